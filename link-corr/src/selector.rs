use crate::config::{LinkAnalysisConfig, SingularThreshold};
use crate::engine::Thresholds;
use crate::histogram::{CorrelationHistogram, NUM_BINS};
use crate::pvalue::correlation_for_pvalue;

use log::info;

/// Score cut points read off the histogram
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CutPoints {
    pub upper: f64,
    pub lower: f64,
}

///
/// Cut points leaving a `cdf_cut` fraction of scores in the tails.
/// Two-tailed unless `absolute_value`, in which case the histogram
/// holds |r| and only the upper cut is used (lower is 0).
///
/// `cdf_cut <= 0` gives (1, -1) and `cdf_cut >= 1` gives (0, 0),
/// whatever the histogram holds.
///
pub fn cdf_cut_points(hist: &CorrelationHistogram, cdf_cut: f64, absolute_value: bool) -> CutPoints {
    if cdf_cut <= 0.0 {
        return CutPoints {
            upper: 1.0,
            lower: -1.0,
        };
    }
    if cdf_cut >= 1.0 {
        return CutPoints {
            upper: 0.0,
            lower: 0.0,
        };
    }

    let cdf = hist.upper_tail_cdf();
    let tail = if absolute_value { cdf_cut } else { cdf_cut / 2.0 };

    let upper = (0..NUM_BINS)
        .rev()
        .find(|&i| cdf[i] >= tail)
        .map(CorrelationHistogram::score_in_bin)
        .unwrap_or(1.0);

    let lower = if absolute_value {
        0.0
    } else {
        (0..NUM_BINS)
            .find(|&i| 1.0 - cdf[i] >= tail)
            .map(CorrelationHistogram::score_in_bin)
            .unwrap_or(-1.0)
    };

    CutPoints { upper, lower }
}

/// Turns a pass-1 histogram into pass-2 thresholds
pub struct LinkSelector<'a> {
    config: &'a LinkAnalysisConfig,
}

impl<'a> LinkSelector<'a> {
    pub fn new(config: &'a LinkAnalysisConfig) -> Self {
        Self { config }
    }

    /// Bonferroni-corrected p-value ceiling over `num_eligible_rows`
    pub fn max_pvalue(&self, num_eligible_rows: usize) -> f64 {
        (self.config.fwe / num_eligible_rows.max(1) as f64).min(1.0)
    }

    ///
    /// Choose the thresholds for pass 2
    ///
    /// * `hist` - pass-1 histogram
    /// * `num_eligible_rows` - rows tested (rows with genes)
    /// * `num_samples` - columns of the expression matrix
    ///
    pub fn choose(&self, hist: &CorrelationHistogram, num_eligible_rows: usize, num_samples: usize) -> Thresholds {
        let config = self.config;
        let cut = cdf_cut_points(hist, config.cdf_cut, config.absolute_value);
        let max_p = self.max_pvalue(num_eligible_rows);
        let score_at_p = correlation_for_pvalue(max_p, num_samples);

        info!(
            "cdf cut {} -> upper {:.4}, lower {:.4}; max p {:.3e} -> |r| {:.4}",
            config.cdf_cut, cut.upper, cut.lower, max_p, score_at_p
        );

        let (upper, lower, use_pvalue) = match config.singular_threshold {
            SingularThreshold::Fwe => (score_at_p, -score_at_p, config.use_pvalue_threshold),
            SingularThreshold::CdfCut => (cut.upper, cut.lower, false),
            SingularThreshold::None => (
                score_at_p.max(cut.upper),
                (-score_at_p).min(cut.lower),
                config.use_pvalue_threshold,
            ),
        };
        let lower = if config.absolute_value { upper } else { lower };

        info!(
            "thresholds ({}): upper {:.4}, lower {:.4}, p-value filter {}",
            config.singular_threshold,
            upper,
            lower,
            if use_pvalue { "on" } else { "off" }
        );

        Thresholds {
            upper,
            lower,
            pvalue: max_p,
            use_pvalue,
            absolute_value: config.absolute_value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn uniform_histogram(n: usize) -> CorrelationHistogram {
        let mut rng = StdRng::seed_from_u64(7);
        let mut hist = CorrelationHistogram::new();
        for _ in 0..n {
            hist.add(rng.random_range(-1.0..1.0));
        }
        hist
    }

    #[test]
    fn degenerate_cuts_ignore_the_histogram() {
        for hist in [CorrelationHistogram::new(), uniform_histogram(1000)] {
            for abs in [false, true] {
                assert_eq!(
                    cdf_cut_points(&hist, 0.0, abs),
                    CutPoints {
                        upper: 1.0,
                        lower: -1.0
                    }
                );
                assert_eq!(
                    cdf_cut_points(&hist, 1.0, abs),
                    CutPoints {
                        upper: 0.0,
                        lower: 0.0
                    }
                );
            }
        }
    }

    #[test]
    fn tails_of_a_uniform_distribution() {
        let hist = uniform_histogram(200_000);
        let cut = cdf_cut_points(&hist, 0.1, false);
        assert_abs_diff_eq!(cut.upper, 0.9, epsilon = 0.01);
        assert_abs_diff_eq!(cut.lower, -0.9, epsilon = 0.01);
    }

    #[test]
    fn singular_choices() {
        let hist = uniform_histogram(10_000);
        let base = LinkAnalysisConfig {
            cdf_cut: 0.5,
            ..Default::default()
        };
        let both = LinkSelector::new(&base).choose(&hist, 100, 20);
        let fwe_config = LinkAnalysisConfig {
            singular_threshold: SingularThreshold::Fwe,
            ..base.clone()
        };
        let fwe = LinkSelector::new(&fwe_config).choose(&hist, 100, 20);
        let cdf_config = LinkAnalysisConfig {
            singular_threshold: SingularThreshold::CdfCut,
            ..base.clone()
        };
        let cdf = LinkSelector::new(&cdf_config).choose(&hist, 100, 20);

        let score_at_p = correlation_for_pvalue(1e-4, 20);
        assert_abs_diff_eq!(fwe.upper, score_at_p, epsilon = 1e-9);
        assert_abs_diff_eq!(fwe.lower, -score_at_p, epsilon = 1e-9);
        assert!(fwe.use_pvalue);
        assert!(!cdf.use_pvalue);
        assert_abs_diff_eq!(both.upper, fwe.upper.max(cdf.upper));
        assert_abs_diff_eq!(both.lower, fwe.lower.min(cdf.lower));
        assert_abs_diff_eq!(both.pvalue, 1e-4, epsilon = 1e-15);
    }

    #[test]
    fn absolute_mode_uses_one_cut() {
        let config = LinkAnalysisConfig {
            absolute_value: true,
            singular_threshold: SingularThreshold::CdfCut,
            cdf_cut: 0.2,
            ..Default::default()
        };
        let mut hist = CorrelationHistogram::new();
        for k in 0..1000 {
            hist.add(k as f64 / 1000.0);
        }
        let t = LinkSelector::new(&config).choose(&hist, 10, 20);
        assert_eq!(t.lower, t.upper);
        assert_abs_diff_eq!(t.upper, 0.8, epsilon = 0.002);
    }
}
