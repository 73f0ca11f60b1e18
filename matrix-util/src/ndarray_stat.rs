use crate::traits::{RankOps, RowStatOps};
use ndarray::prelude::*;
use rayon::prelude::*;

/// Sufficient statistics of each row, computed over finite entries only
#[derive(Clone, Debug)]
pub struct RowStatistics {
    pub n_present: Vec<usize>,
    pub mean: Vec<f64>,
    /// sum of squared deviations from the mean
    pub ssd: Vec<f64>,
}

impl RowStatistics {
    pub fn nrows(&self) -> usize {
        self.mean.len()
    }

    /// Sample variance; NaN with fewer than two values
    pub fn variance(&self, i: usize) -> f64 {
        let n = self.n_present[i];
        if n < 2 {
            f64::NAN
        } else {
            self.ssd[i] / (n - 1) as f64
        }
    }

    pub fn has_missing(&self, i: usize, ncols: usize) -> bool {
        self.n_present[i] < ncols
    }
}

impl RowStatOps for Array2<f64> {
    type Stat = RowStatistics;

    fn row_stat(&self) -> Self::Stat {
        let stats: Vec<(usize, f64, f64)> = self
            .axis_iter(Axis(0))
            .into_par_iter()
            .map(|row| {
                let (n, s1) = row
                    .iter()
                    .filter(|x| x.is_finite())
                    .fold((0_usize, 0_f64), |(n, s), &x| (n + 1, s + x));
                if n == 0 {
                    return (0, f64::NAN, 0.0);
                }
                let mu = s1 / n as f64;
                let ssd = row
                    .iter()
                    .filter(|x| x.is_finite())
                    .map(|&x| (x - mu) * (x - mu))
                    .sum::<f64>();
                (n, mu, ssd)
            })
            .collect();

        RowStatistics {
            n_present: stats.iter().map(|x| x.0).collect(),
            mean: stats.iter().map(|x| x.1).collect(),
            ssd: stats.iter().map(|x| x.2).collect(),
        }
    }
}

///
/// 1-based ranks with ties replaced by their average rank. Non-finite
/// values get NaN and do not take part in the ranking.
///
/// * `values` - a slice of numbers
///
pub fn rank_with_ties(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len())
        .filter(|&i| values[i].is_finite())
        .collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![f64::NAN; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start..end share the average of ranks start+1..=end
        let avg = (start + end + 1) as f64 / 2.0;
        for &k in &order[start..end] {
            ranks[k] = avg;
        }
        start = end;
    }
    ranks
}

///
/// Percentile rank in [0,1] of each value (average ranks for ties);
/// non-finite values stay NaN
///
pub fn percentile_ranks(values: &[f64]) -> Vec<f64> {
    let ranks = rank_with_ties(values);
    let n = ranks.iter().filter(|x| x.is_finite()).count();
    if n <= 1 {
        return ranks.iter().map(|r| if r.is_finite() { 1.0 } else { f64::NAN }).collect();
    }
    ranks
        .into_iter()
        .map(|r| (r - 1.0) / (n - 1) as f64)
        .collect()
}

impl RankOps for Array2<f64> {
    type Mat = Array2<f64>;

    fn rank_rows(&self) -> Self::Mat {
        let mut ret = self.clone();
        ret.axis_iter_mut(Axis(0))
            .into_par_iter()
            .for_each(|mut row| {
                let values = row.to_vec();
                for (x, r) in row.iter_mut().zip(rank_with_ties(&values)) {
                    *x = r;
                }
            });
        ret
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn ranks_average_ties() {
        let r = rank_with_ties(&[3.0, 1.0, 3.0, f64::NAN, 2.0]);
        assert_abs_diff_eq!(r[0], 3.5);
        assert_abs_diff_eq!(r[1], 1.0);
        assert_abs_diff_eq!(r[2], 3.5);
        assert!(r[3].is_nan());
        assert_abs_diff_eq!(r[4], 2.0);
    }

    #[test]
    fn row_stat_skips_missing() {
        let x = array![[1.0, 2.0, 3.0, f64::NAN], [4.0, 4.0, 4.0, 4.0]];
        let stat = x.row_stat();
        assert_eq!(stat.n_present, vec![3, 4]);
        assert_abs_diff_eq!(stat.mean[0], 2.0);
        assert_abs_diff_eq!(stat.ssd[0], 2.0);
        assert_abs_diff_eq!(stat.variance(0), 1.0);
        assert_abs_diff_eq!(stat.ssd[1], 0.0);
        assert!(stat.has_missing(0, 4));
        assert!(!stat.has_missing(1, 4));
    }

    #[test]
    fn percentile_ranks_span_unit_interval() {
        let p = percentile_ranks(&[10.0, 30.0, 20.0]);
        assert_abs_diff_eq!(p[0], 0.0);
        assert_abs_diff_eq!(p[1], 1.0);
        assert_abs_diff_eq!(p[2], 0.5);
    }
}
