use statrs::distribution::{ContinuousCDF, StudentsT};

///
/// Two-sided p-value of a correlation coefficient under the null of no
/// correlation, from the t statistic `r sqrt((n-2)/(1-r^2))` with
/// `n - 2` degrees of freedom
///
/// * `r` - correlation
/// * `n` - number of samples used
///
pub fn correlation_pvalue(r: f64, n: usize) -> f64 {
    if n <= 2 || !r.is_finite() {
        return 1.0;
    }
    let r = r.abs();
    if r >= 1.0 {
        return 0.0;
    }
    let df = (n - 2) as f64;
    let t = r * (df / (1.0 - r * r)).sqrt();
    match StudentsT::new(0.0, 1.0, df) {
        Ok(t_dist) => (2.0 * (1.0 - t_dist.cdf(t))).clamp(0.0, 1.0),
        Err(_) => 1.0,
    }
}

///
/// Smallest |r| whose two-sided p-value is at or below `pvalue` for `n`
/// samples, found by bisection on the monotone p-value curve
///
pub fn correlation_for_pvalue(pvalue: f64, n: usize) -> f64 {
    if pvalue >= 1.0 {
        return 0.0;
    }
    if pvalue <= 0.0 || n <= 2 {
        return 1.0;
    }
    let (mut lo, mut hi) = (0.0_f64, 1.0_f64);
    for _ in 0..64 {
        let mid = 0.5 * (lo + hi);
        if correlation_pvalue(mid, n) <= pvalue {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    hi
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn known_values() {
        // r = 0.5 with 12 samples: t = 1.8257, df = 10, p ~ 0.0979
        assert_abs_diff_eq!(correlation_pvalue(0.5, 12), 0.0979, epsilon = 1e-3);
        assert_abs_diff_eq!(correlation_pvalue(0.0, 12), 1.0, epsilon = 1e-12);
        assert_eq!(correlation_pvalue(1.0, 12), 0.0);
        assert_eq!(correlation_pvalue(0.9, 2), 1.0);
        assert_eq!(correlation_pvalue(-0.5, 12), correlation_pvalue(0.5, 12));
    }

    #[test]
    fn inverse_is_consistent() {
        for &(p, n) in &[(0.05, 10), (1e-4, 30), (1e-6, 100)] {
            let r = correlation_for_pvalue(p, n);
            assert!(r > 0.0 && r < 1.0);
            assert_abs_diff_eq!(correlation_pvalue(r, n), p, epsilon = p * 1e-3);
        }
        assert!(correlation_for_pvalue(1e-4, 100) < correlation_for_pvalue(1e-4, 20));
    }
}
