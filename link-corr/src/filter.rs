use crate::config::ProfileFilterConfig;
use crate::expression::{ExpressionData, ExpressionProfile};

use log::info;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterSummary {
    pub too_many_missing: usize,
    pub low_expression: usize,
    pub low_variance: usize,
    pub kept: usize,
}

/// Drop the `cut` fraction of `rows` with the smallest `key`
fn drop_lowest(
    rows: Vec<usize>,
    profiles: &[ExpressionProfile],
    cut: f64,
    key: impl Fn(&ExpressionProfile) -> f64,
) -> (Vec<usize>, usize) {
    let ndrop = (cut * rows.len() as f64).floor() as usize;
    if ndrop == 0 {
        return (rows, 0);
    }
    let mut order = rows;
    order.sort_by(|&a, &b| key(&profiles[a]).total_cmp(&key(&profiles[b])).then(a.cmp(&b)));
    let mut kept = order.split_off(ndrop);
    kept.sort();
    (kept, ndrop)
}

///
/// Remove profiles that cannot or should not be correlated: too many
/// missing values, the lowest expressed fraction by profile rank, and
/// the lowest variance fraction
///
/// * `data` - expression data
/// * `config` - filter settings
/// * `min_num_present` - rows need at least this many present values
///
pub fn filter_profiles(
    data: &ExpressionData,
    config: &ProfileFilterConfig,
    min_num_present: usize,
) -> anyhow::Result<(ExpressionData, FilterSummary)> {
    config.validate()?;

    let profiles = data.profiles();
    let ncols = data.ncols();
    let min_present = ((config.min_present_fraction * ncols as f64).ceil() as usize).max(min_num_present);

    let mut summary = FilterSummary::default();
    let rows: Vec<usize> = profiles
        .iter()
        .filter(|p| p.n_present >= min_present)
        .map(|p| p.row)
        .collect();
    summary.too_many_missing = profiles.len() - rows.len();

    let (rows, nlow) = drop_lowest(rows, &profiles, config.low_expression_cut, |p| p.rank);
    summary.low_expression = nlow;

    let (rows, nvar) = drop_lowest(rows, &profiles, config.low_variance_cut, |p| {
        if p.variance.is_finite() {
            p.variance
        } else {
            f64::NEG_INFINITY
        }
    });
    summary.low_variance = nvar;
    summary.kept = rows.len();

    info!(
        "profile filter: kept {} of {} ({} missing, {} low expression, {} low variance)",
        summary.kept,
        profiles.len(),
        summary.too_many_missing,
        summary.low_expression,
        summary.low_variance
    );

    if rows.len() < 2 {
        anyhow::bail!("only {} profiles left after filtering", rows.len());
    }

    Ok((data.select_rows(&rows), summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use matrix_util::ndarray_io::NamedArray2;
    use ndarray::Array2;

    #[test]
    fn filters_in_order() -> anyhow::Result<()> {
        // 10 rows x 10 samples; row i has mean ~ i and spread ~ i
        let mut x = Array2::<f64>::zeros((10, 10));
        for i in 0..10 {
            for j in 0..10 {
                x[[i, j]] = i as f64 * 10.0 + (j as f64) * (i as f64 + 1.0) * 0.1;
            }
        }
        // row 9 is mostly missing
        for j in 0..8 {
            x[[9, j]] = f64::NAN;
        }
        let names = (0..10).map(|i| format!("p{}", i).into_boxed_str()).collect();
        let cols = (0..10).map(|j| format!("s{}", j).into_boxed_str()).collect();
        let data = ExpressionData::new(NamedArray2::new(x, names, cols)?, None);

        let config = ProfileFilterConfig {
            min_present_fraction: 0.5,
            low_expression_cut: 0.25,
            low_variance_cut: 0.2,
        };
        let (kept, summary) = filter_profiles(&data, &config, 8)?;
        assert_eq!(summary.too_many_missing, 1);
        // floor(0.25 * 9) = 2 lowest means: p0, p1
        assert_eq!(summary.low_expression, 2);
        // floor(0.2 * 7) = 1 lowest variance: p2
        assert_eq!(summary.low_variance, 1);
        assert_eq!(kept.nrows(), 6);
        assert_eq!(kept.probe_name(0), "p3");
        Ok(())
    }
}
