use matrix_util::ndarray_stat::rank_with_ties;
use matrix_util::traits::{RankOps, RowStatOps};
use ndarray::prelude::*;

/// Scores beyond this magnitude indicate a numerical problem
const MAX_ABS_SCORE: f64 = 1.00001;

fn checked(r: f64) -> Option<f64> {
    if r.is_finite() && r.abs() <= MAX_ABS_SCORE {
        Some(r.clamp(-1.0, 1.0))
    } else {
        None
    }
}

///
/// Pearson correlation over positions where both values are finite
///
/// * returns (r, number of positions used); `None` when fewer than two
///   positions remain or either vector is constant there
///
pub fn pearson(x: &[f64], y: &[f64]) -> Option<(f64, usize)> {
    assert_eq!(x.len(), y.len(), "vectors differ in length");
    let (mut n, mut sx, mut sy, mut sxx, mut syy, mut sxy) = (0_usize, 0.0, 0.0, 0.0, 0.0, 0.0);
    for (&a, &b) in x.iter().zip(y) {
        if a.is_finite() && b.is_finite() {
            n += 1;
            sx += a;
            sy += b;
            sxx += a * a;
            syy += b * b;
            sxy += a * b;
        }
    }
    if n < 2 {
        return None;
    }
    let nf = n as f64;
    let vx = nf * sxx - sx * sx;
    let vy = nf * syy - sy * sy;
    let denom = vx * vy;
    if denom <= 0.0 {
        return None;
    }
    checked((nf * sxy - sx * sy) / denom.sqrt()).map(|r| (r, n))
}

/// `1 - 6 sse / (n^3 - n)` on ranks, where `sse` sums squared rank
/// differences. `None` when either side has a single distinct rank.
fn rank_difference_score(rx: &[f64], ry: &[f64]) -> Option<(f64, usize)> {
    let n = rx.len();
    if n < 2 || is_constant(rx) || is_constant(ry) {
        return None;
    }
    let sse: f64 = rx.iter().zip(ry).map(|(a, b)| (a - b) * (a - b)).sum();
    let nf = n as f64;
    checked(1.0 - 6.0 * sse / (nf * nf * nf - nf)).map(|r| (r, n))
}

fn is_constant(v: &[f64]) -> bool {
    v.iter().all(|&a| a == v[0])
}

///
/// Spearman correlation over positions where both values are finite.
/// Values are ranked within those positions, ties get average ranks.
///
pub fn spearman(x: &[f64], y: &[f64]) -> Option<(f64, usize)> {
    assert_eq!(x.len(), y.len(), "vectors differ in length");
    let (xs, ys): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y)
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(&a, &b)| (a, b))
        .unzip();
    rank_difference_score(&rank_with_ties(&xs), &rank_with_ties(&ys))
}

/// A similarity between two rows of an expression matrix
pub trait RowPairMetric: Sync {
    fn nrows(&self) -> usize;

    ///
    /// Score of rows `i` and `j` with the number of samples used. `None`
    /// when fewer than the required number of samples are jointly
    /// present or a row is constant.
    ///
    fn correlate(&self, i: usize, j: usize) -> Option<(f64, usize)>;
}

///
/// Pearson correlation between rows. Complete rows are standardized
/// once so that their correlation is a dot product; pairs involving a
/// row with missing values fall back to pairwise-complete sums.
///
pub struct PearsonMetric {
    raw: Array2<f64>,
    unit: Array2<f64>,
    complete: Vec<bool>,
    min_num_used: usize,
}

impl PearsonMetric {
    pub fn new(data: &Array2<f64>, min_num_used: usize) -> Self {
        let stat = data.row_stat();
        let ncols = data.ncols();
        let mut unit = data.clone();
        let mut complete = vec![false; data.nrows()];
        for (i, mut row) in unit.axis_iter_mut(Axis(0)).enumerate() {
            if !stat.has_missing(i, ncols) && stat.ssd[i] > 0.0 {
                let (mu, norm) = (stat.mean[i], stat.ssd[i].sqrt());
                row.mapv_inplace(|x| (x - mu) / norm);
                complete[i] = true;
            }
        }
        Self {
            raw: data.clone(),
            unit,
            complete,
            min_num_used,
        }
    }
}

impl RowPairMetric for PearsonMetric {
    fn nrows(&self) -> usize {
        self.raw.nrows()
    }

    fn correlate(&self, i: usize, j: usize) -> Option<(f64, usize)> {
        if self.complete[i] && self.complete[j] {
            let n = self.unit.ncols();
            if n < self.min_num_used {
                return None;
            }
            let r = self.unit.row(i).dot(&self.unit.row(j));
            return checked(r).map(|r| (r, n));
        }
        let (x, y) = (self.raw.row(i), self.raw.row(j));
        let (Some(x), Some(y)) = (x.as_slice(), y.as_slice()) else {
            return pearson(&x.to_vec(), &y.to_vec()).filter(|&(_, n)| n >= self.min_num_used);
        };
        pearson(x, y).filter(|&(_, n)| n >= self.min_num_used)
    }
}

///
/// Spearman correlation between rows. Rows without missing values are
/// ranked once; pairs involving missing values are re-ranked over the
/// jointly present samples.
///
pub struct SpearmanMetric {
    raw: Array2<f64>,
    ranks: Array2<f64>,
    complete: Vec<bool>,
    min_num_used: usize,
}

impl SpearmanMetric {
    pub fn new(data: &Array2<f64>, min_num_used: usize) -> Self {
        let stat = data.row_stat();
        let ncols = data.ncols();
        let complete = (0..data.nrows())
            .map(|i| !stat.has_missing(i, ncols) && stat.ssd[i] > 0.0)
            .collect();
        Self {
            raw: data.clone(),
            ranks: data.rank_rows(),
            complete,
            min_num_used,
        }
    }
}

impl RowPairMetric for SpearmanMetric {
    fn nrows(&self) -> usize {
        self.raw.nrows()
    }

    fn correlate(&self, i: usize, j: usize) -> Option<(f64, usize)> {
        if self.complete[i] && self.complete[j] {
            if self.ranks.ncols() < self.min_num_used {
                return None;
            }
            let (x, y) = (self.ranks.row(i).to_vec(), self.ranks.row(j).to_vec());
            return rank_difference_score(&x, &y);
        }
        let (x, y) = (self.raw.row(i).to_vec(), self.raw.row(j).to_vec());
        spearman(&x, &y).filter(|&(_, n)| n >= self.min_num_used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn identical_rows_correlate_perfectly() {
        let x = [0.3, 1.2, -0.7, 2.5, 0.0];
        let (r, n) = pearson(&x, &x).unwrap();
        assert_abs_diff_eq!(r, 1.0, epsilon = 1e-9);
        assert_eq!(n, 5);
        let (r, _) = spearman(&x, &x).unwrap();
        assert_abs_diff_eq!(r, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn reversed_ranks_give_minus_one() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [50.0, 40.0, 30.0, 20.0, 10.0];
        assert_abs_diff_eq!(spearman(&x, &y).unwrap().0, -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pearson(&x, &y).unwrap().0, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn missing_values_are_pairwise() {
        let x = [1.0, 2.0, f64::NAN, 4.0, 5.0];
        let y = [2.0, 4.0, 6.0, f64::NAN, 10.0];
        let (r, n) = pearson(&x, &y).unwrap();
        assert_eq!(n, 3);
        assert_abs_diff_eq!(r, 1.0, epsilon = 1e-12);
        assert!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_none());
    }

    #[test]
    fn row_metrics_match_free_functions() {
        let data = array![
            [1.0, 3.0, 2.0, 5.0, 4.0, 7.0, 6.0, 9.0, 8.0],
            [2.0, 1.0, 4.0, 3.0, 6.0, 5.0, 8.0, 7.0, 9.0],
            [9.0, f64::NAN, 7.0, 6.0, 5.0, 4.0, 3.0, 2.0, 1.0],
        ];
        let p = PearsonMetric::new(&data, 8);
        let s = SpearmanMetric::new(&data, 8);
        for (i, j) in [(0, 1), (0, 2), (1, 2)] {
            let (x, y) = (data.row(i).to_vec(), data.row(j).to_vec());
            assert_abs_diff_eq!(p.correlate(i, j).unwrap().0, pearson(&x, &y).unwrap().0, epsilon = 1e-12);
            assert_abs_diff_eq!(s.correlate(i, j).unwrap().0, spearman(&x, &y).unwrap().0, epsilon = 1e-12);
            assert_eq!(p.correlate(i, j), p.correlate(j, i));
            assert_eq!(s.correlate(i, j), s.correlate(j, i));
        }
        // 8 jointly present samples is enough, 9 is not
        assert!(PearsonMetric::new(&data, 9).correlate(0, 2).is_none());
        assert!(PearsonMetric::new(&data, 9).correlate(0, 1).is_some());
    }

    #[test]
    fn constant_row_has_no_score() {
        let data = Array2::from_shape_fn((2, 10), |(i, j)| if i == 0 { 5.0 } else { j as f64 });
        let (x, y) = (data.row(0).to_vec(), data.row(1).to_vec());
        assert!(SpearmanMetric::new(&data, 8).correlate(0, 1).is_none());
        assert!(PearsonMetric::new(&data, 8).correlate(0, 1).is_none());
        assert!(spearman(&x, &y).is_none());
        assert!(spearman(&y, &x).is_none());
        assert!(spearman(&y, &y).is_some());
    }
}
