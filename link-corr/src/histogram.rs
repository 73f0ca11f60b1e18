use matrix_util::common_io::write_lines;

/// Number of bins over [-1, 1]
pub const NUM_BINS: usize = 2048;
const HALF_BINS: f64 = (NUM_BINS / 2) as f64;

///
/// Fixed-resolution histogram of correlation scores. Each parallel job
/// fills its own copy; the copies are merged afterwards.
///
#[derive(Clone, Debug, PartialEq)]
pub struct CorrelationHistogram {
    counts: Vec<u64>,
    total: u64,
    sum: f64,
}

impl Default for CorrelationHistogram {
    fn default() -> Self {
        Self {
            counts: vec![0; NUM_BINS],
            total: 0,
            sum: 0.0,
        }
    }
}

impl CorrelationHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bin of a score; scores are clamped into [-1, 1]
    pub fn bin_of(score: f64) -> usize {
        let x = ((1.0 + score.clamp(-1.0, 1.0)) * HALF_BINS) as usize;
        x.min(NUM_BINS - 1)
    }

    /// Lower edge of bin `i`
    pub fn score_in_bin(i: usize) -> f64 {
        i as f64 / HALF_BINS - 1.0
    }

    pub fn add(&mut self, score: f64) {
        self.counts[Self::bin_of(score)] += 1;
        self.total += 1;
        self.sum += score;
    }

    pub fn merge(&mut self, other: &Self) {
        for (a, b) in self.counts.iter_mut().zip(&other.counts) {
            *a += b;
        }
        self.total += other.total;
        self.sum += other.sum;
    }

    pub fn count(&self, i: usize) -> u64 {
        self.counts[i]
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn mean(&self) -> f64 {
        if self.total == 0 {
            f64::NAN
        } else {
            self.sum / self.total as f64
        }
    }

    ///
    /// Fraction of scores in bin `i` or above, for every bin. Empty
    /// histograms give all zeros.
    ///
    pub fn upper_tail_cdf(&self) -> Vec<f64> {
        let mut ret = vec![0.0; NUM_BINS];
        if self.total == 0 {
            return ret;
        }
        let mut cum = 0_u64;
        for i in (0..NUM_BINS).rev() {
            cum += self.counts[i];
            ret[i] = cum as f64 / self.total as f64;
        }
        ret
    }

    /// Write `bin_start \t count` lines for non-empty bins
    pub fn to_file(&self, file: &str) -> anyhow::Result<()> {
        let mut lines: Vec<Box<str>> = vec!["bin_start\tcount".into()];
        lines.extend(
            self.counts
                .iter()
                .enumerate()
                .filter(|(_, &c)| c > 0)
                .map(|(i, c)| format!("{:.5}\t{}", Self::score_in_bin(i), c).into_boxed_str()),
        );
        write_lines(&lines, file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn bins_cover_unit_interval() {
        assert_eq!(CorrelationHistogram::bin_of(-1.0), 0);
        assert_eq!(CorrelationHistogram::bin_of(0.0), 1024);
        assert_eq!(CorrelationHistogram::bin_of(1.0), NUM_BINS - 1);
        assert_eq!(CorrelationHistogram::bin_of(1.00001), NUM_BINS - 1);
        assert_abs_diff_eq!(CorrelationHistogram::score_in_bin(1024), 0.0);
        assert_abs_diff_eq!(CorrelationHistogram::score_in_bin(0), -1.0);
    }

    #[test]
    fn merge_and_tail() {
        let mut a = CorrelationHistogram::new();
        let mut b = CorrelationHistogram::new();
        a.add(0.5);
        a.add(-0.5);
        b.add(0.9);
        b.add(0.9);
        a.merge(&b);
        assert_eq!(a.total(), 4);
        assert_abs_diff_eq!(a.mean(), 0.45);

        let cdf = a.upper_tail_cdf();
        assert_abs_diff_eq!(cdf[0], 1.0);
        assert_abs_diff_eq!(cdf[CorrelationHistogram::bin_of(0.9)], 0.5);
        assert_abs_diff_eq!(cdf[CorrelationHistogram::bin_of(0.95)], 0.0);
    }
}
