use rand::prelude::SliceRandom;
use rand::Rng;

/// Row blocks for upper-triangle pair loops. Row `i` visits `n - i - 1`
/// pairs, so blocks shrink toward the top of the matrix to balance work.
/// * `ntot` - number of rows
/// * `pairs_per_block` - target number of pairs per block
pub fn generate_triangle_intervals(ntot: usize, pairs_per_block: usize) -> Vec<(usize, usize)> {
    let pairs_per_block = pairs_per_block.max(1);
    let mut ret = vec![];
    let mut lb = 0;
    while lb < ntot {
        let mut ub = lb;
        let mut npairs = 0;
        while ub < ntot && (npairs < pairs_per_block || ub == lb) {
            npairs += ntot - ub - 1;
            ub += 1;
        }
        ret.push((lb, ub));
        lb = ub;
    }
    ret
}

/// Shuffle a copy of `elems`
pub fn shuffled<T: Clone, R: Rng + ?Sized>(elems: &[T], rng: &mut R) -> Vec<T> {
    let mut ret = elems.to_vec();
    ret.shuffle(rng);
    ret
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_intervals_are_contiguous() {
        let jobs = generate_triangle_intervals(100, 500);
        assert_eq!(jobs.first().map(|x| x.0), Some(0));
        assert_eq!(jobs.last().map(|x| x.1), Some(100));
        for w in jobs.windows(2) {
            assert_eq!(w[0].1, w[1].0);
        }
        // early rows carry more pairs, so the first block is narrower
        assert!(jobs[0].1 - jobs[0].0 < jobs[jobs.len() - 1].1 - jobs[jobs.len() - 1].0);
    }
}
