use crate::gene_links::GeneLink;

use fnv::{FnvHashMap as HashMap, FnvHashSet as HashSet};
use log::info;
use matrix_util::common_io::write_lines;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

/// Replication counts above this are pooled into the last bucket
pub const LINK_MAXIMUM_COUNT: usize = 100;

///
/// How many links were replicated in exactly `r` experiments, kept
/// separately for positive and negative links
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkConfirmationStatistics {
    pos: Vec<usize>,
    neg: Vec<usize>,
}

impl Default for LinkConfirmationStatistics {
    fn default() -> Self {
        Self {
            pos: vec![0; LINK_MAXIMUM_COUNT + 1],
            neg: vec![0; LINK_MAXIMUM_COUNT + 1],
        }
    }
}

impl LinkConfirmationStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket(rep: usize) -> usize {
        assert!(rep >= 1, "replication count must be at least 1");
        rep.min(LINK_MAXIMUM_COUNT)
    }

    /// Record one positive link replicated `rep` times
    pub fn add_pos(&mut self, rep: usize) {
        self.pos[Self::bucket(rep)] += 1;
    }

    /// Record one negative link replicated `rep` times
    pub fn add_neg(&mut self, rep: usize) {
        self.neg[Self::bucket(rep)] += 1;
    }

    pub fn pos_rep_count(&self, rep: usize) -> usize {
        self.pos[Self::bucket(rep)]
    }

    pub fn neg_rep_count(&self, rep: usize) -> usize {
        self.neg[Self::bucket(rep)]
    }

    pub fn rep_count(&self, rep: usize) -> usize {
        self.pos_rep_count(rep) + self.neg_rep_count(rep)
    }

    /// Positive links replicated at least `rep` times
    pub fn cumulative_pos_rep_count(&self, rep: usize) -> usize {
        self.pos[Self::bucket(rep)..].iter().sum()
    }

    pub fn cumulative_neg_rep_count(&self, rep: usize) -> usize {
        self.neg[Self::bucket(rep)..].iter().sum()
    }

    /// Links replicated at least `rep` times
    pub fn cumulative_rep_count(&self, rep: usize) -> usize {
        self.cumulative_pos_rep_count(rep) + self.cumulative_neg_rep_count(rep)
    }

    pub fn total(&self) -> usize {
        self.cumulative_rep_count(1)
    }

    /// Largest replication count observed (0 if empty)
    pub fn max_support(&self) -> usize {
        (1..=LINK_MAXIMUM_COUNT)
            .rev()
            .find(|&r| self.rep_count(r) > 0)
            .unwrap_or(0)
    }

    pub fn merge(&mut self, other: &Self) {
        for (a, b) in self.pos.iter_mut().zip(&other.pos) {
            *a += b;
        }
        for (a, b) in self.neg.iter_mut().zip(&other.neg) {
            *a += b;
        }
    }
}

///
/// Counts in how many experiments each gene link was found, and repeats
/// the count on data whose gene ids were permuted within each
/// experiment to estimate how much support arises by chance.
///
#[derive(Clone, Debug, Default)]
pub struct LinkStatistics {
    experiments: Vec<Vec<GeneLink>>,
    genes: Vec<i64>,
}

impl LinkStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the links of one experiment; repeated links count once
    pub fn add_experiment(&mut self, links: &[GeneLink]) {
        let mut uniq: HashSet<GeneLink> = HashSet::default();
        let mut kept = vec![];
        for l in links.iter() {
            let l = l.canonical();
            if l.first != l.second && uniq.insert(l) {
                kept.push(l);
            }
        }
        self.experiments.push(kept);
        self.genes.clear();
    }

    pub fn num_experiments(&self) -> usize {
        self.experiments.len()
    }

    /// Genes taking part in any link, sorted
    pub fn genes(&mut self) -> &[i64] {
        if self.genes.is_empty() {
            let mut genes: Vec<i64> = self
                .experiments
                .iter()
                .flatten()
                .flat_map(|l| [l.first, l.second])
                .collect();
            genes.sort();
            genes.dedup();
            self.genes = genes;
        }
        &self.genes
    }

    fn tally<'a>(experiments: impl Iterator<Item = &'a Vec<GeneLink>>) -> LinkConfirmationStatistics {
        let mut counts: HashMap<GeneLink, usize> = HashMap::default();
        for links in experiments {
            for l in links {
                *counts.entry(*l).or_default() += 1;
            }
        }
        let mut stats = LinkConfirmationStatistics::new();
        for (l, rep) in counts {
            if l.is_positive() {
                stats.add_pos(rep);
            } else {
                stats.add_neg(rep);
            }
        }
        stats
    }

    pub fn confirmation_stats(&self) -> LinkConfirmationStatistics {
        Self::tally(self.experiments.iter())
    }

    ///
    /// Confirmation statistics on gene-shuffled data
    ///
    /// * `num_runs` - number of shuffles
    /// * `seed` - run `k` uses `seed + k`
    ///
    pub fn shuffled_stats(&mut self, num_runs: usize, seed: u64) -> Vec<LinkConfirmationStatistics> {
        let genes = self.genes().to_vec();
        let experiments = &self.experiments;

        (0..num_runs)
            .into_par_iter()
            .map(|run| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(run as u64));
                let shuffled: Vec<Vec<GeneLink>> = experiments
                    .iter()
                    .map(|links| {
                        let perm = matrix_util::utils::shuffled(&genes, &mut rng);
                        let relabel: HashMap<i64, i64> =
                            genes.iter().copied().zip(perm.iter().copied()).collect();
                        let mut uniq: HashSet<GeneLink> = HashSet::default();
                        links
                            .iter()
                            .map(|l| GeneLink::new(relabel[&l.first], relabel[&l.second], l.score).canonical())
                            .filter(|l| uniq.insert(*l))
                            .collect()
                    })
                    .collect();
                let stats = Self::tally(shuffled.iter());
                info!("shuffle run {}: {} links", run, stats.total());
                stats
            })
            .collect()
    }

    ///
    /// Write the table of links supported by at least `r` experiments:
    /// a `Support` header, `RealLinks`, `ShuffleMean` (mean shuffled
    /// count over the real count) and one `ShuffleRun_k` row per run.
    ///
    pub fn write_stats(
        file: &str,
        real: &LinkConfirmationStatistics,
        shuffles: &[LinkConfirmationStatistics],
    ) -> anyhow::Result<()> {
        let lines = Self::stats_table(real, shuffles);
        write_lines(&lines, file)
    }

    pub fn stats_table(
        real: &LinkConfirmationStatistics,
        shuffles: &[LinkConfirmationStatistics],
    ) -> Vec<Box<str>> {
        let max_support = shuffles
            .iter()
            .map(|s| s.max_support())
            .chain(std::iter::once(real.max_support()))
            .max()
            .unwrap_or(0);

        let row = |label: &str, values: Vec<String>| -> Box<str> {
            std::iter::once(label.to_string())
                .chain(values)
                .collect::<Vec<_>>()
                .join("\t")
                .into_boxed_str()
        };

        let mut lines = vec![row(
            "Support",
            (1..=max_support).map(|r| r.to_string()).collect(),
        )];

        lines.push(row(
            "RealLinks",
            (1..=max_support)
                .map(|r| real.cumulative_rep_count(r).to_string())
                .collect(),
        ));

        if !shuffles.is_empty() {
            let ratios = (1..=max_support)
                .map(|r| {
                    let mean = shuffles
                        .iter()
                        .map(|s| s.cumulative_rep_count(r) as f64)
                        .sum::<f64>()
                        / shuffles.len() as f64;
                    let denom = real.cumulative_rep_count(r);
                    if denom > 0 {
                        format!("{:.4}", mean / denom as f64)
                    } else {
                        "NA".to_string()
                    }
                })
                .collect();
            lines.push(row("ShuffleMean", ratios));

            for (k, s) in shuffles.iter().enumerate() {
                lines.push(row(
                    &format!("ShuffleRun_{}", k + 1),
                    (1..=max_support)
                        .map(|r| s.cumulative_rep_count(r).to_string())
                        .collect(),
                ));
            }
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replication_counts() {
        let mut stats = LinkConfirmationStatistics::new();
        stats.add_pos(3);
        stats.add_pos(3);
        stats.add_neg(3);
        assert_eq!(stats.rep_count(3), 3);
        assert_eq!(stats.cumulative_rep_count(3), 3);
        assert_eq!(stats.cumulative_rep_count(1), 3);
        assert_eq!(stats.cumulative_rep_count(4), 0);
        assert_eq!(stats.pos_rep_count(3), 2);
        assert_eq!(stats.neg_rep_count(3), 1);
        assert_eq!(stats.max_support(), 3);
    }

    #[test]
    fn large_counts_pool_in_last_bucket() {
        let mut stats = LinkConfirmationStatistics::new();
        stats.add_pos(LINK_MAXIMUM_COUNT + 50);
        assert_eq!(stats.rep_count(LINK_MAXIMUM_COUNT), 1);
        assert_eq!(stats.max_support(), LINK_MAXIMUM_COUNT);
    }

    #[test]
    fn shuffles_preserve_link_totals() {
        let mut ls = LinkStatistics::new();
        let e1 = vec![
            GeneLink::new(1, 2, 0.9),
            GeneLink::new(2, 1, 0.8),
            GeneLink::new(3, 4, -0.7),
        ];
        let e2 = vec![GeneLink::new(1, 2, 0.5), GeneLink::new(5, 6, 0.6)];
        ls.add_experiment(&e1);
        ls.add_experiment(&e2);

        let real = ls.confirmation_stats();
        assert_eq!(real.pos_rep_count(2), 1);
        assert_eq!(real.pos_rep_count(1), 1);
        assert_eq!(real.neg_rep_count(1), 1);

        let shuffles = ls.shuffled_stats(3, 7);
        assert_eq!(shuffles.len(), 3);
        // each experiment keeps its number of distinct links
        for s in shuffles.iter() {
            let weighted: usize = (1..=LINK_MAXIMUM_COUNT).map(|r| r * s.rep_count(r)).sum();
            assert_eq!(weighted, 4);
        }
        assert_eq!(ls.shuffled_stats(3, 7), shuffles);

        let table = LinkStatistics::stats_table(&real, &shuffles);
        assert!(table[0].starts_with("Support\t1"));
        assert!(table[1].starts_with("RealLinks\t3"));
        assert!(table[2].starts_with("ShuffleMean"));
        assert_eq!(table.len(), 6);
    }
}
