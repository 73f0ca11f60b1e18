use crate::bit_matrix::{CompressedBitMatrix, PairPacker};
use crate::collaborators::{CoexpressionSource, ExperimentLookup, GeneLookup, OntologySource};
use crate::error::Result;
use crate::experiment_index::ExperimentIndex;
use crate::mask;

use fnv::{FnvHashMap as HashMap, FnvHashSet as HashSet};
use log::{info, warn};

/// What a `count` call recorded and skipped
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CountSummary {
    pub bits_set: usize,
    pub unknown_query_genes: usize,
    pub unknown_partner_genes: usize,
    pub unknown_experiments: usize,
}

impl CountSummary {
    pub fn add(&mut self, other: &CountSummary) {
        self.bits_set += other.bits_set;
        self.unknown_query_genes += other.unknown_query_genes;
        self.unknown_partner_genes += other.unknown_partner_genes;
        self.unknown_experiments += other.unknown_experiments;
    }

    pub fn skipped(&self) -> usize {
        self.unknown_query_genes + self.unknown_partner_genes + self.unknown_experiments
    }
}

///
/// Query genes by candidate genes, one bit per experiment: bit `e` of
/// cell (i, j) means the two genes were coexpressed in experiment `e`.
///
#[derive(Clone, Debug)]
pub struct LinkMatrix {
    matrix: CompressedBitMatrix,
    experiments: ExperimentIndex,
}

impl LinkMatrix {
    ///
    /// Allocate the matrix and name its rows, columns and bits
    ///
    /// * `target_genes` - query genes (rows)
    /// * `candidate_genes` - partner genes (columns)
    /// * `experiments` - experiment ids in bit order
    ///
    pub fn init(target_genes: &[i64], candidate_genes: &[i64], experiments: &[i64]) -> Result<Self> {
        let experiments = ExperimentIndex::new(experiments);
        let mut matrix =
            CompressedBitMatrix::new(target_genes.len(), candidate_genes.len(), experiments.len());
        for &g in target_genes {
            matrix.add_row_name(g)?;
        }
        for &g in candidate_genes {
            matrix.add_column_name(g)?;
        }
        info!(
            "link matrix: {} query genes x {} candidate genes x {} experiments",
            matrix.rows(),
            matrix.cols(),
            matrix.bit_count()
        );
        Ok(Self {
            matrix,
            experiments,
        })
    }

    pub fn from_parts(matrix: CompressedBitMatrix, experiments: ExperimentIndex) -> anyhow::Result<Self> {
        if matrix.bit_count() != experiments.len() {
            anyhow::bail!(
                "bit count {} does not match {} experiments",
                matrix.bit_count(),
                experiments.len()
            );
        }
        Ok(Self {
            matrix,
            experiments,
        })
    }

    pub fn matrix(&self) -> &CompressedBitMatrix {
        &self.matrix
    }

    pub fn experiments(&self) -> &ExperimentIndex {
        &self.experiments
    }

    ///
    /// Record the coexpression partners of one query gene
    ///
    /// * `row_gene` - query gene id
    /// * `partners` - partner gene id -> experiments where the pair was coexpressed
    ///
    pub fn count(&mut self, row_gene: i64, partners: &HashMap<i64, Vec<i64>>) -> Result<CountSummary> {
        let mut summary = CountSummary::default();

        let Some(i) = self.matrix.row_index(row_gene) else {
            warn!("query gene {} is not a row of the link matrix", row_gene);
            summary.unknown_query_genes += 1;
            return Ok(summary);
        };

        for (&partner, ees) in partners.iter() {
            let Some(j) = self.matrix.col_index(partner) else {
                summary.unknown_partner_genes += 1;
                continue;
            };
            for &ee in ees.iter() {
                match self.experiments.bit(ee) {
                    Some(b) => {
                        self.matrix.set(i, j, b)?;
                        summary.bits_set += 1;
                    }
                    None => {
                        warn!("no bit for experiment {}; skipping", ee);
                        summary.unknown_experiments += 1;
                    }
                }
            }
        }
        Ok(summary)
    }

    ///
    /// Fill every row from a coexpression source
    ///
    /// * `source` - partners of each query gene
    /// * `stringency` - minimum experiments per pair passed to the source
    ///
    pub fn fill<S: CoexpressionSource>(&mut self, source: &S, stringency: usize) -> anyhow::Result<CountSummary> {
        let experiments = self.experiments.experiment_ids().to_vec();
        let genes = self.matrix.row_names().to_vec();
        let mut total = CountSummary::default();

        for (k, &g) in genes.iter().enumerate() {
            let partners = source.coexpressed_genes(g, &experiments, stringency)?;
            total.add(&self.count(g, &partners)?);
            if (k + 1) % 1000 == 0 {
                info!("filled {} / {} query genes", k + 1, genes.len());
            }
        }

        info!(
            "{} bits set over {} cells; skipped {} unknown partners, {} unknown experiments",
            total.bits_set,
            self.matrix.num_nonempty_cells(),
            total.unknown_partner_genes,
            total.unknown_experiments
        );
        Ok(total)
    }

    pub fn packer(&self) -> PairPacker {
        self.matrix.packer()
    }

    pub fn pack(&self, i: usize, j: usize) -> u64 {
        self.matrix.packer().pack(i, j)
    }

    pub fn unpack(&self, id: u64) -> (usize, usize) {
        self.matrix.packer().unpack(id)
    }

    /// Gene ids of a packed pair
    pub fn paired_genes(&self, id: u64) -> (i64, i64) {
        let (i, j) = self.unpack(id);
        (self.matrix.row_name(i), self.matrix.col_name(j))
    }

    /// Support of a gene pair; 0 when either gene is unknown
    pub fn support(&self, query_gene: i64, partner_gene: i64) -> usize {
        match (
            self.matrix.row_index(query_gene),
            self.matrix.col_index(partner_gene),
        ) {
            (Some(i), Some(j)) => self.matrix.count_bits(i, j),
            _ => 0,
        }
    }

    /// Experiments supporting cell (i, j), in bit order
    pub fn supporting_experiments(&self, i: usize, j: usize) -> Vec<i64> {
        match self.matrix.mask(i, j) {
            Some(m) => mask::iter_ones(m)
                .map(|b| self.experiments.experiment_id(b))
                .collect(),
            None => vec![],
        }
    }

    /// Experiment ids of the set bits of any mask of this matrix
    pub fn decode_experiments(&self, m: &[u64]) -> Vec<i64> {
        mask::iter_ones(m)
            .map(|b| self.experiments.experiment_id(b))
            .collect()
    }

    pub fn supporting_experiment_names<E: ExperimentLookup>(
        &self,
        lookup: &E,
        i: usize,
        j: usize,
    ) -> anyhow::Result<Vec<Box<str>>> {
        let ids = self.supporting_experiments(i, j);
        Ok(lookup
            .load_experiments_by_ids(&ids)?
            .into_iter()
            .map(|e| e.short_name)
            .collect())
    }

    /// Gene names of a packed pair, falling back to ids
    pub fn paired_gene_names<G: GeneLookup>(&self, lookup: &G, id: u64) -> anyhow::Result<(Box<str>, Box<str>)> {
        let (a, b) = self.paired_genes(id);
        let genes = lookup.load_genes_by_ids(&[a, b])?;
        let name = |x: i64| -> Box<str> {
            genes
                .iter()
                .find(|g| g.id == x)
                .map(|g| g.name.clone())
                .unwrap_or_else(|| x.to_string().into_boxed_str())
        };
        Ok((name(a), name(b)))
    }

    /// Was the pair found in this experiment?
    pub fn check_confirmation(&self, i: usize, j: usize, experiment_id: i64) -> bool {
        match self.experiments.bit(experiment_id) {
            Some(b) => self.matrix.check(i, j, b),
            None => false,
        }
    }

    /// Number of cells at each support level, indexed by support
    pub fn support_histogram(&self) -> Vec<usize> {
        let mut hist = vec![0_usize; self.matrix.bit_count() + 1];
        for (_, _, m) in self.matrix.nonempty_cells() {
            hist[mask::count_bits(m)] += 1;
        }
        hist
    }

    ///
    /// Cells supported by at least `stringency` experiments, as
    /// (row, col, support) sorted by support (desc) then position.
    /// When a gene pair appears as both (a, b) and (b, a), only the
    /// first in row order is kept.
    ///
    pub fn links_above(&self, stringency: usize) -> Vec<(usize, usize, usize)> {
        let mut seen: HashSet<(i64, i64)> = HashSet::default();
        let mut ret = vec![];
        for (i, j, m) in self.matrix.nonempty_cells() {
            let support = mask::count_bits(m);
            if support == 0 || support < stringency {
                continue;
            }
            let (a, b) = (self.matrix.row_name(i), self.matrix.col_name(j));
            if a == b || !seen.insert((a.min(b), a.max(b))) {
                continue;
            }
            ret.push((i, j, support));
        }
        ret.sort_by(|x, y| y.2.cmp(&x.2).then((x.0, x.1).cmp(&(y.0, y.1))));
        ret
    }

    /// Number of GO terms shared by the two genes of cell (i, j)
    pub fn go_overlap<O: OntologySource>(&self, ontology: &O, i: usize, j: usize) -> anyhow::Result<usize> {
        let a: HashSet<Box<str>> = ontology.go_terms(self.matrix.row_name(i))?.into_iter().collect();
        let b = ontology.go_terms(self.matrix.col_name(j))?;
        Ok(b.iter().filter(|t| a.contains(*t)).count())
    }

    ///
    /// GO terms shared by both genes of the most links in a set
    ///
    /// * `ids` - packed pair ids
    /// * `top_n` - how many terms to report
    ///
    pub fn top_go_terms<O: OntologySource>(
        &self,
        ontology: &O,
        ids: &[u64],
        top_n: usize,
    ) -> anyhow::Result<Vec<(Box<str>, usize)>> {
        let mut freq: HashMap<Box<str>, usize> = HashMap::default();
        for &id in ids {
            let (a, b) = self.paired_genes(id);
            let ta: HashSet<Box<str>> = ontology.go_terms(a)?.into_iter().collect();
            for t in ontology.go_terms(b)? {
                if ta.contains(&t) {
                    *freq.entry(t).or_default() += 1;
                }
            }
        }
        let mut ret: Vec<(Box<str>, usize)> = freq.into_iter().collect();
        ret.sort_by(|x, y| y.1.cmp(&x.1).then(x.0.cmp(&y.0)));
        ret.truncate(top_n);
        Ok(ret)
    }

    /// Write the bit matrix and the experiment map
    pub fn to_files(&self, matrix_file: &str, ee_map_file: &str) -> Result<()> {
        self.matrix.to_file(matrix_file)?;
        self.experiments.to_file(ee_map_file)?;
        info!("wrote {} and {}", matrix_file, ee_map_file);
        Ok(())
    }

    pub fn from_files(matrix_file: &str, ee_map_file: &str) -> anyhow::Result<Self> {
        let matrix = CompressedBitMatrix::from_file(matrix_file)?;
        let experiments = ExperimentIndex::from_file(ee_map_file)?;
        Self::from_parts(matrix, experiments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partners(xs: &[(i64, &[i64])]) -> HashMap<i64, Vec<i64>> {
        xs.iter().map(|(g, ees)| (*g, ees.to_vec())).collect()
    }

    #[test]
    fn count_skips_unknowns() -> anyhow::Result<()> {
        let mut lm = LinkMatrix::init(&[1, 2], &[1, 2, 3], &[100, 200])?;
        let s = lm.count(1, &partners(&[(2, &[100, 200, 300]), (9, &[100])]))?;
        assert_eq!(s.bits_set, 2);
        assert_eq!(s.unknown_experiments, 1);
        assert_eq!(s.unknown_partner_genes, 1);
        assert_eq!(lm.support(1, 2), 2);
        assert_eq!(lm.supporting_experiments(0, 1), vec![100, 200]);
        assert!(lm.check_confirmation(0, 1, 200));
        assert!(!lm.check_confirmation(0, 1, 300));

        let s = lm.count(42, &partners(&[(2, &[100])]))?;
        assert_eq!(s.unknown_query_genes, 1);
        Ok(())
    }

    #[test]
    fn links_above_dedups_symmetric_pairs() -> anyhow::Result<()> {
        let mut lm = LinkMatrix::init(&[1, 2], &[1, 2], &[10, 20, 30])?;
        lm.count(1, &partners(&[(2, &[10, 20])]))?;
        lm.count(2, &partners(&[(1, &[10, 20]), (2, &[30])]))?;
        let links = lm.links_above(1);
        assert_eq!(links, vec![(0, 1, 2)]);
        assert_eq!(lm.support_histogram(), vec![0, 1, 2, 0]);
        let id = lm.pack(0, 1);
        assert_eq!(lm.paired_genes(id), (1, 2));
        Ok(())
    }
}
