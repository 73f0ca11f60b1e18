use fnv::{FnvHashMap as HashMap, FnvHashSet as HashSet};
use log::{info, warn};
use matrix_util::common_io::{read_lines_of_words_delim, Delimiter};
use matrix_util::ndarray_io::NamedArray2;
use matrix_util::ndarray_stat::percentile_ranks;
use matrix_util::traits::{IoOps, RowStatOps};

/// Genes measured by each probe
#[derive(Clone, Debug, Default)]
pub struct ProbeGeneMap {
    genes: HashMap<Box<str>, Vec<i64>>,
}

impl ProbeGeneMap {
    pub fn insert(&mut self, probe: &str, genes: Vec<i64>) {
        self.genes.insert(probe.into(), genes);
    }

    pub fn genes(&self, probe: &str) -> Option<&[i64]> {
        self.genes.get(probe).map(|x| x.as_slice())
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    ///
    /// Read `probe \t gene_id[,gene_id...]` lines. An empty gene field
    /// means the probe measures no known gene.
    ///
    pub fn from_file(file: &str) -> anyhow::Result<Self> {
        let out = read_lines_of_words_delim(file, Delimiter::Tab, false)?;
        let mut ret = Self::default();
        for (line, words) in out.lines.iter() {
            if words.is_empty() || words[0].trim().is_empty() || words.len() > 2 {
                anyhow::bail!("{}:{}: expected probe and gene ids", file, line);
            }
            let genes = match words.get(1) {
                Some(w) => w
                    .split(',')
                    .filter(|g| !g.trim().is_empty())
                    .map(|g| {
                        g.trim()
                            .parse::<i64>()
                            .map_err(|e| anyhow::anyhow!("{}:{}: bad gene id '{}': {}", file, line, g, e))
                    })
                    .collect::<anyhow::Result<Vec<_>>>()?,
                None => vec![],
            };
            ret.insert(words[0].trim(), genes);
        }
        Ok(ret)
    }
}

/// Summary of one probe's profile within an experiment
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExpressionProfile {
    pub row: usize,
    pub n_present: usize,
    pub mean: f64,
    pub variance: f64,
    /// percentile of the mean expression among all profiles
    pub rank: f64,
}

impl ExpressionProfile {
    /// Both profiles have enough values to be correlated
    pub fn is_comparable(&self, other: &Self, min_num_present: usize) -> bool {
        self.n_present.min(other.n_present) >= min_num_present
    }
}

///
/// Expression matrix (probes x samples) with the genes of each probe.
/// Without a probe-to-gene map every row is eligible, no probe is
/// penalized for redundancy, and no pair counts as cross-hybridizing.
///
#[derive(Clone, Debug)]
pub struct ExpressionData {
    matrix: NamedArray2,
    row_genes: Option<Vec<Vec<i64>>>,
    probes_per_gene: HashMap<i64, usize>,
}

impl ExpressionData {
    pub fn new(matrix: NamedArray2, probe_genes: Option<&ProbeGeneMap>) -> Self {
        let row_genes = match probe_genes {
            Some(map) => {
                let mut unmapped = 0;
                let genes: Vec<Vec<i64>> = matrix
                    .row_names
                    .iter()
                    .map(|p| match map.genes(p) {
                        Some(g) => g.to_vec(),
                        None => {
                            unmapped += 1;
                            vec![]
                        }
                    })
                    .collect();
                if unmapped > 0 {
                    warn!("{} probes are missing from the probe-to-gene map", unmapped);
                }
                Some(genes)
            }
            None => {
                warn!("no probe-to-gene map: every row is eligible and no redundancy penalty applies");
                None
            }
        };

        let mut probes_per_gene: HashMap<i64, usize> = HashMap::default();
        if let Some(row_genes) = row_genes.as_ref() {
            for genes in row_genes {
                let uniq: HashSet<i64> = genes.iter().copied().collect();
                for g in uniq {
                    *probes_per_gene.entry(g).or_default() += 1;
                }
            }
        }

        Self {
            matrix,
            row_genes,
            probes_per_gene,
        }
    }

    pub fn from_files(expression_file: &str, probe_gene_file: Option<&str>) -> anyhow::Result<Self> {
        let matrix = NamedArray2::from_tsv(expression_file)?;
        info!(
            "read {} probes x {} samples from {}",
            matrix.nrows(),
            matrix.ncols(),
            expression_file
        );
        let map = match probe_gene_file {
            Some(f) => Some(ProbeGeneMap::from_file(f)?),
            None => None,
        };
        Ok(Self::new(matrix, map.as_ref()))
    }

    pub fn matrix(&self) -> &NamedArray2 {
        &self.matrix
    }

    pub fn nrows(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn probe_name(&self, i: usize) -> &str {
        &self.matrix.row_names[i]
    }

    pub fn has_gene_map(&self) -> bool {
        self.row_genes.is_some()
    }

    /// Genes of row `i`; empty without a gene map
    pub fn genes(&self, i: usize) -> &[i64] {
        match self.row_genes.as_ref() {
            Some(g) => &g[i],
            None => &[],
        }
    }

    /// Row `i` takes part in correlations
    pub fn has_gene(&self, i: usize) -> bool {
        match self.row_genes.as_ref() {
            Some(g) => !g[i].is_empty(),
            None => true,
        }
    }

    pub fn num_eligible_rows(&self) -> usize {
        (0..self.nrows()).filter(|&i| self.has_gene(i)).count()
    }

    /// Largest number of probes measuring any gene of row `i` (at least 1)
    pub fn num_tests(&self, i: usize) -> usize {
        self.genes(i)
            .iter()
            .map(|g| self.probes_per_gene.get(g).copied().unwrap_or(1))
            .max()
            .unwrap_or(1)
            .max(1)
    }

    /// Rows `i` and `j` measure a common gene
    pub fn cross_hybridizes(&self, i: usize, j: usize) -> bool {
        let (a, b) = (self.genes(i), self.genes(j));
        a.iter().any(|g| b.contains(g))
    }

    pub fn profiles(&self) -> Vec<ExpressionProfile> {
        let stat = self.matrix.data.row_stat();
        let ranks = percentile_ranks(&stat.mean);
        (0..self.nrows())
            .map(|i| ExpressionProfile {
                row: i,
                n_present: stat.n_present[i],
                mean: stat.mean[i],
                variance: stat.variance(i),
                rank: ranks[i],
            })
            .collect()
    }

    /// Keep a subset of rows; probe counts per gene are recomputed
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        let matrix = self.matrix.select_rows(rows);
        match self.row_genes.as_ref() {
            Some(g) => {
                let mut map = ProbeGeneMap::default();
                for &r in rows {
                    map.insert(&self.matrix.row_names[r], g[r].clone());
                }
                Self::new(matrix, Some(&map))
            }
            None => Self {
                matrix,
                row_genes: None,
                probes_per_gene: HashMap::default(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn small() -> anyhow::Result<NamedArray2> {
        NamedArray2::new(
            array![[1.0, 2.0], [3.0, 4.0], [5.0, f64::NAN], [0.0, 0.0]],
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            vec!["s1".into(), "s2".into()],
        )
    }

    #[test]
    fn gene_map_drives_eligibility() -> anyhow::Result<()> {
        let mut map = ProbeGeneMap::default();
        map.insert("a", vec![10]);
        map.insert("b", vec![10, 20]);
        map.insert("c", vec![30]);
        let data = ExpressionData::new(small()?, Some(&map));

        assert!(data.has_gene(0));
        assert!(!data.has_gene(3));
        assert_eq!(data.num_eligible_rows(), 3);
        assert_eq!(data.num_tests(0), 2);
        assert_eq!(data.num_tests(1), 2);
        assert_eq!(data.num_tests(2), 1);
        assert!(data.cross_hybridizes(0, 1));
        assert!(!data.cross_hybridizes(0, 2));

        let sub = data.select_rows(&[0, 2]);
        assert_eq!(sub.num_tests(0), 1);
        assert_eq!(sub.probe_name(1), "c");
        Ok(())
    }

    #[test]
    fn missing_map_keeps_everything() -> anyhow::Result<()> {
        let data = ExpressionData::new(small()?, None);
        assert_eq!(data.num_eligible_rows(), 4);
        assert_eq!(data.num_tests(1), 1);
        assert!(!data.cross_hybridizes(0, 1));

        let profiles = data.profiles();
        assert_eq!(profiles[2].n_present, 1);
        assert!(!profiles[2].is_comparable(&profiles[0], 2));
        assert!(profiles[3].rank < profiles[1].rank);
        Ok(())
    }
}
