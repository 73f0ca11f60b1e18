//! Narrow interfaces to gene, experiment, coexpression and ontology
//! data, with in-memory implementations backed by TSV files.

use fnv::{FnvHashMap as HashMap, FnvHashSet as HashSet};
use matrix_util::common_io::{read_lines_of_words_delim, Delimiter};
use std::collections::BTreeSet;

use crate::gene_links::GeneLink;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Gene {
    pub id: i64,
    pub name: Box<str>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Experiment {
    pub id: i64,
    pub short_name: Box<str>,
}

/// Resolve gene ids; unknown ids are left out of the result
pub trait GeneLookup {
    fn load_genes_by_ids(&self, ids: &[i64]) -> anyhow::Result<Vec<Gene>>;
}

/// Resolve experiment ids; unknown ids are left out of the result
pub trait ExperimentLookup {
    fn load_experiments_by_ids(&self, ids: &[i64]) -> anyhow::Result<Vec<Experiment>>;
}

/// Per-gene coexpression partners
pub trait CoexpressionSource {
    ///
    /// Partners of `gene` coexpressed in at least `stringency` of the
    /// given experiments
    ///
    /// * returns partner gene id -> experiments supporting the pair
    ///
    fn coexpressed_genes(
        &self,
        gene: i64,
        experiments: &[i64],
        stringency: usize,
    ) -> anyhow::Result<HashMap<i64, Vec<i64>>>;
}

/// GO annotation of genes
pub trait OntologySource {
    fn go_terms(&self, gene: i64) -> anyhow::Result<Vec<Box<str>>>;
}

fn parse_id(word: &str, line: usize, file: &str) -> anyhow::Result<i64> {
    word.trim()
        .parse::<i64>()
        .map_err(|e| anyhow::anyhow!("{}:{}: bad id '{}': {}", file, line, word, e))
}

/// Genes and experiments held in memory
#[derive(Clone, Debug, Default)]
pub struct InMemoryCatalog {
    genes: HashMap<i64, Gene>,
    experiments: HashMap<i64, Experiment>,
}

impl InMemoryCatalog {
    pub fn new(genes: Vec<Gene>, experiments: Vec<Experiment>) -> Self {
        Self {
            genes: genes.into_iter().map(|g| (g.id, g)).collect(),
            experiments: experiments.into_iter().map(|e| (e.id, e)).collect(),
        }
    }

    ///
    /// Read `gene id \t symbol` lines; `#` lines are comments
    ///
    pub fn read_genes(file: &str) -> anyhow::Result<Vec<Gene>> {
        let out = read_lines_of_words_delim(file, Delimiter::Tab, false)?;
        out.lines
            .iter()
            .map(|(line, words)| {
                if words.len() < 2 {
                    anyhow::bail!("{}:{}: expected gene id and name", file, line);
                }
                Ok(Gene {
                    id: parse_id(&words[0], *line, file)?,
                    name: words[1].clone(),
                })
            })
            .collect()
    }

    pub fn gene(&self, id: i64) -> Option<&Gene> {
        self.genes.get(&id)
    }

    pub fn experiment(&self, id: i64) -> Option<&Experiment> {
        self.experiments.get(&id)
    }

    pub fn gene_ids(&self) -> Vec<i64> {
        let mut ret: Vec<i64> = self.genes.keys().copied().collect();
        ret.sort();
        ret
    }

    pub fn experiment_ids(&self) -> Vec<i64> {
        let mut ret: Vec<i64> = self.experiments.keys().copied().collect();
        ret.sort();
        ret
    }

    /// Gene name for reporting, falling back to the id
    pub fn gene_label(&self, id: i64) -> Box<str> {
        self.genes
            .get(&id)
            .map(|g| g.name.clone())
            .unwrap_or_else(|| id.to_string().into_boxed_str())
    }
}

impl GeneLookup for InMemoryCatalog {
    fn load_genes_by_ids(&self, ids: &[i64]) -> anyhow::Result<Vec<Gene>> {
        Ok(ids.iter().filter_map(|i| self.genes.get(i).cloned()).collect())
    }
}

impl ExperimentLookup for InMemoryCatalog {
    fn load_experiments_by_ids(&self, ids: &[i64]) -> anyhow::Result<Vec<Experiment>> {
        Ok(ids
            .iter()
            .filter_map(|i| self.experiments.get(i).cloned())
            .collect())
    }
}

/// One experiment of a manifest: `id \t short name \t link file`
#[derive(Clone, Debug)]
pub struct ManifestEntry {
    pub experiment: Experiment,
    pub link_file: Box<str>,
}

pub fn read_manifest(file: &str) -> anyhow::Result<Vec<ManifestEntry>> {
    let out = read_lines_of_words_delim(file, Delimiter::Tab, false)?;
    let mut seen = HashSet::default();
    out.lines
        .iter()
        .map(|(line, words)| {
            if words.len() != 3 || words.iter().any(|w| w.trim().is_empty()) {
                anyhow::bail!("{}:{}: expected id, short name, link file", file, line);
            }
            let id = parse_id(&words[0], *line, file)?;
            if !seen.insert(id) {
                anyhow::bail!("{}:{}: experiment {} listed twice", file, line, id);
            }
            Ok(ManifestEntry {
                experiment: Experiment {
                    id,
                    short_name: words[1].clone(),
                },
                link_file: words[2].clone(),
            })
        })
        .collect()
}

/// Coexpression partners assembled from per-experiment gene links
#[derive(Clone, Debug, Default)]
pub struct LinkTableSource {
    partners: HashMap<i64, HashMap<i64, BTreeSet<i64>>>,
}

impl LinkTableSource {
    /// Record the links of one experiment in both directions
    pub fn add_experiment(&mut self, experiment: i64, links: &[GeneLink]) {
        for link in links {
            if link.first == link.second {
                continue;
            }
            self.partners
                .entry(link.first)
                .or_default()
                .entry(link.second)
                .or_default()
                .insert(experiment);
            self.partners
                .entry(link.second)
                .or_default()
                .entry(link.first)
                .or_default()
                .insert(experiment);
        }
    }

    /// Genes with at least one partner, sorted
    pub fn genes(&self) -> Vec<i64> {
        let mut ret: Vec<i64> = self.partners.keys().copied().collect();
        ret.sort();
        ret
    }
}

impl CoexpressionSource for LinkTableSource {
    fn coexpressed_genes(
        &self,
        gene: i64,
        experiments: &[i64],
        stringency: usize,
    ) -> anyhow::Result<HashMap<i64, Vec<i64>>> {
        let wanted: HashSet<i64> = experiments.iter().copied().collect();
        let Some(partners) = self.partners.get(&gene) else {
            return Ok(HashMap::default());
        };
        Ok(partners
            .iter()
            .filter_map(|(&partner, ees)| {
                let ees: Vec<i64> = ees.iter().filter(|e| wanted.contains(*e)).copied().collect();
                (!ees.is_empty() && ees.len() >= stringency).then_some((partner, ees))
            })
            .collect())
    }
}

/// GO terms per gene held in memory
#[derive(Clone, Debug, Default)]
pub struct InMemoryOntology {
    terms: HashMap<i64, BTreeSet<Box<str>>>,
}

impl InMemoryOntology {
    pub fn add(&mut self, gene: i64, term: &str) {
        self.terms.entry(gene).or_default().insert(term.into());
    }

    ///
    /// Read `gene id \t GO term` lines
    ///
    pub fn from_file(file: &str) -> anyhow::Result<Self> {
        let out = read_lines_of_words_delim(file, Delimiter::Tab, false)?;
        let mut ret = Self::default();
        for (line, words) in out.lines.iter() {
            if words.len() < 2 || words[1].trim().is_empty() {
                anyhow::bail!("{}:{}: expected gene id and GO term", file, line);
            }
            ret.add(parse_id(&words[0], *line, file)?, words[1].trim());
        }
        Ok(ret)
    }
}

impl OntologySource for InMemoryOntology {
    fn go_terms(&self, gene: i64) -> anyhow::Result<Vec<Box<str>>> {
        Ok(self
            .terms
            .get(&gene)
            .map(|x| x.iter().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_table_respects_experiments_and_stringency() -> anyhow::Result<()> {
        let mut source = LinkTableSource::default();
        source.add_experiment(1, &[GeneLink::new(10, 20, 0.9), GeneLink::new(10, 30, 0.8)]);
        source.add_experiment(2, &[GeneLink::new(20, 10, 0.7)]);
        source.add_experiment(3, &[GeneLink::new(10, 10, 1.0)]);

        let all = source.coexpressed_genes(10, &[1, 2, 3], 1)?;
        assert_eq!(all[&20], vec![1, 2]);
        assert_eq!(all[&30], vec![1]);
        assert!(!all.contains_key(&10));

        let strict = source.coexpressed_genes(10, &[1, 2, 3], 2)?;
        assert_eq!(strict.len(), 1);

        let only2 = source.coexpressed_genes(20, &[2], 1)?;
        assert_eq!(only2[&10], vec![2]);
        assert_eq!(source.genes(), vec![10, 20, 30]);
        Ok(())
    }

    #[test]
    fn catalog_lookups_skip_unknown() -> anyhow::Result<()> {
        let catalog = InMemoryCatalog::new(
            vec![Gene {
                id: 1,
                name: "ACTB".into(),
            }],
            vec![Experiment {
                id: 5,
                short_name: "GSE5".into(),
            }],
        );
        assert_eq!(catalog.load_genes_by_ids(&[1, 2])?.len(), 1);
        assert_eq!(catalog.load_experiments_by_ids(&[4])?.len(), 0);
        assert_eq!(catalog.gene_label(2).as_ref(), "2");
        Ok(())
    }
}
