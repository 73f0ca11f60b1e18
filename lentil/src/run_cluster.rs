use crate::common::*;

use link_bits::collaborators::{read_manifest, Experiment, InMemoryCatalog, InMemoryOntology};
use link_bits::go_cache::{CachedOntology, SystemClock};
use link_bits::LinkMatrix;
use link_cluster::output::{write_clusters, write_dendrogram};
use link_cluster::select::{clusters_by_common_bits, cut_clusters, largest_clusters};
use link_cluster::{cluster_links, collect_leaves, ClusterConfig, FrequentLinkSetFinder, LinkSet};
use std::sync::Arc;
use std::time::Duration;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClusterMethod {
    /// Bottom-up merging of the most similar links
    Agglomerate,
    /// Top-down mining of maximal link sets
    Frequent,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClusterSelection {
    /// Top-level clusters with the most links
    Largest,
    /// Clusters sharing the most experiments, never nested
    CommonBits,
    /// Undo the latest merges until the requested number of groups
    Cut,
}

#[derive(Args, Debug)]
pub struct ClusterArgs {
    /// Output header of `lentil count`: reads `{input}.bits.gz` and
    /// `{input}.experiments.tsv`
    #[arg(required = true)]
    input: Box<str>,

    /// Gene names: `gene id \t symbol`
    #[arg(short = 'g', long)]
    genes: Option<Box<str>>,

    /// Experiment manifest, for experiment short names
    #[arg(short = 'm', long)]
    manifest: Option<Box<str>>,

    /// GO annotations: `gene id \t GO term`
    #[arg(long)]
    go: Option<Box<str>>,

    /// Clustering method
    #[arg(long, value_enum, default_value = "agglomerate")]
    method: ClusterMethod,

    /// How clusters are picked from the dendrogram
    #[arg(long, value_enum, default_value = "largest")]
    select: ClusterSelection,

    /// Minimum number of supporting experiments per link
    #[arg(short, long, default_value_t = 2)]
    stringency: usize,

    /// Smallest cluster reported
    #[arg(long, default_value_t = 3)]
    min_links: usize,

    /// Stop merging below this many shared experiments (default: 2 x stringency)
    #[arg(long)]
    merge_threshold: Option<usize>,

    /// Cap on nodes explored by top-down mining
    #[arg(long, default_value_t = 1_000_000)]
    max_nodes: usize,

    /// Number of clusters to report
    #[arg(short = 'k', long, default_value_t = 50)]
    num_clusters: usize,

    /// GO terms reported per cluster
    #[arg(long, default_value_t = 5)]
    top_terms: usize,

    /// GO term cache capacity (genes)
    #[arg(long, default_value_t = 10_000)]
    go_cache_size: usize,

    /// Output header: writes `{out}.clusters.tsv` and, for agglomeration,
    /// `{out}.gtr`, `{out}.order.tsv` and `{out}.nwk`
    #[arg(short, long, required = true)]
    out: Box<str>,

    /// Maximum number of threads
    #[arg(long, default_value_t = 16)]
    max_threads: usize,
}

impl ClusterArgs {
    fn config(&self) -> ClusterConfig {
        ClusterConfig {
            stringency: self.stringency,
            min_links: self.min_links,
            merge_threshold: self.merge_threshold,
            max_nodes: self.max_nodes,
        }
    }
}

/// Experiment names from the manifest, ids for the rest
fn experiment_names(matrix: &LinkMatrix, manifest: Option<&str>) -> anyhow::Result<Vec<Experiment>> {
    let mut named: Vec<Experiment> = match manifest {
        Some(f) => read_manifest(f)?.into_iter().map(|e| e.experiment).collect(),
        None => vec![],
    };
    for &id in matrix.experiments().experiment_ids() {
        if !named.iter().any(|e| e.id == id) {
            named.push(Experiment {
                id,
                short_name: id.to_string().into_boxed_str(),
            });
        }
    }
    Ok(named)
}

/// Cluster the links of a support matrix and write the clusters
pub fn run_cluster(args: &ClusterArgs) -> anyhow::Result<()> {
    let config = args.config();
    config.validate()?;
    setup_threads(args.max_threads)?;

    let matrix = LinkMatrix::from_files(
        &format!("{}.bits.gz", args.input),
        &format!("{}.experiments.tsv", args.input),
    )?;

    let genes = match &args.genes {
        Some(f) => InMemoryCatalog::read_genes(f)?,
        None => vec![],
    };
    let catalog = InMemoryCatalog::new(genes, experiment_names(&matrix, args.manifest.as_deref())?);

    let ontology = match &args.go {
        Some(f) => Some(CachedOntology::new(
            InMemoryOntology::from_file(f)?,
            args.go_cache_size,
            Duration::from_secs(3600),
            Arc::new(SystemClock),
        )),
        None => None,
    };

    let leaves = collect_leaves(&matrix, config.stringency);
    info!("{} links with support >= {}", leaves.len(), config.stringency);
    if leaves.is_empty() {
        warn!("nothing to cluster");
    }

    let clusters_file = format!("{}.clusters.tsv", args.out);
    io::mkdir(&clusters_file)?;

    let clusters: Vec<LinkSet> = match args.method {
        ClusterMethod::Frequent => {
            if args.select != ClusterSelection::Largest {
                warn!("--select applies to agglomeration only");
            }
            let mut sets = FrequentLinkSetFinder::new(&config).find(&leaves)?;
            sets.truncate(args.num_clusters);
            sets
        }
        ClusterMethod::Agglomerate => {
            let tree = cluster_links(&leaves, &config)?;
            write_dendrogram(&tree, &matrix, &catalog, &args.out)?;
            match args.select {
                ClusterSelection::Largest => largest_clusters(&tree, args.num_clusters, config.min_links),
                ClusterSelection::CommonBits => {
                    clusters_by_common_bits(&tree, args.num_clusters, config.min_links)
                }
                ClusterSelection::Cut => cut_clusters(&tree, args.num_clusters)
                    .into_iter()
                    .filter(|s| s.len() >= config.min_links)
                    .collect(),
            }
        }
    };

    write_clusters(
        &clusters_file,
        &clusters,
        &matrix,
        &catalog,
        &catalog,
        ontology.as_ref(),
        args.top_terms,
    )?;

    if let Some(o) = ontology.as_ref() {
        info!("GO terms cached for {} genes", o.len());
    }
    Ok(())
}
