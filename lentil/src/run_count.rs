use crate::common::*;

use link_bits::collaborators::{read_manifest, InMemoryCatalog, LinkTableSource, ManifestEntry};
use link_bits::gene_links::read_gene_links;
use link_bits::{GeneLink, LinkMatrix};

#[derive(Args, Debug)]
pub struct CountArgs {
    /// Experiment manifest: `experiment id \t short name \t link file`,
    /// where each link file is the output of `lentil correlate`
    #[arg(required = true)]
    manifest: Box<str>,

    /// Query genes: `gene id \t symbol` (default: every gene with a link)
    #[arg(short = 'g', long)]
    genes: Option<Box<str>>,

    /// Minimum number of supporting experiments per gene pair
    #[arg(short, long, default_value_t = 1)]
    stringency: usize,

    /// Output header: writes `{out}.bits.gz`, `{out}.experiments.tsv`
    /// and `{out}.support.tsv`
    #[arg(short, long, required = true)]
    out: Box<str>,

    /// Maximum number of threads
    #[arg(long, default_value_t = 16)]
    max_threads: usize,
}

///
/// Read the link file of every experiment in the manifest, in parallel
///
pub fn read_experiment_links(entries: &[ManifestEntry]) -> anyhow::Result<Vec<Vec<GeneLink>>> {
    let njobs = entries.len() as u64;
    entries
        .par_iter()
        .progress_count(njobs)
        .map(|e| {
            let links = read_gene_links(&e.link_file)?;
            info!(
                "{}: {} gene links in {}",
                e.experiment.short_name,
                links.len(),
                e.link_file
            );
            Ok(links)
        })
        .collect()
}

/// Build the gene-by-gene experiment support matrix
pub fn run_count(args: &CountArgs) -> anyhow::Result<()> {
    if args.stringency == 0 {
        anyhow::bail!("stringency must be at least 1");
    }
    setup_threads(args.max_threads)?;

    let entries = read_manifest(&args.manifest)?;
    if entries.is_empty() {
        anyhow::bail!("no experiments in {}", args.manifest);
    }
    info!("{} experiments in {}", entries.len(), args.manifest);

    let links = read_experiment_links(&entries)?;
    let mut source = LinkTableSource::default();
    for (e, ee_links) in entries.iter().zip(links.iter()) {
        source.add_experiment(e.experiment.id, ee_links);
    }

    let candidates = source.genes();
    let targets: Vec<i64> = match &args.genes {
        Some(f) => InMemoryCatalog::read_genes(f)?.into_iter().map(|g| g.id).collect(),
        None => candidates.clone(),
    };
    if targets.is_empty() || candidates.is_empty() {
        anyhow::bail!("no genes to count");
    }
    info!("{} query genes, {} candidate partners", targets.len(), candidates.len());

    let experiments: Vec<i64> = entries.iter().map(|e| e.experiment.id).collect();
    let mut matrix = LinkMatrix::init(&targets, &candidates, &experiments)?;
    let summary = matrix.fill(&source, args.stringency)?;
    if summary.skipped() > 0 {
        warn!("{} partners or experiments were not in the matrix", summary.skipped());
    }

    let bits_file = format!("{}.bits.gz", args.out);
    let ee_file = format!("{}.experiments.tsv", args.out);
    let support_file = format!("{}.support.tsv", args.out);
    io::mkdir(&bits_file)?;
    io::remove_file(&bits_file)?;

    matrix.to_files(&bits_file, &ee_file)?;

    let lines: Vec<Box<str>> = std::iter::once("support\tpairs".to_string().into_boxed_str())
        .chain(
            matrix
                .support_histogram()
                .into_iter()
                .enumerate()
                .skip(1)
                .filter(|&(_, n)| n > 0)
                .map(|(s, n)| format!("{}\t{}", s, n).into_boxed_str()),
        )
        .collect();
    io::write_lines(&lines, &support_file)?;

    info!("wrote {}, {} and {}", bits_file, ee_file, support_file);
    Ok(())
}
