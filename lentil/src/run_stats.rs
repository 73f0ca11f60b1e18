use crate::common::*;
use crate::run_count::read_experiment_links;

use link_bits::collaborators::read_manifest;
use link_bits::LinkStatistics;

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Experiment manifest: `experiment id \t short name \t link file`
    #[arg(required = true)]
    manifest: Box<str>,

    /// Number of gene-shuffled replicates
    #[arg(short = 'r', long, default_value_t = 10)]
    num_runs: usize,

    /// Random seed for shuffling
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Output file for the support table
    #[arg(short, long, required = true)]
    out: Box<str>,

    /// Maximum number of threads
    #[arg(long, default_value_t = 16)]
    max_threads: usize,
}

/// Count how often links replicate across experiments, against shuffled data
pub fn run_stats(args: &StatsArgs) -> anyhow::Result<()> {
    setup_threads(args.max_threads)?;

    let entries = read_manifest(&args.manifest)?;
    if entries.is_empty() {
        anyhow::bail!("no experiments in {}", args.manifest);
    }

    let mut stats = LinkStatistics::new();
    for links in read_experiment_links(&entries)? {
        stats.add_experiment(&links);
    }
    info!("{} experiments, {} genes", stats.num_experiments(), stats.genes().len());

    let real = stats.confirmation_stats();
    let shuffles = stats.shuffled_stats(args.num_runs, args.seed);

    io::mkdir(&args.out)?;
    LinkStatistics::write_stats(&args.out, &real, &shuffles)?;
    info!("{} links; support table written to {}", real.total(), args.out);
    Ok(())
}
