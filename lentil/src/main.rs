mod common;
mod run_cluster;
mod run_correlate;
mod run_count;
mod run_stats;

use crate::common::*;
use run_cluster::*;
use run_correlate::*;
use run_count::*;
use run_stats::*;

#[derive(Parser, Debug)]
#[command(name = "lentil", version, term_width = 80)]
#[command(about = "Gene coexpression links: correlate, count, replicate and cluster")]
struct Cli {
    /// Show progress messages
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Correlate probe profiles of one data set and select significant links
    Correlate(CorrelateArgs),
    /// Tally gene links across experiments into a support bit matrix
    Count(CountArgs),
    /// Compare link replication against gene-shuffled experiments
    Stats(StatsArgs),
    /// Cluster links by their shared supporting experiments
    Cluster(ClusterArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    match &cli.commands {
        Commands::Correlate(args) => {
            run_correlate(args)?;
        }
        Commands::Count(args) => {
            run_count(args)?;
        }
        Commands::Stats(args) => {
            run_stats(args)?;
        }
        Commands::Cluster(args) => {
            run_cluster(args)?;
        }
    }

    Ok(())
}
