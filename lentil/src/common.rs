#![allow(unused)]

pub use matrix_util::common_io as io;

pub use clap::{Args, Parser, Subcommand, ValueEnum};

pub use log::{info, warn};

pub use indicatif::ParallelProgressIterator;
pub use rayon::prelude::*;

/// Cap the global rayon pool at `max_threads`
pub fn setup_threads(max_threads: usize) -> anyhow::Result<()> {
    let max_threads = num_cpus::get().min(max_threads).max(1);
    rayon::ThreadPoolBuilder::new()
        .num_threads(max_threads)
        .build_global()?;
    info!("will use {} threads", rayon::current_num_threads());
    Ok(())
}
