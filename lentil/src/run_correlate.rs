use crate::common::*;

use link_corr::filter::filter_profiles;
use link_corr::links_io::write_links;
use link_corr::{
    run_link_analysis, ExpressionData, LinkAnalysisConfig, Metric, ProfileFilterConfig,
    SingularThreshold,
};

#[derive(Args, Debug)]
pub struct CorrelateArgs {
    /// Expression matrix: a header of sample names, then one probe per
    /// row (`.tsv` or `.tsv.gz`; `NA`, `NaN` and empty cells are missing)
    #[arg(required = true)]
    data_file: Box<str>,

    /// Probe to gene map: `probe \t gene_id[,gene_id...]`. Without it,
    /// every probe is eligible and no pair counts as cross-hybridizing.
    #[arg(short = 'p', long)]
    probe_map: Option<Box<str>>,

    /// Output header: writes `{out}.links.tsv.gz` and `{out}.hist.tsv`
    #[arg(short, long, required = true)]
    out: Box<str>,

    /// Correlation metric
    #[arg(long, value_enum, default_value = "pearson")]
    metric: Metric,

    /// Fraction of the score distribution tail(s) to keep
    #[arg(long, default_value_t = 0.01)]
    cdf_cut: f64,

    /// Family-wise error rate for the Bonferroni-corrected p-value cutoff
    #[arg(long, default_value_t = 0.01)]
    fwe: f64,

    /// Scores with |r| above this are kept in memory after the first pass
    #[arg(long, default_value_t = 0.5)]
    cache_cut: f64,

    /// Rank links by absolute score
    #[arg(long, default_value_t = false)]
    absolute_value: bool,

    /// Drop negatively correlated links
    #[arg(long, default_value_t = false)]
    omit_negative_links: bool,

    /// Do not filter links by corrected p-value
    #[arg(long, default_value_t = false)]
    no_pvalue_threshold: bool,

    /// Minimum number of jointly present samples (at least 8)
    #[arg(long, default_value_t = 8)]
    min_num_present: usize,

    /// Use only one of the two thresholds (none, fwe, cdfCut)
    #[arg(long, value_enum, default_value = "none")]
    singular_threshold: SingularThreshold,

    /// Drop links of probes with more links than this (0: off)
    #[arg(long, default_value_t = 0)]
    probe_degree_threshold: usize,

    /// Write a random subset of about this many links (0: all)
    #[arg(long, default_value_t = 0)]
    subset_size: usize,

    /// Row pairs per parallel job
    #[arg(long, default_value_t = 200_000)]
    block_size: usize,

    /// Random seed for subsetting
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Rows need at least this fraction of present values
    #[arg(long, default_value_t = 0.3)]
    min_present_fraction: f64,

    /// Drop this fraction of rows with the lowest expression rank
    #[arg(long, default_value_t = 0.3)]
    low_expression_cut: f64,

    /// Drop this fraction of rows with the lowest variance
    #[arg(long, default_value_t = 0.05)]
    low_variance_cut: f64,

    /// Skip the profile filters
    #[arg(long, default_value_t = false)]
    no_filter: bool,

    /// Maximum number of threads
    #[arg(long, default_value_t = 16)]
    max_threads: usize,
}

impl CorrelateArgs {
    fn analysis_config(&self) -> LinkAnalysisConfig {
        LinkAnalysisConfig {
            metric: self.metric,
            cdf_cut: self.cdf_cut,
            fwe: self.fwe,
            cache_cut: self.cache_cut,
            absolute_value: self.absolute_value,
            omit_negative_links: self.omit_negative_links,
            use_pvalue_threshold: !self.no_pvalue_threshold,
            min_num_present: self.min_num_present,
            singular_threshold: self.singular_threshold,
            probe_degree_threshold: self.probe_degree_threshold,
            subset_size: self.subset_size,
            block_size: self.block_size,
            seed: self.seed,
        }
    }

    fn filter_config(&self) -> ProfileFilterConfig {
        if self.no_filter {
            ProfileFilterConfig::none()
        } else {
            ProfileFilterConfig {
                min_present_fraction: self.min_present_fraction,
                low_expression_cut: self.low_expression_cut,
                low_variance_cut: self.low_variance_cut,
            }
        }
    }
}

/// Correlate all probe pairs of one data set and write the selected links
pub fn run_correlate(args: &CorrelateArgs) -> anyhow::Result<()> {
    let config = args.analysis_config();
    config.validate()?;
    let filter = args.filter_config();
    filter.validate()?;

    setup_threads(args.max_threads)?;

    let data = ExpressionData::from_files(&args.data_file, args.probe_map.as_deref())?;
    let (data, _) = filter_profiles(&data, &filter, config.min_num_present)?;

    let result = run_link_analysis(&data, &config)?;

    let links_file = format!("{}.links.tsv.gz", args.out);
    let hist_file = format!("{}.hist.tsv", args.out);
    io::mkdir(&links_file)?;
    io::remove_file(&links_file)?;

    write_links(&data, &result, &config, &links_file)?;
    result.histogram.to_file(&hist_file)?;

    info!(
        "{} links over {} eligible probes written to {}",
        result.links.len(),
        result.num_eligible_rows,
        links_file
    );
    Ok(())
}
