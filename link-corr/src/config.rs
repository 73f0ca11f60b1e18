use clap::ValueEnum;
use std::str::FromStr;
use thiserror::Error;

/// Fewest jointly present samples a correlation may use
pub const HARD_LIMIT_MIN_NUM_USED: usize = 8;

pub const DEFAULT_BLOCK_SIZE: usize = 200_000;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("unknown metric '{0}': choose pearson or spearman")]
    UnknownMetric(String),

    #[error("unknown threshold choice '{0}': choose none, fwe or cdfCut")]
    UnknownSingularThreshold(String),

    #[error("{name} = {value} is outside [{lo}, {hi}]")]
    OutOfRange {
        name: &'static str,
        value: f64,
        lo: f64,
        hi: f64,
    },

    #[error("min_num_present = {0} is below the hard limit {limit}", limit = HARD_LIMIT_MIN_NUM_USED)]
    TooFewPresent(usize),
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Metric {
    #[default]
    Pearson,
    Spearman,
}

impl FromStr for Metric {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pearson" => Ok(Metric::Pearson),
            "spearman" => Ok(Metric::Spearman),
            _ => Err(ConfigError::UnknownMetric(s.to_string())),
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Metric::Pearson => f.write_str("pearson"),
            Metric::Spearman => f.write_str("spearman"),
        }
    }
}

/// Use only one of the two thresholds to select links
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SingularThreshold {
    #[default]
    #[value(name = "none")]
    None,
    #[value(name = "fwe")]
    Fwe,
    #[value(name = "cdfCut")]
    CdfCut,
}

impl FromStr for SingularThreshold {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(SingularThreshold::None),
            "fwe" => Ok(SingularThreshold::Fwe),
            "cdfCut" => Ok(SingularThreshold::CdfCut),
            _ => Err(ConfigError::UnknownSingularThreshold(s.to_string())),
        }
    }
}

impl std::fmt::Display for SingularThreshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SingularThreshold::None => f.write_str("none"),
            SingularThreshold::Fwe => f.write_str("fwe"),
            SingularThreshold::CdfCut => f.write_str("cdfCut"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LinkAnalysisConfig {
    pub metric: Metric,
    /// fraction of the score distribution tail(s) to keep
    pub cdf_cut: f64,
    /// family-wise error rate for Bonferroni correction
    pub fwe: f64,
    /// scores with |r| above this are cached in pass 1
    pub cache_cut: f64,
    pub absolute_value: bool,
    pub omit_negative_links: bool,
    pub use_pvalue_threshold: bool,
    pub min_num_present: usize,
    pub singular_threshold: SingularThreshold,
    /// drop links of probes with more links than this (0 = off)
    pub probe_degree_threshold: usize,
    /// approximate number of links to write (0 = all)
    pub subset_size: usize,
    /// target number of row pairs per parallel job
    pub block_size: usize,
    pub seed: u64,
}

impl Default for LinkAnalysisConfig {
    fn default() -> Self {
        Self {
            metric: Metric::Pearson,
            cdf_cut: 0.01,
            fwe: 0.01,
            cache_cut: 0.5,
            absolute_value: false,
            omit_negative_links: false,
            use_pvalue_threshold: true,
            min_num_present: HARD_LIMIT_MIN_NUM_USED,
            singular_threshold: SingularThreshold::None,
            probe_degree_threshold: 0,
            subset_size: 0,
            block_size: DEFAULT_BLOCK_SIZE,
            seed: 42,
        }
    }
}

fn check_unit(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            lo: 0.0,
            hi: 1.0,
        })
    }
}

impl LinkAnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit("cdf_cut", self.cdf_cut)?;
        check_unit("fwe", self.fwe)?;
        check_unit("cache_cut", self.cache_cut)?;
        if self.min_num_present < HARD_LIMIT_MIN_NUM_USED {
            return Err(ConfigError::TooFewPresent(self.min_num_present));
        }
        Ok(())
    }

    /// `# key: value` lines describing this configuration
    pub fn header_lines(&self) -> Vec<Box<str>> {
        [
            ("metric", self.metric.to_string()),
            ("cdf_cut", self.cdf_cut.to_string()),
            ("fwe", self.fwe.to_string()),
            ("cache_cut", self.cache_cut.to_string()),
            ("absolute_value", self.absolute_value.to_string()),
            ("omit_negative_links", self.omit_negative_links.to_string()),
            ("use_pvalue_threshold", self.use_pvalue_threshold.to_string()),
            ("min_num_present", self.min_num_present.to_string()),
            ("singular_threshold", self.singular_threshold.to_string()),
            ("probe_degree_threshold", self.probe_degree_threshold.to_string()),
            ("subset_size", self.subset_size.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| format!("# {}: {}", k, v).into_boxed_str())
        .collect()
    }
}

/// Profile filters applied before correlating
#[derive(Clone, Debug, PartialEq)]
pub struct ProfileFilterConfig {
    /// rows need at least this fraction of present values
    pub min_present_fraction: f64,
    /// drop this fraction of rows with the lowest mean expression rank
    pub low_expression_cut: f64,
    /// drop this fraction of rows with the lowest variance
    pub low_variance_cut: f64,
}

impl Default for ProfileFilterConfig {
    fn default() -> Self {
        Self {
            min_present_fraction: 0.3,
            low_expression_cut: 0.3,
            low_variance_cut: 0.05,
        }
    }
}

impl ProfileFilterConfig {
    /// Keep every row with enough values to correlate
    pub fn none() -> Self {
        Self {
            min_present_fraction: 0.0,
            low_expression_cut: 0.0,
            low_variance_cut: 0.0,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit("min_present_fraction", self.min_present_fraction)?;
        check_unit("low_expression_cut", self.low_expression_cut)?;
        check_unit("low_variance_cut", self.low_variance_cut)?;
        Ok(())
    }
}
