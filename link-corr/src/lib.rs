pub mod analysis;
pub mod config;
pub mod engine;
pub mod expression;
pub mod filter;
pub mod histogram;
pub mod links_io;
pub mod metric;
pub mod pvalue;
pub mod selector;

pub use analysis::{run_link_analysis, LinkAnalysisResult};
pub use config::{LinkAnalysisConfig, Metric, ProfileFilterConfig, SingularThreshold};
pub use engine::{CorrelationEngine, Link, Thresholds};
pub use expression::{ExpressionData, ProbeGeneMap};
pub use histogram::CorrelationHistogram;
pub use selector::LinkSelector;
