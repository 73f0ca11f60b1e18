pub mod bit_matrix;
pub mod collaborators;
pub mod error;
pub mod experiment_index;
pub mod gene_links;
pub mod go_cache;
pub mod link_matrix;
pub mod link_stats;
pub mod mask;

pub use bit_matrix::{CompressedBitMatrix, PairPacker};
pub use error::{BitMatrixError, Result};
pub use experiment_index::ExperimentIndex;
pub use gene_links::GeneLink;
pub use link_matrix::{CountSummary, LinkMatrix};
pub use link_stats::{LinkConfirmationStatistics, LinkStatistics, LINK_MAXIMUM_COUNT};
