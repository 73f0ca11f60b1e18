pub mod agglomerate;
pub mod config;
pub mod frequent;
pub mod link_set;
pub mod output;
pub mod select;
pub mod tree;

pub use agglomerate::{cluster_links, LinkGraphClustering};
pub use config::ClusterConfig;
pub use frequent::FrequentLinkSetFinder;
pub use link_set::{collect_leaves, Leaf, LinkSet};
pub use tree::{LinkTree, NodeId, TreeNode};
