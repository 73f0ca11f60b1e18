/// Settings shared by both clustering strategies
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterConfig {
    /// pairs need at least this many supporting experiments
    pub stringency: usize,
    /// smallest link set worth reporting
    pub min_links: usize,
    /// stop merging below this overlap; `None` means twice the stringency
    pub merge_threshold: Option<usize>,
    /// cap on nodes created by top-down expansion
    pub max_nodes: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            stringency: 2,
            min_links: 3,
            merge_threshold: None,
            max_nodes: 1_000_000,
        }
    }
}

impl ClusterConfig {
    pub fn merge_threshold(&self) -> usize {
        self.merge_threshold.unwrap_or(2 * self.stringency).max(1)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.stringency == 0 {
            anyhow::bail!("stringency must be at least 1");
        }
        if self.min_links == 0 {
            anyhow::bail!("min_links must be at least 1");
        }
        if self.max_nodes == 0 {
            anyhow::bail!("max_nodes must be positive");
        }
        Ok(())
    }
}
