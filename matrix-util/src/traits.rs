/// Read and write a matrix type from delimited text
pub trait IoOps {
    type Mat;

    /// Read a tab-separated file (gzipped or not)
    fn from_tsv(tsv_file: &str) -> anyhow::Result<Self::Mat>;

    /// Write a tab-separated file (gzipped if `.gz`)
    fn to_tsv(&self, tsv_file: &str) -> anyhow::Result<()>;
}

/// Row-wise summary statistics that tolerate missing values
pub trait RowStatOps {
    type Stat;

    /// Summarize each row, ignoring non-finite entries
    fn row_stat(&self) -> Self::Stat;
}

/// Rank transformation of each row
pub trait RankOps {
    type Mat;

    /// Replace each row by its 1-based ranks with ties averaged; missing
    /// entries stay missing
    fn rank_rows(&self) -> Self::Mat;
}
