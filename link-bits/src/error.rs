use thiserror::Error;

/// Sections of a serialized bit matrix or experiment map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Configuration,
    RowNames,
    ColumnNames,
    Data,
    ExperimentMap,
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Section::Configuration => "configuration",
            Section::RowNames => "row names",
            Section::ColumnNames => "column names",
            Section::Data => "data",
            Section::ExperimentMap => "experiment map",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum BitMatrixError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// malformed serialized input; `line` is 1-based
    #[error("format error in {section} at line {line}: {message}")]
    Format {
        section: Section,
        line: usize,
        message: String,
    },

    #[error("duplicate {kind} name {name}")]
    DuplicateName { kind: &'static str, name: i64 },

    #[error("too many {kind} names: capacity is {capacity}")]
    NameOverflow { kind: &'static str, capacity: usize },

    #[error("index ({row}, {col}, bit {bit}) out of range for {rows} x {cols} x {bit_count}")]
    IndexOutOfRange {
        row: usize,
        col: usize,
        bit: usize,
        rows: usize,
        cols: usize,
        bit_count: usize,
    },

    #[error("{0}")]
    Other(String),
}

impl BitMatrixError {
    pub fn format(section: Section, line: usize, message: impl Into<String>) -> Self {
        BitMatrixError::Format {
            section,
            line,
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for BitMatrixError {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast::<std::io::Error>() {
            Ok(io) => BitMatrixError::Io(io),
            Err(e) => BitMatrixError::Other(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, BitMatrixError>;
