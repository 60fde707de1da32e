use thiserror::Error;

pub type InsightsResult<T> = Result<T, InsightsError>;

#[derive(Error, Debug)]
pub enum InsightsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot read source file '{path}': {reason}")]
    SourceRead { path: String, reason: String },

    #[error("No source files matching '{pattern}' in '{dir}'")]
    NoSources { dir: String, pattern: String },

    #[error("Not enough distinct values in '{column}': found {distinct}, need at least {required}")]
    InsufficientCardinality {
        column: String,
        distinct: usize,
        required: usize,
    },

    #[error("Precondition not met for '{column}': {reason}")]
    PreconditionNotMet { column: String, reason: String },

    #[error("Column '{column}' is not present in the dataset")]
    MissingColumn { column: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl InsightsError {
    pub fn source_read(path: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        Self::SourceRead {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Analysis-level conditions that skip one view section instead of
    /// failing the whole run.
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            Self::InsufficientCardinality { .. }
                | Self::PreconditionNotMet { .. }
                | Self::MissingColumn { .. }
        )
    }
}
