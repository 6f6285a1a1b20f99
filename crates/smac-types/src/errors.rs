use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the orchestration layer
#[derive(Error, Debug)]
pub enum SmacError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid seed specification: {message}")]
    InvalidSeedSpec { message: String },

    #[error(
        "Scenario setup incomplete, missing {missing:?}. \
         Try to specify a writable working directory and keep its files persistent."
    )]
    SetupIncomplete { missing: Vec<PathBuf> },

    #[error("No usable result: none of the {runs} runs produced a readable trajectory")]
    NoUsableResult { runs: usize },

    #[error("Unknown parameter in incumbent: {name}")]
    UnknownParameter { name: String },

    #[error("Invalid value for parameter {name}: {value:?} ({message})")]
    InvalidValue {
        name: String,
        value: String,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SmacError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn invalid_seed_spec(message: impl Into<String>) -> Self {
        Self::InvalidSeedSpec {
            message: message.into(),
        }
    }

    /// Whether retrying the same call could succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(self, SmacError::NoUsableResult { .. } | SmacError::Io(_))
    }
}

/// Result type alias for orchestration operations
pub type SmacResult<T> = Result<T, SmacError>;
