//! Error types for the address import tools

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for address import operations
pub type Result<T> = std::result::Result<T, AddrError>;

/// Main error type for the address import tools
#[derive(Error, Debug)]
pub enum AddrError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown dataset '{name}' (supported: {supported})")]
    UnknownDataset { name: String, supported: String },

    #[error("Dataset '{0}' was given more than once")]
    DuplicateDataset(String),

    #[error(
        "Source directory for dataset '{dataset}' does not exist or is not a directory: {}",
        path.display()
    )]
    MissingDirectory { dataset: String, path: PathBuf },

    #[error("Failed to read dataset '{dataset}': {reason}")]
    DatasetRead { dataset: String, reason: String },

    #[error("Enrichment error: {0}")]
    Enrichment(String),

    #[error("Dispatch error: {0}")]
    Dispatch(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

impl AddrError {
    /// Whether this error was raised while validating the invocation, before
    /// any record was processed.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AddrError::Config(_)
                | AddrError::UnknownDataset { .. }
                | AddrError::DuplicateDataset(_)
                | AddrError::MissingDirectory { .. }
        )
    }
}
