//! Error types for the xray-eval library.

use thiserror::Error;

/// Result type for xray-eval operations.
pub type Result<T> = std::result::Result<T, XrayEvalError>;

/// Error types that can occur while reconciling, encoding or scoring findings.
#[derive(Error, Debug)]
pub enum XrayEvalError {
    /// Malformed prediction string.
    #[error("Format error: {0}")]
    FormatError(String),

    /// Label convention or taxonomy mismatch.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Invalid score or IoU threshold.
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),

    /// Invalid bounding box coordinates.
    #[error("Invalid bounding box: {0}")]
    InvalidBoundingBox(String),

    /// Inconsistent annotation data.
    #[error("Invalid annotation: {0}")]
    InvalidAnnotation(String),

    /// Empty dataset provided.
    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    /// Error during JSON parsing or serialization.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error while reading or writing CSV tables.
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error during I/O operations.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
