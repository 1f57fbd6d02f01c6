//! Error types for turdus
//!
//! Two tiers: `Error` aborts a stage (page-count discovery failure,
//! unreadable local state), `ItemError` is a per-item failure value that is
//! logged, counted into a stage summary, and never aborts the batch.

use thiserror::Error;

/// Result type for stage-level operations
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal stage errors
#[derive(Error, Debug)]
pub enum Error {
    /// Page-count discovery failed; nothing to resume from
    #[error("Catalog discovery failed: {0}")]
    Discovery(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed TSV in durable storage
    #[error("Malformed TSV: {0}")]
    Tsv(String),

    /// Malformed feature matrix file
    #[error("Malformed matrix: {0}")]
    Matrix(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Per-item failure reasons
///
/// A network failure leaves no artifact behind, so the item is naturally
/// retried on the next run. A decode failure is permanent for that payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ItemError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Not found")]
    NotFound,
}
