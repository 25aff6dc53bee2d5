//! Error types for a chunking run
//!
//! The `Display` text of a [`ChunkError`] is what the failure path writes
//! into `data.error` on the import row, so messages are phrased for the
//! people reading that column.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for chunking operations
pub type Result<T> = std::result::Result<T, ChunkError>;

#[derive(Error, Debug)]
pub enum ChunkError {
    /// Source file does not exist; raised before any reading starts
    #[error("CSV file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// A single row could not be parsed; the normalizer skips it
    #[error("Malformed row at line {line}: {reason}")]
    MalformedRow { line: u64, reason: String },

    #[error("Failed to connect to the import store: {0}")]
    StoreConnection(#[source] sqlx::Error),

    #[error("Failed to update the import store: {0}")]
    StoreWrite(#[source] sqlx::Error),

    /// The update statement matched no row
    #[error("Import '{0}' not found in the import store")]
    ImportNotFound(String),

    #[error("CSV read error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to persist chunk file: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid signature '{0}': expected a single file name component of [A-Za-z0-9._-]")]
    InvalidSignature(String),

    #[error("Signature mismatch: expected {expected}, source file hashes to {actual}")]
    SignatureMismatch { expected: String, actual: String },

    #[error(transparent)]
    Common(#[from] chunker_common::CommonError),
}

impl ChunkError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
