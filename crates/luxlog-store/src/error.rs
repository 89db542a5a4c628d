//! Error types for luxlog-store.

use std::path::PathBuf;

/// Result type for luxlog-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in luxlog-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Timestamp text or stored value that cannot be interpreted.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// CSV encoding error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
