//! Storage error types.

use thiserror::Error;

/// Result type for backend operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by key-value backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend cannot be reached (lock poisoned, connection gone, ...).
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(#[from] duckdb::Error),
}
