// Error types for the task store

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Everything a store operation can fail with
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store has been closed
    #[error("store is closed")]
    ConnectionUnavailable,

    /// No task with this id exists
    #[error("task not found: {0}")]
    RecordNotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// SQLite rejected the statement or the transaction failed to commit
    #[error("transaction failed: {0}")]
    Transaction(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Another process owns the store directory
    #[error("store is locked by another process: {0}")]
    Locked(PathBuf),

    /// The blocking worker running the transaction panicked or was cancelled
    #[error("store worker failed: {0}")]
    Worker(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        StoreError::Worker(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(StoreError::ConnectionUnavailable.to_string(), "store is closed");
        assert_eq!(
            StoreError::RecordNotFound("abc".to_string()).to_string(),
            "task not found: abc"
        );
        assert_eq!(
            StoreError::Locked(PathBuf::from("/tmp/x")).to_string(),
            "store is locked by another process: /tmp/x"
        );
    }

    #[test]
    fn test_from_rusqlite_error() {
        let err: StoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, StoreError::Transaction(_)));
    }
}
