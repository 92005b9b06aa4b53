//! Error types for changegate-state

use thiserror::Error;

/// Errors that can occur in the snapshot persistence layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend connection error
    #[error("Storage connection failed: {0}")]
    Connection(String),

    /// Backend query or write error
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// A stored blob could not be decoded or failed its digest check
    #[error("Corrupt snapshot '{key}': {reason}")]
    Corrupt { key: String, reason: String },
}

impl From<surrealdb::Error> for StorageError {
    fn from(err: surrealdb::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
