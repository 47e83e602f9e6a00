//! Error types for netsim-storage

use thiserror::Error;

/// Errors that can occur while mirroring or loading a topology
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error while reading or writing a snapshot
    #[error("I/O error: {0}")]
    Io(String),

    /// Error during serialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error during deserialization
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl StorageError {
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::Deserialization(message.into())
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
