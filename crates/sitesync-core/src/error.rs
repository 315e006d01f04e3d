//! Error types for sitesync-core

use thiserror::Error;

/// Result type alias using sitesync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sitesync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Local persistence failed (quota, corruption, disabled storage)
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Network read failed and no cached snapshot could be served
    #[error("Fetch of '{collection}' failed: {reason}")]
    FetchFailed { collection: String, reason: String },

    /// Network write failed; the item was kept in the pending queue
    #[error("Send of '{kind}' failed: {reason}")]
    SendFailed { kind: String, reason: String },

    /// Caller-supplied data rejected before any queue or network interaction
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<libsql::Error> for Error {
    fn from(error: libsql::Error) -> Self {
        Self::StorageUnavailable(error.to_string())
    }
}
