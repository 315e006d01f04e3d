use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] sitesync_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Invalid parameter '{0}', expected KEY=VALUE")]
    InvalidParam(String),
    #[error("Invalid pending item ID: {0}")]
    InvalidPendingId(String),
    #[error("No pending item with ID {0}")]
    PendingNotFound(String),
    #[error("`watch` needs network access; run it without --offline")]
    WatchOffline,
}
