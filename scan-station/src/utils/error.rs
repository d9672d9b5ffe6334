//! Application error types

use thiserror::Error;

use crate::store::StoreError;
use crate::sync::SyncError;

/// Application error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Storage failure underneath a scan or console operation
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Sync failure surfaced outside the engine (client construction, forced sync)
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Bad or missing configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Invalid operator input outside the scan flow
    #[error("Validation error: {0}")]
    Validation(String),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Result type for application operations
pub type AppResult<T> = Result<T, AppError>;
