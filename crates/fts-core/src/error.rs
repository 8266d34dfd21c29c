//! Error types for fts-core

use thiserror::Error;

/// Result type alias using fts-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in fts-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Remote API error
    #[error("API error: {0}")]
    Api(#[from] crate::api::ApiError),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Offline capture attempted on a device that has never authenticated online
    #[error("Offline capture is not permitted on this device")]
    OfflineNotPermitted,
}
