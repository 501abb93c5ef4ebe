//! Error types for the client engine.

use thiserror::Error;

/// Result type alias using ClientError.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors surfaced by the local store, sync adapter, and manager.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("network error: {0}")]
    Network(String),

    #[error("backend error: {status} - {message}")]
    Backend { status: u16, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(#[from] review_core::CoreError),
}
