//! Error types for lounge-store

use thiserror::Error;

/// Errors surfaced by a [`crate::DocumentStore`].
///
/// A missing key is not an error: reads return `Ok(None)` or leave the key
/// out of a multi-get result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend failed while operating on a specific key
    #[error("store operation on {key} failed: {message}")]
    Backend { key: String, message: String },

    /// The backend failed on a request not tied to one key
    #[error("store request failed: {0}")]
    Request(String),

    /// Store settings are incomplete or malformed
    #[error("invalid store configuration: {0}")]
    Config(String),

    /// Could not connect to or authenticate with the backend
    #[error("store connection failed: {0}")]
    Connection(String),

    /// A stored body could not be encoded or decoded as JSON
    #[error("document {key} is not valid JSON: {message}")]
    Serialization { key: String, message: String },

    /// Keys must be non-empty
    #[error("invalid document key: {0:?}")]
    InvalidKey(String),
}

impl StoreError {
    /// The key this error concerns, when there is one.
    pub fn key(&self) -> Option<&str> {
        match self {
            StoreError::Backend { key, .. } | StoreError::Serialization { key, .. } => Some(key),
            StoreError::InvalidKey(key) => Some(key),
            StoreError::Request(_) | StoreError::Config(_) | StoreError::Connection(_) => None,
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;
