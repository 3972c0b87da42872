//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type KvResult<T> = Result<T, KvError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum KvError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A value could not be encoded or decoded as JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The backing file does not hold a JSON object.
    #[error("store corrupted: {0}")]
    Corrupted(String),

    /// The store could not serve the request (offline, quota, injected fault).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl KvError {
    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Returns true if a later attempt at the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, KvError::Io(_) | KvError::Unavailable(_))
    }
}
