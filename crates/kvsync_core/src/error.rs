//! Error types for synced cells.

use kvsync_store::KvError;
use std::time::Duration;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while synchronizing a cell.
///
/// Only [`SyncError::InvalidKey`] and [`SyncError::NoRuntime`] are ever
/// returned to callers; relay failures are logged and swallowed.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The storage key is empty.
    #[error("storage key must not be empty")]
    InvalidKey,

    /// No Tokio runtime was available to drive the relays.
    #[error("synced cells must be created inside a Tokio runtime")]
    NoRuntime,

    /// The initial read failed.
    #[error("failed to read {key:?} from storage: {source}")]
    RemoteRead {
        /// Storage key.
        key: String,
        /// Underlying store error.
        source: KvError,
    },

    /// An outbound write failed.
    #[error("failed to write {key:?} to storage: {source}")]
    RemoteWrite {
        /// Storage key.
        key: String,
        /// Underlying store error.
        source: KvError,
    },

    /// An outbound write did not complete in time.
    #[error("write of {key:?} timed out after {timeout:?}")]
    WriteTimeout {
        /// Storage key.
        key: String,
        /// Configured timeout.
        timeout: Duration,
    },

    /// A change notification for the key had an unexpected shape.
    #[error("ignoring malformed change for {key:?}: {reason}")]
    MalformedNotification {
        /// Storage key.
        key: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The cell value could not be encoded as JSON.
    #[error("failed to encode value of {key:?}: {source}")]
    Encode {
        /// Storage key.
        key: String,
        /// Encoder error.
        source: serde_json::Error,
    },
}

impl SyncError {
    /// Creates a malformed-notification error.
    pub fn malformed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedNotification {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if a later attempt may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::RemoteRead { source, .. } | SyncError::RemoteWrite { source, .. } => {
                source.is_transient()
            }
            SyncError::WriteTimeout { .. } => true,
            _ => false,
        }
    }
}
