//! Value and change types shared by all stores.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// A set of key/value pairs read from or written to a store.
///
/// Ordered so that dumps and change batches are deterministic.
pub type StorageItems = BTreeMap<String, Value>;

/// Changes reported to listeners, keyed by storage key.
pub type StorageChanges = BTreeMap<String, StorageChange>;

/// The storage area a store belongs to.
///
/// Change listeners receive the area alongside every batch so that a
/// listener shared between areas can filter on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageArea {
    /// Storage synchronized across the user's devices.
    #[default]
    Sync,
    /// Storage local to this device.
    Local,
    /// Storage kept for the lifetime of the session.
    Session,
    /// Read-only storage provisioned by an administrator.
    Managed,
}

impl StorageArea {
    /// Returns the lowercase name of the area.
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageArea::Sync => "sync",
            StorageArea::Local => "local",
            StorageArea::Session => "session",
            StorageArea::Managed => "managed",
        }
    }
}

impl fmt::Display for StorageArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single key's change within a write.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageChange {
    /// Value before the write, if the key existed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    /// Value after the write. `None` when the key was removed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
}

impl StorageChange {
    /// Creates a change that writes `new_value`.
    pub fn written(old_value: Option<Value>, new_value: Value) -> Self {
        Self {
            old_value,
            new_value: Some(new_value),
        }
    }

    /// Creates a change that removes the key.
    pub fn removed(old_value: Value) -> Self {
        Self {
            old_value: Some(old_value),
            new_value: None,
        }
    }

    /// Returns true if the key was removed.
    pub fn is_removal(&self) -> bool {
        self.new_value.is_none()
    }
}
