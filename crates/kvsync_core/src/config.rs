//! Configuration for synced cells.

use kvsync_store::StorageArea;
use std::time::Duration;

/// When a synced cell starts listening to remote changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemoteSubscription {
    /// Listen from construction onwards.
    #[default]
    Eager,
    /// Listen only after the first successful outbound write.
    Lazy,
}

/// Configuration for one synced cell.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Storage key bound to the cell.
    pub key: String,
    /// Whether to read the key from storage before relaying local writes.
    pub load_from_storage: bool,
    /// Area whose change notifications are accepted.
    pub area: StorageArea,
    /// When to start listening to remote changes.
    pub remote_subscription: RemoteSubscription,
    /// Upper bound on an outbound write. `None` waits indefinitely.
    pub write_timeout: Option<Duration>,
}

impl SyncConfig {
    /// Creates a configuration for `key` with default settings.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            load_from_storage: true,
            area: StorageArea::Sync,
            remote_subscription: RemoteSubscription::Eager,
            write_timeout: None,
        }
    }

    /// Sets whether the initial value is read from storage.
    pub fn with_load_from_storage(mut self, load: bool) -> Self {
        self.load_from_storage = load;
        self
    }

    /// Sets the storage area to accept notifications from.
    pub fn with_area(mut self, area: StorageArea) -> Self {
        self.area = area;
        self
    }

    /// Sets the remote subscription strategy.
    pub fn with_remote_subscription(mut self, strategy: RemoteSubscription) -> Self {
        self.remote_subscription = strategy;
        self
    }

    /// Sets the outbound write timeout.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SyncConfig::new("theme");
        assert_eq!(config.key, "theme");
        assert!(config.load_from_storage);
        assert_eq!(config.area, StorageArea::Sync);
        assert_eq!(config.remote_subscription, RemoteSubscription::Eager);
        assert_eq!(config.write_timeout, None);
    }

    #[test]
    fn builder() {
        let config = SyncConfig::new("volume")
            .with_load_from_storage(false)
            .with_area(StorageArea::Local)
            .with_remote_subscription(RemoteSubscription::Lazy)
            .with_write_timeout(Duration::from_secs(5));

        assert!(!config.load_from_storage);
        assert_eq!(config.area, StorageArea::Local);
        assert_eq!(config.remote_subscription, RemoteSubscription::Lazy);
        assert_eq!(config.write_timeout, Some(Duration::from_secs(5)));
    }
}
