//! In-memory store for tests and ephemeral state.

use crate::backend::RemoteKv;
use crate::error::KvResult;
use crate::listeners::{ChangeListener, ListenerId, ListenerSet};
use crate::types::{StorageArea, StorageChange, StorageChanges, StorageItems};
use futures::future::{self, BoxFuture, FutureExt};
use parking_lot::RwLock;
use std::sync::Arc;

/// An in-memory store.
///
/// Clones share the same entries and listeners, so two clones behave
/// like two writers attached to the same synced storage.
///
/// Writes that leave a key's value unchanged are not reported to
/// listeners.
///
/// # Example
///
/// ```rust
/// use kvsync_store::{MemoryKv, RemoteKv, StorageArea};
///
/// let kv = MemoryKv::with_area(StorageArea::Local);
/// assert_eq!(kv.area(), StorageArea::Local);
/// assert!(kv.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    area: StorageArea,
    data: RwLock<StorageItems>,
    listeners: ListenerSet,
}

impl MemoryKv {
    /// Creates an empty store in the `sync` area.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store in the given area.
    #[must_use]
    pub fn with_area(area: StorageArea) -> Self {
        Self {
            inner: Arc::new(Inner {
                area,
                ..Inner::default()
            }),
        }
    }

    /// Creates a store in the `sync` area holding the given entries.
    #[must_use]
    pub fn with_items(items: StorageItems) -> Self {
        Self {
            inner: Arc::new(Inner {
                data: RwLock::new(items),
                ..Inner::default()
            }),
        }
    }

    /// Returns a copy of all entries.
    #[must_use]
    pub fn items(&self) -> StorageItems {
        self.inner.data.read().clone()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.data.read().len()
    }

    /// Returns true if the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.data.read().is_empty()
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Applies a write and notifies listeners synchronously.
    ///
    /// This is the body of [`RemoteKv::set`], exposed for callers that need
    /// the write to happen before they yield.
    pub fn apply_set(&self, items: StorageItems) {
        let changes = {
            let mut data = self.inner.data.write();
            let mut changes = StorageChanges::new();
            for (key, value) in items {
                let old = data.insert(key.clone(), value.clone());
                if old.as_ref() != Some(&value) {
                    changes.insert(key, StorageChange::written(old, value));
                }
            }
            changes
        };
        self.inner.listeners.emit(&changes, self.inner.area);
    }

    /// Applies a removal and notifies listeners synchronously.
    pub fn apply_remove(&self, keys: &[String]) {
        let changes = {
            let mut data = self.inner.data.write();
            keys.iter()
                .filter_map(|key| {
                    data.remove(key)
                        .map(|old| (key.clone(), StorageChange::removed(old)))
                })
                .collect::<StorageChanges>()
        };
        self.inner.listeners.emit(&changes, self.inner.area);
    }
}

impl RemoteKv for MemoryKv {
    fn area(&self) -> StorageArea {
        self.inner.area
    }

    fn get(&self, key: &str) -> BoxFuture<'static, KvResult<StorageItems>> {
        let items = self
            .inner
            .data
            .read()
            .get(key)
            .map(|value| StorageItems::from([(key.to_string(), value.clone())]))
            .unwrap_or_default();
        future::ready(Ok(items)).boxed()
    }

    fn get_all(&self) -> BoxFuture<'static, KvResult<StorageItems>> {
        future::ready(Ok(self.items())).boxed()
    }

    fn set(&self, items: StorageItems) -> BoxFuture<'static, KvResult<()>> {
        let kv = self.clone();
        async move {
            kv.apply_set(items);
            Ok(())
        }
        .boxed()
    }

    fn remove(&self, keys: Vec<String>) -> BoxFuture<'static, KvResult<()>> {
        let kv = self.clone();
        async move {
            kv.apply_remove(&keys);
            Ok(())
        }
        .boxed()
    }

    fn add_listener(&self, listener: ChangeListener) -> ListenerId {
        self.inner.listeners.add(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }
}
