//! Remote store trait definition.

use crate::error::KvResult;
use crate::listeners::{ChangeListener, ListenerId};
use crate::types::{StorageArea, StorageItems};
use futures::future::BoxFuture;

/// An asynchronous key/value store with change notification.
///
/// Stores hold JSON values under string keys. They may be shared by many
/// writers, in this process or elsewhere; every write is an independent
/// last-write-wins overwrite.
///
/// # Invariants
///
/// - Futures are `'static`: they own whatever they need from the store
/// - A write's changes are delivered to every registered listener
///   before the write's future resolves
/// - Listeners receive writes from every source, including the caller's
///   own writes
/// - `get` returns an empty map, not an error, for a missing key
///
/// # Implementors
///
/// - [`super::MemoryKv`] - For tests and ephemeral state
/// - [`super::FileKv`] - For persistence in a local JSON file
pub trait RemoteKv: Send + Sync {
    /// Returns the storage area this store belongs to.
    fn area(&self) -> StorageArea;

    /// Reads a single key.
    ///
    /// The returned map contains `key` only if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get(&self, key: &str) -> BoxFuture<'static, KvResult<StorageItems>>;

    /// Reads every entry in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get_all(&self) -> BoxFuture<'static, KvResult<StorageItems>>;

    /// Writes all given entries, notifying listeners.
    ///
    /// # Errors
    ///
    /// Returns an error if the write is rejected or cannot be persisted.
    fn set(&self, items: StorageItems) -> BoxFuture<'static, KvResult<()>>;

    /// Removes the given keys, notifying listeners of the keys that existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal cannot be persisted.
    fn remove(&self, keys: Vec<String>) -> BoxFuture<'static, KvResult<()>>;

    /// Registers a change listener.
    fn add_listener(&self, listener: ChangeListener) -> ListenerId;

    /// Removes a change listener. Returns false if it was not registered.
    fn remove_listener(&self, id: ListenerId) -> bool;
}
