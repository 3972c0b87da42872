//! A scriptable store for exercising sync behavior.

use futures::future::{BoxFuture, FutureExt};
use kvsync_store::{
    ChangeListener, KvError, KvResult, ListenerId, MemoryKv, RemoteKv, StorageArea,
    StorageItems,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// A [`RemoteKv`] whose behavior can be scripted by a test.
///
/// Backed by a [`MemoryKv`], it additionally:
/// - Records every write call, in call order, including failed ones
/// - Counts reads
/// - Fails the next reads or writes on request
/// - Holds writes open after they were applied, until released
/// - Simulates writes from other writers
///
/// Clones share all state.
#[derive(Clone)]
pub struct ScriptedKv {
    inner: Arc<Inner>,
}

struct Inner {
    store: MemoryKv,
    writes: Mutex<Vec<StorageItems>>,
    reads: AtomicUsize,
    get_faults: Mutex<VecDeque<String>>,
    set_faults: Mutex<VecDeque<String>>,
    gate: watch::Sender<bool>,
}

impl ScriptedKv {
    /// Creates an empty store in the `sync` area.
    pub fn new() -> Self {
        Self::from_store(MemoryKv::new())
    }

    /// Creates a store holding `items`.
    pub fn with_items(items: StorageItems) -> Self {
        Self::from_store(MemoryKv::with_items(items))
    }

    /// Creates an empty store reporting changes under `area`.
    pub fn with_area(area: StorageArea) -> Self {
        Self::from_store(MemoryKv::with_area(area))
    }

    fn from_store(store: MemoryKv) -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            inner: Arc::new(Inner {
                store,
                writes: Mutex::new(Vec::new()),
                reads: AtomicUsize::new(0),
                get_faults: Mutex::new(VecDeque::new()),
                set_faults: Mutex::new(VecDeque::new()),
                gate,
            }),
        }
    }

    /// Returns this store as a shared trait object.
    pub fn shared(&self) -> Arc<dyn RemoteKv> {
        Arc::new(self.clone())
    }

    /// Returns every write call made so far.
    pub fn writes(&self) -> Vec<StorageItems> {
        self.inner.writes.lock().clone()
    }

    /// Returns the number of write calls made so far.
    pub fn write_count(&self) -> usize {
        self.inner.writes.lock().len()
    }

    /// Returns the values written for `key`, in call order.
    pub fn writes_of(&self, key: &str) -> Vec<Value> {
        self.inner
            .writes
            .lock()
            .iter()
            .filter_map(|items| items.get(key).cloned())
            .collect()
    }

    /// Forgets recorded writes.
    pub fn clear_writes(&self) {
        self.inner.writes.lock().clear();
    }

    /// Returns the number of read calls made so far.
    pub fn read_count(&self) -> usize {
        self.inner.reads.load(Ordering::SeqCst)
    }

    /// Makes the next read fail with [`KvError::Unavailable`].
    pub fn fail_next_get(&self, message: impl Into<String>) {
        self.inner.get_faults.lock().push_back(message.into());
    }

    /// Makes the next write fail with [`KvError::Unavailable`].
    ///
    /// A failed write is recorded but not applied.
    pub fn fail_next_set(&self, message: impl Into<String>) {
        self.inner.set_faults.lock().push_back(message.into());
    }

    /// Keeps subsequent writes pending after they have been applied.
    pub fn hold_writes(&self) {
        self.inner.gate.send_replace(false);
    }

    /// Lets held writes, and all later ones, resolve.
    pub fn release_writes(&self) {
        self.inner.gate.send_replace(true);
    }

    /// Writes `value` under `key` as another writer would.
    ///
    /// Listeners are notified before this returns.
    pub fn external_set(&self, key: &str, value: Value) {
        self.inner
            .store
            .apply_set(StorageItems::from([(key.to_string(), value)]));
    }

    /// Removes `key` as another writer would.
    pub fn external_remove(&self, key: &str) {
        self.inner.store.apply_remove(&[key.to_string()]);
    }

    /// Returns a copy of all entries.
    pub fn items(&self) -> StorageItems {
        self.inner.store.items()
    }

    /// Returns the current value of `key`.
    pub fn value(&self, key: &str) -> Option<Value> {
        self.inner.store.items().remove(key)
    }

    /// Returns the number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.store.listener_count()
    }
}

impl Default for ScriptedKv {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScriptedKv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedKv")
            .field("items", &self.items())
            .field("writes", &self.write_count())
            .field("reads", &self.read_count())
            .finish()
    }
}

impl RemoteKv for ScriptedKv {
    fn area(&self) -> StorageArea {
        self.inner.store.area()
    }

    fn get(&self, key: &str) -> BoxFuture<'static, KvResult<StorageItems>> {
        self.inner.reads.fetch_add(1, Ordering::SeqCst);
        match self.inner.get_faults.lock().pop_front() {
            Some(message) => futures::future::ready(Err(KvError::unavailable(message))).boxed(),
            None => self.inner.store.get(key),
        }
    }

    fn get_all(&self) -> BoxFuture<'static, KvResult<StorageItems>> {
        self.inner.reads.fetch_add(1, Ordering::SeqCst);
        match self.inner.get_faults.lock().pop_front() {
            Some(message) => futures::future::ready(Err(KvError::unavailable(message))).boxed(),
            None => self.inner.store.get_all(),
        }
    }

    fn set(&self, items: StorageItems) -> BoxFuture<'static, KvResult<()>> {
        self.inner.writes.lock().push(items.clone());
        let fault = self.inner.set_faults.lock().pop_front();
        let store = self.inner.store.clone();
        let mut gate = self.inner.gate.subscribe();

        async move {
            if let Some(message) = fault {
                return Err(KvError::unavailable(message));
            }
            store.apply_set(items);
            let _ = gate.wait_for(|open| *open).await;
            Ok(())
        }
        .boxed()
    }

    fn remove(&self, keys: Vec<String>) -> BoxFuture<'static, KvResult<()>> {
        self.inner.store.remove(keys)
    }

    fn add_listener(&self, listener: ChangeListener) -> ListenerId {
        self.inner.store.add_listener(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.store.remove_listener(id)
    }
}
