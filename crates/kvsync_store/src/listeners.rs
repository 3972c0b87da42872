//! Change listener registry.
//!
//! Every backend keeps a [`ListenerSet`] and calls [`ListenerSet::emit`]
//! after it has applied a write. Listeners run synchronously on the
//! writer's stack, before the write's future resolves, which is what
//! lets a synchronizing caller recognise the echo of its own write.

use crate::types::{StorageArea, StorageChanges};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A change listener.
///
/// Receives the changed keys and the area of the store that changed.
pub type ChangeListener = Arc<dyn Fn(&StorageChanges, StorageArea) + Send + Sync>;

/// Handle identifying a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A registry that distributes change batches to listeners.
///
/// The registry:
/// - Delivers batches in emit order
/// - Supports multiple listeners
/// - Lets listeners register or remove listeners while being notified
/// - Is thread-safe
#[derive(Default)]
pub struct ListenerSet {
    listeners: RwLock<Vec<(ListenerId, ChangeListener)>>,
    next_id: AtomicU64,
}

impl ListenerSet {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for all future batches.
    pub fn add(&self, listener: ChangeListener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Delivers a batch to every registered listener.
    ///
    /// Empty batches are dropped.
    pub fn emit(&self, changes: &StorageChanges, area: StorageArea) {
        if changes.is_empty() {
            return;
        }

        // Snapshot so listeners may call back into the registry
        let snapshot: Vec<ChangeListener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            listener(changes, area);
        }
    }

    /// Returns the number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Returns true if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }
}

impl std::fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSet")
            .field("listeners", &self.len())
            .finish()
    }
}
