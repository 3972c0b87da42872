//! Bidirectional sync guard between a reactive cell and a remote store.
//!
//! A [`SyncedCell`] relays every local change of its cell to one key of a
//! [`RemoteKv`], and every remote change of that key back into the cell,
//! without letting either relay trigger the other.
//!
//! ## Relay state
//!
//! ```text
//!            local change               remote change (area + key match)
//!   Idle ─────────────────▶ ApplyingLocal{n}      Idle ───────────▶ ApplyingRemote
//!     ▲   write resolves,      │  further local       ▲   cell.set done    │
//!     └────── n reaches 0 ─────┘  changes: n += 1     └────────────────────┘
//! ```
//!
//! - A local change seen while `ApplyingRemote` is the echo of the inbound
//!   relay and is not written.
//! - A remote change seen while `ApplyingLocal` is treated as the echo of
//!   the pending write and is not applied.
//! - `n` drops on success, failure and timeout alike, so a failed write
//!   never blocks later inbound relays.
//!
//! Local changes are queued and written by a single task, one at a time, in
//! the order the cell notified them. The store therefore ends on the
//! cell's last value even when the cell is set from several threads.
//!
//! The initial load and inbound relays are serialized by one lock. A
//! remote change applied before the load completes is newer than the
//! read, so the read result is discarded and nothing is written back.

use crate::cell::{ReactiveCell, Subscription};
use crate::config::{RemoteSubscription, SyncConfig};
use crate::error::{SyncError, SyncResult};
use kvsync_store::{
    KvResult, ListenerId, RemoteKv, StorageArea, StorageChanges, StorageItems,
};
use parking_lot::{Mutex, ReentrantMutex};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Values that can live in a synced cell.
pub trait SyncValue: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> SyncValue for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// Which relay, if any, is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelayState {
    /// No relay in progress.
    #[default]
    Idle,
    /// A remote change is being applied to the cell.
    ApplyingRemote,
    /// Local changes are being written to the store.
    ApplyingLocal {
        /// Outbound writes not yet resolved.
        pending: usize,
    },
}

impl RelayState {
    /// Returns the number of outbound writes in flight.
    pub fn pending_writes(&self) -> usize {
        match self {
            RelayState::ApplyingLocal { pending } => *pending,
            _ => 0,
        }
    }
}

/// Snapshot of a synced cell's coordination state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GuardStatus {
    /// Current relay.
    pub relay: RelayState,
    /// Whether the initial load has completed (or was skipped).
    pub loaded: bool,
    /// Whether the cell has been disposed.
    pub disposed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Priming {
    Relay,
    Skip,
}

/// A reactive cell kept in sync with one key of a remote store.
///
/// Dereferences to the underlying [`ReactiveCell`]: read, set and
/// subscribe through it as usual. Synchronization stops when the
/// `SyncedCell` is dropped or [`dispose`](SyncedCell::dispose)d; clones of
/// the inner cell keep working as plain in-memory cells.
///
/// # Example
///
/// ```rust
/// use kvsync_core::{SyncConfig, SyncedCell};
/// use kvsync_store::MemoryKv;
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let kv = MemoryKv::new();
/// let theme = SyncedCell::create(Arc::new(kv.clone()), SyncConfig::new("theme"), "light".to_string())
///     .unwrap();
///
/// theme.loaded().await;
/// theme.set("dark".to_string());
/// theme.settled().await;
///
/// assert_eq!(kv.items()["theme"], "dark");
/// # }
/// ```
pub struct SyncedCell<T> {
    cell: ReactiveCell<T>,
    guard: Arc<Guard<T>>,
}

struct Guard<T> {
    config: SyncConfig,
    kv: Arc<dyn RemoteKv>,
    cell: ReactiveCell<T>,
    initial: T,
    runtime: Handle,
    status: watch::Sender<GuardStatus>,
    inbound: ReentrantMutex<()>,
    inbound_seen: AtomicBool,
    local_subscription: Mutex<Option<Subscription>>,
    remote_listener: Mutex<Option<ListenerId>>,
    load_task: Mutex<Option<JoinHandle<()>>>,
}

/// Creates a cell synced with `key`.
///
/// Shorthand for [`SyncedCell::create`] with default settings apart from
/// `load_from_storage`.
///
/// # Errors
///
/// Returns an error if `key` is empty or no Tokio runtime is running.
pub fn create_synced<T: SyncValue>(
    kv: Arc<dyn RemoteKv>,
    key: impl Into<String>,
    initial: T,
    load_from_storage: bool,
) -> SyncResult<SyncedCell<T>> {
    let config = SyncConfig::new(key).with_load_from_storage(load_from_storage);
    SyncedCell::create(kv, config, initial)
}

impl<T: SyncValue> SyncedCell<T> {
    /// Creates a synced cell and starts relaying.
    ///
    /// Returns immediately. With `load_from_storage`, the stored value (or
    /// `initial` when the key is absent) is applied once the read
    /// completes, and local changes are relayed only from then on.
    ///
    /// Must be called from within a Tokio runtime; relays are spawned on
    /// that runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty or no runtime is running.
    /// Failures of the relays themselves are logged, never returned.
    pub fn create(kv: Arc<dyn RemoteKv>, config: SyncConfig, initial: T) -> SyncResult<Self> {
        if config.key.is_empty() {
            return Err(SyncError::InvalidKey);
        }
        let runtime = Handle::try_current().map_err(|_| SyncError::NoRuntime)?;

        let cell = ReactiveCell::new(initial.clone());
        let (status, _) = watch::channel(GuardStatus::default());

        let guard = Arc::new(Guard {
            config,
            kv,
            cell: cell.clone(),
            initial,
            runtime,
            status,
            inbound: ReentrantMutex::new(()),
            inbound_seen: AtomicBool::new(false),
            local_subscription: Mutex::new(None),
            remote_listener: Mutex::new(None),
            load_task: Mutex::new(None),
        });

        tracing::debug!(
            key = %guard.config.key,
            area = %guard.config.area,
            load = guard.config.load_from_storage,
            "creating synced cell"
        );

        if guard.config.remote_subscription == RemoteSubscription::Eager {
            guard.listen_remote();
        }

        if guard.config.load_from_storage {
            guard.spawn_initial_load();
        } else {
            guard.subscribe_local(Priming::Relay);
            guard.mark_loaded();
        }

        Ok(Self { cell, guard })
    }

    /// Returns the underlying cell.
    pub fn cell(&self) -> &ReactiveCell<T> {
        &self.cell
    }

    /// Waits until the initial load has completed.
    ///
    /// Resolves immediately when loading was disabled, and after disposal.
    pub async fn loaded(&self) {
        let mut rx = self.guard.status.subscribe();
        let _ = rx.wait_for(|s| s.loaded || s.disposed).await;
    }

    /// Waits until the initial load has completed and no outbound write is
    /// in flight.
    pub async fn settled(&self) {
        let mut rx = self.guard.status.subscribe();
        let _ = rx
            .wait_for(|s| (s.loaded || s.disposed) && s.relay.pending_writes() == 0)
            .await;
    }
}

impl<T> SyncedCell<T> {
    /// Returns the storage key.
    pub fn key(&self) -> &str {
        &self.guard.config.key
    }

    /// Returns the storage area accepted for inbound changes.
    pub fn area(&self) -> StorageArea {
        self.guard.config.area
    }

    /// Returns a snapshot of the coordination state.
    pub fn status(&self) -> GuardStatus {
        *self.guard.status.borrow()
    }

    /// Returns true if the cell currently listens to remote changes.
    pub fn is_listening(&self) -> bool {
        self.guard.remote_listener.lock().is_some()
    }

    /// Stops synchronizing.
    ///
    /// Removes the remote listener, ends the cell subscription and cancels a
    /// pending initial load. Writes already queued complete. Calling it
    /// again does nothing.
    pub fn dispose(&self) {
        self.guard.dispose();
    }
}

impl<T> Deref for SyncedCell<T> {
    type Target = ReactiveCell<T>;

    fn deref(&self) -> &Self::Target {
        &self.cell
    }
}

impl<T> Drop for SyncedCell<T> {
    fn drop(&mut self) {
        self.guard.dispose();
    }
}

impl<T> std::fmt::Debug for SyncedCell<T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncedCell")
            .field("key", &self.guard.config.key)
            .field("cell", &self.cell)
            .field("status", &*self.guard.status.borrow())
            .finish()
    }
}

impl<T: SyncValue> Guard<T> {
    fn spawn_initial_load(self: &Arc<Self>) {
        let read = self.kv.get(&self.config.key);
        let weak = Arc::downgrade(self);

        let task = self.runtime.spawn(async move {
            let result = read.await;
            if let Some(guard) = weak.upgrade() {
                guard.finish_initial_load(result);
            }
        });
        *self.load_task.lock() = Some(task);
    }

    fn finish_initial_load(self: &Arc<Self>, result: KvResult<StorageItems>) {
        if self.is_disposed() {
            return;
        }
        let key = &self.config.key;

        let priming = match result {
            Ok(mut items) => {
                let _inbound = self.inbound.lock();
                if self.inbound_seen.load(Ordering::Acquire) {
                    tracing::debug!(key = %key, "remote change arrived during load; read result discarded");
                    Priming::Skip
                } else {
                    let value = match items.remove(key) {
                        Some(raw) => match serde_json::from_value::<T>(raw) {
                            Ok(value) => {
                                tracing::debug!(key = %key, "loaded stored value");
                                value
                            }
                            Err(e) => {
                                let err = SyncError::malformed(key.as_str(), e.to_string());
                                tracing::warn!(error = %err, "stored value unreadable; using initial value");
                                self.initial.clone()
                            }
                        },
                        None => {
                            tracing::debug!(key = %key, "no stored value; using initial value");
                            self.initial.clone()
                        }
                    };
                    self.cell.set(value);
                    Priming::Relay
                }
            }
            Err(source) => {
                let err = SyncError::RemoteRead {
                    key: key.clone(),
                    source,
                };
                tracing::warn!(error = %err, "initial load failed; keeping current value");
                Priming::Skip
            }
        };

        self.subscribe_local(priming);
        self.mark_loaded();
    }

    fn subscribe_local(self: &Arc<Self>, priming: Priming) {
        if self.is_disposed() {
            return;
        }

        let (outbound, queue) = mpsc::unbounded_channel();
        self.runtime.spawn(Arc::clone(self).relay_outbound(queue));

        let weak: Weak<Self> = Arc::downgrade(self);
        let skip_priming = AtomicBool::new(priming == Priming::Skip);
        let subscription = self.cell.subscribe(move |value| {
            if skip_priming.swap(false, Ordering::AcqRel) {
                return;
            }
            if let Some(guard) = weak.upgrade() {
                guard.on_local_change(value, &outbound);
            }
        });

        let mut slot = self.local_subscription.lock();
        if self.is_disposed() {
            return;
        }
        *slot = Some(subscription);
    }

    fn listen_remote(self: &Arc<Self>) {
        let mut slot = self.remote_listener.lock();
        if slot.is_some() || self.is_disposed() {
            return;
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        let id = self.kv.add_listener(Arc::new(move |changes, area| {
            if let Some(guard) = weak.upgrade() {
                guard.on_remote_change(changes, area);
            }
        }));
        *slot = Some(id);
        tracing::debug!(key = %self.config.key, "listening for remote changes");
    }

    /// Outbound relay.
    fn on_local_change(&self, value: &T, outbound: &mpsc::UnboundedSender<Value>) {
        let key = &self.config.key;

        if !self.begin_local() {
            tracing::trace!(key = %key, "local change is an inbound echo; not written");
            return;
        }

        let raw = match serde_json::to_value(value) {
            Ok(raw) => raw,
            Err(source) => {
                let err = SyncError::Encode {
                    key: key.clone(),
                    source,
                };
                tracing::error!(error = %err, "local change not written");
                self.finish_local();
                return;
            }
        };

        if outbound.send(raw).is_err() {
            tracing::warn!(key = %key, "outbound relay stopped; local change not written");
            self.finish_local();
        }
    }

    /// Writes queued local changes one at a time, in queue order.
    ///
    /// Ends once the local subscription is gone and the queue is drained.
    async fn relay_outbound(self: Arc<Self>, mut queue: mpsc::UnboundedReceiver<Value>) {
        while let Some(raw) = queue.recv().await {
            tracing::debug!(key = %self.config.key, "relaying local change to storage");
            let outcome = self.write(raw).await;
            self.finish_outbound(outcome);
        }
    }

    async fn write(&self, raw: Value) -> SyncResult<()> {
        let key = self.config.key.clone();
        let write = self.kv.set(StorageItems::from([(key.clone(), raw)]));

        match self.config.write_timeout {
            Some(limit) => match tokio::time::timeout(limit, write).await {
                Ok(result) => result.map_err(|source| SyncError::RemoteWrite { key, source }),
                Err(_) => Err(SyncError::WriteTimeout {
                    key,
                    timeout: limit,
                }),
            },
            None => write
                .await
                .map_err(|source| SyncError::RemoteWrite { key, source }),
        }
    }

    fn finish_outbound(self: &Arc<Self>, outcome: SyncResult<()>) {
        self.finish_local();

        match outcome {
            Ok(()) => {
                tracing::trace!(key = %self.config.key, "local change stored");
                if self.config.remote_subscription == RemoteSubscription::Lazy {
                    self.listen_remote();
                }
            }
            Err(err) => {
                tracing::error!(error = %err, transient = err.is_transient(), "outbound write failed");
            }
        }
    }

    /// Inbound relay.
    fn on_remote_change(&self, changes: &StorageChanges, area: StorageArea) {
        let key = &self.config.key;
        if area != self.config.area {
            return;
        }
        let Some(change) = changes.get(key) else {
            return;
        };
        if self.is_disposed() {
            return;
        }

        let _inbound = self.inbound.lock();
        if !self.begin_remote() {
            let relay = self.status.borrow().relay;
            tracing::trace!(key = %key, ?relay, "remote change ignored while relaying");
            return;
        }

        let decoded = match &change.new_value {
            None => Err(SyncError::malformed(key.as_str(), "key was removed")),
            Some(raw) => serde_json::from_value::<T>(raw.clone())
                .map_err(|e| SyncError::malformed(key.as_str(), e.to_string())),
        };

        match decoded {
            Ok(value) => {
                tracing::debug!(key = %key, "applying remote change");
                self.inbound_seen.store(true, Ordering::Release);
                self.cell.set(value);
            }
            Err(err) => tracing::warn!(error = %err, "remote change not applied"),
        }

        self.finish_remote();
    }

    fn begin_local(&self) -> bool {
        self.status.send_if_modified(|s| match s.relay {
            RelayState::ApplyingRemote => false,
            RelayState::Idle => {
                s.relay = RelayState::ApplyingLocal { pending: 1 };
                true
            }
            RelayState::ApplyingLocal { pending } => {
                s.relay = RelayState::ApplyingLocal {
                    pending: pending + 1,
                };
                true
            }
        })
    }

    fn finish_local(&self) {
        self.status.send_modify(|s| {
            s.relay = match s.relay {
                RelayState::ApplyingLocal { pending } if pending > 1 => {
                    RelayState::ApplyingLocal {
                        pending: pending - 1,
                    }
                }
                RelayState::ApplyingLocal { .. } => RelayState::Idle,
                other => other,
            };
        });
    }

    fn begin_remote(&self) -> bool {
        self.status.send_if_modified(|s| {
            if s.relay == RelayState::Idle {
                s.relay = RelayState::ApplyingRemote;
                true
            } else {
                false
            }
        })
    }

    fn finish_remote(&self) {
        self.status.send_if_modified(|s| {
            if s.relay == RelayState::ApplyingRemote {
                s.relay = RelayState::Idle;
                true
            } else {
                false
            }
        });
    }

    fn mark_loaded(&self) {
        self.status.send_if_modified(|s| !std::mem::replace(&mut s.loaded, true));
    }
}

impl<T> Guard<T> {
    fn is_disposed(&self) -> bool {
        self.status.borrow().disposed
    }

    fn dispose(&self) {
        let first = self
            .status
            .send_if_modified(|s| !std::mem::replace(&mut s.disposed, true));
        if !first {
            return;
        }

        if let Some(id) = self.remote_listener.lock().take() {
            self.kv.remove_listener(id);
        }
        let subscription = self.local_subscription.lock().take();
        drop(subscription);
        if let Some(task) = self.load_task.lock().take() {
            task.abort();
        }

        tracing::debug!(key = %self.config.key, "synced cell disposed");
    }
}
