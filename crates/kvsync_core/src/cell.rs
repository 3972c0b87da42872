//! Reactive value container.
//!
//! A [`ReactiveCell`] holds one value and notifies subscribers
//! synchronously, on the setter's stack, every time the value is set.
//! Subscribing delivers the current value immediately.
//!
//! Sets from different threads are serialized: subscribers observe values
//! in the order they were stored.
//!
//! ```rust
//! use kvsync_core::ReactiveCell;
//! use std::sync::{Arc, Mutex};
//!
//! let cell = ReactiveCell::new(1);
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! let sink = Arc::clone(&seen);
//! let subscription = cell.subscribe(move |v| sink.lock().unwrap().push(*v));
//! cell.set(2);
//! cell.set(2);
//! drop(subscription);
//! cell.set(3);
//!
//! assert_eq!(*seen.lock().unwrap(), vec![1, 2, 2]);
//! ```

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

type Subscriber<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A shared, thread-safe writable value with synchronous notification.
///
/// Clones refer to the same cell. Setting a value equal to the current
/// one still notifies subscribers.
pub struct ReactiveCell<T> {
    inner: Arc<CellInner<T>>,
}

struct CellInner<T> {
    value: RwLock<T>,
    // Held across store and notify; re-entrant so subscribers may set.
    order: ReentrantMutex<()>,
    subscribers: Mutex<Vec<(u64, Subscriber<T>)>>,
    next_id: AtomicU64,
}

impl<T> ReactiveCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a cell holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(CellInner {
                value: RwLock::new(value),
                order: ReentrantMutex::new(()),
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Returns a copy of the current value.
    pub fn get(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Replaces the value and notifies every subscriber.
    pub fn set(&self, value: T) {
        let _order = self.inner.order.lock();
        *self.inner.value.write() = value.clone();
        self.notify(&value);
    }

    /// Replaces the value with `f(current)` and notifies every subscriber.
    ///
    /// `f` runs under the cell's write lock and must not touch the cell.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let _order = self.inner.order.lock();
        let next = {
            let mut value = self.inner.value.write();
            let next = f(&value);
            *value = next.clone();
            next
        };
        self.notify(&next);
    }

    /// Subscribes to the cell.
    ///
    /// `f` is called once with the current value before this returns, then
    /// after every `set`. The subscription ends when the returned handle is
    /// dropped.
    pub fn subscribe(&self, f: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let _order = self.inner.order.lock();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let subscriber: Subscriber<T> = Arc::new(f);
        self.inner
            .subscribers
            .lock()
            .push((id, Arc::clone(&subscriber)));

        let current = self.get();
        subscriber(&current);

        let weak: Weak<CellInner<T>> = Arc::downgrade(&self.inner);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.subscribers.lock().retain(|(sid, _)| *sid != id);
                }
            })),
        }
    }

    /// Returns the number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    fn notify(&self, value: &T) {
        // Only the re-entrant order lock is held while subscribers run
        let snapshot: Vec<Subscriber<T>> = self
            .inner
            .subscribers
            .lock()
            .iter()
            .map(|(_, s)| Arc::clone(s))
            .collect();

        for subscriber in snapshot {
            subscriber(value);
        }
    }
}

impl<T> Clone for ReactiveCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for ReactiveCell<T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactiveCell")
            .field("value", &*self.inner.value.read())
            .field("subscribers", &self.inner.subscribers.lock().len())
            .finish()
    }
}

/// Handle to a cell subscription.
///
/// Dropping the handle unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Ends the subscription.
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
