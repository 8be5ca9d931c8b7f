//! Push-based invalidation primitive: a typed change hub the stores publish
//! into and derived-view consumers observe.
//!
//! Observers are stored as `Arc<dyn Fn(&T)>`; `publish` snapshots the list
//! under the lock and fires callbacks with the lock released, so an observer
//! may call `observe`/`unobserve` reentrantly without deadlocking. An
//! observer removed during a publish round is still called in that round; an
//! observer added during a round is not called until the next one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Handle identifying a registered observer.
pub type ObserverId = u64;

type ObserverFn<T> = dyn Fn(&T) + Send + Sync;

/// Typed synchronous change hub.
pub struct ChangeHub<T> {
    observers: Mutex<Vec<(ObserverId, Arc<ObserverFn<T>>)>>,
    next_id: AtomicU64,
}

impl<T> ChangeHub<T> {
    pub fn new() -> Self {
        Self {
            observers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `callback`; it fires for every subsequent publish until
    /// removed via [`ChangeHub::unobserve`].
    pub fn observe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> ObserverId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.observers.lock().push((id, Arc::new(callback)));
        id
    }

    /// Remove an observer. Unknown ids are ignored (safe to call twice).
    pub fn unobserve(&self, id: ObserverId) {
        self.observers.lock().retain(|(oid, _)| *oid != id);
    }

    /// Deliver `event` to every currently registered observer.
    pub fn publish(&self, event: &T) {
        let snapshot: Vec<Arc<ObserverFn<T>>> = {
            let guard = self.observers.lock();
            guard.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };
        for cb in snapshot {
            cb(event);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }
}

impl<T> Default for ChangeHub<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// What changed in a store, published after the change is visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// An inbound snapshot replaced the whole collection.
    SnapshotReplaced,
    /// A single field of one record changed (optimistic or revert).
    FieldChanged { key: String },
    /// A record was inserted locally.
    RecordInserted { key: String },
    /// A record was removed locally.
    RecordRemoved { key: String },
    /// A settings category list changed.
    SettingsChanged,
}

// ============================================================================
// Tests
// ============================================================================
