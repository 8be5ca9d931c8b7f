//! Wire boundary to the push-based remote store, and the subscription
//! bookkeeping layered on top of it.
//!
//! The remote is a path-addressable hierarchical key-value store that pushes
//! full-collection snapshots to subscribed listeners. This module owns the
//! two concerns the rest of the engine must never re-implement:
//!
//!   - idempotent registration — exactly one live subscription per path, no
//!     matter how many surfaces ask for it;
//!   - ordering — a snapshot that arrives with a lower delivery sequence
//!     than one already applied for the same path is discarded.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::RemoteError;

// ============================================================================
// Wire types
// ============================================================================

/// Full state of one collection path as pushed by the remote. `Value::Null`
/// means the path is absent, which the engine treats as an empty collection.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Transport delivery counter for this path, monotonically increasing
    /// in emission order.
    pub seq: u64,
    pub value: Value,
}

/// Callback invoked for every snapshot the remote pushes on a path.
pub type SnapshotListener = Arc<dyn Fn(Snapshot) + Send + Sync>;

/// Handle for an active remote subscription.
pub type SubscriptionId = u64;

/// A rejected sub-path inside a multi-path patch. The remainder of the
/// patch is applied; bulk edits use this for partial-success reconciliation.
#[derive(Debug, Clone)]
pub struct PatchFailure {
    pub path: String,
    pub message: String,
}

/// The remote store contract — the only wire-level boundary of the engine.
///
/// Every method is asynchronous and may fail; none silently succeeds.
/// Implementations live outside the engine (production transport) or in the
/// test suite (in-memory mock with failure injection).
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Register a push listener for `path`. The remote emits the current
    /// state immediately and again on every change.
    async fn subscribe(
        &self,
        path: &str,
        listener: SnapshotListener,
    ) -> Result<SubscriptionId, RemoteError>;

    /// Remove a listener. Unknown ids are ignored.
    async fn unsubscribe(&self, id: SubscriptionId);

    /// Point read. Returns `Value::Null` when the path is absent.
    async fn read_once(&self, path: &str) -> Result<Value, RemoteError>;

    /// Whole-value write at `path`.
    async fn write(&self, path: &str, value: Value) -> Result<(), RemoteError>;

    /// Partial multi-path write: each entry addresses a sub-path relative to
    /// `path` (slash-separated for nesting) and replaces only that value;
    /// `Value::Null` removes the sub-path. Applied as a single request; an
    /// `Err` means the whole request failed, while per-entry rejections come
    /// back as `PatchFailure`s with the rest applied.
    async fn patch(
        &self,
        path: &str,
        entries: Vec<(String, Value)>,
    ) -> Result<Vec<PatchFailure>, RemoteError>;

    /// Delete the value at `path`.
    async fn delete(&self, path: &str) -> Result<(), RemoteError>;
}

// ============================================================================
// RemoteSync
// ============================================================================

struct PathSub {
    id: SubscriptionId,
    /// Highest snapshot seq applied for this path.
    last_seq: Arc<Mutex<Option<u64>>>,
}

/// Subscription manager over an injected [`RemoteStore`].
///
/// Created once at process start and torn down with
/// [`RemoteSync::unsubscribe_all`] on shutdown; dropping it without teardown
/// leaks listeners on the remote side.
pub struct RemoteSync {
    remote: Arc<dyn RemoteStore>,
    subs: Mutex<HashMap<String, PathSub>>,
}

impl RemoteSync {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            remote,
            subs: Mutex::new(HashMap::new()),
        }
    }

    pub fn remote(&self) -> &Arc<dyn RemoteStore> {
        &self.remote
    }

    /// Subscribe `handler` to full-collection snapshots of `path`.
    ///
    /// Idempotent per path: a second call for an already-subscribed path is
    /// a no-op (the existing listener keeps delivering; notifications are
    /// never duplicated). Out-of-order snapshots are dropped with a warning
    /// before the handler ever sees them.
    pub async fn subscribe(
        &self,
        path: &str,
        handler: impl Fn(Value) + Send + Sync + 'static,
    ) -> Result<(), RemoteError> {
        if self.subs.lock().contains_key(path) {
            return Ok(());
        }

        let last_seq = Arc::new(Mutex::new(None::<u64>));
        let guard_seq = Arc::clone(&last_seq);
        let guard_path = path.to_string();
        let listener: SnapshotListener = Arc::new(move |snapshot: Snapshot| {
            {
                let mut last = guard_seq.lock();
                if let Some(applied) = *last {
                    if snapshot.seq <= applied {
                        tracing::warn!(
                            path = %guard_path,
                            seq = snapshot.seq,
                            applied,
                            "discarding stale out-of-order snapshot"
                        );
                        return;
                    }
                }
                *last = Some(snapshot.seq);
            }
            handler(snapshot.value);
        });

        let id = self.remote.subscribe(path, listener).await?;

        let mut subs = self.subs.lock();
        // A racing subscribe for the same path may have won; keep the first
        // registration and drop ours so the path still has exactly one.
        if subs.contains_key(path) {
            let remote = Arc::clone(&self.remote);
            tokio::spawn(async move { remote.unsubscribe(id).await });
            return Ok(());
        }
        subs.insert(path.to_string(), PathSub { id, last_seq });
        Ok(())
    }

    /// Whether a live subscription exists for `path`.
    pub fn is_subscribed(&self, path: &str) -> bool {
        self.subs.lock().contains_key(path)
    }

    /// Unregister every live subscription (shutdown teardown).
    pub async fn unsubscribe_all(&self) {
        let drained: Vec<PathSub> = {
            let mut subs = self.subs.lock();
            subs.drain().map(|(_, sub)| sub).collect()
        };
        for sub in drained {
            self.remote.unsubscribe(sub.id).await;
        }
    }
}
