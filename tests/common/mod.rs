//! Shared test double: an in-memory, path-addressable remote store with
//! push notifications and scripted failure injection.
//!
//! Response plans are queued per operation kind; each call pops the next
//! plan (default: succeed immediately). Plans can delay, reject individual
//! patch sub-paths, or fail the whole request, which makes optimistic-write
//! races deterministic under `tokio::time` paused clocks.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use roster_sync::error::RemoteError;
use roster_sync::remote::{PatchFailure, RemoteStore, Snapshot, SnapshotListener, SubscriptionId};

// ============================================================================
// Response plans
// ============================================================================

#[derive(Clone)]
pub enum PatchPlan {
    /// Apply all entries.
    Apply { delay_ms: u64 },
    /// Apply entries except the listed sub-paths, which are rejected.
    Reject { paths: Vec<String>, delay_ms: u64 },
    /// Whole-request failure; nothing is applied.
    Fail { message: String, delay_ms: u64 },
}

#[derive(Clone)]
pub enum WritePlan {
    Apply,
    Fail(String),
}

// ============================================================================
// MemoryRemote
// ============================================================================

struct Listener {
    path: String,
    callback: SnapshotListener,
}

struct Inner {
    root: Value,
    listeners: HashMap<SubscriptionId, Listener>,
    next_listener_id: SubscriptionId,
    /// Per-path snapshot delivery counters.
    seq: HashMap<String, u64>,
    /// When false, mutations do not push snapshots; tests emit manually.
    auto_notify: bool,

    patch_plans: VecDeque<PatchPlan>,
    write_plans: VecDeque<WritePlan>,
    delete_plans: VecDeque<WritePlan>,
    read_plans: VecDeque<WritePlan>,

    patch_calls: Vec<(String, Vec<(String, Value)>)>,
}

pub struct MemoryRemote {
    inner: Mutex<Inner>,
}

impl MemoryRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                root: Value::Object(Default::default()),
                listeners: HashMap::new(),
                next_listener_id: 1,
                seq: HashMap::new(),
                auto_notify: true,
                patch_plans: VecDeque::new(),
                write_plans: VecDeque::new(),
                delete_plans: VecDeque::new(),
                read_plans: VecDeque::new(),
                patch_calls: Vec::new(),
            }),
        })
    }

    pub fn seed(&self, path: &str, value: Value) {
        set_at(&mut self.inner.lock().root, path, value);
    }

    pub fn value_at(&self, path: &str) -> Value {
        get_at(&self.inner.lock().root, path)
    }

    pub fn set_auto_notify(&self, on: bool) {
        self.inner.lock().auto_notify = on;
    }

    pub fn plan_patch(&self, plan: PatchPlan) {
        self.inner.lock().patch_plans.push_back(plan);
    }

    pub fn plan_write(&self, plan: WritePlan) {
        self.inner.lock().write_plans.push_back(plan);
    }

    pub fn plan_delete(&self, plan: WritePlan) {
        self.inner.lock().delete_plans.push_back(plan);
    }

    pub fn plan_read(&self, plan: WritePlan) {
        self.inner.lock().read_plans.push_back(plan);
    }

    pub fn patch_calls(&self) -> Vec<(String, Vec<(String, Value)>)> {
        self.inner.lock().patch_calls.clone()
    }

    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    /// Push the current subtree at `path` to its subscribers.
    pub fn emit_current(&self, path: &str) {
        let pending = {
            let mut inner = self.inner.lock();
            let value = get_at(&inner.root, path);
            collect_emissions(&mut inner, path, value)
        };
        deliver(pending);
    }

    /// Push an arbitrary snapshot with an explicit delivery seq (for
    /// out-of-order transport tests).
    pub fn emit_snapshot(&self, path: &str, seq: u64, value: Value) {
        let pending: Vec<(SnapshotListener, Snapshot)> = {
            let inner = self.inner.lock();
            inner
                .listeners
                .values()
                .filter(|l| l.path == path)
                .map(|l| (Arc::clone(&l.callback), Snapshot { seq, value: value.clone() }))
                .collect()
        };
        deliver(pending);
    }

    fn notify_change(&self, changed_path: &str) {
        let pending = {
            let mut inner = self.inner.lock();
            if !inner.auto_notify {
                return;
            }
            let affected: Vec<String> = inner
                .listeners
                .values()
                .map(|l| l.path.clone())
                .filter(|lpath| overlaps(lpath, changed_path))
                .collect();
            let mut all = Vec::new();
            for lpath in affected {
                let value = get_at(&inner.root, &lpath);
                all.extend(collect_emissions(&mut inner, &lpath, value));
            }
            all
        };
        deliver(pending);
    }
}

fn collect_emissions(
    inner: &mut Inner,
    path: &str,
    value: Value,
) -> Vec<(SnapshotListener, Snapshot)> {
    let seq = {
        let counter = inner.seq.entry(path.to_string()).or_insert(0);
        *counter += 1;
        *counter
    };
    inner
        .listeners
        .values()
        .filter(|l| l.path == path)
        .map(|l| {
            (
                Arc::clone(&l.callback),
                Snapshot {
                    seq,
                    value: value.clone(),
                },
            )
        })
        .collect()
}

fn deliver(pending: Vec<(SnapshotListener, Snapshot)>) {
    for (cb, snapshot) in pending {
        cb(snapshot);
    }
}

/// Whether a change at `changed` is visible from a subscription at `sub`
/// (ancestor or descendant).
fn overlaps(sub: &str, changed: &str) -> bool {
    sub == changed
        || changed.starts_with(&format!("{sub}/"))
        || sub.starts_with(&format!("{changed}/"))
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn subscribe(
        &self,
        path: &str,
        listener: SnapshotListener,
    ) -> Result<SubscriptionId, RemoteError> {
        let (id, initial) = {
            let mut inner = self.inner.lock();
            let id = inner.next_listener_id;
            inner.next_listener_id += 1;
            inner.listeners.insert(
                id,
                Listener {
                    path: path.to_string(),
                    callback: Arc::clone(&listener),
                },
            );
            let value = get_at(&inner.root, path);
            let counter = inner.seq.entry(path.to_string()).or_insert(0);
            *counter += 1;
            (
                id,
                Snapshot {
                    seq: *counter,
                    value,
                },
            )
        };
        // The remote pushes the current state immediately on subscribe.
        listener(initial);
        Ok(id)
    }

    async fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.lock().listeners.remove(&id);
    }

    async fn read_once(&self, path: &str) -> Result<Value, RemoteError> {
        let plan = self.inner.lock().read_plans.pop_front();
        if let Some(WritePlan::Fail(message)) = plan {
            return Err(RemoteError::new(message));
        }
        Ok(get_at(&self.inner.lock().root, path))
    }

    async fn write(&self, path: &str, value: Value) -> Result<(), RemoteError> {
        let plan = self.inner.lock().write_plans.pop_front();
        if let Some(WritePlan::Fail(message)) = plan {
            return Err(RemoteError::new(message));
        }
        set_at(&mut self.inner.lock().root, path, value);
        self.notify_change(path);
        Ok(())
    }

    async fn patch(
        &self,
        path: &str,
        entries: Vec<(String, Value)>,
    ) -> Result<Vec<PatchFailure>, RemoteError> {
        let plan = {
            let mut inner = self.inner.lock();
            inner.patch_calls.push((path.to_string(), entries.clone()));
            inner
                .patch_plans
                .pop_front()
                .unwrap_or(PatchPlan::Apply { delay_ms: 0 })
        };

        let (rejected, delay_ms) = match plan {
            PatchPlan::Apply { delay_ms } => (Vec::new(), delay_ms),
            PatchPlan::Reject { paths, delay_ms } => (paths, delay_ms),
            PatchPlan::Fail { message, delay_ms } => {
                if delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                return Err(RemoteError::new(message));
            }
        };
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        let mut failures = Vec::new();
        {
            let mut inner = self.inner.lock();
            for (sub_path, value) in &entries {
                if rejected.contains(sub_path) {
                    failures.push(PatchFailure {
                        path: sub_path.clone(),
                        message: "rejected by remote".to_string(),
                    });
                    continue;
                }
                let full = format!("{path}/{sub_path}");
                set_at(&mut inner.root, &full, value.clone());
            }
        }
        self.notify_change(path);
        Ok(failures)
    }

    async fn delete(&self, path: &str) -> Result<(), RemoteError> {
        let plan = self.inner.lock().delete_plans.pop_front();
        if let Some(WritePlan::Fail(message)) = plan {
            return Err(RemoteError::new(message));
        }
        set_at(&mut self.inner.lock().root, path, Value::Null);
        self.notify_change(path);
        Ok(())
    }
}

// ============================================================================
// Path helpers (slash-addressed JSON tree, null removes)
// ============================================================================

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

pub fn get_at(root: &Value, path: &str) -> Value {
    let mut current = root;
    for seg in segments(path) {
        match current.get(seg) {
            Some(next) => current = next,
            None => return Value::Null,
        }
    }
    current.clone()
}

pub fn set_at(root: &mut Value, path: &str, value: Value) {
    let segs = segments(path);
    if segs.is_empty() {
        *root = value;
        return;
    }
    let mut current = root;
    for seg in &segs[..segs.len() - 1] {
        if !current.is_object() {
            *current = Value::Object(Default::default());
        }
        current = current
            .as_object_mut()
            .expect("just ensured object")
            .entry(seg.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
    }
    if !current.is_object() {
        *current = Value::Object(Default::default());
    }
    let map = current.as_object_mut().expect("just ensured object");
    let last = segs[segs.len() - 1];
    if value.is_null() {
        map.remove(last);
    } else {
        map.insert(last.to_string(), value);
    }
}
