//! MutationQueue — turns user mutation intents into optimistically visible
//! remote writes, and reconciles inbound snapshots against edits still in
//! flight.
//!
//! One mutation is tracked per (record key, field path) at a time. A newer
//! edit to the same pair supersedes the older one: the older network request
//! is left to complete, but its completion is ignored — neither its success
//! nor its failure may clobber the newer value (last-intent-wins locally).
//!
//! There is no automatic retry. A failed mutation reverts the store to the
//! value captured when that mutation started and reports once; repeating the
//! action is the user's call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::remote::RemoteStore;
use crate::store::{records_from_snapshot, RecordStore};
use crate::types::{BulkFailure, BulkOutcome, FieldPath, Record};

/// An optimistic field edit awaiting remote acknowledgment.
struct PendingEdit {
    /// Local mutation sequence number; higher supersedes lower.
    seq: u64,
    /// The optimistic value, re-applied over inbound snapshots until the
    /// edit settles.
    value: Option<String>,
}

pub struct MutationQueue {
    store: Arc<RecordStore>,
    remote: Arc<dyn RemoteStore>,
    collection_path: String,
    pending: Mutex<HashMap<(String, FieldPath), PendingEdit>>,
    next_seq: AtomicU64,
}

impl MutationQueue {
    pub fn new(
        store: Arc<RecordStore>,
        remote: Arc<dyn RemoteStore>,
        collection_path: impl Into<String>,
    ) -> Self {
        Self {
            store,
            remote,
            collection_path: collection_path.into(),
            pending: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
        }
    }

    fn bump_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    fn record_path(&self, key: &str) -> String {
        format!("{}/{}", self.collection_path, key)
    }

    // -----------------------------------------------------------------------
    // Pending-edit bookkeeping
    // -----------------------------------------------------------------------

    /// Register an optimistic edit, superseding any older one for the pair.
    fn begin_edit(&self, key: &str, path: FieldPath, seq: u64, value: Option<String>) {
        self.pending
            .lock()
            .insert((key.to_string(), path), PendingEdit { seq, value });
    }

    /// Settle a successful completion. Returns quietly if a newer edit has
    /// superseded this one.
    fn settle_success(&self, key: &str, path: FieldPath, seq: u64) {
        let mut pending = self.pending.lock();
        if let Some(entry) = pending.get(&(key.to_string(), path)) {
            if entry.seq == seq {
                pending.remove(&(key.to_string(), path));
            }
        }
    }

    /// Settle a failed completion: revert to `prior` — the value captured at
    /// the moment this mutation started, not the current store value — unless
    /// a newer edit has superseded this one, in which case nothing happens.
    fn settle_failure(&self, key: &str, path: FieldPath, seq: u64, prior: Option<String>) {
        let superseded = {
            let mut pending = self.pending.lock();
            match pending.get(&(key.to_string(), path)) {
                Some(entry) if entry.seq == seq => {
                    pending.remove(&(key.to_string(), path));
                    false
                }
                _ => true,
            }
        };
        if !superseded {
            self.store.apply_local(key, &path, prior);
        }
    }

    /// Number of edits currently awaiting acknowledgment.
    pub fn in_flight(&self) -> usize {
        self.pending.lock().len()
    }

    // -----------------------------------------------------------------------
    // Snapshot reconciliation
    // -----------------------------------------------------------------------

    /// Apply an inbound collection snapshot to the store, overlaying edits
    /// still in flight so a snapshot emitted before our write landed cannot
    /// clobber a newer unacknowledged value.
    ///
    /// A pending edit for a record the snapshot no longer contains is left
    /// alone: the remote deleted the record, and last-writer-wins says the
    /// edit must not resurrect it.
    pub fn reconcile_snapshot(&self, raw: &Value) {
        let mut records = records_from_snapshot(raw);
        {
            let pending = self.pending.lock();
            for ((key, path), edit) in pending.iter() {
                if let Some(record) = records.iter_mut().find(|r| &r.key == key) {
                    path.apply(record, edit.value.clone());
                }
            }
        }
        self.store.replace_all(records);
    }

    // -----------------------------------------------------------------------
    // Mutation intents
    // -----------------------------------------------------------------------

    /// Inline single-field edit: optimistic locally, then a one-entry patch
    /// addressing just that sub-path (a schedule day patch never touches
    /// sibling days).
    pub async fn edit_field(
        &self,
        key: &str,
        path: FieldPath,
        value: Option<String>,
    ) -> Result<()> {
        let prior = self
            .store
            .get_field(key, &path)
            .ok_or_else(|| EngineError::validation(format!("unknown record: {key}")))?;

        let seq = self.bump_seq();
        self.store.apply_local(key, &path, value.clone());
        self.begin_edit(key, path, seq, value.clone());

        let entry = (path.remote_path(), to_wire(value));
        match self.remote.patch(&self.record_path(key), vec![entry]).await {
            Ok(failures) if failures.is_empty() => {
                self.settle_success(key, path, seq);
                Ok(())
            }
            Ok(failures) => {
                self.settle_failure(key, path, seq, prior);
                Err(EngineError::Remote(crate::error::RemoteError::new(
                    failures
                        .into_iter()
                        .map(|f| f.message)
                        .collect::<Vec<_>>()
                        .join("; "),
                )))
            }
            Err(err) => {
                self.settle_failure(key, path, seq, prior);
                Err(err.into())
            }
        }
    }

    /// Edit one field across many records as a single logical batch: one
    /// aggregate patch request covering every key, with per-key rejections
    /// reverted individually while unaffected keys' changes stand.
    ///
    /// A whole-request transport failure reverts everything and surfaces as
    /// `Err`; per-key partial failure is a normal `Ok` outcome.
    pub async fn bulk_edit_field(
        &self,
        keys: &[String],
        path: FieldPath,
        value: Option<String>,
    ) -> Result<BulkOutcome> {
        let mut outcome = BulkOutcome::default();
        // (key, seq, prior) for every record we optimistically touched.
        let mut touched: Vec<(String, u64, Option<String>)> = Vec::new();
        let mut entries: Vec<(String, Value)> = Vec::new();

        for key in keys {
            let Some(prior) = self.store.get_field(key, &path) else {
                outcome.failed.push(BulkFailure {
                    key: key.clone(),
                    message: format!("unknown record: {key}"),
                });
                continue;
            };
            let seq = self.bump_seq();
            self.store.apply_local(key, &path, value.clone());
            self.begin_edit(key, path, seq, value.clone());
            entries.push((format!("{}/{}", key, path.remote_path()), to_wire(value.clone())));
            touched.push((key.clone(), seq, prior));
        }

        if entries.is_empty() {
            return Ok(outcome);
        }

        match self.remote.patch(&self.collection_path, entries).await {
            Ok(failures) => {
                let rejected: HashMap<String, String> = failures
                    .into_iter()
                    .map(|f| (leading_key(&f.path), f.message))
                    .collect();
                for (key, seq, prior) in touched {
                    match rejected.get(&key) {
                        Some(message) => {
                            self.settle_failure(&key, path, seq, prior);
                            outcome.failed.push(BulkFailure {
                                key,
                                message: message.clone(),
                            });
                        }
                        None => {
                            self.settle_success(&key, path, seq);
                            outcome.applied.push(key);
                        }
                    }
                }
                Ok(outcome)
            }
            Err(err) => {
                for (key, seq, prior) in touched {
                    self.settle_failure(&key, path, seq, prior);
                }
                Err(err.into())
            }
        }
    }

    /// Create a new record. The existence check is a point read against the
    /// remote, not the local cache — the cache may be stale.
    pub async fn create_record(&self, key: &str, mut fields: Record) -> Result<()> {
        if key.is_empty() {
            return Err(EngineError::validation("record key must not be empty"));
        }

        let existing = self.remote.read_once(&self.record_path(key)).await?;
        if !existing.is_null() {
            return Err(EngineError::duplicate_key(&self.collection_path, key));
        }

        fields.key = key.to_string();
        let value = serde_json::to_value(&fields)
            .map_err(|e| EngineError::validation(format!("unserializable record: {e}")))?;

        self.store.insert(fields);
        match self.remote.write(&self.record_path(key), value).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.store.remove(key);
                Err(err.into())
            }
        }
    }

    /// Full-form save: replace every field of an existing record except its
    /// key with a whole-value write.
    pub async fn save_record(&self, key: &str, mut fields: Record) -> Result<()> {
        let prior = self
            .store
            .get(key)
            .ok_or_else(|| EngineError::validation(format!("unknown record: {key}")))?;

        fields.key = key.to_string();
        let value = serde_json::to_value(&fields)
            .map_err(|e| EngineError::validation(format!("unserializable record: {e}")))?;

        self.store.apply_record(key, fields);
        match self.remote.write(&self.record_path(key), value).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.store.apply_record(key, prior);
                Err(err.into())
            }
        }
    }

    /// Delete a record: optimistic removal, remote delete, and on failure a
    /// re-insert of the retained pre-delete snapshot at its old position.
    pub async fn delete_record(&self, key: &str) -> Result<()> {
        let (index, record) = self
            .store
            .remove(key)
            .ok_or_else(|| EngineError::validation(format!("unknown record: {key}")))?;

        match self.remote.delete(&self.record_path(key)).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.store.insert_at(index, record);
                Err(err.into())
            }
        }
    }
}

fn to_wire(value: Option<String>) -> Value {
    match value {
        Some(s) => Value::String(s),
        None => Value::Null,
    }
}

/// First segment of a patch sub-path (`"{key}/{field...}"` → `key`).
fn leading_key(path: &str) -> String {
    path.split('/').next().unwrap_or(path).to_string()
}
