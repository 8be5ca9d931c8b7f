//! RecordStore — the normalized, keyed in-memory table of directory records.
//!
//! The store is a cache of the remote's last known state, not a source of
//! truth: its contents are replaced wholesale by every inbound snapshot and
//! touched in between only by optimistic local mutations. Enumeration order
//! is the insertion order of the last snapshot — no secondary sort, on
//! purpose.
//!
//! All methods take `&self`; a single `parking_lot::Mutex` guards the table
//! and is never held while change observers run.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;

use crate::reactive::{ChangeEvent, ChangeHub};
use crate::types::{FieldPath, Record};

struct Table {
    /// Key enumeration order (last snapshot order + local appends).
    order: Vec<String>,
    records: HashMap<String, Record>,
}

impl Table {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            records: HashMap::new(),
        }
    }
}

pub struct RecordStore {
    table: Mutex<Table>,
    hub: ChangeHub<ChangeEvent>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(Table::new()),
            hub: ChangeHub::new(),
        }
    }

    /// The change hub dependent computations observe (push invalidation).
    pub fn changes(&self) -> &ChangeHub<ChangeEvent> {
        &self.hub
    }

    // -----------------------------------------------------------------------
    // Snapshot delivery
    // -----------------------------------------------------------------------

    /// Wholesale swap with an inbound snapshot, preserving the given order.
    /// Called only from the sync pipeline; duplicate keys keep the last
    /// occurrence.
    pub fn replace_all(&self, records: Vec<Record>) {
        {
            let mut table = self.table.lock();
            table.order.clear();
            table.records.clear();
            for record in records {
                let key = record.key.clone();
                if table.records.insert(key.clone(), record).is_none() {
                    table.order.push(key);
                }
            }
        }
        self.hub.publish(&ChangeEvent::SnapshotReplaced);
    }

    // -----------------------------------------------------------------------
    // Optimistic local mutation
    // -----------------------------------------------------------------------

    /// Merge a single field value into an existing record. Returns `false`
    /// (and publishes nothing) when the key is unknown.
    pub fn apply_local(&self, key: &str, path: &FieldPath, value: Option<String>) -> bool {
        let applied = {
            let mut table = self.table.lock();
            match table.records.get_mut(key) {
                Some(record) => {
                    path.apply(record, value);
                    true
                }
                None => false,
            }
        };
        if applied {
            self.hub.publish(&ChangeEvent::FieldChanged {
                key: key.to_string(),
            });
        }
        applied
    }

    /// Full-record save: replace every field except `key`. Returns `false`
    /// when the key is unknown.
    pub fn apply_record(&self, key: &str, fields: Record) -> bool {
        let applied = {
            let mut table = self.table.lock();
            match table.records.get_mut(key) {
                Some(record) => {
                    record.replace_fields(fields);
                    true
                }
                None => false,
            }
        };
        if applied {
            self.hub.publish(&ChangeEvent::FieldChanged {
                key: key.to_string(),
            });
        }
        applied
    }

    /// Append a new record. Replaces silently if the key already exists
    /// (callers check for duplicates against the remote, not this cache).
    pub fn insert(&self, record: Record) {
        let key = record.key.clone();
        {
            let mut table = self.table.lock();
            if table.records.insert(key.clone(), record).is_none() {
                table.order.push(key.clone());
            }
        }
        self.hub.publish(&ChangeEvent::RecordInserted { key });
    }

    /// Re-insert a record at a specific enumeration position (delete revert).
    pub fn insert_at(&self, index: usize, record: Record) {
        let key = record.key.clone();
        {
            let mut table = self.table.lock();
            if table.records.insert(key.clone(), record).is_none() {
                let at = index.min(table.order.len());
                table.order.insert(at, key.clone());
            }
        }
        self.hub.publish(&ChangeEvent::RecordInserted { key });
    }

    /// Remove a record, returning its enumeration position and contents so
    /// a failed remote delete can restore it exactly.
    pub fn remove(&self, key: &str) -> Option<(usize, Record)> {
        let removed = {
            let mut table = self.table.lock();
            let record = table.records.remove(key)?;
            let index = table
                .order
                .iter()
                .position(|k| k == key)
                .unwrap_or(table.order.len());
            if index < table.order.len() {
                table.order.remove(index);
            }
            Some((index, record))
        };
        if removed.is_some() {
            self.hub.publish(&ChangeEvent::RecordRemoved {
                key: key.to_string(),
            });
        }
        removed
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn get(&self, key: &str) -> Option<Record> {
        self.table.lock().records.get(key).cloned()
    }

    /// Current value of one field, or `None` when the record itself is
    /// unknown. The inner `Option` is the field's presence.
    pub fn get_field(&self, key: &str, path: &FieldPath) -> Option<Option<String>> {
        let table = self.table.lock();
        table
            .records
            .get(key)
            .map(|r| path.get(r).map(str::to_string))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.table.lock().records.contains_key(key)
    }

    /// All records in enumeration order.
    pub fn list(&self) -> Vec<Record> {
        let table = self.table.lock();
        table
            .order
            .iter()
            .filter_map(|k| table.records.get(k).cloned())
            .collect()
    }

    pub fn keys(&self) -> Vec<String> {
        self.table.lock().order.clone()
    }

    pub fn len(&self) -> usize {
        self.table.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.lock().order.is_empty()
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Snapshot decoding
// ============================================================================

/// Decode a raw collection snapshot (`key -> record object`) into records in
/// wire order. `Null` (absent collection) decodes to an empty list. Records
/// that fail to parse are skipped with a warning rather than poisoning the
/// whole snapshot.
pub fn records_from_snapshot(value: &Value) -> Vec<Record> {
    let map = match value {
        Value::Null => return Vec::new(),
        Value::Object(map) => map,
        other => {
            tracing::warn!(kind = %value_kind(other), "collection snapshot is not an object");
            return Vec::new();
        }
    };

    let mut records = Vec::with_capacity(map.len());
    for (key, raw) in map {
        match serde_json::from_value::<Record>(raw.clone()) {
            Ok(mut record) => {
                record.key = key.clone();
                records.push(record);
            }
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "skipping unparseable record in snapshot");
            }
        }
    }
    records
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Tests
// ============================================================================
