//! SettingsCache — the secondary synchronized collection of per-category
//! option lists that forms and inline editors consult.
//!
//! Follows the same sync contract as the record store, scoped to its own
//! path. An absent category is an empty option list — consumers render the
//! field as free text instead of a constrained choice — never an error.
//!
//! Option-list mutations mirror the record mutation discipline: optimistic
//! local change, whole-list remote write (the remote stores each category as
//! one ordered array), revert on failure, no automatic retry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::reactive::{ChangeEvent, ChangeHub};
use crate::remote::RemoteStore;
use crate::types::SettingsCategory;

pub struct SettingsCache {
    remote: Arc<dyn RemoteStore>,
    collection_path: String,
    lists: Mutex<HashMap<SettingsCategory, Vec<String>>>,
    hub: ChangeHub<ChangeEvent>,
}

impl SettingsCache {
    pub fn new(remote: Arc<dyn RemoteStore>, collection_path: impl Into<String>) -> Self {
        Self {
            remote,
            collection_path: collection_path.into(),
            lists: Mutex::new(HashMap::new()),
            hub: ChangeHub::new(),
        }
    }

    pub fn changes(&self) -> &ChangeHub<ChangeEvent> {
        &self.hub
    }

    fn category_path(&self, category: SettingsCategory) -> String {
        format!("{}/{}", self.collection_path, category.as_str())
    }

    // -----------------------------------------------------------------------
    // Snapshot delivery
    // -----------------------------------------------------------------------

    /// Apply a full settings snapshot (`category -> list`). Unknown category
    /// names are ignored; a `Null` snapshot clears everything. Lists may
    /// arrive as arrays or as sparse objects (the remote re-keys arrays with
    /// holes), both decode to an ordered list.
    pub fn apply_snapshot(&self, raw: &Value) {
        {
            let mut lists = self.lists.lock();
            lists.clear();
            if let Value::Object(map) = raw {
                for (name, value) in map {
                    let Some(category) = SettingsCategory::parse(name) else {
                        tracing::warn!(category = %name, "ignoring unknown settings category");
                        continue;
                    };
                    lists.insert(category, decode_list(value));
                }
            }
        }
        self.hub.publish(&ChangeEvent::SettingsChanged);
    }

    /// Point-read the settings collection once and apply it (used by
    /// surfaces that need options before the live subscription delivers).
    pub async fn refresh(&self) -> Result<()> {
        let raw = self.remote.read_once(&self.collection_path).await?;
        self.apply_snapshot(&raw);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Option list for a category, in display order. Absent category ⇒
    /// empty list.
    pub fn options(&self, category: SettingsCategory) -> Vec<String> {
        self.lists
            .lock()
            .get(&category)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether a category constrains its field to enumerated choices (a
    /// non-empty list) or leaves it free text.
    pub fn is_enumerated(&self, category: SettingsCategory) -> bool {
        !self.options(category).is_empty()
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Append a new option. Duplicates are rejected case-insensitively.
    pub async fn add_option(&self, category: SettingsCategory, item: &str) -> Result<()> {
        let item = item.trim();
        if item.is_empty() {
            return Err(EngineError::validation("option must not be empty"));
        }

        let prior = {
            let mut lists = self.lists.lock();
            let list = lists.entry(category).or_default();
            if list.iter().any(|i| i.to_lowercase() == item.to_lowercase()) {
                return Err(EngineError::duplicate_key(category.as_str(), item));
            }
            let prior = list.clone();
            list.push(item.to_string());
            prior
        };
        self.hub.publish(&ChangeEvent::SettingsChanged);

        self.write_list(category, prior).await
    }

    /// Remove an option by value.
    pub async fn remove_option(&self, category: SettingsCategory, item: &str) -> Result<()> {
        let prior = {
            let mut lists = self.lists.lock();
            let list = lists.entry(category).or_default();
            let Some(index) = list.iter().position(|i| i == item) else {
                return Err(EngineError::validation(format!("unknown option: {item}")));
            };
            let prior = list.clone();
            list.remove(index);
            prior
        };
        self.hub.publish(&ChangeEvent::SettingsChanged);

        self.write_list(category, prior).await
    }

    /// Rename an option in place, keeping its position in the list.
    pub async fn rename_option(
        &self,
        category: SettingsCategory,
        from: &str,
        to: &str,
    ) -> Result<()> {
        let to = to.trim();
        if to.is_empty() {
            return Err(EngineError::validation("option must not be empty"));
        }

        let prior = {
            let mut lists = self.lists.lock();
            let list = lists.entry(category).or_default();
            let Some(index) = list.iter().position(|i| i == from) else {
                return Err(EngineError::validation(format!("unknown option: {from}")));
            };
            let collides = list
                .iter()
                .enumerate()
                .any(|(i, item)| i != index && item.to_lowercase() == to.to_lowercase());
            if collides {
                return Err(EngineError::duplicate_key(category.as_str(), to));
            }
            let prior = list.clone();
            list[index] = to.to_string();
            prior
        };
        self.hub.publish(&ChangeEvent::SettingsChanged);

        self.write_list(category, prior).await
    }

    /// Push the current list for `category`; on failure restore `prior` and
    /// surface the error once.
    async fn write_list(&self, category: SettingsCategory, prior: Vec<String>) -> Result<()> {
        let current = self.options(category);
        let value = Value::Array(current.into_iter().map(Value::String).collect());
        match self.remote.write(&self.category_path(category), value).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.lists.lock().insert(category, prior);
                self.hub.publish(&ChangeEvent::SettingsChanged);
                Err(err.into())
            }
        }
    }
}

/// Decode one category list. Arrays decode positionally; objects (arrays
/// with holes, re-keyed by the remote) decode in key order.
fn decode_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Value::Object(map) => map
            .values()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

// ============================================================================
// Tests (pure parts; remote-backed paths are covered in tests/)
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_list_handles_arrays_and_sparse_objects() {
        assert_eq!(
            decode_list(&json!(["A", "B"])),
            vec!["A".to_string(), "B".to_string()]
        );
        assert_eq!(
            decode_list(&json!({"0": "A", "2": "C"})),
            vec!["A".to_string(), "C".to_string()]
        );
        assert!(decode_list(&json!("not a list")).is_empty());
    }
}
