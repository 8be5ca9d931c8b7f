//! SelectionSet — the set of record keys marked for bulk operation.
//!
//! Owned by the presentation layer and independent of filtering; the engine
//! only ever reads it. Keys whose records disappear from the store (deleted
//! by another writer) are pruned lazily on the next read, not eagerly.

use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    keys: HashSet<String>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle(&mut self, key: &str) {
        if !self.keys.remove(key) {
            self.keys.insert(key.to_string());
        }
    }

    /// Toggle-all over the currently filtered keys: if the selection already
    /// covers exactly that set, clear it; otherwise select exactly that set.
    /// Not additive.
    pub fn select_all(&mut self, filtered_keys: &[String]) {
        let target: HashSet<String> = filtered_keys.iter().cloned().collect();
        if self.keys == target && !target.is_empty() {
            self.keys.clear();
        } else {
            self.keys = target;
        }
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn has(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Lazy pruning read: drop keys no longer known to the store, then
    /// return the surviving selection in `known_keys` order.
    pub fn keys(&mut self, known_keys: &[String]) -> Vec<String> {
        self.retain_known(known_keys);
        known_keys
            .iter()
            .filter(|k| self.keys.contains(*k))
            .cloned()
            .collect()
    }

    /// Drop selection entries whose records have disappeared.
    pub fn retain_known(&mut self, known_keys: &[String]) {
        let known: HashSet<&str> = known_keys.iter().map(String::as_str).collect();
        self.keys.retain(|k| known.contains(k.as_str()));
    }
}

// ============================================================================
// Tests
// ============================================================================
