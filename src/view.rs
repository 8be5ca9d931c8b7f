//! DerivedView — pure recomputation of the filtered list and aggregate
//! statistics from store contents and the active predicate.
//!
//! Both functions are referentially transparent: same inputs, same output,
//! no memoization and no hidden state. Recomputation is triggered by the
//! store's change hub, never by polling.

use crate::types::{FilterPredicate, Record, Stats, GENDER_FEMALE};

/// Records matching `predicate`, in input (store enumeration) order.
///
/// No secondary sort is applied — the order is the last snapshot's insertion
/// order, deliberately.
pub fn filtered_list<'a>(records: &'a [Record], predicate: &FilterPredicate) -> Vec<&'a Record> {
    records.iter().filter(|r| predicate.matches(r)).collect()
}

/// Collection totals. Counted over all records, not the filtered view.
pub fn statistics(records: &[Record]) -> Stats {
    let total = records.len();
    let female = records
        .iter()
        .filter(|r| r.gender.as_deref() == Some(GENDER_FEMALE))
        .count();
    Stats {
        total,
        female,
        male: total - female,
    }
}

// ============================================================================
// Tests
// ============================================================================
