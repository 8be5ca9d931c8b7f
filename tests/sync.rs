//! Engine wiring tests: snapshot delivery, ordering guarantees, idempotent
//! subscription, read-your-writes, and teardown.

mod common;

use std::sync::Arc;

use serde_json::json;

use common::MemoryRemote;
use roster_sync::remote::{RemoteStore, RemoteSync};
use roster_sync::types::{FieldPath, FilterPredicate, SettingsCategory};
use roster_sync::{Engine, EngineConfig};

async fn started_engine(remote: &Arc<MemoryRemote>) -> Engine {
    Engine::start(
        Arc::clone(remote) as Arc<dyn RemoteStore>,
        EngineConfig::default(),
    )
    .await
    .unwrap()
}

fn seed_two_students(remote: &MemoryRemote) {
    remote.seed(
        "students",
        json!({
            "101": { "ឈ្មោះ": "សុខា", "ភេទ": "ប្រុស", "ថ្នាក់": "C1" },
            "102": { "ឈ្មោះ": "ចាន់ថា", "ភេទ": "ស្រី", "ថ្នាក់": "C2" },
        }),
    );
}

#[tokio::test]
async fn start_applies_initial_snapshots() {
    let remote = MemoryRemote::new();
    seed_two_students(&remote);
    remote.seed("settings", json!({ "classes": ["C1", "C2"] }));

    let engine = started_engine(&remote).await;

    let records = engine.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].key, "101");
    assert_eq!(records[1].key, "102");
    assert_eq!(
        engine.options(SettingsCategory::Classes),
        vec!["C1".to_string(), "C2".to_string()]
    );

    let stats = engine.statistics();
    assert_eq!((stats.total, stats.male, stats.female), (2, 1, 1));
}

#[tokio::test]
async fn absent_collections_are_empty_not_errors() {
    let remote = MemoryRemote::new();
    let engine = started_engine(&remote).await;

    assert!(engine.records().is_empty());
    assert!(engine.options(SettingsCategory::Groups).is_empty());
}

#[tokio::test]
async fn store_always_equals_last_delivered_snapshot() {
    let remote = MemoryRemote::new();
    seed_two_students(&remote);
    let engine = started_engine(&remote).await;

    // Another writer replaces the collection; the push replaces the cache
    // wholesale.
    remote
        .write("students", json!({ "200": { "ឈ្មោះ": "ដារា" } }))
        .await
        .unwrap();
    assert_eq!(engine.records().len(), 1);
    assert_eq!(engine.records()[0].key, "200");

    remote.write("students", json!(null)).await.unwrap();
    assert!(engine.records().is_empty());
}

#[tokio::test]
async fn stale_out_of_order_snapshot_is_discarded() {
    let remote = MemoryRemote::new();
    seed_two_students(&remote);
    let engine = started_engine(&remote).await;
    assert_eq!(engine.records().len(), 2);

    // A reordered transport delivers an obsolete snapshot with a lower seq.
    remote.emit_snapshot("students", 0, json!({ "999": { "ឈ្មោះ": "stale" } }));
    assert_eq!(engine.records().len(), 2);
    assert!(engine.store().get("999").is_none());

    // A genuinely newer delivery still applies.
    remote.emit_snapshot("students", 1000, json!({ "999": { "ឈ្មោះ": "fresh" } }));
    assert_eq!(engine.records().len(), 1);
    assert_eq!(engine.records()[0].key, "999");
}

#[tokio::test]
async fn subscribe_is_idempotent_per_path() {
    let remote = MemoryRemote::new();
    let sync = RemoteSync::new(Arc::clone(&remote) as Arc<dyn RemoteStore>);

    sync.subscribe("students", |_| {}).await.unwrap();
    sync.subscribe("students", |_| {}).await.unwrap();
    sync.subscribe("students", |_| {}).await.unwrap();

    assert!(sync.is_subscribed("students"));
    assert_eq!(remote.listener_count(), 1);

    sync.unsubscribe_all().await;
    assert_eq!(remote.listener_count(), 0);
    assert!(!sync.is_subscribed("students"));
}

#[tokio::test]
async fn read_your_writes_before_snapshot_arrives() {
    let remote = MemoryRemote::new();
    seed_two_students(&remote);
    let engine = started_engine(&remote).await;

    // Suppress push notifications: the remote accepts the write but the
    // confirming snapshot never arrives in this test.
    remote.set_auto_notify(false);
    engine
        .edit_field("101", FieldPath::Class, Some("C9".into()))
        .await
        .unwrap();

    assert_eq!(
        engine.store().get("101").unwrap().class.as_deref(),
        Some("C9")
    );

    // When the snapshot does arrive it confirms, not clobbers.
    remote.set_auto_notify(true);
    remote.emit_current("students");
    assert_eq!(
        engine.store().get("101").unwrap().class.as_deref(),
        Some("C9")
    );
}

#[tokio::test]
async fn filtered_view_tracks_live_edits() {
    let remote = MemoryRemote::new();
    seed_two_students(&remote);
    let engine = started_engine(&remote).await;

    let predicate = FilterPredicate {
        class: Some("C1".into()),
        ..Default::default()
    };
    assert_eq!(engine.filtered(&predicate).len(), 1);

    engine
        .edit_field("102", FieldPath::Class, Some("C1-B".into()))
        .await
        .unwrap();
    let hits = engine.filtered(&predicate);
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].key, "101");
    assert_eq!(hits[1].key, "102");
}

#[tokio::test]
async fn shutdown_unregisters_remote_listeners() {
    let remote = MemoryRemote::new();
    seed_two_students(&remote);
    let engine = started_engine(&remote).await;
    assert_eq!(remote.listener_count(), 2); // records + settings

    engine.shutdown().await;
    assert_eq!(remote.listener_count(), 0);

    // Later pushes no longer reach the store.
    remote
        .write("students", json!({ "300": { "ឈ្មោះ": "x" } }))
        .await
        .unwrap();
    assert_eq!(engine.records().len(), 2);
}
