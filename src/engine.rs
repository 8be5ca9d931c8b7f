//! Engine — wiring and lifecycle for the whole synchronization core.
//!
//! Created once at process start with an injected remote store (no hidden
//! module-level singleton), handed by reference to every UI surface, and
//! torn down with [`Engine::shutdown`], which unregisters the remote
//! listeners.
//!
//! Data flow: remote snapshots → MutationQueue::reconcile_snapshot →
//! RecordStore → derived views; mutation intents → MutationQueue →
//! RecordStore (optimistic) → remote write → next snapshot (authoritative).

use std::sync::Arc;

use crate::error::Result;
use crate::mutation::MutationQueue;
use crate::remote::{RemoteStore, RemoteSync};
use crate::settings::SettingsCache;
use crate::store::RecordStore;
use crate::types::{
    BulkOutcome, FieldPath, FilterPredicate, Record, SettingsCategory, Stats,
};
use crate::view;

/// Collection paths on the remote store.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub records_path: String,
    pub settings_path: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            records_path: "students".to_string(),
            settings_path: "settings".to_string(),
        }
    }
}

pub struct Engine {
    store: Arc<RecordStore>,
    settings: Arc<SettingsCache>,
    queue: Arc<MutationQueue>,
    sync: RemoteSync,
}

impl Engine {
    /// Wire the engine against `remote` and open the live subscriptions for
    /// both collections. Returns once both are registered; snapshots start
    /// flowing immediately.
    pub async fn start(remote: Arc<dyn RemoteStore>, config: EngineConfig) -> Result<Engine> {
        let store = Arc::new(RecordStore::new());
        let settings = Arc::new(SettingsCache::new(
            Arc::clone(&remote),
            config.settings_path.clone(),
        ));
        let queue = Arc::new(MutationQueue::new(
            Arc::clone(&store),
            Arc::clone(&remote),
            config.records_path.clone(),
        ));
        let sync = RemoteSync::new(remote);

        let snapshot_queue = Arc::clone(&queue);
        sync.subscribe(&config.records_path, move |raw| {
            snapshot_queue.reconcile_snapshot(&raw);
        })
        .await?;

        let snapshot_settings = Arc::clone(&settings);
        sync.subscribe(&config.settings_path, move |raw| {
            snapshot_settings.apply_snapshot(&raw);
        })
        .await?;

        Ok(Engine {
            store,
            settings,
            queue,
            sync,
        })
    }

    /// Tear down the live subscriptions. The engine stays readable but no
    /// longer receives snapshots.
    pub async fn shutdown(&self) {
        self.sync.unsubscribe_all().await;
    }

    // -----------------------------------------------------------------------
    // Reactive outbound surface
    // -----------------------------------------------------------------------

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    pub fn settings(&self) -> &Arc<SettingsCache> {
        &self.settings
    }

    /// Current records in enumeration order.
    pub fn records(&self) -> Vec<Record> {
        self.store.list()
    }

    /// Records matching `predicate`, cloned for the presentation layer.
    pub fn filtered(&self, predicate: &FilterPredicate) -> Vec<Record> {
        let records = self.store.list();
        view::filtered_list(&records, predicate)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn statistics(&self) -> Stats {
        view::statistics(&self.store.list())
    }

    pub fn options(&self, category: SettingsCategory) -> Vec<String> {
        self.settings.options(category)
    }

    // -----------------------------------------------------------------------
    // Mutation intents
    // -----------------------------------------------------------------------

    pub async fn edit_field(&self, key: &str, path: FieldPath, value: Option<String>) -> Result<()> {
        self.queue.edit_field(key, path, value).await
    }

    pub async fn bulk_edit_field(
        &self,
        keys: &[String],
        path: FieldPath,
        value: Option<String>,
    ) -> Result<BulkOutcome> {
        self.queue.bulk_edit_field(keys, path, value).await
    }

    pub async fn create_record(&self, key: &str, fields: Record) -> Result<()> {
        self.queue.create_record(key, fields).await
    }

    pub async fn save_record(&self, key: &str, fields: Record) -> Result<()> {
        self.queue.save_record(key, fields).await
    }

    pub async fn delete_record(&self, key: &str) -> Result<()> {
        self.queue.delete_record(key).await
    }
}
