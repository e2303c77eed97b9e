//! Test fixtures and harness helpers.
//!
//! Provides a fully wired orchestrator over in-memory collaborators,
//! temporary file-backed stores and row builders.

use crate::recorders::{RecordingInvalidator, RecordingNotifier};
use fibersync_engine::{EngineConfig, MemoryRemote, RemoteSource, StrategyRegistry, SyncOrchestrator};
use fibersync_protocol::{Row, Value};
use fibersync_store::{FileStore, InMemoryStore, ReplicaStore};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Column used by [`event`] rows.
pub const EVENT_TIMESTAMP: &str = "created_at";

/// An orchestrator wired to an in-memory remote, a replica store and
/// recording output ports.
pub struct TestHarness {
    /// The registry the orchestrator was built with.
    pub registry: Arc<StrategyRegistry>,
    /// The scripted remote.
    pub remote: Arc<MemoryRemote>,
    /// The replica store.
    pub store: Arc<dyn ReplicaStore>,
    /// Records user-facing notices.
    pub notifier: Arc<RecordingNotifier>,
    /// Records cache invalidation signals.
    pub invalidator: Arc<RecordingInvalidator>,
    /// The orchestrator under test.
    pub orchestrator: SyncOrchestrator,
}

impl TestHarness {
    /// Creates a harness with the default engine configuration.
    pub fn new(registry: StrategyRegistry) -> Self {
        Self::with_config(registry, EngineConfig::default())
    }

    /// Creates a harness with `config` over a fresh in-memory store.
    pub fn with_config(registry: StrategyRegistry, config: EngineConfig) -> Self {
        Self::with_store(registry, config, Arc::new(InMemoryStore::new()))
    }

    /// Creates a harness over an existing store.
    pub fn with_store(
        registry: StrategyRegistry,
        config: EngineConfig,
        store: Arc<dyn ReplicaStore>,
    ) -> Self {
        let registry = Arc::new(registry);
        let remote = Arc::new(MemoryRemote::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let invalidator = Arc::new(RecordingInvalidator::new());
        let source: Arc<dyn RemoteSource> = remote.clone();
        let orchestrator = SyncOrchestrator::builder(Arc::clone(&registry), source, Arc::clone(&store))
            .config(config)
            .notifier(notifier.clone())
            .invalidator(invalidator.clone())
            .build()
            .expect("Failed to build orchestrator");

        Self {
            registry,
            remote,
            store,
            notifier,
            invalidator,
            orchestrator,
        }
    }

    /// Returns the rows stored locally for `table`.
    pub fn local_rows(&self, table: &str) -> Vec<Row> {
        self.store.scan(table).expect("Failed to scan table")
    }

    /// Returns the number of rows stored locally for `table`.
    pub fn local_count(&self, table: &str) -> usize {
        self.store.count(table).expect("Failed to count table")
    }
}

/// A file-backed store directory with automatic cleanup.
pub struct TempStore {
    dir: TempDir,
}

impl TempStore {
    /// Creates an empty temporary directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Returns the store directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Opens a [`FileStore`] in the directory.
    ///
    /// Only one store may be open at a time; drop the previous one
    /// before reopening.
    pub fn open(&self) -> FileStore {
        FileStore::open(self.dir.path()).expect("Failed to open file store")
    }
}

impl Default for TempStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts a JSON object into a row.
///
/// # Panics
///
/// Panics if `value` is not an object.
pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("row must be a JSON object, got {other}"),
    }
}

/// Builds rows carrying only an `id` column.
pub fn rows_with_ids(ids: impl IntoIterator<Item = i64>) -> Vec<Row> {
    ids.into_iter()
        .map(|id| row(serde_json::json!({ "id": id })))
        .collect()
}

/// Builds an append-only event row stamped at `timestamp`.
pub fn event(id: i64, timestamp: &str) -> Row {
    row(serde_json::json!({ "id": id, "created_at": timestamp }))
}

/// Extracts the sorted `id` column of `rows`.
pub fn ids(rows: &[Row]) -> Vec<i64> {
    let mut ids: Vec<i64> = rows
        .iter()
        .filter_map(|r| r.get("id").and_then(Value::as_i64))
        .collect();
    ids.sort_unstable();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_builders() {
        let rows = rows_with_ids(1..=3);
        assert_eq!(ids(&rows), vec![1, 2, 3]);

        let e = event(7, "2024-01-01T00:00:00Z");
        assert_eq!(e.get(EVENT_TIMESTAMP).and_then(Value::as_str), Some("2024-01-01T00:00:00Z"));
    }

    #[test]
    #[should_panic(expected = "row must be a JSON object")]
    fn row_rejects_non_objects() {
        row(serde_json::json!([1, 2]));
    }

    #[test]
    fn temp_store_reopens() {
        let temp = TempStore::new();
        {
            let store = temp.open();
            store
                .define_table("nodes", fibersync_store::KeyPath::id())
                .unwrap();
            store.bulk_put("nodes", rows_with_ids(1..=2)).unwrap();
        }
        let store = temp.open();
        assert_eq!(store.count("nodes").unwrap(), 2);
    }

    #[tokio::test]
    async fn harness_runs_a_full_sync() {
        let harness = TestHarness::new(StrategyRegistry::builder().full("widgets").build());
        harness.remote.set_rows("widgets", rows_with_ids(1..=3));

        let outcome = harness.orchestrator.run_sync(&["widgets"]).await.unwrap();
        assert_eq!(outcome.count_for("widgets"), Some(3));
        assert_eq!(harness.local_count("widgets"), 3);
    }
}
