//! Full sync: drain a relation, then atomically replace the local table.

use crate::error::SyncResult;
use crate::transport::PagedFetcher;
use fibersync_protocol::Row;
use fibersync_store::{KeyPath, ReplicaStore};
use tracing::{debug, info};

/// Result of one full sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FullSyncReport {
    /// Rows written to the local table.
    pub rows: u64,
    /// Pages requested, including the final short one.
    pub pages: u32,
    /// Rows discarded for lacking a primary key.
    pub discarded: u64,
}

/// Replaces a local table with the complete remote relation.
///
/// All pages are buffered in memory and written with a single
/// clear-and-put batch. A failed fetch returns before anything is written,
/// so the local table keeps its previous content.
pub struct FullSync<'a> {
    fetcher: &'a PagedFetcher,
    store: &'a dyn ReplicaStore,
}

impl<'a> FullSync<'a> {
    /// Creates an executor writing into `store`.
    pub fn new(fetcher: &'a PagedFetcher, store: &'a dyn ReplicaStore) -> Self {
        Self { fetcher, store }
    }

    /// Syncs `entity` into the local table of the same name.
    pub async fn run(&self, entity: &str, key: &KeyPath) -> SyncResult<FullSyncReport> {
        self.store.define_table(entity, key.clone())?;

        let limit = u64::from(self.fetcher.limit());
        let mut report = FullSyncReport::default();
        let mut buffer: Vec<Row> = Vec::new();
        let mut offset = 0u64;

        loop {
            let page = self
                .fetcher
                .fetch_page(&self.fetcher.request(entity, offset))
                .await?;
            report.pages += 1;

            let has_more = page.has_more();
            let (rows, discarded) = keyed_rows(page.rows, key);
            report.discarded += discarded;
            buffer.extend(rows);

            if !has_more {
                break;
            }
            offset += limit;
        }

        report.rows = buffer.len() as u64;
        self.store.replace_all(entity, buffer)?;

        info!(
            entity,
            rows = report.rows,
            pages = report.pages,
            discarded = report.discarded,
            "full sync complete"
        );
        Ok(report)
    }
}

/// Splits off rows lacking a usable primary key.
///
/// Returns the keyed rows and the number discarded.
pub(crate) fn keyed_rows(rows: Vec<Row>, key: &KeyPath) -> (Vec<Row>, u64) {
    let total = rows.len();
    let keyed: Vec<Row> = rows.into_iter().filter(|row| key.is_valid(row)).collect();
    let discarded = (total - keyed.len()) as u64;
    if discarded > 0 {
        debug!(key = %key, discarded, "discarded rows without primary key");
    }
    (keyed, discarded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryRemote;
    use fibersync_store::InMemoryStore;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    fn ids(store: &InMemoryStore, table: &str) -> Vec<Value> {
        store
            .scan(table)
            .unwrap()
            .into_iter()
            .map(|r| r["id"].clone())
            .collect()
    }

    #[tokio::test]
    async fn full_sync_pages_until_short_page() {
        let remote = Arc::new(MemoryRemote::new());
        remote.set_rows(
            "widgets",
            (1..=3).map(|i| row(json!({"id": i}))).collect(),
        );
        let fetcher = PagedFetcher::new(remote.clone(), 2);
        let store = InMemoryStore::new();

        let report = FullSync::new(&fetcher, &store)
            .run("widgets", &KeyPath::id())
            .await
            .unwrap();

        assert_eq!(report.rows, 3);
        assert_eq!(report.pages, 2);
        let offsets: Vec<u64> = remote.requests().iter().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![0, 2]);
        assert_eq!(ids(&store, "widgets"), vec![json!(1), json!(2), json!(3)]);
    }

    #[tokio::test]
    async fn full_sync_drops_stale_and_keyless_rows() {
        let remote = Arc::new(MemoryRemote::new());
        remote.set_rows(
            "nodes",
            vec![row(json!({"id": 2})), row(json!({"id": null})), row(json!({"name": "x"}))],
        );
        let fetcher = PagedFetcher::new(remote, 10);
        let store = InMemoryStore::new();
        store.define_table("nodes", KeyPath::id()).unwrap();
        store.bulk_put("nodes", vec![row(json!({"id": 1}))]).unwrap();

        let report = FullSync::new(&fetcher, &store)
            .run("nodes", &KeyPath::id())
            .await
            .unwrap();

        assert_eq!(report.rows, 1);
        assert_eq!(report.discarded, 2);
        assert_eq!(ids(&store, "nodes"), vec![json!(2)]);
    }

    #[tokio::test]
    async fn full_sync_fetch_error_leaves_table_untouched() {
        let remote = Arc::new(MemoryRemote::new());
        remote.set_rows("nodes", (1..=5).map(|i| row(json!({"id": i}))).collect());
        remote.fail_after("nodes", 1, "connection reset");
        let fetcher = PagedFetcher::new(remote, 2);
        let store = InMemoryStore::new();
        store.define_table("nodes", KeyPath::id()).unwrap();
        store.bulk_put("nodes", vec![row(json!({"id": 99}))]).unwrap();

        let result = FullSync::new(&fetcher, &store)
            .run("nodes", &KeyPath::id())
            .await;

        assert!(result.is_err());
        assert_eq!(ids(&store, "nodes"), vec![json!(99)]);
    }

    #[tokio::test]
    async fn full_sync_compound_key() {
        let remote = Arc::new(MemoryRemote::new());
        remote.set_rows(
            "ring_based_systems",
            vec![
                row(json!({"system_id": "s1", "ring_id": "r1"})),
                row(json!({"system_id": "s1", "ring_id": "r2"})),
                row(json!({"system_id": "s2", "ring_id": null})),
            ],
        );
        let fetcher = PagedFetcher::new(remote, 10);
        let store = InMemoryStore::new();
        let key = KeyPath::compound(["system_id", "ring_id"]);

        let report = FullSync::new(&fetcher, &store)
            .run("ring_based_systems", &key)
            .await
            .unwrap();

        assert_eq!(report.rows, 2);
        assert_eq!(store.count("ring_based_systems").unwrap(), 2);
    }

    #[test]
    fn keyed_rows_counts_discards() {
        let (rows, discarded) = keyed_rows(
            vec![row(json!({"id": 1})), row(json!({"id": null}))],
            &KeyPath::id(),
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(discarded, 1);
    }
}
