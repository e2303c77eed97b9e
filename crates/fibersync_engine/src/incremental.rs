//! Incremental sync: fetch rows newer than the local cursor.

use crate::config::CursorMode;
use crate::error::SyncResult;
use crate::full::keyed_rows;
use crate::transport::PagedFetcher;
use fibersync_protocol::{compare_values, max_value, Filter, Filters, Operator, OrderDir, Row, Value};
use fibersync_store::{KeyPath, ReplicaStore};
use std::cmp::Ordering;
use tracing::{debug, info};

/// Result of one incremental sync pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncrementalReport {
    /// Rows upserted into the local table.
    pub rows: u64,
    /// Pages requested, including the final short one.
    pub pages: u32,
    /// Cursor the pass started from (`None` on an empty table).
    pub start_cursor: Option<Value>,
    /// Greatest cursor value held locally after the pass.
    pub cursor: Option<Value>,
}

/// Merges remote rows newer than the local cursor into a local table.
///
/// The cursor is the greatest non-null value of the timestamp column held
/// locally. The pass keeps one filter (`column > cursor`) for all of its
/// pages and walks them by offset in ascending cursor order. Each page is
/// committed on its own, so rows from earlier pages survive a later failure.
pub struct IncrementalSync<'a> {
    fetcher: &'a PagedFetcher,
    store: &'a dyn ReplicaStore,
    mode: CursorMode,
}

impl<'a> IncrementalSync<'a> {
    /// Creates an executor writing into `store`.
    pub fn new(fetcher: &'a PagedFetcher, store: &'a dyn ReplicaStore, mode: CursorMode) -> Self {
        Self {
            fetcher,
            store,
            mode,
        }
    }

    /// Reads the local cursor of `entity`.
    pub fn local_cursor(&self, entity: &str, column: &str) -> SyncResult<Option<Value>> {
        Ok(self
            .store
            .last_by(entity, column)?
            .and_then(|row| row.get(column).cloned())
            .filter(|value| !value.is_null()))
    }

    /// Syncs `entity` using `column` as the cursor.
    pub async fn run(&self, entity: &str, key: &KeyPath, column: &str) -> SyncResult<IncrementalReport> {
        self.store.define_table(entity, key.clone())?;

        let start_cursor = self.local_cursor(entity, column)?;
        let mut filters = Filters::new();
        if let Some(cursor) = &start_cursor {
            let operator = match self.mode {
                CursorMode::Exclusive => Operator::Gt,
                CursorMode::Inclusive => Operator::Gte,
            };
            filters.insert(column, Filter::compare(operator, cursor.clone()));
        }

        let limit = u64::from(self.fetcher.limit());
        let mut report = IncrementalReport {
            start_cursor: start_cursor.clone(),
            cursor: start_cursor.clone(),
            ..IncrementalReport::default()
        };
        let mut offset = 0u64;

        loop {
            let request = self
                .fetcher
                .request(entity, offset)
                .with_filters(filters.clone())
                .with_order(column, OrderDir::Asc);
            let page = self.fetcher.fetch_page(&request).await?;
            report.pages += 1;

            let has_more = page.has_more();
            let (rows, _) = keyed_rows(page.rows, key);
            let rows = self.skip_stored_boundary(entity, key, column, start_cursor.as_ref(), rows)?;

            if !rows.is_empty() {
                let page_max = max_value(rows.iter(), column).cloned();
                let count = rows.len() as u64;
                self.store.bulk_upsert(entity, rows)?;
                report.rows += count;
                report.cursor = later(report.cursor.take(), page_max);
                debug!(entity, rows = count, cursor = ?report.cursor, "committed page");
            }

            if !has_more {
                break;
            }
            offset += limit;
        }

        info!(
            entity,
            rows = report.rows,
            pages = report.pages,
            cursor = ?report.cursor,
            "incremental sync complete"
        );
        Ok(report)
    }

    /// In inclusive mode, drops boundary rows already stored locally.
    fn skip_stored_boundary(
        &self,
        entity: &str,
        key: &KeyPath,
        column: &str,
        start: Option<&Value>,
        rows: Vec<Row>,
    ) -> SyncResult<Vec<Row>> {
        let Some(start) = start else {
            return Ok(rows);
        };
        if self.mode == CursorMode::Exclusive {
            return Ok(rows);
        }

        let mut fresh = Vec::with_capacity(rows.len());
        for row in rows {
            let on_boundary = row.get(column) == Some(start);
            let stored = match key.extract(&row) {
                Some(row_key) if on_boundary => self.store.get(entity, &row_key)?.is_some(),
                _ => false,
            };
            if !stored {
                fresh.push(row);
            }
        }
        Ok(fresh)
    }
}

fn later(current: Option<Value>, candidate: Option<Value>) -> Option<Value> {
    match (current, candidate) {
        (Some(a), Some(b)) => match compare_values(&b, &a) {
            Ordering::Greater => Some(b),
            _ => Some(a),
        },
        (a, b) => a.or(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryRemote;
    use fibersync_store::InMemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    fn event(id: i64, ts: &str) -> Row {
        row(json!({"id": id, "created_at": ts}))
    }

    fn setup(batch: u32) -> (Arc<MemoryRemote>, PagedFetcher, InMemoryStore) {
        let remote = Arc::new(MemoryRemote::new());
        let fetcher = PagedFetcher::new(remote.clone(), batch);
        (remote, fetcher, InMemoryStore::new())
    }

    #[tokio::test]
    async fn first_run_fetches_everything_unfiltered() {
        let (remote, fetcher, store) = setup(2);
        remote.set_rows("events", vec![event(1, "t1"), event(2, "t1"), event(3, "t2")]);

        let report = IncrementalSync::new(&fetcher, &store, CursorMode::Exclusive)
            .run("events", &KeyPath::id(), "created_at")
            .await
            .unwrap();

        assert_eq!(report.rows, 3);
        assert_eq!(report.start_cursor, None);
        assert_eq!(report.cursor, Some(json!("t2")));
        let requests = remote.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].filters.is_empty());
        assert_eq!(requests[0].order_by.as_deref(), Some("created_at"));
        assert_eq!(requests[1].offset, 2);
    }

    #[tokio::test]
    async fn cursor_filter_is_fixed_for_the_pass() {
        let (remote, fetcher, store) = setup(2);
        store.define_table("events", KeyPath::id()).unwrap();
        store.bulk_put("events", vec![event(1, "t1")]).unwrap();
        remote.set_rows(
            "events",
            vec![event(1, "t1"), event(2, "t2"), event(3, "t3"), event(4, "t4")],
        );

        let report = IncrementalSync::new(&fetcher, &store, CursorMode::Exclusive)
            .run("events", &KeyPath::id(), "created_at")
            .await
            .unwrap();

        assert_eq!(report.rows, 3);
        let expected = Filters::new().with("created_at", Filter::compare(Operator::Gt, "t1"));
        for request in remote.requests() {
            assert_eq!(request.filters, expected);
        }
        assert_eq!(store.count("events").unwrap(), 4);
    }

    #[tokio::test]
    async fn later_page_failure_keeps_committed_pages() {
        let (remote, fetcher, store) = setup(1);
        remote.set_rows("events", vec![event(1, "t1"), event(2, "t2"), event(3, "t3")]);
        remote.fail_after("events", 2, "timeout");

        let result = IncrementalSync::new(&fetcher, &store, CursorMode::Exclusive)
            .run("events", &KeyPath::id(), "created_at")
            .await;

        assert!(result.is_err());
        assert_eq!(store.count("events").unwrap(), 2);
    }

    #[tokio::test]
    async fn inclusive_mode_picks_up_late_boundary_rows() {
        let (remote, fetcher, store) = setup(10);
        remote.set_rows("events", vec![event(1, "t1"), event(2, "t2")]);
        let sync = IncrementalSync::new(&fetcher, &store, CursorMode::Inclusive);
        sync.run("events", &KeyPath::id(), "created_at").await.unwrap();

        remote.push_rows("events", vec![event(3, "t2")]);
        let report = sync.run("events", &KeyPath::id(), "created_at").await.unwrap();

        assert_eq!(report.rows, 1);
        assert_eq!(store.count("events").unwrap(), 3);
    }

    #[tokio::test]
    async fn exclusive_mode_misses_late_boundary_rows() {
        let (remote, fetcher, store) = setup(10);
        remote.set_rows("events", vec![event(1, "t1"), event(2, "t2")]);
        let sync = IncrementalSync::new(&fetcher, &store, CursorMode::Exclusive);
        sync.run("events", &KeyPath::id(), "created_at").await.unwrap();

        remote.push_rows("events", vec![event(3, "t2")]);
        let report = sync.run("events", &KeyPath::id(), "created_at").await.unwrap();

        assert_eq!(report.rows, 0);
        assert_eq!(store.count("events").unwrap(), 2);
    }

    #[tokio::test]
    async fn null_cursor_values_are_ignored() {
        let (remote, fetcher, store) = setup(10);
        store.define_table("events", KeyPath::id()).unwrap();
        store
            .bulk_put(
                "events",
                vec![event(1, "t1"), row(json!({"id": 2, "created_at": null}))],
            )
            .unwrap();
        remote.set_rows("events", vec![event(3, "t2")]);

        let sync = IncrementalSync::new(&fetcher, &store, CursorMode::Exclusive);
        assert_eq!(
            sync.local_cursor("events", "created_at").unwrap(),
            Some(json!("t1"))
        );
        let report = sync.run("events", &KeyPath::id(), "created_at").await.unwrap();
        assert_eq!(report.rows, 1);
    }

    #[test]
    fn later_keeps_the_greater_cursor() {
        assert_eq!(later(Some(json!("t2")), Some(json!("t1"))), Some(json!("t2")));
        assert_eq!(later(Some(json!("t1")), Some(json!("t2"))), Some(json!("t2")));
        assert_eq!(later(None, Some(json!("t1"))), Some(json!("t1")));
        assert_eq!(later(None, None), None);
    }
}
