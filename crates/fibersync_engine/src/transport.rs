//! Remote source abstraction and the paged fetcher.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use fibersync_protocol::{compare_values, OrderDir, PageRequest, PageResponse, RemotePage, Row, Value};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// The authoritative remote data service.
///
/// This trait abstracts the paged-read contract, allowing for different
/// implementations (HTTP RPC, in-memory for testing, etc.). Implementations
/// must not retry; errors propagate to the caller unmodified.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Reads one page of an entity's relation.
    async fn fetch_page(&self, request: &PageRequest) -> SyncResult<PageResponse>;

    /// Checks if the remote is reachable.
    fn is_connected(&self) -> bool {
        true
    }
}

/// Issues fixed-size paged reads against a [`RemoteSource`].
#[derive(Clone)]
pub struct PagedFetcher {
    remote: Arc<dyn RemoteSource>,
    limit: u32,
}

impl PagedFetcher {
    /// Creates a fetcher requesting `limit` rows per page.
    pub fn new(remote: Arc<dyn RemoteSource>, limit: u32) -> Self {
        Self {
            remote,
            limit: limit.max(1),
        }
    }

    /// Rows requested per page.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Builds an unfiltered request for `entity` at `offset`.
    pub fn request(&self, entity: &str, offset: u64) -> PageRequest {
        PageRequest::new(entity, self.limit, offset)
    }

    /// Fetches one page.
    pub async fn fetch_page(&self, request: &PageRequest) -> SyncResult<RemotePage> {
        let response = self.remote.fetch_page(request).await?;
        if response.malformed > 0 {
            warn!(
                entity = %request.view_name,
                malformed = response.malformed,
                "remote returned non-object rows"
            );
        }
        let page = RemotePage::new(response, request.limit);
        debug!(
            entity = %request.view_name,
            offset = request.offset,
            fetched = page.fetched,
            "fetched page"
        );
        Ok(page)
    }
}

impl std::fmt::Debug for PagedFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagedFetcher")
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
enum Failure {
    Always(String),
    AfterPages { remaining: usize, message: String },
}

/// An in-memory remote for testing.
///
/// Holds rows per relation and answers paged reads with the same
/// filtering, ordering and limit/offset semantics as the RPC. Every request
/// is logged so tests can assert on offsets and filters.
#[derive(Debug)]
pub struct MemoryRemote {
    relations: RwLock<HashMap<String, Vec<Row>>>,
    requests: Mutex<Vec<PageRequest>>,
    failures: Mutex<HashMap<String, Failure>>,
    connected: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl MemoryRemote {
    /// Creates an empty, connected remote.
    pub fn new() -> Self {
        Self {
            relations: RwLock::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(true),
            latency: Mutex::new(None),
        }
    }

    /// Replaces the rows of `entity`.
    pub fn set_rows(&self, entity: impl Into<String>, rows: Vec<Row>) {
        self.relations.write().insert(entity.into(), rows);
    }

    /// Appends rows to `entity`.
    pub fn push_rows(&self, entity: impl Into<String>, rows: Vec<Row>) {
        self.relations
            .write()
            .entry(entity.into())
            .or_default()
            .extend(rows);
    }

    /// Returns the rows currently held for `entity`.
    pub fn rows(&self, entity: &str) -> Vec<Row> {
        self.relations.read().get(entity).cloned().unwrap_or_default()
    }

    /// Makes every read of `entity` fail with `message`.
    pub fn fail(&self, entity: impl Into<String>, message: impl Into<String>) {
        self.failures
            .lock()
            .insert(entity.into(), Failure::Always(message.into()));
    }

    /// Lets `pages` reads of `entity` succeed, then fails the rest.
    pub fn fail_after(&self, entity: impl Into<String>, pages: usize, message: impl Into<String>) {
        self.failures.lock().insert(
            entity.into(),
            Failure::AfterPages {
                remaining: pages,
                message: message.into(),
            },
        );
    }

    /// Removes any scripted failure for `entity`.
    pub fn recover(&self, entity: &str) {
        self.failures.lock().remove(entity);
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Delays every read by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    /// Returns every request received, in order.
    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().clone()
    }

    /// Returns the requests received for `entity`, in order.
    pub fn requests_for(&self, entity: &str) -> Vec<PageRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.view_name == entity)
            .cloned()
            .collect()
    }

    /// Forgets logged requests.
    pub fn clear_requests(&self) {
        self.requests.lock().clear();
    }

    fn scripted_failure(&self, entity: &str) -> Option<String> {
        let mut failures = self.failures.lock();
        match failures.get_mut(entity)? {
            Failure::Always(message) => Some(message.clone()),
            Failure::AfterPages { remaining, message } => {
                if *remaining == 0 {
                    Some(message.clone())
                } else {
                    *remaining -= 1;
                    None
                }
            }
        }
    }

    fn answer(&self, request: &PageRequest) -> SyncResult<PageResponse> {
        let relations = self.relations.read();
        let rows = relations.get(&request.view_name).ok_or_else(|| {
            SyncError::remote_fatal(format!(
                "relation \"{}\" does not exist",
                request.view_name
            ))
        })?;

        let mut matching: Vec<&Row> = rows.iter().filter(|r| request.filters.matches(r)).collect();
        if let Some(column) = &request.order_by {
            matching.sort_by(|a, b| {
                let a = a.get(column).unwrap_or(&Value::Null);
                let b = b.get(column).unwrap_or(&Value::Null);
                match request.order_dir.unwrap_or_default() {
                    OrderDir::Asc => compare_values(a, b),
                    OrderDir::Desc => compare_values(b, a),
                }
            });
        }

        let offset = usize::try_from(request.offset).unwrap_or(usize::MAX);
        let page = matching
            .into_iter()
            .skip(offset)
            .take(request.limit as usize)
            .cloned()
            .collect();
        Ok(PageResponse::new(page))
    }
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteSource for MemoryRemote {
    async fn fetch_page(&self, request: &PageRequest) -> SyncResult<PageResponse> {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        self.requests.lock().push(request.clone());
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }
        if let Some(message) = self.scripted_failure(&request.view_name) {
            return Err(SyncError::remote_retryable(message));
        }
        self.answer(request)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fibersync_protocol::{Filter, Filters, Operator};
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    fn events() -> MemoryRemote {
        let remote = MemoryRemote::new();
        remote.set_rows(
            "events",
            vec![
                row(json!({"id": 3, "created_at": "t3"})),
                row(json!({"id": 1, "created_at": "t1"})),
                row(json!({"id": 2, "created_at": "t2"})),
            ],
        );
        remote
    }

    #[tokio::test]
    async fn memory_remote_orders_and_pages() {
        let remote = events();
        let request = PageRequest::new("events", 2, 1).with_order("created_at", OrderDir::Asc);

        let response = remote.fetch_page(&request).await.unwrap();
        let ids: Vec<Value> = response.rows.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!(2), json!(3)]);
    }

    #[tokio::test]
    async fn memory_remote_applies_filters() {
        let remote = events();
        let filters = Filters::new().with("created_at", Filter::compare(Operator::Gt, "t1"));
        let request = PageRequest::new("events", 10, 0).with_filters(filters);

        let response = remote.fetch_page(&request).await.unwrap();
        assert_eq!(response.rows.len(), 2);
    }

    #[tokio::test]
    async fn memory_remote_logs_requests() {
        let remote = events();
        remote.fetch_page(&PageRequest::new("events", 2, 0)).await.unwrap();
        remote.fetch_page(&PageRequest::new("events", 2, 2)).await.unwrap();

        let offsets: Vec<u64> = remote.requests_for("events").iter().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![0, 2]);
    }

    #[tokio::test]
    async fn memory_remote_scripted_failures() {
        let remote = events();
        remote.fail_after("events", 1, "timeout");

        assert!(remote.fetch_page(&PageRequest::new("events", 1, 0)).await.is_ok());
        let err = remote
            .fetch_page(&PageRequest::new("events", 1, 1))
            .await
            .unwrap_err();
        assert_eq!(err.status_message(), "timeout");

        remote.recover("events");
        assert!(remote.fetch_page(&PageRequest::new("events", 1, 1)).await.is_ok());
    }

    #[tokio::test]
    async fn memory_remote_unknown_relation_fails() {
        let remote = MemoryRemote::new();
        let result = remote.fetch_page(&PageRequest::new("ghost", 1, 0)).await;
        assert!(matches!(result, Err(SyncError::Remote { retryable: false, .. })));
    }

    #[tokio::test]
    async fn memory_remote_disconnected() {
        let remote = events();
        remote.set_connected(false);
        assert!(!remote.is_connected());
        let result = remote.fetch_page(&PageRequest::new("events", 1, 0)).await;
        assert!(matches!(result, Err(SyncError::NotConnected)));
    }

    #[tokio::test]
    async fn fetcher_reports_has_more() {
        let fetcher = PagedFetcher::new(Arc::new(events()), 3);
        let page = fetcher.fetch_page(&fetcher.request("events", 0)).await.unwrap();
        assert!(page.has_more());

        let page = fetcher.fetch_page(&fetcher.request("events", 3)).await.unwrap();
        assert!(page.is_empty());
        assert!(!page.has_more());
    }
}
