//! Configuration for the replication engine.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default page size for every paged read.
pub const DEFAULT_BATCH_SIZE: u32 = 2500;

/// How the incremental cursor bounds the next read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorMode {
    /// `column > cursor`. Rows sharing the boundary timestamp that arrive
    /// after a run are never fetched.
    #[default]
    Exclusive,
    /// `column >= cursor`; boundary rows already stored are skipped by key.
    Inclusive,
}

/// Configuration for the sync engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Rows requested per page.
    pub batch_size: u32,
    /// Incremental cursor comparison.
    pub cursor_mode: CursorMode,
    /// Local table holding status records.
    pub status_table: String,
    /// Cache key of the orchestrator's own bookkeeping, spared by full-run
    /// invalidation.
    pub bookkeeping_key: String,
}

impl EngineConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            cursor_mode: CursorMode::Exclusive,
            status_table: "sync_status".into(),
            bookkeeping_key: "data-sync-all".into(),
        }
    }

    /// Sets the page size. Zero is clamped to one.
    pub fn with_batch_size(mut self, size: u32) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Sets the incremental cursor mode.
    pub fn with_cursor_mode(mut self, mode: CursorMode) -> Self {
        self.cursor_mode = mode;
        self
    }

    /// Sets the status table name.
    pub fn with_status_table(mut self, table: impl Into<String>) -> Self {
        self.status_table = table.into();
        self
    }

    /// Sets the bookkeeping cache key.
    pub fn with_bookkeeping_key(mut self, key: impl Into<String>) -> Self {
        self.bookkeeping_key = key.into();
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Connection settings for the HTTP remote.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL of the data service (e.g., "https://project.example.co").
    pub base_url: String,
    /// API key sent with every request.
    pub api_key: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl RemoteConfig {
    /// Creates a remote configuration with a 30 second timeout.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
