//! HTTP binding of the remote source.
//!
//! The remote exposes paged reads as the `get_paged_data` remote procedure.
//! The actual HTTP client is abstracted via a trait so the binary can plug
//! in `reqwest` while tests use a scripted client.

use crate::error::{SyncError, SyncResult};
use crate::transport::RemoteSource;
use async_trait::async_trait;
use fibersync_protocol::{PageRequest, PageResponse};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

/// Path of the paged-read procedure below the base URL.
pub const PAGED_DATA_PATH: &str = "/rest/v1/rpc/get_paged_data";

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual transport (reqwest, hyper,
/// a loopback for tests).
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a JSON POST request and returns the decoded response body.
    async fn post_json(&self, url: &str, body: Value) -> Result<Value, String>;

    /// Checks if the client is connected/healthy.
    fn is_healthy(&self) -> bool;
}

/// Remote source backed by the `get_paged_data` procedure.
pub struct RpcRemote<C: HttpClient> {
    /// Base URL of the data service (e.g., "https://project.example.co").
    base_url: String,
    /// HTTP client implementation.
    client: C,
    /// Last error message.
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> RpcRemote<C> {
    /// Creates a remote for `base_url`.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            last_error: RwLock::new(None),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the full procedure URL.
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, PAGED_DATA_PATH)
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }
}

#[async_trait]
impl<C: HttpClient> RemoteSource for RpcRemote<C> {
    async fn fetch_page(&self, request: &PageRequest) -> SyncResult<PageResponse> {
        let params = request.to_rpc_params()?;
        let url = self.endpoint();
        debug!(url = %url, entity = %request.view_name, offset = request.offset, "posting paged read");

        let body = self.client.post_json(&url, params).await.map_err(|e| {
            *self.last_error.write() = Some(e.clone());
            SyncError::remote_retryable(e)
        })?;
        *self.last_error.write() = None;

        Ok(PageResponse::from_value(body)?)
    }

    fn is_connected(&self) -> bool {
        self.client.is_healthy()
    }
}
