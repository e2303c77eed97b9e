//! `reqwest` implementation of the engine's HTTP client.

use async_trait::async_trait;
use fibersync_engine::{HttpClient, RemoteConfig};
use parking_lot::Mutex;
use serde_json::Value;
use std::time::{Duration, Instant};

/// How long an unreachable service is reported offline before the next
/// run is allowed to try again.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(15);

/// HTTP client authenticating with the data service's API key.
pub struct ReqwestClient {
    client: reqwest::Client,
    api_key: String,
    unreachable_since: Mutex<Option<Instant>>,
    retry_after: Duration,
}

impl ReqwestClient {
    /// Builds a client honoring the configured timeout.
    pub fn new(config: &RemoteConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            unreachable_since: Mutex::new(None),
            retry_after: DEFAULT_RETRY_AFTER,
        })
    }

    /// Sets how long a connection failure keeps the client offline.
    #[cfg(test)]
    fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = retry_after;
        self
    }

    fn mark_unreachable(&self) {
        *self.unreachable_since.lock() = Some(Instant::now());
    }

    fn mark_reachable(&self) {
        *self.unreachable_since.lock() = None;
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn post_json(&self, url: &str, body: Value) -> Result<Value, String> {
        let response = self
            .client
            .post(url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    self.mark_unreachable();
                }
                e.to_string()
            })?;
        self.mark_reachable();

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(remote_message(status.as_u16(), &text));
        }
        response.json::<Value>().await.map_err(|e| e.to_string())
    }

    /// Offline only within `retry_after` of the last connection failure.
    fn is_healthy(&self) -> bool {
        match *self.unreachable_since.lock() {
            Some(since) => since.elapsed() >= self.retry_after,
            None => true,
        }
    }
}

/// Extracts the service's error message from a failed response body.
fn remote_message(status: u16, body: &str) -> String {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from));
    match message {
        Some(message) => message,
        None if body.is_empty() => format!("HTTP {status}"),
        None => format!("HTTP {status}: {body}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ReqwestClient {
        ReqwestClient::new(&RemoteConfig::new("https://db.example.co", "key")).unwrap()
    }

    #[test]
    fn error_message_prefers_service_message() {
        let body = r#"{"code":"42P01","message":"relation \"x\" does not exist"}"#;
        assert_eq!(remote_message(404, body), "relation \"x\" does not exist");
        assert_eq!(remote_message(502, ""), "HTTP 502");
        assert_eq!(remote_message(500, "oops"), "HTTP 500: oops");
    }

    #[test]
    fn new_client_starts_healthy() {
        assert!(client().is_healthy());
    }

    #[test]
    fn connection_failure_is_offline_until_retry_window_passes() {
        let client = client().with_retry_after(Duration::from_secs(3600));
        client.mark_unreachable();
        assert!(!client.is_healthy());

        client.mark_reachable();
        assert!(client.is_healthy());
    }

    #[test]
    fn offline_state_expires() {
        let client = client().with_retry_after(Duration::ZERO);
        client.mark_unreachable();
        assert!(client.is_healthy());
    }
}
