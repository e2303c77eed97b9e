//! Read-cache invalidation signals.

use chrono::Utc;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::debug;

const BUS_CAPACITY: usize = 64;

/// Which downstream read caches to drop after a sync run.
///
/// Cache keys are JSON arrays, e.g. `["v_nodes_complete", {"page": 2}]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    /// Every cache except the one whose first key element is `except`.
    All {
        /// Key of the orchestrator's own bookkeeping cache.
        except: String,
    },
    /// Caches whose key contains one of `names`, or whose first element
    /// contains one of them as a substring.
    Matching {
        /// Synced entity names and their related tables.
        names: Vec<String>,
    },
}

impl Invalidation {
    /// Returns true if the cache stored under `key` must be dropped.
    ///
    /// Substring matching on the first element is deliberately loose:
    /// `"nodes"` also drops caches keyed `"v_nodes_complete"`.
    pub fn matches(&self, key: &[Value]) -> bool {
        match self {
            Invalidation::All { except } => key.first().and_then(Value::as_str) != Some(except.as_str()),
            Invalidation::Matching { names } => names.iter().any(|name| {
                key.iter().any(|part| part.as_str() == Some(name.as_str()))
                    || key
                        .first()
                        .and_then(Value::as_str)
                        .is_some_and(|head| head.contains(name.as_str()))
            }),
        }
    }
}

/// Receives invalidation signals.
pub trait CacheInvalidator: Send + Sync {
    /// Drops the caches selected by `invalidation`.
    fn invalidate(&self, invalidation: &Invalidation);
}

/// In-process broadcast of invalidation signals.
#[derive(Debug, Clone)]
pub struct InvalidationBus {
    sender: broadcast::Sender<Invalidation>,
}

impl InvalidationBus {
    /// Creates a bus with no subscribers.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender }
    }

    /// Subscribes to future signals.
    pub fn subscribe(&self) -> broadcast::Receiver<Invalidation> {
        self.sender.subscribe()
    }
}

impl Default for InvalidationBus {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheInvalidator for InvalidationBus {
    fn invalidate(&self, invalidation: &Invalidation) {
        let receivers = self.sender.send(invalidation.clone()).unwrap_or(0);
        debug!(?invalidation, receivers, "broadcast cache invalidation");
    }
}

/// Process-wide cache-busting token, bumped after every full run.
///
/// Tokens look like `v-<millis>` and strictly increase even when two bumps
/// land in the same millisecond.
#[derive(Debug, Default)]
pub struct CacheBuster {
    last: AtomicU64,
}

impl CacheBuster {
    /// Creates a buster that has never been bumped.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a new token.
    pub fn bump(&self) -> String {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        format!("v-{}", now.max(previous + 1))
    }

    /// Returns the latest token, if any.
    pub fn current(&self) -> Option<String> {
        match self.last.load(Ordering::SeqCst) {
            0 => None,
            millis => Some(format!("v-{millis}")),
        }
    }
}
