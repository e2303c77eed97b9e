//! Sync orchestration across entities.

use crate::config::EngineConfig;
use crate::error::{SyncError, SyncResult};
use crate::full::FullSync;
use crate::incremental::IncrementalSync;
use crate::invalidation::{CacheBuster, CacheInvalidator, Invalidation, InvalidationBus};
use crate::notify::{NoticeLevel, Notifier, TracingNotifier};
use crate::registry::{StrategyRegistry, SyncStrategy};
use crate::status::StatusStore;
use crate::transport::{PagedFetcher, RemoteSource};
use fibersync_store::ReplicaStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Outcome of one entity attempt as shared with waiting callers.
type AttemptResult = Result<u64, String>;

/// Whether a run covered every registered entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    /// Every registered entity.
    Full,
    /// A strict subset.
    Partial,
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncKind::Full => f.write_str("full"),
            SyncKind::Partial => f.write_str("partial"),
        }
    }
}

/// One entity that failed during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityFailure {
    /// Entity name.
    pub entity: String,
    /// Failure message.
    pub message: String,
}

impl fmt::Display for EntityFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.entity, self.message)
    }
}

/// Aggregate result of [`SyncOrchestrator::run_sync`].
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// Full or partial run.
    pub kind: SyncKind,
    /// Entities attempted, in order.
    pub attempted: Vec<String>,
    /// Entities that succeeded with their row counts.
    pub succeeded: Vec<(String, u64)>,
    /// Entities that failed.
    pub failures: Vec<EntityFailure>,
    /// Wall time of the run.
    pub duration: Duration,
    /// Cache-busting token issued by a full run.
    pub cache_token: Option<String>,
}

impl SyncOutcome {
    /// Returns true if no entity failed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Rows written across all successful entities.
    pub fn total_rows(&self) -> u64 {
        self.succeeded.iter().map(|(_, count)| count).sum()
    }

    /// Row count of `entity`, if it succeeded.
    pub fn count_for(&self, entity: &str) -> Option<u64> {
        self.succeeded
            .iter()
            .find(|(name, _)| name == entity)
            .map(|(_, count)| *count)
    }
}

/// Builder for [`SyncOrchestrator`].
pub struct OrchestratorBuilder {
    registry: Arc<StrategyRegistry>,
    remote: Arc<dyn RemoteSource>,
    store: Arc<dyn ReplicaStore>,
    config: EngineConfig,
    notifier: Arc<dyn Notifier>,
    invalidator: Arc<dyn CacheInvalidator>,
}

impl OrchestratorBuilder {
    /// Sets the engine configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the notifier (default: [`TracingNotifier`]).
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Sets the cache invalidator (default: an unobserved
    /// [`InvalidationBus`]).
    pub fn invalidator(mut self, invalidator: Arc<dyn CacheInvalidator>) -> Self {
        self.invalidator = invalidator;
        self
    }

    /// Opens the status table and builds the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] when a registered entity shares its
    /// name with the status table.
    pub fn build(self) -> SyncResult<SyncOrchestrator> {
        if self.registry.contains(&self.config.status_table) {
            return Err(SyncError::Config(format!(
                "entity {} collides with the status table",
                self.config.status_table
            )));
        }
        let status = StatusStore::open(Arc::clone(&self.store), self.config.status_table.clone())?;
        let fetcher = PagedFetcher::new(Arc::clone(&self.remote), self.config.batch_size);
        Ok(SyncOrchestrator {
            registry: self.registry,
            remote: self.remote,
            store: self.store,
            fetcher,
            status,
            config: self.config,
            notifier: self.notifier,
            invalidator: self.invalidator,
            cache_buster: CacheBuster::new(),
            in_flight: Mutex::new(HashMap::new()),
        })
    }
}

/// Public entry point of the replication engine.
///
/// Runs entities one at a time, records each attempt in the status store,
/// isolates per-entity failures and signals cache invalidation when the
/// run ends.
///
/// # Overlapping attempts
///
/// At most one attempt per entity runs at a time. A caller asking for an
/// entity that is already in flight waits for that attempt and reuses its
/// result instead of starting another one.
pub struct SyncOrchestrator {
    registry: Arc<StrategyRegistry>,
    remote: Arc<dyn RemoteSource>,
    store: Arc<dyn ReplicaStore>,
    fetcher: PagedFetcher,
    status: StatusStore,
    config: EngineConfig,
    notifier: Arc<dyn Notifier>,
    invalidator: Arc<dyn CacheInvalidator>,
    cache_buster: CacheBuster,
    in_flight: Mutex<HashMap<String, watch::Receiver<Option<AttemptResult>>>>,
}

impl SyncOrchestrator {
    /// Starts building an orchestrator.
    pub fn builder(
        registry: Arc<StrategyRegistry>,
        remote: Arc<dyn RemoteSource>,
        store: Arc<dyn ReplicaStore>,
    ) -> OrchestratorBuilder {
        OrchestratorBuilder {
            registry,
            remote,
            store,
            config: EngineConfig::default(),
            notifier: Arc::new(TracingNotifier),
            invalidator: Arc::new(InvalidationBus::new()),
        }
    }

    /// The strategy registry.
    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// The status store.
    pub fn status(&self) -> &StatusStore {
        &self.status
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The latest cache-busting token.
    pub fn cache_token(&self) -> Option<String> {
        self.cache_buster.current()
    }

    /// Entities with an attempt in flight, sorted.
    pub fn active_entities(&self) -> Vec<String> {
        let mut entities: Vec<String> = self.in_flight.lock().keys().cloned().collect();
        entities.sort();
        entities
    }

    /// Returns true if any attempt is in flight.
    pub fn is_syncing(&self) -> bool {
        !self.in_flight.lock().is_empty()
    }

    /// Syncs `entities`, or every registered entity when empty.
    ///
    /// Per-entity failures are reported in the outcome, never as `Err`.
    ///
    /// # Errors
    ///
    /// - [`SyncError::UnknownEntity`] if a name is not registered; nothing
    ///   is attempted
    /// - [`SyncError::NotConnected`] if the remote reports it is offline
    pub async fn run_sync<S: AsRef<str>>(&self, entities: &[S]) -> SyncResult<SyncOutcome> {
        let started = Instant::now();
        let (targets, kind) = match self.resolve(entities) {
            Ok(resolved) => resolved,
            Err(e) => {
                error!(error = %e, "sync run rejected");
                self.notifier.notify(NoticeLevel::Error, "Sync process failed.");
                return Err(e);
            }
        };

        if !self.remote.is_connected() {
            self.notifier
                .notify(NoticeLevel::Error, "Cannot sync while offline.");
            return Err(SyncError::NotConnected);
        }

        if kind == SyncKind::Full {
            self.notifier.notify(NoticeLevel::Info, "Starting full sync...");
        }
        info!(%kind, entities = targets.len(), "sync run started");

        let mut succeeded = Vec::new();
        let mut failures = Vec::new();
        for entity in &targets {
            match self.sync_entity(entity).await {
                Ok(count) => succeeded.push((entity.clone(), count)),
                Err(message) => {
                    warn!(entity = %entity, error = %message, "entity sync failed");
                    failures.push(EntityFailure {
                        entity: entity.clone(),
                        message,
                    });
                }
            }
        }

        let cache_token = self.invalidate(kind, &targets);

        if failures.is_empty() {
            let message = match kind {
                SyncKind::Full => "All local data is up to date.",
                SyncKind::Partial => "Data refreshed.",
            };
            self.notifier.notify(NoticeLevel::Success, message);
        } else {
            self.notifier.notify(
                NoticeLevel::Warning,
                &format!(
                    "Sync completed with warnings. {} tables failed.",
                    failures.len()
                ),
            );
            let list: Vec<String> = failures.iter().map(ToString::to_string).collect();
            error!(failures = ?list, "sync failures");
        }

        let outcome = SyncOutcome {
            kind,
            attempted: targets,
            succeeded,
            failures,
            duration: started.elapsed(),
            cache_token,
        };
        info!(
            %kind,
            succeeded = outcome.succeeded.len(),
            failed = outcome.failures.len(),
            rows = outcome.total_rows(),
            elapsed_ms = outcome.duration.as_millis() as u64,
            "sync run finished"
        );
        Ok(outcome)
    }

    fn resolve<S: AsRef<str>>(&self, entities: &[S]) -> SyncResult<(Vec<String>, SyncKind)> {
        if entities.is_empty() {
            let all = self.registry.entities().into_iter().map(String::from).collect();
            return Ok((all, SyncKind::Full));
        }

        let mut targets: Vec<String> = Vec::with_capacity(entities.len());
        for entity in entities {
            let name = entity.as_ref();
            self.registry.lookup(name)?;
            if !targets.iter().any(|t| t == name) {
                targets.push(name.to_string());
            }
        }
        let kind = if targets.len() < self.registry.len() {
            SyncKind::Partial
        } else {
            SyncKind::Full
        };
        Ok((targets, kind))
    }

    fn invalidate(&self, kind: SyncKind, targets: &[String]) -> Option<String> {
        match kind {
            SyncKind::Full => {
                let token = self.cache_buster.bump();
                debug!(token = %token, "bumped cache token");
                self.invalidator.invalidate(&Invalidation::All {
                    except: self.config.bookkeeping_key.clone(),
                });
                Some(token)
            }
            SyncKind::Partial => {
                let mut names: Vec<String> = targets.to_vec();
                for target in targets {
                    let related = self
                        .registry
                        .get(target)
                        .and_then(|c| c.related_table.as_ref());
                    if let Some(related) = related {
                        if !names.contains(related) {
                            names.push(related.clone());
                        }
                    }
                }
                self.invalidator.invalidate(&Invalidation::Matching { names });
                None
            }
        }
    }

    /// Runs one entity, or joins the attempt already in flight for it.
    async fn sync_entity(&self, entity: &str) -> AttemptResult {
        let slot = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(entity) {
                Some(receiver) => Err(receiver.clone()),
                None => {
                    let (sender, receiver) = watch::channel(None);
                    in_flight.insert(entity.to_string(), receiver);
                    Ok(AttemptGuard {
                        orchestrator: self,
                        entity: entity.to_string(),
                        sender: Some(sender),
                    })
                }
            }
        };

        match slot {
            Ok(guard) => {
                let result = self.attempt(entity).await.map_err(|e| e.status_message());
                guard.finish(result.clone());
                result
            }
            Err(mut receiver) => {
                debug!(entity, "joining in-flight attempt");
                let shared = receiver
                    .wait_for(Option::is_some)
                    .await
                    .map(|value| value.clone());
                match shared {
                    Ok(Some(result)) => result,
                    _ => Err(SyncError::Abandoned.status_message()),
                }
            }
        }
    }

    async fn attempt(&self, entity: &str) -> SyncResult<u64> {
        let config = self.registry.lookup(entity)?;
        if let Err(e) = self.status.mark_syncing(entity) {
            warn!(entity, error = %e, "failed to record sync start");
        }

        let store = self.store.as_ref();
        let result = match &config.strategy {
            SyncStrategy::Full => FullSync::new(&self.fetcher, store)
                .run(entity, &config.key)
                .await
                .map(|report| report.rows),
            SyncStrategy::Incremental { timestamp_column } => {
                IncrementalSync::new(&self.fetcher, store, self.config.cursor_mode)
                    .run(entity, &config.key, timestamp_column)
                    .await
                    .map(|report| report.rows)
            }
        };

        let recorded = match &result {
            Ok(count) => self.status.mark_success(entity, *count),
            Err(e) => self.status.mark_error(entity, e.status_message()),
        };
        if let Err(e) = recorded {
            warn!(entity, error = %e, "failed to record sync result");
        }
        result
    }
}

impl fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("entities", &self.registry.len())
            .field("config", &self.config)
            .field("active", &self.active_entities())
            .finish_non_exhaustive()
    }
}

/// Owns an entity's in-flight slot for the duration of one attempt.
///
/// Dropping the guard without [`AttemptGuard::finish`] (the caller dropped
/// the sync future) records the entity as failed, hands waiters the
/// abandoned error and frees the slot.
struct AttemptGuard<'a> {
    orchestrator: &'a SyncOrchestrator,
    entity: String,
    sender: Option<watch::Sender<Option<AttemptResult>>>,
}

impl AttemptGuard<'_> {
    fn finish(mut self, result: AttemptResult) {
        self.release(result);
    }

    fn release(&mut self, result: AttemptResult) {
        if let Some(sender) = self.sender.take() {
            self.orchestrator.in_flight.lock().remove(&self.entity);
            sender.send_replace(Some(result));
        }
    }
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if self.sender.is_none() {
            return;
        }
        let message = SyncError::Abandoned.status_message();
        error!(entity = %self.entity, "sync attempt abandoned");
        if let Err(e) = self.orchestrator.status.mark_error(&self.entity, message.clone()) {
            warn!(entity = %self.entity, error = %e, "failed to record abandoned attempt");
        }
        self.release(Err(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::SyncStatus;
    use crate::transport::MemoryRemote;
    use fibersync_protocol::Row;
    use fibersync_store::InMemoryStore;
    use serde_json::{json, Value};

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    fn setup() -> (Arc<MemoryRemote>, Arc<InMemoryStore>, SyncOrchestrator) {
        let registry = StrategyRegistry::builder()
            .full("e1")
            .full("e2")
            .incremental("e3", "created_at")
            .build();
        let remote = Arc::new(MemoryRemote::new());
        remote.set_rows("e1", vec![row(json!({"id": 1}))]);
        remote.set_rows("e2", vec![row(json!({"id": 2}))]);
        remote.set_rows("e3", vec![row(json!({"id": 3, "created_at": "t1"}))]);
        let store = Arc::new(InMemoryStore::new());
        let orchestrator = SyncOrchestrator::builder(Arc::new(registry), remote.clone(), store.clone())
            .config(EngineConfig::new().with_batch_size(10))
            .build()
            .unwrap();
        (remote, store, orchestrator)
    }

    #[tokio::test]
    async fn empty_list_is_full_run() {
        let (_, _, orchestrator) = setup();
        let outcome = orchestrator.run_sync::<&str>(&[]).await.unwrap();

        assert_eq!(outcome.kind, SyncKind::Full);
        assert_eq!(outcome.attempted, vec!["e1", "e2", "e3"]);
        assert!(outcome.cache_token.is_some());
        assert_eq!(outcome.total_rows(), 3);
    }

    #[tokio::test]
    async fn subset_is_partial_run() {
        let (_, _, orchestrator) = setup();
        let outcome = orchestrator.run_sync(&["e2", "e2"]).await.unwrap();

        assert_eq!(outcome.kind, SyncKind::Partial);
        assert_eq!(outcome.attempted, vec!["e2"]);
        assert_eq!(outcome.cache_token, None);
    }

    #[tokio::test]
    async fn unknown_entity_fails_before_anything_runs() {
        let (remote, _, orchestrator) = setup();
        let result = orchestrator.run_sync(&["e1", "nope"]).await;

        assert!(matches!(result, Err(SyncError::UnknownEntity(name)) if name == "nope"));
        assert!(remote.requests().is_empty());
        assert!(orchestrator.status().all().is_empty());
    }

    #[test]
    fn entity_named_like_status_table_is_rejected() {
        let registry = StrategyRegistry::builder().full("nodes").full("sync_status").build();
        let result = SyncOrchestrator::builder(
            Arc::new(registry),
            Arc::new(MemoryRemote::new()),
            Arc::new(InMemoryStore::new()),
        )
        .build();

        assert!(matches!(result, Err(SyncError::Config(msg)) if msg.contains("sync_status")));
    }

    #[test]
    fn renamed_status_table_frees_the_name() {
        let registry = StrategyRegistry::builder().full("sync_status").build();
        let result = SyncOrchestrator::builder(
            Arc::new(registry),
            Arc::new(MemoryRemote::new()),
            Arc::new(InMemoryStore::new()),
        )
        .config(EngineConfig::new().with_status_table("replica_status"))
        .build();

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn offline_refuses_to_start() {
        let (remote, _, orchestrator) = setup();
        remote.set_connected(false);

        let result = orchestrator.run_sync::<&str>(&[]).await;
        assert!(matches!(result, Err(SyncError::NotConnected)));
        assert!(remote.requests().is_empty());
    }

    #[tokio::test]
    async fn failures_are_isolated() {
        let (remote, _, orchestrator) = setup();
        remote.fail("e2", "boom");

        let outcome = orchestrator.run_sync::<&str>(&[]).await.unwrap();
        assert_eq!(outcome.count_for("e1"), Some(1));
        assert_eq!(outcome.count_for("e3"), Some(1));
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].to_string(), "e2 (boom)");
        assert_eq!(
            orchestrator.status().get("e2").unwrap().status,
            SyncStatus::Error
        );
    }

    #[tokio::test]
    async fn slot_is_released_after_attempt() {
        let (_, _, orchestrator) = setup();
        orchestrator.run_sync(&["e1"]).await.unwrap();
        assert!(!orchestrator.is_syncing());
        assert!(orchestrator.active_entities().is_empty());
    }
}
