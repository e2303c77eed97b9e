//! Sync command implementation.

use crate::http::ReqwestClient;
use fibersync_engine::{
    CursorMode, EngineConfig, RemoteConfig, RemoteSource, RpcRemote, SyncOrchestrator, SyncOutcome,
};
use fibersync_store::{FileStore, ReplicaStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Options of one sync invocation.
#[derive(Debug)]
pub struct SyncOptions {
    /// Base URL of the data service.
    pub remote_url: String,
    /// API key of the data service.
    pub api_key: String,
    /// Registry file, if not the built-in one.
    pub registry: Option<PathBuf>,
    /// Rows per page.
    pub batch_size: Option<u32>,
    /// Compare the cursor with `>=`.
    pub inclusive_cursor: bool,
    /// Request timeout.
    pub timeout_secs: u64,
}

impl SyncOptions {
    fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::new();
        if let Some(size) = self.batch_size {
            config = config.with_batch_size(size);
        }
        if self.inclusive_cursor {
            config = config.with_cursor_mode(CursorMode::Inclusive);
        }
        config
    }
}

/// Runs the sync command.
pub async fn run(
    data_dir: &Path,
    entities: &[String],
    options: SyncOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = Arc::new(super::load_registry(options.registry.as_deref())?);
    let store: Arc<dyn ReplicaStore> = Arc::new(FileStore::open(data_dir)?);

    let remote_config = RemoteConfig::new(&options.remote_url, &options.api_key)
        .with_timeout(Duration::from_secs(options.timeout_secs));
    let client = ReqwestClient::new(&remote_config)?;
    let remote: Arc<dyn RemoteSource> = Arc::new(RpcRemote::new(&remote_config.base_url, client));

    let orchestrator = SyncOrchestrator::builder(registry, remote, store)
        .config(options.engine_config())
        .build()?;
    info!(data_dir = %data_dir.display(), "replica opened");

    let outcome = orchestrator.run_sync(entities).await?;
    print_outcome(&outcome);
    Ok(())
}

fn print_outcome(outcome: &SyncOutcome) {
    println!("FiberSync {} sync", outcome.kind);
    println!("========================================");
    for (entity, rows) in &outcome.succeeded {
        println!("  ok    {:<32} {:>8} rows", entity, rows);
    }
    for failure in &outcome.failures {
        println!("  FAIL  {:<32} {}", failure.entity, failure.message);
    }
    println!();
    println!(
        "{} succeeded, {} failed, {} rows in {:.2?}",
        outcome.succeeded.len(),
        outcome.failures.len(),
        outcome.total_rows(),
        outcome.duration
    );
    if let Some(token) = &outcome.cache_token {
        println!("Cache token: {token}");
    }
}
