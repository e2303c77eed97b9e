//! # FiberSync Engine
//!
//! Offline-first replication engine for FiberSync.
//!
//! This crate keeps a client-resident replica store synchronized with an
//! authoritative remote data service:
//! - Per-entity consistency strategy (full replace or incremental append)
//! - Paginated batch transfer
//! - Sync status bookkeeping, observable live
//! - Partial-failure isolation and overlap guarding
//! - Cache invalidation signals after each run
//!
//! ## Architecture
//!
//! ```text
//! SyncOrchestrator ─▶ StrategyRegistry
//!        │
//!        ├─▶ FullSync / IncrementalSync ─▶ PagedFetcher ─▶ RemoteSource
//!        │                │
//!        │                └─▶ ReplicaStore
//!        ├─▶ StatusStore
//!        └─▶ CacheInvalidator, Notifier
//! ```
//!
//! ## Key Invariants
//!
//! - The remote is authoritative; the replica is read-mostly
//! - A full sync replaces a table atomically or leaves it untouched
//! - An incremental sync never moves the local cursor backwards
//! - A status record is never left at `syncing` once an attempt ends
//! - At most one attempt per entity is in flight
//!
//! ## Example
//!
//! ```rust
//! use fibersync_engine::{MemoryRemote, StrategyRegistry, SyncOrchestrator};
//! use fibersync_store::InMemoryStore;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
//! runtime.block_on(async {
//!     let remote = Arc::new(MemoryRemote::new());
//!     remote.set_rows("nodes", vec![json!({"id": 1}).as_object().cloned().unwrap()]);
//!
//!     let registry = Arc::new(StrategyRegistry::builder().full("nodes").build());
//!     let orchestrator = SyncOrchestrator::builder(registry, remote, Arc::new(InMemoryStore::new()))
//!         .build()
//!         .unwrap();
//!
//!     let outcome = orchestrator.run_sync::<&str>(&[]).await.unwrap();
//!     assert_eq!(outcome.count_for("nodes"), Some(1));
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod full;
mod http;
mod incremental;
mod invalidation;
mod notify;
mod orchestrator;
mod registry;
mod status;
mod transport;

pub use config::{CursorMode, EngineConfig, RemoteConfig, DEFAULT_BATCH_SIZE};
pub use error::{SyncError, SyncResult};
pub use full::{FullSync, FullSyncReport};
pub use http::{HttpClient, RpcRemote, PAGED_DATA_PATH};
pub use incremental::{IncrementalReport, IncrementalSync};
pub use invalidation::{CacheBuster, CacheInvalidator, Invalidation, InvalidationBus};
pub use notify::{NoticeLevel, Notifier, TracingNotifier};
pub use orchestrator::{EntityFailure, OrchestratorBuilder, SyncKind, SyncOrchestrator, SyncOutcome};
pub use registry::{RegistryBuilder, StrategyRegistry, SyncStrategy, SyncStrategyConfig};
pub use status::{StatusExtra, StatusStore, SyncStatus, SyncStatusRecord, INTERRUPTED_MESSAGE};
pub use transport::{MemoryRemote, PagedFetcher, RemoteSource};
