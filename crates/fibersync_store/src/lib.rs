//! # FiberSync Store
//!
//! Local replica store trait and implementations for FiberSync.
//!
//! This crate provides the client-resident structured store the
//! replication engine writes into. A store holds named tables of JSON
//! rows, each keyed by a primary-key path.
//!
//! ## Design Principles
//!
//! - Tables are keyed; `put` is always upsert-by-key
//! - Every write goes through a [`WriteBatch`] applied atomically
//! - Readers observe either the state before a batch or after it
//! - Stores must be `Send + Sync` for concurrent access
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and ephemeral replicas
//! - [`FileStore`] - Persistent replica, one JSON file per table
//!
//! ## Example
//!
//! ```rust
//! use fibersync_store::{InMemoryStore, KeyPath, ReplicaStore};
//! use serde_json::json;
//!
//! let store = InMemoryStore::new();
//! store.define_table("nodes", KeyPath::id()).unwrap();
//! let row = json!({"id": 1, "name": "Exchange A"}).as_object().cloned().unwrap();
//! store.bulk_put("nodes", vec![row]).unwrap();
//! assert_eq!(store.count("nodes").unwrap(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod batch;
mod error;
mod file;
mod key;
mod memory;
mod table;

pub use backend::ReplicaStore;
pub use batch::{WriteBatch, WriteOp};
pub use error::{StoreError, StoreResult};
pub use file::FileStore;
pub use key::{KeyPath, RowKey};
pub use memory::InMemoryStore;
pub use table::Table;
