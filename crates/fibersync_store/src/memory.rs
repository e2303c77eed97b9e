//! In-memory replica store for testing.

use crate::backend::ReplicaStore;
use crate::batch::WriteBatch;
use crate::error::{StoreError, StoreResult};
use crate::key::{KeyPath, RowKey};
use crate::table::{stage_batch, validate_table_name, Table};
use fibersync_protocol::Row;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// An in-memory replica store.
///
/// This store keeps all tables in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral replicas that don't need persistence
///
/// # Thread Safety
///
/// Batches are staged on copies of the touched tables and swapped in
/// under the write lock, so readers never see a half-applied batch.
///
/// # Example
///
/// ```rust
/// use fibersync_store::{InMemoryStore, KeyPath, ReplicaStore};
/// use serde_json::json;
///
/// let store = InMemoryStore::new();
/// store.define_table("rings", KeyPath::id()).unwrap();
/// let row = json!({"id": "r1"}).as_object().cloned().unwrap();
/// store.replace_all("rings", vec![row]).unwrap();
/// assert_eq!(store.count("rings").unwrap(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<BTreeMap<String, Table>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of one table.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn snapshot(&self, table: &str) -> Option<Table> {
        self.tables.read().get(table).cloned()
    }

    fn with_table<T>(&self, table: &str, f: impl FnOnce(&Table) -> T) -> StoreResult<T> {
        let tables = self.tables.read();
        let t = tables
            .get(table)
            .ok_or_else(|| StoreError::unknown_table(table))?;
        Ok(f(t))
    }
}

impl ReplicaStore for InMemoryStore {
    fn define_table(&self, table: &str, key: KeyPath) -> StoreResult<()> {
        validate_table_name(table)?;
        let mut tables = self.tables.write();
        match tables.get(table) {
            Some(existing) if existing.key() == &key => Ok(()),
            Some(existing) if !existing.is_empty() => Err(StoreError::KeyMismatch {
                table: table.to_string(),
                existing: existing.key().to_string(),
                requested: key.to_string(),
            }),
            _ => {
                tables.insert(table.to_string(), Table::new(key));
                Ok(())
            }
        }
    }

    fn table_names(&self) -> StoreResult<Vec<String>> {
        Ok(self.tables.read().keys().cloned().collect())
    }

    fn key_path(&self, table: &str) -> StoreResult<KeyPath> {
        self.with_table(table, |t| t.key().clone())
    }

    fn scan(&self, table: &str) -> StoreResult<Vec<Row>> {
        self.with_table(table, |t| t.rows().cloned().collect())
    }

    fn count(&self, table: &str) -> StoreResult<usize> {
        self.with_table(table, Table::len)
    }

    fn get(&self, table: &str, key: &RowKey) -> StoreResult<Option<Row>> {
        self.with_table(table, |t| t.get(key).cloned())
    }

    fn last_by(&self, table: &str, column: &str) -> StoreResult<Option<Row>> {
        self.with_table(table, |t| t.last_by(column).cloned())
    }

    fn write(&self, batch: WriteBatch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut tables = self.tables.write();
        let staged = stage_batch(&tables, batch)?;
        tables.extend(staged);
        Ok(())
    }
}
