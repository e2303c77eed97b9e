//! Replica store trait definition.

use crate::batch::WriteBatch;
use crate::error::StoreResult;
use crate::key::{KeyPath, RowKey};
use fibersync_protocol::Row;

/// A client-resident structured store holding local replicas.
///
/// Stores hold named tables of rows keyed by a [`KeyPath`]. All mutation
/// goes through [`ReplicaStore::write`], which applies a [`WriteBatch`]
/// atomically.
///
/// # Invariants
///
/// - `put` is upsert-by-key; the last row written for a key wins
/// - A batch is applied completely or not at all
/// - Concurrent readers see the state before or after a batch, never an
///   intermediate one (a clear followed by a put is never observed empty)
/// - Reads and writes against an undefined table fail with
///   [`crate::StoreError::UnknownTable`]
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing
/// - [`super::FileStore`] - For persistent replicas
pub trait ReplicaStore: Send + Sync {
    /// Defines `table` keyed by `key`, creating it if missing.
    ///
    /// Redefining with the same key is a no-op. An empty table may be
    /// rekeyed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::KeyMismatch`] if a non-empty table
    /// already uses a different key.
    fn define_table(&self, table: &str, key: KeyPath) -> StoreResult<()>;

    /// Returns the defined table names in order.
    fn table_names(&self) -> StoreResult<Vec<String>>;

    /// Returns the key path of `table`.
    fn key_path(&self, table: &str) -> StoreResult<KeyPath>;

    /// Returns every row of `table` in key order.
    fn scan(&self, table: &str) -> StoreResult<Vec<Row>>;

    /// Returns the number of rows in `table`.
    fn count(&self, table: &str) -> StoreResult<usize>;

    /// Looks up one row by key.
    fn get(&self, table: &str, key: &RowKey) -> StoreResult<Option<Row>>;

    /// Returns the row with the greatest non-null `column` value
    /// (`orderBy(column).last()`).
    fn last_by(&self, table: &str, column: &str) -> StoreResult<Option<Row>>;

    /// Applies `batch` atomically.
    fn write(&self, batch: WriteBatch) -> StoreResult<()>;

    /// Upserts `rows` into `table` in one commit.
    fn bulk_put(&self, table: &str, rows: Vec<Row>) -> StoreResult<()> {
        let mut batch = WriteBatch::new();
        batch.put(table, rows);
        self.write(batch)
    }

    /// Same as [`ReplicaStore::bulk_put`]; tables are always keyed.
    fn bulk_upsert(&self, table: &str, rows: Vec<Row>) -> StoreResult<()> {
        self.bulk_put(table, rows)
    }

    /// Removes every row of `table`.
    fn clear(&self, table: &str) -> StoreResult<()> {
        let mut batch = WriteBatch::new();
        batch.clear(table);
        self.write(batch)
    }

    /// Replaces the content of `table` with `rows` in one commit.
    fn replace_all(&self, table: &str, rows: Vec<Row>) -> StoreResult<()> {
        let mut batch = WriteBatch::new();
        batch.clear(table).put(table, rows);
        self.write(batch)
    }
}
