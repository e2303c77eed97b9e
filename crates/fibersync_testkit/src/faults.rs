//! Fault injection for replica stores.

use fibersync_protocol::Row;
use fibersync_store::{KeyPath, ReplicaStore, RowKey, StoreError, StoreResult, WriteBatch};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// A store wrapper that fails writes on demand.
///
/// Reads always pass through. A failed write is rejected before it
/// reaches the inner store, the way a quota or I/O error would surface.
pub struct FaultyStore {
    inner: Arc<dyn ReplicaStore>,
    fail_all: AtomicBool,
    failing_tables: Mutex<HashSet<String>>,
    writes: AtomicUsize,
}

impl FaultyStore {
    /// Wraps `inner`.
    pub fn new(inner: Arc<dyn ReplicaStore>) -> Self {
        Self {
            inner,
            fail_all: AtomicBool::new(false),
            failing_tables: Mutex::new(HashSet::new()),
            writes: AtomicUsize::new(0),
        }
    }

    /// Fails every write while `fail` is true.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Fails writes that touch `table`.
    pub fn fail_writes_to(&self, table: impl Into<String>) {
        self.failing_tables.lock().insert(table.into());
    }

    /// Stops failing writes to every table.
    pub fn heal(&self) {
        self.fail_all.store(false, Ordering::SeqCst);
        self.failing_tables.lock().clear();
    }

    /// Number of writes that reached the inner store.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn should_fail(&self, batch: &WriteBatch) -> bool {
        if self.fail_all.load(Ordering::SeqCst) {
            return true;
        }
        let failing = self.failing_tables.lock();
        batch.tables().iter().any(|t| failing.contains(*t))
    }
}

impl ReplicaStore for FaultyStore {
    fn define_table(&self, table: &str, key: KeyPath) -> StoreResult<()> {
        self.inner.define_table(table, key)
    }

    fn table_names(&self) -> StoreResult<Vec<String>> {
        self.inner.table_names()
    }

    fn key_path(&self, table: &str) -> StoreResult<KeyPath> {
        self.inner.key_path(table)
    }

    fn scan(&self, table: &str) -> StoreResult<Vec<Row>> {
        self.inner.scan(table)
    }

    fn count(&self, table: &str) -> StoreResult<usize> {
        self.inner.count(table)
    }

    fn get(&self, table: &str, key: &RowKey) -> StoreResult<Option<Row>> {
        self.inner.get(table, key)
    }

    fn last_by(&self, table: &str, column: &str) -> StoreResult<Option<Row>> {
        self.inner.last_by(table, column)
    }

    fn write(&self, batch: WriteBatch) -> StoreResult<()> {
        if self.should_fail(&batch) {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::Other,
                "injected write failure",
            )));
        }
        self.inner.write(batch)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
