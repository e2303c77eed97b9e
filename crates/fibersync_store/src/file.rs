//! File-based replica store for persistent local replicas.
//!
//! Directory layout:
//!
//! ```text
//! <store_path>/
//! ├─ LOCK              # Advisory lock for single-writer
//! ├─ nodes.json        # One file per table: key path + rows
//! └─ sync_status.json
//! ```

use crate::backend::ReplicaStore;
use crate::batch::WriteBatch;
use crate::error::{StoreError, StoreResult};
use crate::key::{KeyPath, RowKey};
use crate::table::{stage_batch, validate_table_name, Table};
use fibersync_protocol::Row;
use fs2::FileExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const LOCK_FILE: &str = "LOCK";
const TABLE_EXT: &str = "json";
const TEMP_EXT: &str = "json.tmp";

/// On-disk form of one table.
#[derive(Debug, Serialize, Deserialize)]
struct TableFile {
    key: KeyPath,
    rows: Vec<Row>,
}

/// A file-backed replica store.
///
/// All tables are loaded into memory on open and served from there.
/// Each write stages the touched tables, persists them with
/// write-then-rename, and only then swaps the in-memory copy, so a failed
/// write leaves both disk and memory at the previous state.
///
/// # Durability
///
/// A single-table batch is atomic on disk. A batch spanning several tables
/// is atomic in memory; on disk each table file is replaced atomically on
/// its own.
///
/// # Thread Safety
///
/// The store holds an exclusive lock on its directory; only one `FileStore`
/// can be open per directory at a time.
///
/// # Example
///
/// ```no_run
/// use fibersync_store::{FileStore, KeyPath, ReplicaStore};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("replica")).unwrap();
/// store.define_table("nodes", KeyPath::id()).unwrap();
/// println!("{} nodes cached", store.count("nodes").unwrap());
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    tables: RwLock<BTreeMap<String, Table>>,
    _lock_file: File,
}

impl FileStore {
    /// Opens or creates a store directory and loads every table file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - Another process holds the lock (returns [`StoreError::Locked`])
    /// - A table file cannot be decoded
    pub fn open(path: &Path) -> StoreResult<Self> {
        fs::create_dir_all(path)?;
        if !path.is_dir() {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("store path is not a directory: {}", path.display()),
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked);
        }

        let tables = load_tables(path)?;
        debug!(path = %path.display(), tables = tables.len(), "opened file store");

        Ok(Self {
            path: path.to_path_buf(),
            tables: RwLock::new(tables),
            _lock_file: lock_file,
        })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn table_path(&self, table: &str) -> PathBuf {
        self.path.join(format!("{table}.{TABLE_EXT}"))
    }

    fn persist(&self, name: &str, table: &Table) -> StoreResult<()> {
        let temp_path = self.path.join(format!("{name}.{TEMP_EXT}"));
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        let on_disk = TableFile {
            key: table.key().clone(),
            rows: table.rows().cloned().collect(),
        };
        serde_json::to_writer(&mut writer, &on_disk)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);

        fs::rename(&temp_path, self.table_path(name))?;
        self.sync_directory()
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> StoreResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> StoreResult<()> {
        Ok(())
    }

    fn with_table<T>(&self, table: &str, f: impl FnOnce(&Table) -> T) -> StoreResult<T> {
        let tables = self.tables.read();
        let t = tables
            .get(table)
            .ok_or_else(|| StoreError::unknown_table(table))?;
        Ok(f(t))
    }
}

fn load_tables(path: &Path) -> StoreResult<BTreeMap<String, Table>> {
    let mut tables = BTreeMap::new();
    for entry in fs::read_dir(path)? {
        let entry_path = entry?.path();
        if entry_path.extension().and_then(|e| e.to_str()) != Some(TABLE_EXT) {
            continue;
        }
        let Some(name) = entry_path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if validate_table_name(name).is_err() {
            continue;
        }

        let reader = BufReader::new(File::open(&entry_path)?);
        let on_disk: TableFile = serde_json::from_reader(reader).map_err(|e| {
            StoreError::Corrupted(format!("{}: {e}", entry_path.display()))
        })?;
        let table = Table::from_rows(name, on_disk.key, on_disk.rows)?;
        tables.insert(name.to_string(), table);
    }
    Ok(tables)
}

impl ReplicaStore for FileStore {
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
                let fresh = Table::new(key);
                self.persist(table, &fresh)?;
                tables.insert(table.to_string(), fresh);
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
        for (name, table) in &staged {
            self.persist(name, table)?;
        }
        tables.extend(staged);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn file_create_new() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(&dir.path().join("replica")).unwrap();
        assert!(store.table_names().unwrap().is_empty());
        assert!(store.path().join(LOCK_FILE).exists());
    }

    #[test]
    fn file_persistence() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileStore::open(dir.path()).unwrap();
            store.define_table("nodes", KeyPath::id()).unwrap();
            store
                .bulk_put("nodes", vec![row(json!({"id": 1, "name": "Exchange A"}))])
                .unwrap();
        }

        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.table_names().unwrap(), vec!["nodes".to_string()]);
        let rows = store.scan("nodes").unwrap();
        assert_eq!(rows, vec![row(json!({"id": 1, "name": "Exchange A"}))]);
    }

    #[test]
    fn file_compound_key_roundtrip() {
        let dir = TempDir::new().unwrap();
        let key = KeyPath::compound(["system_id", "ring_id"]);
        {
            let store = FileStore::open(dir.path()).unwrap();
            store.define_table("ring_based_systems", key.clone()).unwrap();
        }
        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.key_path("ring_based_systems").unwrap(), key);
    }

    #[test]
    fn file_second_open_is_locked() {
        let dir = TempDir::new().unwrap();
        let _first = FileStore::open(dir.path()).unwrap();
        assert!(matches!(FileStore::open(dir.path()), Err(StoreError::Locked)));
    }

    #[test]
    fn file_failed_write_keeps_disk_and_memory() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileStore::open(dir.path()).unwrap();
            store.define_table("nodes", KeyPath::id()).unwrap();
            store.bulk_put("nodes", vec![row(json!({"id": 1}))]).unwrap();
            assert!(store
                .replace_all("nodes", vec![row(json!({"name": "keyless"}))])
                .is_err());
            assert_eq!(store.count("nodes").unwrap(), 1);
        }
        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.count("nodes").unwrap(), 1);
        assert!(!dir.path().join("nodes.json.tmp").exists());
    }

    #[test]
    fn file_corrupted_table_is_reported() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("nodes.json"), b"{not json").unwrap();
        assert!(matches!(
            FileStore::open(dir.path()),
            Err(StoreError::Corrupted(_))
        ));
    }
}
