//! Keyed in-memory table shared by the store implementations.

use crate::batch::{WriteBatch, WriteOp};
use crate::error::{StoreError, StoreResult};
use crate::key::{KeyPath, RowKey};
use fibersync_protocol::{compare_values, Row};
use std::collections::BTreeMap;

/// Rows of one table, ordered by primary key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    key: KeyPath,
    rows: BTreeMap<RowKey, Row>,
}

impl Table {
    /// Creates an empty table keyed by `key`.
    pub fn new(key: KeyPath) -> Self {
        Self {
            key,
            rows: BTreeMap::new(),
        }
    }

    /// Builds a table from persisted rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupted`] if a row has no usable key.
    pub fn from_rows(name: &str, key: KeyPath, rows: Vec<Row>) -> StoreResult<Self> {
        let mut table = Self::new(key);
        for row in rows {
            let row_key = table.key.extract(&row).ok_or_else(|| {
                StoreError::Corrupted(format!("table {name} holds a row without key {}", table.key))
            })?;
            table.rows.insert(row_key, row);
        }
        Ok(table)
    }

    /// Returns the key path.
    pub fn key(&self) -> &KeyPath {
        &self.key
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Looks up a row by key.
    pub fn get(&self, key: &RowKey) -> Option<&Row> {
        self.rows.get(key)
    }

    /// Iterates rows in key order.
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.values()
    }

    /// Returns the row with the greatest non-null `column` value.
    ///
    /// Rows where `column` is null or missing are not indexed and never
    /// returned. Among equal values the row with the greatest key wins.
    pub fn last_by(&self, column: &str) -> Option<&Row> {
        self.rows
            .values()
            .filter_map(|row| match row.get(column) {
                Some(value) if !value.is_null() => Some((value, row)),
                _ => None,
            })
            .max_by(|(a, _), (b, _)| compare_values(a, b))
            .map(|(_, row)| row)
    }

    /// Upserts `rows` by key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingKey`] if any row lacks a key. Rows
    /// before the offending one are already applied, so callers stage on a
    /// copy.
    pub fn put(&mut self, name: &str, rows: Vec<Row>) -> StoreResult<()> {
        for row in rows {
            let row_key = self.key.extract(&row).ok_or_else(|| StoreError::MissingKey {
                table: name.to_string(),
                key: self.key.to_string(),
            })?;
            self.rows.insert(row_key, row);
        }
        Ok(())
    }

    /// Removes every row.
    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Consumes the table, returning its rows in key order.
    pub fn into_rows(self) -> Vec<Row> {
        self.rows.into_values().collect()
    }
}

/// Applies `batch` to copies of the touched tables.
///
/// Returns the replacement tables; `tables` itself is never modified, so a
/// failing batch leaves no trace. A table whose first operation is a clear
/// starts from an empty copy instead of cloning its rows.
pub(crate) fn stage_batch(
    tables: &BTreeMap<String, Table>,
    batch: WriteBatch,
) -> StoreResult<BTreeMap<String, Table>> {
    let mut staged: BTreeMap<String, Table> = BTreeMap::new();

    for op in batch.into_ops() {
        let name = op.table().to_string();
        if !staged.contains_key(&name) {
            let current = tables
                .get(&name)
                .ok_or_else(|| StoreError::unknown_table(&name))?;
            let copy = match op {
                WriteOp::Clear { .. } => Table::new(current.key.clone()),
                WriteOp::Put { .. } => current.clone(),
            };
            staged.insert(name.clone(), copy);
        }

        let table = staged
            .get_mut(&name)
            .ok_or_else(|| StoreError::unknown_table(&name))?;
        match op {
            WriteOp::Clear { .. } => table.clear(),
            WriteOp::Put { rows, .. } => table.put(&name, rows)?,
        }
    }

    Ok(staged)
}

/// Checks that `name` is usable as a table (and file) name.
pub(crate) fn validate_table_name(name: &str) -> StoreResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidTableName(name.to_string()))
    }
}
