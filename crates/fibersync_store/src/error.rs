//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A table file could not be encoded or decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The table was never defined.
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// The table name cannot be used as a storage identifier.
    #[error("invalid table name: {0:?}")]
    InvalidTableName(String),

    /// A non-empty table was redefined with a different key.
    #[error("table {table} is keyed by {existing}, cannot rekey to {requested}")]
    KeyMismatch {
        /// Table name.
        table: String,
        /// Key path the table already uses.
        existing: String,
        /// Key path that was requested.
        requested: String,
    },

    /// A row lacks one of the key columns.
    #[error("row in table {table} is missing key column(s) {key}")]
    MissingKey {
        /// Table name.
        table: String,
        /// Key path of the table.
        key: String,
    },

    /// The store directory is locked by another process.
    #[error("store is locked by another process")]
    Locked,

    /// The stored data is corrupted.
    #[error("store corrupted: {0}")]
    Corrupted(String),
}

impl StoreError {
    /// Creates an unknown-table error.
    pub fn unknown_table(name: impl Into<String>) -> Self {
        Self::UnknownTable(name.into())
    }
}
