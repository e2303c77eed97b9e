//! Primary-key paths and extracted row keys.

use fibersync_protocol::{compare_values, Row, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// The column(s) forming a table's primary key.
///
/// Serializes as a bare string for single-column keys and as an array
/// for compound keys, e.g. `["system_id", "ring_id"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyPath {
    /// Single key column.
    Single(String),
    /// Compound key, in order.
    Compound(Vec<String>),
}

impl KeyPath {
    /// The conventional `id` key.
    pub fn id() -> Self {
        Self::Single("id".into())
    }

    /// A single-column key.
    pub fn single(column: impl Into<String>) -> Self {
        Self::Single(column.into())
    }

    /// A compound key. A one-column list collapses to [`KeyPath::Single`].
    pub fn compound<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if columns.len() == 1 {
            Self::Single(columns.remove(0))
        } else {
            Self::Compound(columns)
        }
    }

    /// Returns the key columns in order.
    pub fn columns(&self) -> &[String] {
        match self {
            KeyPath::Single(column) => std::slice::from_ref(column),
            KeyPath::Compound(columns) => columns,
        }
    }

    /// Extracts the key of `row`.
    ///
    /// Returns `None` if any key column is missing or null.
    pub fn extract(&self, row: &Row) -> Option<RowKey> {
        let columns = self.columns();
        if columns.is_empty() {
            return None;
        }
        let mut parts = Vec::with_capacity(columns.len());
        for column in columns {
            match row.get(column) {
                Some(value) if !value.is_null() => parts.push(value.clone()),
                _ => return None,
            }
        }
        Some(RowKey(parts))
    }

    /// Returns true if `row` has a usable key.
    pub fn is_valid(&self, row: &Row) -> bool {
        self.extract(row).is_some()
    }
}

impl Default for KeyPath {
    fn default() -> Self {
        Self::id()
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.columns().join("+"))
    }
}

/// The extracted primary key of one row.
///
/// Keys order by index ordering of their parts.
#[derive(Debug, Clone)]
pub struct RowKey(Vec<Value>);

impl RowKey {
    /// Creates a key from its parts.
    pub fn new(parts: Vec<Value>) -> Self {
        Self(parts)
    }

    /// Creates a single-part key.
    pub fn single(value: impl Into<Value>) -> Self {
        Self(vec![value.into()])
    }

    /// Returns the key parts.
    pub fn parts(&self) -> &[Value] {
        &self.0
    }
}

impl Ord for RowKey {
    fn cmp(&self, other: &Self) -> Ordering {
        for (l, r) in self.0.iter().zip(other.0.iter()) {
            let ord = compare_values(l, r);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        self.0.len().cmp(&other.0.len())
    }
}

impl PartialOrd for RowKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for RowKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RowKey {}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("+")?;
            }
            match part {
                Value::String(s) => f.write_str(s)?,
                other => write!(f, "{other}")?,
            }
        }
        Ok(())
    }
}
