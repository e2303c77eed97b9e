//! Atomic write batches.

use fibersync_protocol::Row;

/// One staged write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Remove every row of the table.
    Clear {
        /// Target table.
        table: String,
    },
    /// Upsert rows by primary key.
    Put {
        /// Target table.
        table: String,
        /// Rows to upsert, later rows win on duplicate keys.
        rows: Vec<Row>,
    },
}

impl WriteOp {
    /// Returns the table this operation targets.
    pub fn table(&self) -> &str {
        match self {
            WriteOp::Clear { table } | WriteOp::Put { table, .. } => table,
        }
    }
}

/// An ordered list of writes committed as one unit.
///
/// A store applies either every operation of a batch or none of them.
///
/// # Example
///
/// ```rust
/// use fibersync_store::WriteBatch;
///
/// let mut batch = WriteBatch::new();
/// batch.clear("nodes");
/// batch.put("nodes", Vec::new());
/// assert_eq!(batch.len(), 2);
/// assert_eq!(batch.tables(), vec!["nodes"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages clearing `table`.
    pub fn clear(&mut self, table: impl Into<String>) -> &mut Self {
        self.ops.push(WriteOp::Clear {
            table: table.into(),
        });
        self
    }

    /// Stages an upsert of `rows` into `table`.
    pub fn put(&mut self, table: impl Into<String>, rows: Vec<Row>) -> &mut Self {
        self.ops.push(WriteOp::Put {
            table: table.into(),
            rows,
        });
        self
    }

    /// Returns the staged operations in order.
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Consumes the batch, returning its operations.
    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    /// Returns the number of staged operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Returns the distinct tables touched, in first-touch order.
    pub fn tables(&self) -> Vec<&str> {
        let mut tables: Vec<&str> = Vec::new();
        for op in &self.ops {
            if !tables.contains(&op.table()) {
                tables.push(op.table());
            }
        }
        tables
    }

    /// Total number of rows staged for upsert.
    pub fn row_count(&self) -> usize {
        self.ops
            .iter()
            .map(|op| match op {
                WriteOp::Put { rows, .. } => rows.len(),
                WriteOp::Clear { .. } => 0,
            })
            .sum()
    }
}
