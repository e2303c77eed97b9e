//! Per-entity sync status records.
//!
//! Records live in a table of the replica store keyed by `tableName`, so
//! they persist alongside the data they describe. Every write updates an
//! in-memory snapshot first; observers watch that snapshot or subscribe to
//! individual writes.

use crate::error::SyncResult;
use chrono::{DateTime, Utc};
use fibersync_protocol::{ProtocolError, Row};
use fibersync_store::{KeyPath, ReplicaStore};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::warn;

const EVENT_CAPACITY: usize = 256;

/// Message recorded for attempts a previous process never finished.
pub const INTERRUPTED_MESSAGE: &str = "sync interrupted before completion";

/// Last known state of one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Never synced.
    Idle,
    /// An attempt is running.
    Syncing,
    /// The last attempt succeeded.
    Success,
    /// The last attempt failed.
    Error,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Success => "success",
            SyncStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// One status row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusRecord {
    /// Entity name.
    pub table_name: String,
    /// State.
    pub status: SyncStatus,
    /// When the record was written.
    pub last_synced: DateTime<Utc>,
    /// Rows written by a successful attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    /// Failure message of an unsuccessful attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncStatusRecord {
    /// Creates a record stamped now.
    pub fn new(table_name: impl Into<String>, status: SyncStatus) -> Self {
        Self {
            table_name: table_name.into(),
            status,
            last_synced: Utc::now(),
            count: None,
            error: None,
        }
    }

    fn to_row(&self) -> SyncResult<Row> {
        match serde_json::to_value(self).map_err(ProtocolError::from)? {
            serde_json::Value::Object(row) => Ok(row),
            _ => Err(ProtocolError::malformed("status record is not an object").into()),
        }
    }
}

/// Optional fields of a status write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusExtra {
    /// Row count.
    pub count: Option<u64>,
    /// Error message.
    pub error: Option<String>,
}

/// Live store of sync status records.
pub struct StatusStore {
    store: Arc<dyn ReplicaStore>,
    table: String,
    snapshot: watch::Sender<BTreeMap<String, SyncStatusRecord>>,
    events: broadcast::Sender<SyncStatusRecord>,
    write_lock: Mutex<()>,
}

impl StatusStore {
    /// Opens the status table, loading persisted records.
    ///
    /// Records left at `syncing` by a process that stopped mid-attempt are
    /// rewritten as errors.
    pub fn open(store: Arc<dyn ReplicaStore>, table: impl Into<String>) -> SyncResult<Self> {
        let table = table.into();
        store.define_table(&table, KeyPath::single("tableName"))?;

        let mut records = BTreeMap::new();
        let mut interrupted = Vec::new();
        for row in store.scan(&table)? {
            match serde_json::from_value::<SyncStatusRecord>(serde_json::Value::Object(row)) {
                Ok(mut record) => {
                    if record.status == SyncStatus::Syncing {
                        record.status = SyncStatus::Error;
                        record.count = None;
                        record.error = Some(INTERRUPTED_MESSAGE.to_string());
                        interrupted.push(record.to_row()?);
                    }
                    records.insert(record.table_name.clone(), record);
                }
                Err(e) => warn!(table = %table, error = %e, "skipping unreadable status record"),
            }
        }
        if !interrupted.is_empty() {
            warn!(count = interrupted.len(), "marking interrupted sync attempts as failed");
            store.bulk_upsert(&table, interrupted)?;
        }

        let (snapshot, _) = watch::channel(records);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            store,
            table,
            snapshot,
            events,
            write_lock: Mutex::new(()),
        })
    }

    /// Name of the backing table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Overwrites the record of `entity`. Last write wins.
    ///
    /// Observers see the new record even if persisting it fails.
    pub fn set_status(
        &self,
        entity: &str,
        status: SyncStatus,
        extra: StatusExtra,
    ) -> SyncResult<SyncStatusRecord> {
        let mut record = SyncStatusRecord::new(entity, status);
        record.count = extra.count;
        record.error = extra.error;

        let _guard = self.write_lock.lock();
        self.snapshot.send_modify(|records| {
            records.insert(entity.to_string(), record.clone());
        });
        let _ = self.events.send(record.clone());
        self.store.bulk_upsert(&self.table, vec![record.to_row()?])?;
        Ok(record)
    }

    /// Records the start of an attempt.
    pub fn mark_syncing(&self, entity: &str) -> SyncResult<SyncStatusRecord> {
        self.set_status(entity, SyncStatus::Syncing, StatusExtra::default())
    }

    /// Records a successful attempt.
    pub fn mark_success(&self, entity: &str, count: u64) -> SyncResult<SyncStatusRecord> {
        self.set_status(
            entity,
            SyncStatus::Success,
            StatusExtra {
                count: Some(count),
                error: None,
            },
        )
    }

    /// Records a failed attempt.
    pub fn mark_error(&self, entity: &str, message: impl Into<String>) -> SyncResult<SyncStatusRecord> {
        self.set_status(
            entity,
            SyncStatus::Error,
            StatusExtra {
                count: None,
                error: Some(message.into()),
            },
        )
    }

    /// Returns the record of `entity`.
    pub fn get(&self, entity: &str) -> Option<SyncStatusRecord> {
        self.snapshot.borrow().get(entity).cloned()
    }

    /// Returns every record, ordered by entity name.
    pub fn all(&self) -> Vec<SyncStatusRecord> {
        self.snapshot.borrow().values().cloned().collect()
    }

    /// A live view of all records.
    pub fn observe(&self) -> watch::Receiver<BTreeMap<String, SyncStatusRecord>> {
        self.snapshot.subscribe()
    }

    /// Every individual write, in order.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncStatusRecord> {
        self.events.subscribe()
    }
}

impl fmt::Debug for StatusStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusStore")
            .field("table", &self.table)
            .field("records", &self.snapshot.borrow().len())
            .finish()
    }
}
