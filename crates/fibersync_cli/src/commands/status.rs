//! Status command implementation.

use fibersync_engine::{EngineConfig, StatusStore, SyncStatusRecord};
use fibersync_store::{FileStore, ReplicaStore};
use std::path::Path;
use std::sync::Arc;

/// Runs the status command.
pub fn run(data_dir: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let records = load(data_dir)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        _ => {
            print_text_output(&records);
        }
    }

    Ok(())
}

fn load(data_dir: &Path) -> Result<Vec<SyncStatusRecord>, Box<dyn std::error::Error>> {
    if !data_dir.exists() {
        return Err(format!("No replica found at {}", data_dir.display()).into());
    }
    let store: Arc<dyn ReplicaStore> = Arc::new(FileStore::open(data_dir)?);
    let status = StatusStore::open(store, EngineConfig::default().status_table)?;
    Ok(status.all())
}

fn print_text_output(records: &[SyncStatusRecord]) {
    if records.is_empty() {
        println!("No sync has been recorded yet.");
        return;
    }

    println!("{:<32} {:<8} {:>8}  {:<25} ERROR", "TABLE", "STATUS", "ROWS", "LAST SYNCED");
    for record in records {
        let count = record
            .count
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "{:<32} {:<8} {:>8}  {:<25} {}",
            record.table_name,
            record.status.to_string(),
            count,
            record.last_synced.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            record.error.as_deref().unwrap_or("")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fibersync_engine::SyncStatus;

    #[test]
    fn loads_persisted_records() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store: Arc<dyn ReplicaStore> = Arc::new(FileStore::open(dir.path()).unwrap());
            let status = StatusStore::open(store, "sync_status").unwrap();
            status.mark_success("nodes", 12).unwrap();
            status.mark_error("rings", "permission denied").unwrap();
        }

        let records = load(dir.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].table_name, "nodes");
        assert_eq!(records[0].count, Some(12));
        assert_eq!(records[1].status, SyncStatus::Error);
    }

    #[test]
    fn missing_replica_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("absent")).is_err());
    }
}
