//! Inspect command implementation.

use fibersync_store::{FileStore, ReplicaStore};
use serde::Serialize;
use std::path::Path;

/// Replica inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Replica directory.
    pub path: String,
    /// Per-table statistics.
    pub tables: Vec<TableStats>,
    /// Total rows across tables.
    pub total_rows: usize,
}

/// Statistics for a single local table.
#[derive(Debug, Serialize)]
pub struct TableStats {
    /// Table name.
    pub name: String,
    /// Primary key columns.
    pub key: Vec<String>,
    /// Number of rows.
    pub rows: usize,
}

/// Runs the inspect command.
pub fn run(data_dir: &Path, table: Option<&str>, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !data_dir.exists() {
        return Err(format!("No replica found at {}", data_dir.display()).into());
    }
    let store = FileStore::open(data_dir)?;
    let result = inspect(&store, data_dir, table)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn inspect(
    store: &dyn ReplicaStore,
    path: &Path,
    only: Option<&str>,
) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let mut names = match only {
        Some(name) => vec![name.to_string()],
        None => store.table_names()?,
    };
    names.sort();

    let mut tables = Vec::with_capacity(names.len());
    for name in names {
        tables.push(TableStats {
            key: store.key_path(&name)?.columns().to_vec(),
            rows: store.count(&name)?,
            name,
        });
    }

    Ok(InspectResult {
        path: path.display().to_string(),
        total_rows: tables.iter().map(|t| t.rows).sum(),
        tables,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("FiberSync Replica: {}", result.path);
    println!("========================================");
    for table in &result.tables {
        println!(
            "  {:<32} {:>8} rows  key [{}]",
            table.name,
            table.rows,
            table.key.join(", ")
        );
    }
    println!();
    println!("Tables: {}", result.tables.len());
    println!("Total rows: {}", result.total_rows);
}
