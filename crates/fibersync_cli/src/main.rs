//! FiberSync CLI
//!
//! Command-line tools for the FiberSync replica.
//!
//! # Commands
//!
//! - `sync` - Synchronize local tables from the remote data service
//! - `status` - Show persisted sync status records
//! - `entities` - List registered entities and their strategies
//! - `inspect` - Show row counts of local tables

mod commands;
mod http;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// FiberSync offline replica tools.
#[derive(Parser)]
#[command(name = "fibersync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory of the local replica
    #[arg(global = true, short, long, env = "FIBERSYNC_DATA_DIR", default_value = ".fibersync")]
    data_dir: PathBuf,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize local tables from the remote data service
    Sync {
        /// Entities to sync (all registered entities if omitted)
        entities: Vec<String>,

        /// Base URL of the remote data service
        #[arg(long, env = "FIBERSYNC_REMOTE_URL")]
        remote_url: String,

        /// API key sent with every request
        #[arg(long, env = "FIBERSYNC_API_KEY", hide_env_values = true)]
        api_key: String,

        /// Registry file (JSON); the built-in dashboard registry if omitted
        #[arg(short, long)]
        registry: Option<PathBuf>,

        /// Rows per page
        #[arg(short, long)]
        batch_size: Option<u32>,

        /// Compare the incremental cursor with `>=` instead of `>`
        #[arg(long)]
        inclusive_cursor: bool,

        /// Request timeout in seconds
        #[arg(long, default_value = "30")]
        timeout: u64,
    },

    /// Show persisted sync status records
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List registered entities and their strategies
    Entities {
        /// Registry file (JSON); the built-in dashboard registry if omitted
        #[arg(short, long)]
        registry: Option<PathBuf>,
    },

    /// Show row counts of local tables
    Inspect {
        /// Only show this table
        table: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Sync {
            entities,
            remote_url,
            api_key,
            registry,
            batch_size,
            inclusive_cursor,
            timeout,
        } => {
            let options = commands::sync::SyncOptions {
                remote_url,
                api_key,
                registry,
                batch_size,
                inclusive_cursor,
                timeout_secs: timeout,
            };
            commands::sync::run(&cli.data_dir, &entities, options).await?;
        }
        Commands::Status { format } => {
            commands::status::run(&cli.data_dir, &format)?;
        }
        Commands::Entities { registry } => {
            commands::entities::run(registry.as_deref())?;
        }
        Commands::Inspect { table, format } => {
            commands::inspect::run(&cli.data_dir, table.as_deref(), &format)?;
        }
        Commands::Version => {
            println!("FiberSync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
