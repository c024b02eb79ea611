//! Command-line interface for carlot
//!
//! # Usage Examples
//!
//! ```bash
//! # Against a local Azurite instance
//! carlot --connection-string "UseDevelopmentStorage=true"
//!
//! # Against a storage account, reproducible data
//! AZURE_STORAGE_CONNECTION_STRING="DefaultEndpointsProtocol=https;AccountName=...;AccountKey=..." \
//!   carlot --table Cars --record-count 5000 --seed 42
//!
//! # Without any service
//! carlot --store memory --record-count 200
//! ```
//!
//! Then type `C`, `Z1`, `Z2`, `Z3`, `D` or `X` at the prompt.

use anyhow::Context;
use carlot::{run_menu, Session};
use clap::{Parser, ValueEnum};
use std::io;
use std::time::Duration;
use table_store::{AzureTableStore, ConnectionString, MemoryTableStore, RetryPolicy, TableStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    /// Azure Table storage or Azurite
    Azure,
    /// In-process table, lost on exit
    Memory,
}

#[derive(Parser)]
#[command(name = "carlot")]
#[command(about = "Interactive vehicle listing demo over a partitioned table store")]
#[command(long_about = None)]
struct Cli {
    /// Table store backend
    #[arg(long, value_enum, default_value = "azure")]
    store: StoreKind,

    /// Storage connection string (required for the azure backend)
    #[arg(long, env = "AZURE_STORAGE_CONNECTION_STRING", hide_env_values = true)]
    connection_string: Option<String>,

    /// Table name
    #[arg(long, env = "CARLOT_TABLE", default_value = "Cars")]
    table: String,

    /// Records written by each create command
    #[arg(long, default_value = "1000")]
    record_count: u64,

    /// Generator seed (random when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Maximum entities per query page
    #[arg(long)]
    page_size: Option<usize>,

    /// Retries for transient store errors
    #[arg(long, default_value = "3")]
    max_retries: u32,

    /// Delay before the first retry, doubled on each further retry
    #[arg(long, default_value = "200")]
    retry_base_delay_ms: u64,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "30")]
    request_timeout_secs: u64,
}

fn build_store(cli: &Cli) -> anyhow::Result<Box<dyn TableStore>> {
    match cli.store {
        StoreKind::Azure => {
            let raw = cli.connection_string.as_deref().context(
                "A connection string is required for the azure store \
                 (--connection-string or AZURE_STORAGE_CONNECTION_STRING)",
            )?;
            let connection: ConnectionString =
                raw.parse().context("Invalid storage connection string")?;
            let store = AzureTableStore::new(
                connection,
                cli.table.clone(),
                Duration::from_secs(cli.request_timeout_secs),
            )
            .context("Failed to create table client")?
            .with_page_size(cli.page_size);
            tracing::info!(
                "Using Azure table '{}' at {}",
                cli.table,
                store.endpoint()
            );
            Ok(Box::new(store))
        }
        StoreKind::Memory => {
            let mut store = MemoryTableStore::new(cli.table.clone());
            if let Some(page_size) = cli.page_size {
                store = store.with_page_size(page_size);
            }
            tracing::info!("Using in-memory table '{}'", cli.table);
            Ok(Box::new(store))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let store = build_store(&cli)?;
    let retry = RetryPolicy::with_retries(
        cli.max_retries,
        Duration::from_millis(cli.retry_base_delay_ms),
    );

    let handle = store.as_ref();
    let created = retry
        .run("create table", move || handle.create_table_if_not_exists())
        .await
        .with_context(|| format!("Failed to create table '{}'", cli.table))?;
    if created {
        tracing::info!("Created table '{}'", cli.table);
    } else {
        tracing::info!("Table '{}' already exists", cli.table);
    }

    let seed = cli.seed.unwrap_or_else(rand::random);
    tracing::info!("Generator seed: {seed}");

    let session = Session::new(cli.record_count, seed).with_retry(retry);
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    run_menu(handle, &session, stdin.lock(), &mut stdout).await?;

    Ok(())
}
