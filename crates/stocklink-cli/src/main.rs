//! Stocklink CLI - Operate the sync engine from the terminal
//!
//! Register a device against a sync server, run sync cycles, and inspect
//! the local store and its outgoing queue.

use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use stocklink_core::db::{Store, SyncSettings};
use stocklink_core::sync::{HttpSyncServer, OutboxEntry, Synchroniser};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Parser)]
#[command(name = "stocklink")]
#[command(about = "Offline-first sync engine for the Stocklink inventory app")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Optional path to local database file
    #[arg(long, value_name = "PATH")]
    db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Register this device with a sync server and pull its initial data
    Init {
        /// Sync server URL
        #[arg(long, value_name = "URL")]
        url: String,
        /// Sync site name
        #[arg(long, value_name = "NAME")]
        site: String,
        /// Sync site password
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Push queued local changes, then pull and integrate server changes
    Sync,
    /// Show sync configuration and queue state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List queued outgoing changes, oldest first
    Outbox {
        /// Number of entries to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] stocklink_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("stocklink=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::Init {
            url,
            site,
            password,
        } => run_init(&url, &site, &password, &db_path).await?,
        Commands::Sync => run_sync(&db_path).await?,
        Commands::Status { json } => run_status(json, &db_path)?,
        Commands::Outbox { limit, json } => run_outbox(limit, json, &db_path)?,
    }

    Ok(())
}

async fn run_init(
    url: &str,
    site: &str,
    password: &str,
    db_path: &Path,
) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let synchroniser =
        Synchroniser::new(Arc::new(Mutex::new(store)), HttpSyncServer::new()).await?;
    synchroniser.initialise(url, site, password).await?;

    let status = synchroniser.status();
    println!("Initialised site '{site}' against {url} ({} records pulled)", status.progress);
    Ok(())
}

async fn run_sync(db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let synchroniser =
        Synchroniser::new(Arc::new(Mutex::new(store)), HttpSyncServer::new()).await?;
    synchroniser.synchronise().await?;

    println!("Sync completed");
    Ok(())
}

fn run_status(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let report = status_report(&store)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in format_status_lines(&report) {
            println!("{line}");
        }
    }
    Ok(())
}

fn run_outbox(limit: usize, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let entries = store.outbox().next(&store, limit)?;

    if as_json {
        let items: Vec<serde_json::Value> = entries.iter().map(outbox_entry_to_json).collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if entries.is_empty() {
        println!("No queued changes");
    } else {
        for line in format_outbox_lines(&entries) {
            println!("{line}");
        }
    }
    Ok(())
}

fn status_report(store: &Store) -> Result<serde_json::Value, CliError> {
    let settings = SyncSettings::load(store)?;
    let queued = store.outbox().len(store)?;
    Ok(serde_json::json!({
        "initialised": settings.is_initialised,
        "server_url": settings.url,
        "site_name": settings.site_name,
        "site_id": settings.site_id,
        "store_id": settings.store_id,
        "prior_sync_failed": settings.prior_failed,
        "queued_changes": queued,
    }))
}

fn format_status_lines(report: &serde_json::Value) -> Vec<String> {
    let text = |key: &str| {
        report[key]
            .as_str()
            .map_or_else(|| "-".to_string(), ToString::to_string)
    };
    let yes_no = |key: &str| if report[key].as_bool() == Some(true) { "yes" } else { "no" };

    vec![
        format!("Initialised:        {}", yes_no("initialised")),
        format!("Server URL:         {}", text("server_url")),
        format!("Site name:          {}", text("site_name")),
        format!("Site ID:            {}", text("site_id")),
        format!("Store ID:           {}", text("store_id")),
        format!("Prior sync failed:  {}", yes_no("prior_sync_failed")),
        format!(
            "Queued changes:     {}",
            report["queued_changes"].as_u64().unwrap_or(0)
        ),
    ]
}

fn format_outbox_lines(entries: &[OutboxEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            format!(
                "{}  {:<6}  {:<16}  {}",
                format_change_time(entry.change_time),
                entry.change_type.as_str(),
                entry.record_type.as_str(),
                entry.record_id
            )
        })
        .collect()
}

fn outbox_entry_to_json(entry: &OutboxEntry) -> serde_json::Value {
    serde_json::json!({
        "id": entry.id,
        "change_type": entry.change_type.as_str(),
        "record_type": entry.record_type.as_str(),
        "record_id": entry.record_id,
        "change_time": format_change_time(entry.change_time),
    })
}

fn format_change_time(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |when| when.format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}

fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("STOCKLINK_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stocklink")
        .join("stocklink.db")
}

fn open_store(path: &Path) -> Result<Store, CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Store::open(path)?)
}
