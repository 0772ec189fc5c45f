//! nfo-ingest - fiscal invoice ingestion service
//!
//! Startup order:
//! 1. Parse command line (with `NFO_*` environment fallbacks)
//! 2. Merge with the TOML config file and defaults
//! 3. Initialize logging (console, plus the optional log file)
//! 4. Validate configuration and resolve the roots (fatal on failure)
//! 5. Open the registry database, seed caches, log registry summary
//! 6. Run scan cycles until Ctrl+C / SIGTERM

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use nfo_common::config::ConfigLayer;
use nfo_common::IngestConfig;
use nfo_ingest::db::RegistrationStore;
use nfo_ingest::services::{
    IngestService, JsonLinesReportSink, NfeXmlExtractor, ReportSink, DEFAULT_REPORT_CAPACITY,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for nfo-ingest
#[derive(Parser, Debug)]
#[command(name = "nfo-ingest")]
#[command(about = "Registers and files deposited NF-e documents")]
#[command(version)]
struct Args {
    /// TOML config file (default: platform config directory)
    #[arg(short, long, env = "NFO_CONFIG")]
    config: Option<PathBuf>,

    /// Folder scanned for new documents
    #[arg(long, env = "NFO_SOURCE_ROOT")]
    source_root: Option<PathBuf>,

    /// Root of the organized destination tree
    #[arg(long, env = "NFO_DESTINATION_ROOT")]
    destination_root: Option<PathBuf>,

    /// Quarantine area (default: <destination_root>/_ERRORS)
    #[arg(long, env = "NFO_QUARANTINE_ROOT")]
    quarantine_root: Option<PathBuf>,

    /// Registry database file
    #[arg(long, env = "NFO_DATABASE_PATH")]
    database_path: Option<PathBuf>,

    /// Concurrent ingestion workers
    #[arg(short, long, env = "NFO_WORKERS")]
    workers: Option<usize>,

    /// Files per batch
    #[arg(long, env = "NFO_BATCH_SIZE")]
    batch_size: Option<usize>,

    /// Seconds between scan cycles
    #[arg(long, env = "NFO_SCAN_INTERVAL_SECS")]
    scan_interval_secs: Option<u64>,

    /// Seconds before retrying after a store fault
    #[arg(long, env = "NFO_STORE_RETRY_SECS")]
    store_retry_secs: Option<u64>,

    /// Seconds to back off after a failed cycle
    #[arg(long, env = "NFO_FAULT_BACKOFF_SECS")]
    fault_backoff_secs: Option<u64>,

    /// Upper bound for database lock retries
    #[arg(long, env = "NFO_MAX_LOCK_WAIT_MS")]
    max_lock_wait_ms: Option<u64>,

    /// SQLite busy timeout
    #[arg(long, env = "NFO_BUSY_TIMEOUT_MS")]
    busy_timeout_ms: Option<u64>,

    /// Append finalized records as JSON lines to this file
    #[arg(long, env = "NFO_REPORT_PATH")]
    report_path: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset (e.g. "info", "nfo_ingest=debug")
    #[arg(long, env = "NFO_LOG_LEVEL")]
    log_level: Option<String>,

    /// Also write logs to this file (appended, no ANSI colors)
    #[arg(long, env = "NFO_LOG_PATH")]
    log_path: Option<PathBuf>,

    /// Run a single scan cycle and exit
    #[arg(long)]
    once: bool,
}

impl Args {
    fn overrides(&self) -> ConfigLayer {
        ConfigLayer {
            source_root: self.source_root.clone(),
            destination_root: self.destination_root.clone(),
            quarantine_root: self.quarantine_root.clone(),
            database_path: self.database_path.clone(),
            workers: self.workers,
            batch_size: self.batch_size,
            scan_interval_secs: self.scan_interval_secs,
            store_retry_secs: self.store_retry_secs,
            fault_backoff_secs: self.fault_backoff_secs,
            max_lock_wait_ms: self.max_lock_wait_ms,
            busy_timeout_ms: self.busy_timeout_ms,
            report_path: self.report_path.clone(),
            log_level: self.log_level.clone(),
            log_path: self.log_path.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = IngestConfig::load(args.overrides(), args.config.as_deref())
        .context("Failed to load configuration")?;

    let log_file = match &config.log_path {
        Some(path) => Some(
            open_log_file(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?,
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(log_file.map(|file| {
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(file))
        }))
        .init();

    info!("Starting nfo-ingest v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &config.log_path {
        info!("Log file: {}", path.display());
    }

    config.validate().context("Invalid configuration")?;
    config
        .ensure_directories()
        .context("Failed to create working directories")?;
    config
        .canonicalize_roots()
        .context("Invalid configuration")?;

    info!("Source: {}", config.source_root.display());
    info!("Destination: {}", config.destination_root.display());
    info!("Quarantine: {}", config.quarantine_root.display());
    info!(
        workers = config.workers,
        batch_size = config.batch_size,
        "Worker pool configured"
    );

    let db = nfo_common::db::init_database(&config.database_path, config.busy_timeout_ms)
        .await
        .context("Failed to open registry database")?;

    let summary = RegistrationStore::new(db.clone(), config.max_lock_wait_ms)
        .summary()
        .await
        .context("Failed to read registry summary")?;
    info!(
        invoices = summary.invoices,
        issuers = summary.issuers,
        "Registry loaded"
    );
    for (document_type, count) in &summary.by_document_type {
        info!("  {}: {}", document_type, count);
    }

    let report_sink = config
        .report_path
        .as_ref()
        .map(|path| Arc::new(JsonLinesReportSink::spawn(path, DEFAULT_REPORT_CAPACITY)));

    let service = IngestService::build(
        &config,
        db.clone(),
        Arc::new(NfeXmlExtractor::new()),
        report_sink
            .clone()
            .map(|sink| sink as Arc<dyn ReportSink>),
    )
    .await
    .context("Failed to initialize ingestion pipeline")?;

    let cancel = CancellationToken::new();

    if args.once {
        let stats = service.run_cycle(&cancel).await?;
        info!("Single cycle complete: {}", stats.display_string());
    } else {
        tokio::spawn(shutdown_signal(cancel.clone()));
        service.run(cancel).await;
    }

    if let Some(sink) = report_sink {
        sink.close().await;
    }
    db.close().await;

    info!("Shutdown complete");
    Ok(())
}

/// Open `path` for appending, creating it and its parent directory
fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Cancel `token` on Ctrl+C or SIGTERM
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, finishing current batch"),
        _ = terminate => info!("Received SIGTERM, finishing current batch"),
    }

    token.cancel();
}
