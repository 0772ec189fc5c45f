//! Scan cycle driver
//!
//! Scans the source tree, hands the files to the [`BatchScheduler`], then
//! sleeps. The pause depends on how the cycle went:
//!
//! | Cycle result            | Next pause           |
//! |-------------------------|----------------------|
//! | clean                   | `scan_interval_secs` |
//! | some files deferred     | `store_retry_secs`   |
//! | cycle failed (scan etc) | `fault_backoff_secs` |
//!
//! Every pause ends early on cancellation.

use crate::db::RegistrationStore;
use crate::services::batch_scheduler::{BatchScheduler, CycleStats};
use crate::services::dedup_index::DedupIndex;
use crate::services::destination_resolver::DestinationResolver;
use crate::services::document_extractor::DocumentExtractor;
use crate::services::file_scanner::FileScanner;
use crate::services::ingestion_worker::IngestionWorker;
use crate::services::issuer_registry::IssuerRegistry;
use crate::services::relocator::Relocator;
use crate::services::report_sink::ReportSink;
use anyhow::Context;
use nfo_common::IngestConfig;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Long-running ingestion service
pub struct IngestService {
    source_root: PathBuf,
    scanner: Arc<FileScanner>,
    scheduler: BatchScheduler,
    scan_interval: Duration,
    store_retry: Duration,
    fault_backoff: Duration,
}

impl IngestService {
    /// Assemble the pipeline from configuration
    ///
    /// Seeds the dedup index and the issuer cache from the registry.
    pub async fn build(
        config: &IngestConfig,
        db: SqlitePool,
        extractor: Arc<dyn DocumentExtractor>,
        report: Option<Arc<dyn ReportSink>>,
    ) -> nfo_common::Result<Self> {
        let store = RegistrationStore::new(db.clone(), config.max_lock_wait_ms);
        let dedup = Arc::new(DedupIndex::seeded(store.load_dedup_keys().await?));
        let issuers = Arc::new(IssuerRegistry::load(db, config.max_lock_wait_ms).await?);

        let (hashes, keys) = dedup.len();
        let issuer_count = issuers.cached_count().await;
        tracing::info!(hashes, keys, issuers = issuer_count, "Caches seeded");

        let mut worker = IngestionWorker::new(
            extractor,
            dedup,
            issuers,
            store,
            DestinationResolver::new(&config.destination_root),
            Relocator::new(&config.quarantine_root),
        );
        if let Some(sink) = report {
            worker = worker.with_report_sink(sink);
        }

        let scanner = FileScanner::new()
            .exclude(&config.destination_root)
            .exclude(&config.quarantine_root);

        Ok(Self {
            source_root: config.source_root.clone(),
            scanner: Arc::new(scanner),
            scheduler: BatchScheduler::new(Arc::new(worker), config.workers, config.batch_size),
            scan_interval: config.scan_interval(),
            store_retry: config.store_retry_delay(),
            fault_backoff: config.fault_backoff(),
        })
    }

    /// One scan and schedule pass
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> anyhow::Result<CycleStats> {
        let scanner = Arc::clone(&self.scanner);
        let root = self.source_root.clone();

        let files = tokio::task::spawn_blocking(move || scanner.scan(&root))
            .await
            .context("scanner task failed")?
            .with_context(|| format!("scanning {}", self.source_root.display()))?;

        if files.is_empty() {
            tracing::debug!(source = %self.source_root.display(), "No new files");
            return Ok(CycleStats::default());
        }

        tracing::info!(files = files.len(), "Cycle started");
        let stats = self.scheduler.run_cycle(files, cancel).await;
        tracing::info!("Cycle finished: {}", stats.display_string());

        Ok(stats)
    }

    /// Run cycles until `cancel` fires
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            source = %self.source_root.display(),
            interval_secs = self.scan_interval.as_secs(),
            "Ingestion service started"
        );

        while !cancel.is_cancelled() {
            let cycle_start = Instant::now();

            let pause = match self.run_cycle(&cancel).await {
                Ok(stats) if stats.store_faulted() => {
                    tracing::warn!(
                        deferred = stats.totals.deferred,
                        retry_secs = self.store_retry.as_secs(),
                        "Store faults this cycle, retrying deferred files"
                    );
                    self.store_retry
                }
                Ok(_) => self.scan_interval,
                Err(e) => {
                    tracing::error!(
                        error = format!("{:#}", e),
                        backoff_secs = self.fault_backoff.as_secs(),
                        "Cycle failed"
                    );
                    self.fault_backoff
                }
            };

            tracing::debug!(
                cycle_ms = cycle_start.elapsed().as_millis() as u64,
                pause_secs = pause.as_secs(),
                "Sleeping until next cycle"
            );

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        tracing::info!("Ingestion service stopped");
    }
}
