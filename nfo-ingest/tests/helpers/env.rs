//! Temporary ingestion environment
//!
//! Source, destination and quarantine folders plus a file-backed registry
//! database, all inside one TempDir.

use nfo_common::config::ConfigLayer;
use nfo_common::IngestConfig;
use nfo_ingest::db::RegistrationStore;
use nfo_ingest::services::{
    BatchScheduler, DedupIndex, DestinationResolver, DocumentExtractor, IngestionWorker,
    IssuerRegistry, NfeXmlExtractor, Relocator, ReportSink,
};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestEnv {
    _temp_dir: TempDir,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub quarantine: PathBuf,
    pub db_path: PathBuf,
    pub pool: SqlitePool,
    pub store: RegistrationStore,
    pub dedup: Arc<DedupIndex>,
    pub issuers: Arc<IssuerRegistry>,
}

impl TestEnv {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("inbox");
        let destination = temp_dir.path().join("organized");
        let quarantine = destination.join("_ERRORS");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::create_dir_all(&quarantine).unwrap();

        let db_path = temp_dir.path().join("registry.db");
        let pool = nfo_common::db::init_database(&db_path, 100).await.unwrap();

        Self {
            store: RegistrationStore::new(pool.clone(), 5000),
            dedup: Arc::new(DedupIndex::new()),
            issuers: Arc::new(IssuerRegistry::new(pool.clone(), 5000)),
            _temp_dir: temp_dir,
            source,
            destination,
            quarantine,
            db_path,
            pool,
        }
    }

    pub fn config(&self) -> IngestConfig {
        IngestConfig::from_layer(ConfigLayer {
            source_root: Some(self.source.clone()),
            destination_root: Some(self.destination.clone()),
            quarantine_root: Some(self.quarantine.clone()),
            database_path: Some(self.db_path.clone()),
            workers: Some(4),
            batch_size: Some(3),
            scan_interval_secs: Some(1),
            store_retry_secs: Some(1),
            fault_backoff_secs: Some(1),
            max_lock_wait_ms: Some(5000),
            busy_timeout_ms: Some(100),
            ..ConfigLayer::default()
        })
        .unwrap()
    }

    /// Write a file into the source folder
    pub fn deposit(&self, name: &str, content: &str) -> PathBuf {
        let path = self.source.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn worker(&self) -> IngestionWorker {
        self.worker_with(Arc::new(NfeXmlExtractor::new()))
    }

    pub fn worker_with(&self, extractor: Arc<dyn DocumentExtractor>) -> IngestionWorker {
        IngestionWorker::new(
            extractor,
            Arc::clone(&self.dedup),
            Arc::clone(&self.issuers),
            self.store.clone(),
            DestinationResolver::new(&self.destination),
            Relocator::new(&self.quarantine),
        )
    }

    pub fn worker_reporting(&self, sink: Arc<dyn ReportSink>) -> IngestionWorker {
        self.worker().with_report_sink(sink)
    }

    pub fn scheduler(&self, workers: usize, batch_size: usize) -> BatchScheduler {
        BatchScheduler::new(Arc::new(self.worker()), workers, batch_size)
    }

    /// Files directly or indirectly under `dir`
    pub fn files_under(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect();
        files.sort();
        files
    }

    /// Destination files, excluding the quarantine area
    pub fn organized_files(&self) -> Vec<PathBuf> {
        Self::files_under(&self.destination)
            .into_iter()
            .filter(|p| !p.starts_with(&self.quarantine))
            .collect()
    }

    pub fn quarantined(&self, label: &str) -> Vec<PathBuf> {
        Self::files_under(&self.quarantine.join(label))
    }
}
