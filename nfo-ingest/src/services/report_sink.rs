//! Finalized-record reporting
//!
//! A sink is told about every registered and relocated document. Delivery is
//! best-effort: `submit` never blocks ingestion and sink failures never turn
//! into file outcomes.

use crate::models::FinalizedRecord;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

/// Default channel capacity for [`JsonLinesReportSink`]
pub const DEFAULT_REPORT_CAPACITY: usize = 1024;

/// One-way receiver of finalized records
pub trait ReportSink: Send + Sync {
    /// Hand a record over; must return promptly
    fn submit(&self, record: FinalizedRecord);
}

/// Appends one JSON object per line to a report file
///
/// Records are queued on a bounded channel and written by a background task.
/// A full queue drops the record with a warning.
pub struct JsonLinesReportSink {
    path: PathBuf,
    tx: Mutex<Option<mpsc::Sender<FinalizedRecord>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl JsonLinesReportSink {
    /// Start the writer task (requires a running tokio runtime)
    pub fn spawn(path: impl Into<PathBuf>, capacity: usize) -> Self {
        let path = path.into();
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let writer = tokio::spawn(write_loop(path.clone(), rx));

        tracing::info!(path = %path.display(), "Report sink started");

        Self {
            path,
            tx: Mutex::new(Some(tx)),
            writer: Mutex::new(Some(writer)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stop accepting records and wait for queued ones to be written
    pub async fn close(&self) {
        let tx = self.tx.lock().unwrap_or_else(|p| p.into_inner()).take();
        drop(tx);

        let writer = self.writer.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(handle) = writer {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Report writer task failed");
            }
        }
    }
}

impl ReportSink for JsonLinesReportSink {
    fn submit(&self, record: FinalizedRecord) {
        let guard = self.tx.lock().unwrap_or_else(|p| p.into_inner());
        let Some(tx) = guard.as_ref() else {
            tracing::debug!(access_key = %record.access_key, "Report sink closed, record dropped");
            return;
        };

        match tx.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(record)) => {
                tracing::warn!(access_key = %record.access_key, "Report queue full, record dropped");
            }
            Err(TrySendError::Closed(record)) => {
                tracing::warn!(access_key = %record.access_key, "Report writer stopped, record dropped");
            }
        }
    }
}

async fn write_loop(path: PathBuf, mut rx: mpsc::Receiver<FinalizedRecord>) {
    while let Some(record) = rx.recv().await {
        if let Err(e) = append_record(&path, &record).await {
            tracing::warn!(
                path = %path.display(),
                access_key = %record.access_key,
                error = %e,
                "Failed to write report record"
            );
        }
    }
    tracing::debug!(path = %path.display(), "Report writer finished");
}

async fn append_record(path: &Path, record: &FinalizedRecord) -> std::io::Result<()> {
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');

    // Reopened per record so an externally rotated file is picked up
    let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
    file.write_all(&line).await?;
    file.flush().await
}
