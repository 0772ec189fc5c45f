//! Batch scheduling
//!
//! Splits a cycle's file list into fixed-size batches and runs each batch on
//! a bounded worker pool. A batch boundary is a synchronization point: all
//! files of batch k reach a terminal outcome before batch k+1 starts and
//! before batch k's counts are logged.
//!
//! Each file runs in its own task so a panicking worker only loses its own
//! file (quarantined as `unexpected`); siblings and the batch carry on.

pub mod statistics;

pub use statistics::{BatchStats, CycleStats};

use crate::models::{FileOutcome, QuarantineReason};
use crate::services::ingestion_worker::IngestionWorker;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Runs discovered files through the worker pool, batch by batch
#[derive(Clone)]
pub struct BatchScheduler {
    worker: Arc<IngestionWorker>,
    workers: usize,
    batch_size: usize,
}

impl BatchScheduler {
    pub fn new(worker: Arc<IngestionWorker>, workers: usize, batch_size: usize) -> Self {
        Self {
            worker,
            workers: workers.max(1),
            batch_size: batch_size.max(1),
        }
    }

    /// Process every file, stopping between batches when cancelled
    pub async fn run_cycle(&self, files: Vec<PathBuf>, cancel: &CancellationToken) -> CycleStats {
        let total = files.len();
        let batch_count = total.div_ceil(self.batch_size);
        let started = Instant::now();
        let processed = Arc::new(AtomicUsize::new(0));
        let mut cycle = CycleStats::new(total);

        for (index, batch) in files.chunks(self.batch_size).enumerate() {
            if cancel.is_cancelled() {
                tracing::info!(
                    batches_done = index,
                    batches_total = batch_count,
                    "Cycle cancelled between batches"
                );
                break;
            }

            let outcomes = self.run_batch(batch.to_vec()).await;
            let stats = BatchStats::from_outcomes(&outcomes);
            let done = processed.fetch_add(outcomes.len(), Ordering::Relaxed) + outcomes.len();
            let elapsed = started.elapsed().as_secs_f64();

            tracing::info!(
                "batch {}/{}: {} | {}/{} ({:.1} files/s)",
                index + 1,
                batch_count,
                stats.display_string(),
                done,
                total,
                statistics::rate(done, elapsed)
            );

            cycle.add_batch(&stats);
        }

        cycle.finish(started.elapsed());
        cycle
    }

    /// Process one batch to completion; outcomes are in completion order
    pub async fn run_batch(&self, batch: Vec<PathBuf>) -> Vec<FileOutcome> {
        stream::iter(batch)
            .map(|path| {
                let worker = Arc::clone(&self.worker);
                async move {
                    let task_path = path.clone();
                    let task_worker = Arc::clone(&worker);
                    let handle =
                        tokio::spawn(async move { task_worker.process(&task_path).await });

                    match handle.await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            tracing::error!(
                                file = %path.display(),
                                error = %e,
                                "Worker fault, quarantining file"
                            );
                            worker.quarantine(&path, QuarantineReason::Unexpected).await
                        }
                    }
                }
            })
            .buffer_unordered(self.workers)
            .collect()
            .await
    }
}
