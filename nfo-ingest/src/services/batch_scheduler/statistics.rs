//! Batch and cycle statistics
//!
//! Counts are derived from per-file outcomes after each batch; nothing here
//! is shared between workers.

use crate::models::FileOutcome;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome counts for one batch
///
/// Display: "ok N | dup N | err N"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    /// Registered and relocated
    pub succeeded: usize,
    /// Of `succeeded`, destination already occupied
    pub already_present: usize,
    /// Discarded as already registered
    pub duplicates: usize,
    /// Quarantined, failed to quarantine, or deferred
    pub errors: usize,
    /// Of `errors`, rejected files the quarantine move did not reach
    pub quarantine_failed: usize,
    /// Of `errors`, store faults (file left in place)
    pub deferred: usize,
}

impl BatchStats {
    pub fn record(&mut self, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Succeeded {
                already_present, ..
            } => {
                self.succeeded += 1;
                if *already_present {
                    self.already_present += 1;
                }
            }
            FileOutcome::Duplicate(_) => self.duplicates += 1,
            FileOutcome::Quarantined(_) => self.errors += 1,
            FileOutcome::QuarantineFailed(_) => {
                self.errors += 1;
                self.quarantine_failed += 1;
            }
            FileOutcome::Deferred(_) => {
                self.errors += 1;
                self.deferred += 1;
            }
        }
    }

    pub fn from_outcomes<'a>(outcomes: impl IntoIterator<Item = &'a FileOutcome>) -> Self {
        let mut stats = Self::default();
        for outcome in outcomes {
            stats.record(outcome);
        }
        stats
    }

    pub fn processed(&self) -> usize {
        self.succeeded + self.duplicates + self.errors
    }

    pub fn merge(&mut self, other: &BatchStats) {
        self.succeeded += other.succeeded;
        self.already_present += other.already_present;
        self.duplicates += other.duplicates;
        self.errors += other.errors;
        self.quarantine_failed += other.quarantine_failed;
        self.deferred += other.deferred;
    }

    pub fn store_faulted(&self) -> bool {
        self.deferred > 0
    }

    pub fn display_string(&self) -> String {
        format!(
            "ok {} | dup {} | err {}",
            self.succeeded, self.duplicates, self.errors
        )
    }
}

/// Totals for one scan cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleStats {
    /// Files found by the scanner
    pub discovered: usize,
    /// Batches run (may stop early on cancellation)
    pub batches: usize,
    pub totals: BatchStats,
    pub elapsed_secs: f64,
}

impl CycleStats {
    pub fn new(discovered: usize) -> Self {
        Self {
            discovered,
            ..Self::default()
        }
    }

    pub fn add_batch(&mut self, batch: &BatchStats) {
        self.batches += 1;
        self.totals.merge(batch);
    }

    pub fn finish(&mut self, elapsed: Duration) {
        self.elapsed_secs = elapsed.as_secs_f64();
    }

    pub fn store_faulted(&self) -> bool {
        self.totals.store_faulted()
    }

    /// Files per second over the whole cycle
    pub fn rate(&self) -> f64 {
        rate(self.totals.processed(), self.elapsed_secs)
    }

    pub fn display_string(&self) -> String {
        format!(
            "{} files in {} batches: {} ({:.1} files/s)",
            self.discovered,
            self.batches,
            self.totals.display_string(),
            self.rate()
        )
    }
}

/// Throughput helper; zero when no time has elapsed
pub fn rate(processed: usize, elapsed_secs: f64) -> f64 {
    if elapsed_secs > 0.0 {
        processed as f64 / elapsed_secs
    } else {
        0.0
    }
}
