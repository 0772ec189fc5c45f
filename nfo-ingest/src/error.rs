//! Error types for nfo-ingest
//!
//! Per-file failures are classified so the worker can pick the terminal
//! outcome: read and parse failures quarantine the file, store faults leave
//! it in place for the next cycle, relocation faults roll back and quarantine.

use std::path::PathBuf;
use thiserror::Error;

/// Per-file ingestion error
#[derive(Debug, Error)]
pub enum IngestError {
    /// File vanished or could not be read
    #[error("Read error {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Document does not match the expected schema
    #[error("Unparsable document {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    /// Registry store unavailable or failing (transient)
    #[error("Store fault: {0}")]
    Store(#[from] nfo_common::Error),

    /// File could not be moved after registration
    #[error("Relocation failed {path}: {source}")]
    Relocation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Anything else (task panic, join failure)
    #[error("Unexpected fault: {0}")]
    Unexpected(String),
}

impl IngestError {
    pub fn parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        IngestError::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for per-file operations
pub type IngestResult<T> = Result<T, IngestError>;
