//! Per-file terminal outcomes
//!
//! Every discovered file ends in exactly one of these states; the batch
//! statistics are derived from them.

use std::fmt;
use std::path::PathBuf;

/// Which duplicate check rejected the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DuplicateKind {
    /// Content fingerprint already in the dedup index
    ContentHash,
    /// Access key already in the dedup index
    AccessKey,
    /// Store rejected the insert on a uniqueness constraint
    Store,
}

impl fmt::Display for DuplicateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DuplicateKind::ContentHash => "content_hash",
            DuplicateKind::AccessKey => "access_key",
            DuplicateKind::Store => "store",
        };
        f.write_str(s)
    }
}

/// Quarantine partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuarantineReason {
    /// File could not be read while hashing
    ReadError,
    /// Extractor could not parse the document
    Unparsable,
    /// Relocation failed after registration (registration rolled back)
    MoveFailure,
    /// Worker fault outside the expected taxonomy
    Unexpected,
}

impl QuarantineReason {
    /// Directory name under the quarantine root
    pub fn label(&self) -> &'static str {
        match self {
            QuarantineReason::ReadError => "read_error",
            QuarantineReason::Unparsable => "unparsable",
            QuarantineReason::MoveFailure => "move_failure",
            QuarantineReason::Unexpected => "unexpected",
        }
    }
}

impl fmt::Display for QuarantineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Terminal state of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Registered and relocated
    Succeeded {
        invoice_id: i64,
        destination: PathBuf,
        /// Destination was already occupied; existing file kept, source removed
        already_present: bool,
    },
    /// Already represented in the registry; source removed
    Duplicate(DuplicateKind),
    /// Moved to the quarantine area under the given reason
    Quarantined(QuarantineReason),
    /// Rejected for the given reason, but the quarantine move itself failed
    /// (typically the file vanished); nothing was moved
    QuarantineFailed(QuarantineReason),
    /// Store fault before any destructive step; file left in place
    Deferred(String),
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FileOutcome::Succeeded { .. })
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, FileOutcome::Duplicate(_))
    }

    /// Rejected and deferred files all count as errors
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            FileOutcome::Quarantined(_)
                | FileOutcome::QuarantineFailed(_)
                | FileOutcome::Deferred(_)
        )
    }
}
