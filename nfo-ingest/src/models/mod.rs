//! Data models for nfo-ingest
//!
//! - Extracted document fields and document types
//! - Per-file terminal outcomes

pub mod outcome;
pub mod record;

pub use outcome::{DuplicateKind, FileOutcome, QuarantineReason};
pub use record::{DocumentType, ExtractedRecord, FinalizedRecord};
