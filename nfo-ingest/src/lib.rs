//! nfo-ingest - fiscal invoice ingestion
//!
//! Watches a source tree for deposited NF-e documents, registers each one
//! exactly once in the SQLite registry and files it under
//! `<issuer>/<type>/<year>/<month>/<day>` in the destination tree. Files
//! that cannot be processed are moved to a quarantine area by reason.

pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use error::{IngestError, IngestResult};
pub use services::IngestService;
