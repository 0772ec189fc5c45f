//! Ingestion pipeline services
//!
//! Bottom-up: hashing, extraction, issuer and dedup state, destination
//! layout and relocation, then the per-file worker, the batch scheduler and
//! the cycle driver on top.

pub mod batch_scheduler;
pub mod content_hasher;
pub mod dedup_index;
pub mod destination_resolver;
pub mod document_extractor;
pub mod file_scanner;
pub mod ingest_service;
pub mod ingestion_worker;
pub mod issuer_registry;
pub mod relocator;
pub mod report_sink;

pub use batch_scheduler::{BatchScheduler, BatchStats, CycleStats};
pub use content_hasher::ContentHasher;
pub use dedup_index::DedupIndex;
pub use destination_resolver::{sanitize_component, DestinationResolver};
pub use document_extractor::{DocumentExtractor, NfeXmlExtractor};
pub use file_scanner::{FileScanner, ScanError};
pub use ingest_service::IngestService;
pub use ingestion_worker::IngestionWorker;
pub use issuer_registry::{standardize_name, IssuerIdentity, IssuerRegistry, IssuerResolution};
pub use relocator::{Relocation, Relocator};
pub use report_sink::{JsonLinesReportSink, ReportSink, DEFAULT_REPORT_CAPACITY};
