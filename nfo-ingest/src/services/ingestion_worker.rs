//! Per-file ingestion
//!
//! Drives one discovered file to a terminal [`FileOutcome`]:
//!
//! ```text
//! hash → content precheck → extract → key precheck → resolve issuer
//!      → derive destination → register → relocate → report
//! ```
//!
//! **Ordering:** the registry row is committed before the file moves. If the
//! move fails the row is deleted again and the dedup index entry evicted, so
//! the registry never points at a file that is not in the destination tree.
//!
//! **Store faults** (including issuer resolution) happen before any
//! destructive step; the file is left where it is and retried next cycle.

use crate::db::{NewInvoice, Registration, RegistrationStore, UniqueConflict};
use crate::error::IngestError;
use crate::models::{
    DuplicateKind, ExtractedRecord, FileOutcome, FinalizedRecord, QuarantineReason,
};
use crate::services::content_hasher::ContentHasher;
use crate::services::dedup_index::DedupIndex;
use crate::services::destination_resolver::DestinationResolver;
use crate::services::document_extractor::DocumentExtractor;
use crate::services::issuer_registry::IssuerRegistry;
use crate::services::relocator::{Relocation, Relocator};
use crate::services::report_sink::ReportSink;
use chrono::{Local, NaiveDate};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Shared, stateless per-file processor
pub struct IngestionWorker {
    hasher: ContentHasher,
    extractor: Arc<dyn DocumentExtractor>,
    dedup: Arc<DedupIndex>,
    issuers: Arc<IssuerRegistry>,
    store: RegistrationStore,
    resolver: DestinationResolver,
    relocator: Relocator,
    report: Option<Arc<dyn ReportSink>>,
}

impl IngestionWorker {
    pub fn new(
        extractor: Arc<dyn DocumentExtractor>,
        dedup: Arc<DedupIndex>,
        issuers: Arc<IssuerRegistry>,
        store: RegistrationStore,
        resolver: DestinationResolver,
        relocator: Relocator,
    ) -> Self {
        Self {
            hasher: ContentHasher::new(),
            extractor,
            dedup,
            issuers,
            store,
            resolver,
            relocator,
            report: None,
        }
    }

    /// Deliver finalized records to `sink`
    pub fn with_report_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.report = Some(sink);
        self
    }

    /// Process one file to its terminal outcome
    pub async fn process(&self, path: &Path) -> FileOutcome {
        let content_hash = match self.hasher.hash(path).await {
            Ok(hash) => hash,
            Err(e) => return self.quarantine_for(path, &e).await,
        };

        if self.dedup.contains(&content_hash) {
            return self.discard(path, DuplicateKind::ContentHash).await;
        }

        let record = match self.extract(path).await {
            Ok(record) => record,
            Err(e) => return self.quarantine_for(path, &e).await,
        };

        if self.dedup.contains_key(&record.access_key) {
            return self.discard(path, DuplicateKind::AccessKey).await;
        }

        self.register_and_relocate(path, content_hash, record, Local::now().date_naive())
            .await
    }

    async fn extract(&self, path: &Path) -> Result<ExtractedRecord, IngestError> {
        let extractor = Arc::clone(&self.extractor);
        let owned = path.to_path_buf();

        tokio::task::spawn_blocking(move || extractor.extract(&owned))
            .await
            .map_err(|e| IngestError::Unexpected(format!("extractor task failed: {}", e)))?
    }

    async fn register_and_relocate(
        &self,
        path: &Path,
        content_hash: String,
        record: ExtractedRecord,
        received_date: NaiveDate,
    ) -> FileOutcome {
        let resolution = match self
            .issuers
            .resolve(&record.issuer_tax_id, &record.issuer_name)
            .await
        {
            Ok(resolution) => resolution,
            Err(e) => return self.defer(path, "issuer resolution", e),
        };
        let issuer = resolution.issuer;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.xml", record.access_key));
        let destination = self.resolver.resolve(
            &issuer.name,
            &issuer.tax_id,
            &record.document_type,
            record.issue_date,
            &file_name,
        );

        let invoice = NewInvoice {
            access_key: record.access_key.clone(),
            content_hash: content_hash.clone(),
            issuer_id: issuer.id,
            received_date,
            issue_date: record.issue_date,
            document_type: record.document_type.label(),
            destination_path: destination.to_string_lossy().into_owned(),
        };

        let invoice_id = match self.store.register(&invoice).await {
            Ok(Registration::Inserted { id }) => id,
            Ok(Registration::AlreadyExists { conflict }) => {
                debug!(
                    file = %path.display(),
                    access_key = %record.access_key,
                    ?conflict,
                    "Registration rejected as duplicate"
                );
                // Only the value the store confirmed is known to be persisted
                match conflict {
                    UniqueConflict::AccessKey => self.dedup.record_key(&record.access_key),
                    UniqueConflict::ContentHash => self.dedup.record_hash(&content_hash),
                    UniqueConflict::Unknown => {}
                }
                return self.discard(path, DuplicateKind::Store).await;
            }
            Err(e) => return self.defer(path, "registration", e),
        };

        self.dedup.record(&content_hash, &record.access_key);

        let relocation = match self.relocator.relocate(path, &destination).await {
            Ok(relocation) => relocation,
            Err(e) => {
                error!(
                    file = %path.display(),
                    access_key = %record.access_key,
                    error = %e,
                    "Relocation failed, rolling back registration"
                );
                self.compensate(&content_hash, &record.access_key).await;
                return self.quarantine(path, QuarantineReason::MoveFailure).await;
            }
        };

        let already_present = matches!(relocation, Relocation::AlreadyPresent(_));
        info!(
            file = %path.display(),
            destination = %relocation.path().display(),
            invoice_id,
            already_present,
            "Invoice ingested"
        );

        if let Some(sink) = &self.report {
            sink.submit(FinalizedRecord {
                invoice_id,
                access_key: record.access_key,
                content_hash,
                issuer_tax_id: issuer.tax_id,
                issuer_name: issuer.name,
                document_type: invoice.document_type,
                issue_date: record.issue_date,
                received_date,
                destination_path: invoice.destination_path,
            });
        }

        FileOutcome::Succeeded {
            invoice_id,
            destination,
            already_present,
        }
    }

    /// Undo a registration whose file never reached the destination
    async fn compensate(&self, content_hash: &str, access_key: &str) {
        match self.store.rollback(access_key).await {
            Ok(true) => debug!(access_key = %access_key, "Registration rolled back"),
            Ok(false) => warn!(access_key = %access_key, "Rollback found no registration"),
            Err(e) => error!(
                access_key = %access_key,
                error = %e,
                "Rollback failed, registry may reference a missing file"
            ),
        }
        self.dedup.evict(content_hash, access_key);
    }

    /// Remove a duplicate source file
    async fn discard(&self, path: &Path, kind: DuplicateKind) -> FileOutcome {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!(file = %path.display(), kind = %kind, "Duplicate removed"),
            Err(e) => warn!(
                file = %path.display(),
                kind = %kind,
                error = %e,
                "Failed to remove duplicate"
            ),
        }
        FileOutcome::Duplicate(kind)
    }

    fn defer(&self, path: &Path, stage: &str, err: nfo_common::Error) -> FileOutcome {
        error!(
            file = %path.display(),
            stage,
            error = %err,
            "Store fault, file left for next cycle"
        );
        FileOutcome::Deferred(format!("{}: {}", stage, err))
    }

    async fn quarantine_for(&self, path: &Path, err: &IngestError) -> FileOutcome {
        let reason = match err {
            IngestError::Read { .. } => QuarantineReason::ReadError,
            IngestError::Parse { .. } => QuarantineReason::Unparsable,
            IngestError::Relocation { .. } => QuarantineReason::MoveFailure,
            IngestError::Store(_) | IngestError::Unexpected(_) => QuarantineReason::Unexpected,
        };
        warn!(file = %path.display(), reason = %reason, error = %err, "File rejected");

        self.quarantine(path, reason).await
    }

    /// Move a rejected file into the quarantine partition for `reason`
    ///
    /// Returns [`FileOutcome::QuarantineFailed`] when nothing was moved.
    pub async fn quarantine(&self, path: &Path, reason: QuarantineReason) -> FileOutcome {
        match self.relocator.quarantine(path, reason).await {
            Some(_) => FileOutcome::Quarantined(reason),
            None => {
                warn!(
                    file = %path.display(),
                    reason = %reason,
                    "Rejected file not quarantined"
                );
                FileOutcome::QuarantineFailed(reason)
            }
        }
    }
}
