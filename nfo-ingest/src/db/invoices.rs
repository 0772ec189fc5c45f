//! Invoice registration store
//!
//! The insert is the moment of truth for deduplication: the in-memory index
//! is only a pre-filter, and a UNIQUE violation on `access_key` or
//! `content_hash` here is what finally marks a document as a duplicate.

use crate::utils::{begin_monitored, retry_on_lock};
use chrono::NaiveDate;
use nfo_common::db::{InvoiceRow, STATUS_PROCESSED};
use nfo_common::{Error, Result};
use sqlx::SqlitePool;

/// Invoice about to be registered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInvoice {
    pub access_key: String,
    pub content_hash: String,
    pub issuer_id: i64,
    pub received_date: NaiveDate,
    pub issue_date: NaiveDate,
    pub document_type: String,
    /// Intended location; written before the physical move
    pub destination_path: String,
}

/// Which uniqueness constraint rejected an insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueConflict {
    AccessKey,
    ContentHash,
    /// SQLite did not name the column
    Unknown,
}

/// Outcome of [`RegistrationStore::register`]
///
/// Store faults are the `Err` side of the surrounding `Result`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Inserted { id: i64 },
    AlreadyExists { conflict: UniqueConflict },
}

/// Totals reported at startup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySummary {
    pub invoices: i64,
    pub issuers: i64,
    /// (document type label, count), ordered by label
    pub by_document_type: Vec<(String, i64)>,
}

/// Persistent invoice registry
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct RegistrationStore {
    db: SqlitePool,
    max_lock_wait_ms: u64,
}

impl RegistrationStore {
    pub fn new(db: SqlitePool, max_lock_wait_ms: u64) -> Self {
        Self {
            db,
            max_lock_wait_ms,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    /// Insert an invoice unless its access key or content hash is known
    ///
    /// Runs in one transaction that first confirms the issuer row, so an
    /// invoice can never commit against a missing issuer. Lock contention is
    /// retried; anything else is returned as a store fault.
    pub async fn register(&self, invoice: &NewInvoice) -> Result<Registration> {
        retry_on_lock("invoice registration", self.max_lock_wait_ms, || {
            self.try_register(invoice)
        })
        .await
    }

    async fn try_register(&self, invoice: &NewInvoice) -> Result<Registration> {
        let mut tx = begin_monitored(&self.db, "registration_store::register").await?;

        let issuer_exists: Option<i64> = sqlx::query_scalar("SELECT id FROM issuers WHERE id = ?")
            .bind(invoice.issuer_id)
            .fetch_optional(tx.conn()?)
            .await?;
        if issuer_exists.is_none() {
            tx.rollback().await?;
            return Err(Error::NotFound(format!("issuer {}", invoice.issuer_id)));
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO invoices (
                access_key, content_hash, issuer_id, received_date,
                issue_date, document_type, destination_path, status
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&invoice.access_key)
        .bind(&invoice.content_hash)
        .bind(invoice.issuer_id)
        .bind(invoice.received_date.format("%Y-%m-%d").to_string())
        .bind(invoice.issue_date.format("%Y-%m-%d").to_string())
        .bind(&invoice.document_type)
        .bind(&invoice.destination_path)
        .bind(STATUS_PROCESSED)
        .execute(tx.conn()?)
        .await
        .map_err(Error::from);

        match inserted {
            Ok(result) => {
                let id = result.last_insert_rowid();
                tx.commit().await?;
                tracing::debug!(
                    access_key = %invoice.access_key,
                    invoice_id = id,
                    "Invoice registered"
                );
                Ok(Registration::Inserted { id })
            }
            Err(err) if err.is_unique_violation() => {
                tx.rollback().await?;
                let conflict = unique_conflict(&err);
                tracing::debug!(
                    access_key = %invoice.access_key,
                    ?conflict,
                    "Invoice already registered"
                );
                Ok(Registration::AlreadyExists { conflict })
            }
            Err(err) => Err(err),
        }
    }

    /// Delete a registration (compensation after a failed relocation)
    ///
    /// Returns whether a row was removed.
    pub async fn rollback(&self, access_key: &str) -> Result<bool> {
        retry_on_lock("invoice rollback", self.max_lock_wait_ms, || async move {
            let result = sqlx::query("DELETE FROM invoices WHERE access_key = ?")
                .bind(access_key)
                .execute(&self.db)
                .await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    /// Every persisted (content hash, access key) pair, for seeding the dedup index
    pub async fn load_dedup_keys(&self) -> Result<Vec<(String, String)>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT content_hash, access_key FROM invoices")
                .fetch_all(&self.db)
                .await?;
        Ok(rows)
    }

    pub async fn find_by_access_key(&self, access_key: &str) -> Result<Option<InvoiceRow>> {
        let row = sqlx::query_as::<_, InvoiceRow>(
            r#"
            SELECT id, access_key, content_hash, issuer_id, received_date, issue_date,
                   document_type, destination_path, status, created_at
            FROM invoices
            WHERE access_key = ?
            "#,
        )
        .bind(access_key)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    pub async fn count_invoices(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    /// Invoice and issuer totals plus per-type counts
    pub async fn summary(&self) -> Result<RegistrySummary> {
        let invoices = self.count_invoices().await?;
        let issuers = crate::db::issuers::count_issuers(&self.db).await?;
        let by_document_type: Vec<(String, i64)> = sqlx::query_as(
            "SELECT document_type, COUNT(*) FROM invoices GROUP BY document_type ORDER BY document_type",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(RegistrySummary {
            invoices,
            issuers,
            by_document_type,
        })
    }
}

/// Read the violated column out of SQLite's message
/// (`UNIQUE constraint failed: invoices.access_key`)
fn unique_conflict(err: &Error) -> UniqueConflict {
    let msg = err.to_string();
    if msg.contains("invoices.access_key") {
        UniqueConflict::AccessKey
    } else if msg.contains("invoices.content_hash") {
        UniqueConflict::ContentHash
    } else {
        UniqueConflict::Unknown
    }
}
