//! Row models for the registry tables

use serde::{Deserialize, Serialize};

/// Default status written for a registered invoice
pub const STATUS_PROCESSED: &str = "PROCESSED";

/// Issuer row
///
/// `tax_id` is the immutable natural key; `name` always holds the most
/// recently observed standardized name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Issuer {
    pub id: i64,
    pub tax_id: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Invoice row
///
/// Dates are stored as ISO-8601 (`YYYY-MM-DD`) text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct InvoiceRow {
    pub id: i64,
    pub access_key: String,
    pub content_hash: String,
    pub issuer_id: i64,
    pub received_date: String,
    pub issue_date: String,
    pub document_type: String,
    pub destination_path: String,
    pub status: String,
    pub created_at: String,
}
