//! Document records

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fiscal document type, derived from the model code (`ide/mod`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    /// Model 55
    Nfe,
    /// Model 65
    Nfce,
    /// Any other model code, kept raw
    Other(String),
}

impl DocumentType {
    /// Map a raw model code to a document type
    pub fn from_model_code(code: &str) -> Self {
        match code.trim() {
            "55" => DocumentType::Nfe,
            "65" => DocumentType::Nfce,
            other => DocumentType::Other(other.to_string()),
        }
    }

    /// Folder/database label
    ///
    /// Unknown codes fall back to `MOD<code>` (`MOD_UNKNOWN` when blank).
    pub fn label(&self) -> String {
        match self {
            DocumentType::Nfe => "NFE".to_string(),
            DocumentType::Nfce => "NFCE".to_string(),
            DocumentType::Other(code) if code.trim().is_empty() => "MOD_UNKNOWN".to_string(),
            DocumentType::Other(code) => format!("MOD{}", code.trim()),
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Normalized fields returned by a document extractor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    pub access_key: String,
    pub issuer_tax_id: String,
    /// Name as observed in the document (not yet standardized)
    pub issuer_name: String,
    pub document_type: DocumentType,
    pub issue_date: NaiveDate,
}

/// Registered and relocated record, as delivered to the reporting sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizedRecord {
    pub invoice_id: i64,
    pub access_key: String,
    pub content_hash: String,
    pub issuer_tax_id: String,
    pub issuer_name: String,
    pub document_type: String,
    pub issue_date: NaiveDate,
    pub received_date: NaiveDate,
    pub destination_path: String,
}
