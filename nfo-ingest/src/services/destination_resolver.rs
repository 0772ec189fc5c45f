//! Destination path derivation
//!
//! Pure and deterministic: the same inputs always give the same path, which
//! is what lets a registered `destination_path` be re-derived and compared.
//!
//! Layout: `<root>/<NAME - TAXID>/<TYPE>/<YYYY>/<MM-YYYY>/<DD>/<file name>`

use crate::models::DocumentType;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// Characters not allowed inside a single path component
const INVALID_COMPONENT_CHARS: [char; 9] = ['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// Maps registered documents to their place in the destination tree
#[derive(Debug, Clone)]
pub struct DestinationResolver {
    root: PathBuf,
}

impl DestinationResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for a document (without the file name)
    pub fn resolve_dir(
        &self,
        issuer_name: &str,
        tax_id: &str,
        document_type: &DocumentType,
        issue_date: NaiveDate,
    ) -> PathBuf {
        self.root
            .join(issuer_folder(issuer_name, tax_id))
            .join(sanitize_component(&document_type.label()))
            .join(issue_date.format("%Y").to_string())
            .join(issue_date.format("%m-%Y").to_string())
            .join(issue_date.format("%d").to_string())
    }

    /// Full destination path for `file_name`
    pub fn resolve(
        &self,
        issuer_name: &str,
        tax_id: &str,
        document_type: &DocumentType,
        issue_date: NaiveDate,
        file_name: &str,
    ) -> PathBuf {
        self.resolve_dir(issuer_name, tax_id, document_type, issue_date)
            .join(sanitize_component(file_name))
    }
}

/// `"{name} - {tax id}"`, sanitized
pub fn issuer_folder(issuer_name: &str, tax_id: &str) -> String {
    sanitize_component(&format!("{} - {}", issuer_name, tax_id))
}

/// Drop path separators and reserved characters; never returns `.`/`..`
pub fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !INVALID_COMPONENT_CHARS.contains(c) && !c.is_control())
        .collect();
    let trimmed = cleaned.trim();

    match trimmed {
        "" | "." | ".." => "_".to_string(),
        other => other.to_string(),
    }
}
