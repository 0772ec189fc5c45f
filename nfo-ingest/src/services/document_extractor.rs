//! Document field extraction
//!
//! The pipeline only depends on [`DocumentExtractor`]. [`NfeXmlExtractor`]
//! reads the NF-e layout and ignores XML namespaces, so both the signed
//! `nfeProc` envelope and bare `NFe` documents work.

use crate::error::{IngestError, IngestResult};
use crate::models::{DocumentType, ExtractedRecord};
use chrono::NaiveDate;
use roxmltree::{Document, Node};
use std::path::Path;

/// Extracts normalized fields from a deposited document
///
/// Implementations are called from the blocking pool and must be
/// thread-safe. Schema mismatches are reported as [`IngestError::Parse`].
pub trait DocumentExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> IngestResult<ExtractedRecord>;
}

/// NF-e (model 55/65) XML reader
#[derive(Debug, Clone, Copy, Default)]
pub struct NfeXmlExtractor;

impl NfeXmlExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Parse an in-memory document; `path` is only used for error context
    pub fn extract_str(&self, path: &Path, text: &str) -> IngestResult<ExtractedRecord> {
        let doc = Document::parse(text)
            .map_err(|e| IngestError::parse(path, format!("malformed XML: {}", e)))?;

        let inf = doc
            .descendants()
            .find(|n| is_element(n, "infNFe"))
            .ok_or_else(|| IngestError::parse(path, "infNFe element not found"))?;

        let access_key = inf
            .attribute("Id")
            .map(strip_key_prefix)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| IngestError::parse(path, "infNFe/@Id missing"))?;

        let ide = child(&inf, "ide").ok_or_else(|| IngestError::parse(path, "ide not found"))?;
        let emit = child(&inf, "emit").ok_or_else(|| IngestError::parse(path, "emit not found"))?;

        let issue_date_text = child_text(&ide, "dhEmi")
            .or_else(|| child_text(&ide, "dEmi"))
            .ok_or_else(|| IngestError::parse(path, "issue date (dhEmi/dEmi) not found"))?;
        let issue_date = parse_issue_date(issue_date_text)
            .ok_or_else(|| IngestError::parse(path, format!("invalid issue date: {}", issue_date_text)))?;

        let document_type = DocumentType::from_model_code(child_text(&ide, "mod").unwrap_or(""));

        let issuer_tax_id = child_text(&emit, "CNPJ")
            .or_else(|| child_text(&emit, "CPF"))
            .ok_or_else(|| IngestError::parse(path, "emit/CNPJ not found"))?;
        let issuer_name = child_text(&emit, "xNome")
            .ok_or_else(|| IngestError::parse(path, "emit/xNome not found"))?;

        Ok(ExtractedRecord {
            access_key: access_key.to_string(),
            issuer_tax_id: issuer_tax_id.to_string(),
            issuer_name: issuer_name.to_string(),
            document_type,
            issue_date,
        })
    }
}

impl DocumentExtractor for NfeXmlExtractor {
    fn extract(&self, path: &Path) -> IngestResult<ExtractedRecord> {
        let bytes = std::fs::read(path).map_err(|source| IngestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let text = String::from_utf8_lossy(&bytes);
        self.extract_str(path, &text)
    }
}

fn is_element(node: &Node, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

fn child<'a, 'input>(node: &Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| is_element(n, name))
}

fn child_text<'a>(node: &Node<'a, '_>, name: &str) -> Option<&'a str> {
    child(node, name)
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn strip_key_prefix(id: &str) -> &str {
    let id = id.trim();
    match id.get(..3) {
        Some(prefix) if prefix.eq_ignore_ascii_case("nfe") => &id[3..],
        _ => id,
    }
}

/// `2024-03-01T10:00:00-03:00` or `2024-03-01` → date part
fn parse_issue_date(text: &str) -> Option<NaiveDate> {
    let date_part = text.split('T').next().unwrap_or(text);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<nfeProc xmlns="http://www.portalfiscal.inf.br/nfe" versao="4.00">
  <NFe>
    <infNFe Id="NFe35240312345678000199550010000012341000012345" versao="4.00">
      <ide>
        <mod>55</mod>
        <dhEmi>2024-03-01T10:15:00-03:00</dhEmi>
      </ide>
      <emit>
        <CNPJ>12345678000199</CNPJ>
        <xNome>Acme Ltda.</xNome>
      </emit>
    </infNFe>
  </NFe>
</nfeProc>"#;

    #[test]
    fn test_extracts_namespaced_document() {
        let record = NfeXmlExtractor::new()
            .extract_str(Path::new("a.xml"), SAMPLE)
            .unwrap();

        assert_eq!(record.access_key, "35240312345678000199550010000012341000012345");
        assert_eq!(record.issuer_tax_id, "12345678000199");
        assert_eq!(record.issuer_name, "Acme Ltda.");
        assert_eq!(record.document_type, DocumentType::Nfe);
        assert_eq!(record.issue_date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn test_legacy_date_and_unknown_model() {
        let xml = r#"<NFe><infNFe Id="NFe999"><ide><mod>57</mod><dEmi>2010-12-31</dEmi></ide>
            <emit><CNPJ>1</CNPJ><xNome>X</xNome></emit></infNFe></NFe>"#;

        let record = NfeXmlExtractor::new().extract_str(Path::new("b.xml"), xml).unwrap();

        assert_eq!(record.access_key, "999");
        assert_eq!(record.document_type.label(), "MOD57");
        assert_eq!(record.issue_date, NaiveDate::from_ymd_opt(2010, 12, 31).unwrap());
    }

    #[test]
    fn test_missing_emit_is_parse_error() {
        let xml = r#"<NFe><infNFe Id="NFe1"><ide><mod>55</mod><dhEmi>2024-01-01</dhEmi></ide></infNFe></NFe>"#;

        let result = NfeXmlExtractor::new().extract_str(Path::new("c.xml"), xml);
        assert!(matches!(result, Err(IngestError::Parse { .. })));
    }

    #[test]
    fn test_malformed_xml_is_parse_error() {
        let result = NfeXmlExtractor::new().extract_str(Path::new("d.xml"), "<NFe><infNFe>");
        assert!(matches!(result, Err(IngestError::Parse { .. })));
    }
}
