//! Document fixtures and test doubles

use nfo_ingest::error::IngestResult;
use nfo_ingest::models::{ExtractedRecord, FinalizedRecord};
use nfo_ingest::services::{DocumentExtractor, NfeXmlExtractor, ReportSink};
use std::path::Path;
use std::sync::Mutex;

/// Minimal NF-e document
///
/// `key` is the 44-digit access key without the `NFe` prefix; `date` is
/// `YYYY-MM-DD`.
pub fn nfe_xml(key: &str, cnpj: &str, name: &str, model: &str, date: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<nfeProc xmlns="http://www.portalfiscal.inf.br/nfe" versao="4.00">
  <NFe>
    <infNFe Id="NFe{key}" versao="4.00">
      <ide>
        <mod>{model}</mod>
        <dhEmi>{date}T09:30:00-03:00</dhEmi>
      </ide>
      <emit>
        <CNPJ>{cnpj}</CNPJ>
        <xNome>{name}</xNome>
      </emit>
    </infNFe>
  </NFe>
</nfeProc>
"#
    )
}

/// Report sink that keeps every record in memory
#[derive(Default)]
pub struct CollectingSink {
    records: Mutex<Vec<FinalizedRecord>>,
}

impl CollectingSink {
    pub fn records(&self) -> Vec<FinalizedRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl ReportSink for CollectingSink {
    fn submit(&self, record: FinalizedRecord) {
        self.records.lock().unwrap().push(record);
    }
}

/// Real extractor that panics on files whose name contains `trigger`
pub struct PanickingExtractor {
    pub trigger: String,
}

impl DocumentExtractor for PanickingExtractor {
    fn extract(&self, path: &Path) -> IngestResult<ExtractedRecord> {
        let name = path.file_name().unwrap().to_string_lossy();
        if name.contains(&self.trigger) {
            panic!("extractor blew up on {}", name);
        }
        NfeXmlExtractor::new().extract(path)
    }
}
