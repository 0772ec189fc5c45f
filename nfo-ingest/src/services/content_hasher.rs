//! Content fingerprinting
//!
//! SHA-256 over file bytes only; path and metadata never enter the digest,
//! so renamed copies of a document fingerprint identically.

use crate::error::{IngestError, IngestResult};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Read buffer size; files are streamed, never loaded whole
const CHUNK_SIZE: usize = 64 * 1024;

/// Streaming content hasher
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHasher;

impl ContentHasher {
    pub fn new() -> Self {
        Self
    }

    /// Hex-encoded SHA-256 of the file content
    ///
    /// Runs on the blocking pool. A vanished or unreadable file is a
    /// [`IngestError::Read`]; a failed blocking task is `Unexpected`.
    pub async fn hash(&self, file_path: &Path) -> IngestResult<String> {
        let path_buf = file_path.to_path_buf();

        let hash = tokio::task::spawn_blocking(move || Self::hash_blocking(&path_buf))
            .await
            .map_err(|e| IngestError::Unexpected(format!("Hash task failed: {}", e)))??;

        tracing::debug!(path = %file_path.display(), hash = %hash, "Calculated hash");

        Ok(hash)
    }

    /// Synchronous variant of [`ContentHasher::hash`]
    pub fn hash_blocking(file_path: &Path) -> IngestResult<String> {
        let read_error = |source: std::io::Error| IngestError::Read {
            path: file_path.to_path_buf(),
            source,
        };

        let mut file = File::open(file_path).map_err(read_error)?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; CHUNK_SIZE];

        loop {
            let bytes_read = file.read(&mut buffer).map_err(read_error)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    }
}
