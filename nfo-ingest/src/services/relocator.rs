//! File relocation and quarantine
//!
//! Relocation never overwrites: the destination is claimed with a hard link
//! (fails if the name exists) or, across devices, a `create_new` copy. The
//! source is only removed once the destination holds the content.
//!
//! Filesystem work runs on the blocking pool.

use crate::error::{IngestError, IngestResult};
use crate::models::QuarantineReason;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

/// Result of a successful relocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relocation {
    /// Content now at the destination, source removed
    Moved(PathBuf),
    /// Destination was occupied; existing file kept, source removed
    AlreadyPresent(PathBuf),
}

impl Relocation {
    pub fn path(&self) -> &Path {
        match self {
            Relocation::Moved(p) | Relocation::AlreadyPresent(p) => p,
        }
    }
}

/// Moves files into the destination tree or the quarantine area
#[derive(Debug, Clone)]
pub struct Relocator {
    quarantine_root: PathBuf,
}

impl Relocator {
    pub fn new(quarantine_root: impl Into<PathBuf>) -> Self {
        Self {
            quarantine_root: quarantine_root.into(),
        }
    }

    pub fn quarantine_root(&self) -> &Path {
        &self.quarantine_root
    }

    /// Move `source` to `destination` without clobbering
    pub async fn relocate(&self, source: &Path, destination: &Path) -> IngestResult<Relocation> {
        let source = source.to_path_buf();
        let destination = destination.to_path_buf();

        tokio::task::spawn_blocking(move || relocate_blocking(&source, &destination))
            .await
            .map_err(|e| IngestError::Unexpected(format!("relocation task failed: {}", e)))?
    }

    /// Move `source` under `<quarantine_root>/<reason>/`, replacing any occupant
    ///
    /// Failures are logged; returns the quarantine path when the move worked.
    pub async fn quarantine(&self, source: &Path, reason: QuarantineReason) -> Option<PathBuf> {
        let target_dir = self.quarantine_root.join(reason.label());
        let source_buf = source.to_path_buf();

        let result = tokio::task::spawn_blocking(move || quarantine_blocking(&source_buf, &target_dir))
            .await
            .map_err(|e| io::Error::new(ErrorKind::Other, e.to_string()))
            .and_then(|inner| inner);

        match result {
            Ok(path) => {
                tracing::warn!(
                    file = %source.display(),
                    quarantine = %path.display(),
                    reason = %reason,
                    "File quarantined"
                );
                Some(path)
            }
            Err(e) => {
                tracing::error!(
                    file = %source.display(),
                    reason = %reason,
                    error = %e,
                    "Quarantine failed, file left in place"
                );
                None
            }
        }
    }
}

fn relocate_blocking(source: &Path, destination: &Path) -> IngestResult<Relocation> {
    let fail = |source_err: io::Error| IngestError::Relocation {
        path: source.to_path_buf(),
        source: source_err,
    };

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(fail)?;
    }

    match fs::hard_link(source, destination) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return finish_already_present(source, destination).map_err(fail);
        }
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(fail(e)),
        Err(e) => {
            tracing::debug!(
                file = %source.display(),
                error = %e,
                "Hard link unavailable, copying"
            );
            match copy_new(source, destination) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    return finish_already_present(source, destination).map_err(fail);
                }
                Err(e) => return Err(fail(e)),
            }
        }
    }

    if let Err(e) = fs::remove_file(source) {
        // Keep exactly one copy: undo the claim so the source stays authoritative
        let _ = fs::remove_file(destination);
        return Err(fail(e));
    }

    Ok(Relocation::Moved(destination.to_path_buf()))
}

fn finish_already_present(source: &Path, destination: &Path) -> io::Result<Relocation> {
    tracing::warn!(
        file = %source.display(),
        destination = %destination.display(),
        "Destination already exists, keeping existing file"
    );
    fs::remove_file(source)?;
    Ok(Relocation::AlreadyPresent(destination.to_path_buf()))
}

/// Copy into a name that must not exist yet; removes partial output on failure
fn copy_new(source: &Path, destination: &Path) -> io::Result<()> {
    let mut reader = File::open(source)?;
    let mut writer = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(destination)?;

    let copied = io::copy(&mut reader, &mut writer).and_then(|_| writer.sync_all());
    if let Err(e) = copied {
        drop(writer);
        let _ = fs::remove_file(destination);
        return Err(e);
    }
    Ok(())
}

fn quarantine_blocking(source: &Path, target_dir: &Path) -> io::Result<PathBuf> {
    let file_name = source
        .file_name()
        .ok_or_else(|| io::Error::new(ErrorKind::InvalidInput, "path has no file name"))?;

    fs::create_dir_all(target_dir)?;
    let target = target_dir.join(file_name);

    if target.exists() {
        fs::remove_file(&target)?;
    }

    if fs::rename(source, &target).is_err() {
        // Different filesystem
        fs::copy(source, &target)?;
        fs::remove_file(source)?;
    }

    Ok(target)
}
