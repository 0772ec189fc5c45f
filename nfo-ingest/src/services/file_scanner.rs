//! Source tree scanner
//!
//! Recursive discovery of deposited documents. Symlinks are not followed,
//! system/hidden entries are skipped, and configured roots nested inside the
//! source tree (destination, quarantine) are never descended into.

use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// Scanner errors (cycle-level faults)
#[derive(Debug, Error)]
pub enum ScanError {
    /// Specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Document file scanner
pub struct FileScanner {
    ignore_patterns: Vec<String>,
    excluded_roots: Vec<PathBuf>,
    extension: String,
}

impl Default for FileScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl FileScanner {
    /// Scanner for `.xml` files with the default ignore list
    pub fn new() -> Self {
        Self {
            ignore_patterns: vec![
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
                ".git".to_string(),
                ".svn".to_string(),
            ],
            excluded_roots: Vec::new(),
            extension: "xml".to_string(),
        }
    }

    /// Never descend into `root` (used for destination and quarantine roots)
    pub fn exclude(mut self, root: impl Into<PathBuf>) -> Self {
        self.excluded_roots.push(root.into());
        self
    }

    /// Scan `root_path` for documents, sorted by path
    pub fn scan(&self, root_path: &Path) -> Result<Vec<PathBuf>, ScanError> {
        if !root_path.exists() {
            return Err(ScanError::PathNotFound(root_path.to_path_buf()));
        }
        if !root_path.is_dir() {
            return Err(ScanError::NotADirectory(root_path.to_path_buf()));
        }

        let mut files = Vec::new();
        let excluded: Vec<PathBuf> = self.excluded_roots.iter().map(|r| resolved(r)).collect();

        let walker = WalkDir::new(root_path)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| self.should_process_entry(e, &excluded));

        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && self.has_document_extension(entry.path()) {
                        files.push(entry.path().to_path_buf());
                    }
                }
                Err(e) => {
                    // A file vanishing mid-walk is routine in a drop folder
                    tracing::warn!("Error accessing entry: {}", e);
                }
            }
        }

        files.sort();

        tracing::debug!(
            root = %root_path.display(),
            count = files.len(),
            "Scan complete"
        );

        Ok(files)
    }

    fn should_process_entry(&self, entry: &DirEntry, excluded: &[PathBuf]) -> bool {
        // Never filter the root itself
        if entry.depth() == 0 {
            return true;
        }

        let file_name = entry.file_name().to_string_lossy();
        if self.ignore_patterns.iter().any(|p| file_name == p.as_str()) {
            return false;
        }
        if file_name.starts_with('.') {
            return false;
        }

        // Compare real directories, not spellings (`..`, relative, symlinked)
        if entry.file_type().is_dir() && !excluded.is_empty() {
            let dir = resolved(entry.path());
            if excluded.iter().any(|root| *root == dir) {
                return false;
            }
        }

        true
    }

    fn has_document_extension(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(&self.extension))
            .unwrap_or(false)
    }
}

/// Canonical form of `path`, or the path as given when it cannot be resolved
fn resolved(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scan_finds_xml_recursively_case_insensitive() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("one.xml"), b"x").unwrap();
        fs::write(dir.path().join("a/two.XML"), b"x").unwrap();
        fs::write(dir.path().join("a/b/three.xml"), b"x").unwrap();
        fs::write(dir.path().join("a/notes.txt"), b"x").unwrap();

        let files = FileScanner::new().scan(dir.path()).unwrap();

        assert_eq!(files.len(), 3);
        assert!(files.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_scan_skips_hidden_and_excluded() {
        let dir = TempDir::new().unwrap();
        let quarantine = dir.path().join("_ERRORS");
        fs::create_dir_all(quarantine.join("unparsable")).unwrap();
        fs::create_dir_all(dir.path().join(".cache")).unwrap();
        fs::write(quarantine.join("unparsable/bad.xml"), b"x").unwrap();
        fs::write(dir.path().join(".cache/hidden.xml"), b"x").unwrap();
        fs::write(dir.path().join("good.xml"), b"x").unwrap();

        let files = FileScanner::new().exclude(&quarantine).scan(dir.path()).unwrap();

        assert_eq!(files, vec![dir.path().join("good.xml")]);
    }

    #[test]
    fn test_exclusion_matches_differently_spelled_root() {
        let dir = TempDir::new().unwrap();
        let organized = dir.path().join("organized");
        fs::create_dir_all(organized.join("ACME")).unwrap();
        fs::create_dir_all(dir.path().join("x")).unwrap();
        fs::write(organized.join("ACME/filed.xml"), b"x").unwrap();
        fs::write(dir.path().join("new.xml"), b"x").unwrap();

        let files = FileScanner::new()
            .exclude(dir.path().join("x/../organized"))
            .scan(dir.path())
            .unwrap();

        assert_eq!(files, vec![dir.path().join("new.xml")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_exclusion_matches_symlinked_root() {
        let dir = TempDir::new().unwrap();
        let organized = dir.path().join("organized");
        fs::create_dir_all(&organized).unwrap();
        fs::write(organized.join("filed.xml"), b"x").unwrap();

        let outside = TempDir::new().unwrap();
        let link = outside.path().join("dest");
        std::os::unix::fs::symlink(&organized, &link).unwrap();

        let files = FileScanner::new().exclude(&link).scan(dir.path()).unwrap();

        assert!(files.is_empty());
    }

    #[test]
    fn test_missing_root_is_error() {
        let dir = TempDir::new().unwrap();
        let result = FileScanner::new().scan(&dir.path().join("gone"));

        assert!(matches!(result, Err(ScanError::PathNotFound(_))));
    }
}
