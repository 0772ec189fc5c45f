//! Configuration loading and startup validation
//!
//! Each setting is resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`NFO_*`, parsed together with the command line)
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Source and destination roots have no default: both must be supplied and
//! must exist, otherwise startup fails.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default number of concurrent ingestion workers
pub const DEFAULT_WORKERS: usize = 8;
/// Default number of files per batch
pub const DEFAULT_BATCH_SIZE: usize = 200;
/// Default pause between scan cycles
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 30;
/// Default pause before retrying a cycle that hit a store fault
pub const DEFAULT_STORE_RETRY_SECS: u64 = 10;
/// Default pause after the cycle loop itself failed
pub const DEFAULT_FAULT_BACKOFF_SECS: u64 = 60;
/// Default upper bound for lock-retry loops
pub const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 5000;
/// Default SQLite busy timeout
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 250;
/// Quarantine folder name used when no quarantine root is configured
pub const DEFAULT_QUARANTINE_DIR: &str = "_ERRORS";

/// One configuration layer: every field optional
///
/// Used both for the TOML file and for command-line/environment overrides;
/// layers are merged with [`ConfigLayer::or`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigLayer {
    pub source_root: Option<PathBuf>,
    pub destination_root: Option<PathBuf>,
    pub quarantine_root: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub workers: Option<usize>,
    pub batch_size: Option<usize>,
    pub scan_interval_secs: Option<u64>,
    pub store_retry_secs: Option<u64>,
    pub fault_backoff_secs: Option<u64>,
    pub max_lock_wait_ms: Option<u64>,
    pub busy_timeout_ms: Option<u64>,
    pub report_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_path: Option<PathBuf>,
}

impl ConfigLayer {
    /// Fill every unset field of `self` from `lower`
    pub fn or(self, lower: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            source_root: self.source_root.or(lower.source_root),
            destination_root: self.destination_root.or(lower.destination_root),
            quarantine_root: self.quarantine_root.or(lower.quarantine_root),
            database_path: self.database_path.or(lower.database_path),
            workers: self.workers.or(lower.workers),
            batch_size: self.batch_size.or(lower.batch_size),
            scan_interval_secs: self.scan_interval_secs.or(lower.scan_interval_secs),
            store_retry_secs: self.store_retry_secs.or(lower.store_retry_secs),
            fault_backoff_secs: self.fault_backoff_secs.or(lower.fault_backoff_secs),
            max_lock_wait_ms: self.max_lock_wait_ms.or(lower.max_lock_wait_ms),
            busy_timeout_ms: self.busy_timeout_ms.or(lower.busy_timeout_ms),
            report_path: self.report_path.or(lower.report_path),
            log_level: self.log_level.or(lower.log_level),
            log_path: self.log_path.or(lower.log_path),
        }
    }
}

/// Fully resolved ingestion configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestConfig {
    /// Tree scanned for newly deposited documents
    pub source_root: PathBuf,
    /// Root of the organized destination tree
    pub destination_root: PathBuf,
    /// Root of the quarantine area, partitioned by failure reason
    pub quarantine_root: PathBuf,
    /// SQLite registry file
    pub database_path: PathBuf,
    pub workers: usize,
    pub batch_size: usize,
    pub scan_interval_secs: u64,
    pub store_retry_secs: u64,
    pub fault_backoff_secs: u64,
    pub max_lock_wait_ms: u64,
    pub busy_timeout_ms: u64,
    /// Optional JSON-lines file receiving finalized records
    pub report_path: Option<PathBuf>,
    pub log_level: String,
    /// Optional log file written alongside the console output
    pub log_path: Option<PathBuf>,
}

impl IngestConfig {
    /// Resolve a merged layer into a complete configuration
    ///
    /// Missing source or destination root is an error; everything else
    /// falls back to compiled defaults.
    pub fn from_layer(layer: ConfigLayer) -> Result<Self> {
        let source_root = layer
            .source_root
            .ok_or_else(|| Error::Config("source_root is not configured".to_string()))?;
        let destination_root = layer
            .destination_root
            .ok_or_else(|| Error::Config("destination_root is not configured".to_string()))?;

        let quarantine_root = layer
            .quarantine_root
            .unwrap_or_else(|| destination_root.join(DEFAULT_QUARANTINE_DIR));

        Ok(Self {
            source_root,
            destination_root,
            quarantine_root,
            database_path: layer.database_path.unwrap_or_else(default_database_path),
            workers: layer.workers.unwrap_or(DEFAULT_WORKERS),
            batch_size: layer.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            scan_interval_secs: layer.scan_interval_secs.unwrap_or(DEFAULT_SCAN_INTERVAL_SECS),
            store_retry_secs: layer.store_retry_secs.unwrap_or(DEFAULT_STORE_RETRY_SECS),
            fault_backoff_secs: layer.fault_backoff_secs.unwrap_or(DEFAULT_FAULT_BACKOFF_SECS),
            max_lock_wait_ms: layer.max_lock_wait_ms.unwrap_or(DEFAULT_MAX_LOCK_WAIT_MS),
            busy_timeout_ms: layer.busy_timeout_ms.unwrap_or(DEFAULT_BUSY_TIMEOUT_MS),
            report_path: layer.report_path,
            log_level: layer.log_level.unwrap_or_else(|| "info".to_string()),
            log_path: layer.log_path,
        })
    }

    /// Resolve configuration from overrides plus an optional TOML file
    ///
    /// When `config_file` is `None` the platform default location is tried;
    /// a missing default file is not an error, a missing explicit file is.
    pub fn load(overrides: ConfigLayer, config_file: Option<&Path>) -> Result<Self> {
        let file_layer = match config_file {
            Some(path) => load_toml_layer(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => load_toml_layer(&path)?,
                _ => {
                    tracing::debug!("No config file found, using command line and defaults");
                    ConfigLayer::default()
                }
            },
        };

        Self::from_layer(overrides.or(file_layer))
    }

    /// Startup validation
    ///
    /// Source and destination roots must exist and be directories; pool and
    /// batch sizes must be positive.
    pub fn validate(&self) -> Result<()> {
        require_directory("source_root", &self.source_root)?;
        require_directory("destination_root", &self.destination_root)?;

        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".to_string()));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".to_string()));
        }
        self.check_root_overlap()
    }

    /// Replace the three roots with their canonical paths
    ///
    /// Call after [`IngestConfig::ensure_directories`] so every root exists.
    /// The overlap checks are repeated on the resolved paths, which catches
    /// roots that only differ in spelling (`..`, relative, symlinks).
    pub fn canonicalize_roots(&mut self) -> Result<()> {
        self.source_root = canonical("source_root", &self.source_root)?;
        self.destination_root = canonical("destination_root", &self.destination_root)?;
        self.quarantine_root = canonical("quarantine_root", &self.quarantine_root)?;

        self.check_root_overlap()
    }

    fn check_root_overlap(&self) -> Result<()> {
        let source = resolved(&self.source_root);
        if resolved(&self.quarantine_root) == source {
            return Err(Error::Config(
                "quarantine_root must not be the source_root".to_string(),
            ));
        }
        if resolved(&self.destination_root) == source {
            return Err(Error::Config(
                "destination_root must not be the source_root".to_string(),
            ));
        }
        Ok(())
    }

    /// Create the quarantine root and the database parent directory
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.quarantine_root)?;
        if let Some(parent) = self.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn store_retry_delay(&self) -> Duration {
        Duration::from_secs(self.store_retry_secs)
    }

    pub fn fault_backoff(&self) -> Duration {
        Duration::from_secs(self.fault_backoff_secs)
    }
}

fn require_directory(name: &str, path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(Error::Config(format!(
            "{} does not exist: {}",
            name,
            path.display()
        )));
    }
    if !path.is_dir() {
        return Err(Error::Config(format!(
            "{} is not a directory: {}",
            name,
            path.display()
        )));
    }
    Ok(())
}

fn canonical(name: &str, path: &Path) -> Result<PathBuf> {
    std::fs::canonicalize(path).map_err(|e| {
        Error::Config(format!("{} cannot be resolved: {}: {}", name, path.display(), e))
    })
}

/// Canonical path when it can be resolved, otherwise the path as given
fn resolved(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Read one TOML configuration layer
pub fn load_toml_layer(path: &Path) -> Result<ConfigLayer> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Platform config file location
///
/// Linux tries `~/.config/nfo/config.toml` then `/etc/nfo/config.toml`;
/// other platforms use the user config directory only.
pub fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("nfo").join("config.toml"));

    if cfg!(target_os = "linux") {
        if let Some(path) = user_config {
            if path.exists() {
                return Some(path);
            }
        }
        let system_config = PathBuf::from("/etc/nfo/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
        None
    } else {
        user_config
    }
}

/// OS-dependent default database location
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("nfo").join("nfo.db"))
        .unwrap_or_else(|| PathBuf::from("./nfo_data/nfo.db"))
}
