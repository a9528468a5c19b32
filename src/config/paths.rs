//! Path management for snapvault
//!
//! ## Path Resolution Order
//!
//! Configuration file:
//! 1. `--env-file` flag or `SNAPVAULT_ENV_FILE` environment variable
//! 2. `/etc/snapvault/snapvault.env`
//!
//! Logs and the run journal live under `SNAPVAULT_LOG_DIR` from the
//! configuration file, defaulting to `/var/log/snapvault`.

use std::path::{Path, PathBuf};

use crate::error::SnapvaultError;

/// Default location of the configuration file
pub const DEFAULT_ENV_FILE: &str = "/etc/snapvault/snapvault.env";

/// Default log directory
pub const DEFAULT_LOG_DIR: &str = "/var/log/snapvault";

pub const LOG_FILE_NAME: &str = "snapvault.log";
pub const JOURNAL_FILE_NAME: &str = "runs.jsonl";

/// Resolve the configuration file path, falling back to the system default
pub fn resolve_env_file(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_FILE))
}

/// Manages the on-disk locations snapvault writes to
#[derive(Debug, Clone)]
pub struct SnapvaultPaths {
    /// Directory holding the log file and run journal
    log_dir: PathBuf,
}

impl SnapvaultPaths {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Get the path to the plain-text log file
    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join(LOG_FILE_NAME)
    }

    /// Get the path to the run journal (JSON Lines)
    pub fn journal_file(&self) -> PathBuf {
        self.log_dir.join(JOURNAL_FILE_NAME)
    }

    /// Ensure the log directory exists
    pub fn ensure_directories(&self) -> Result<(), SnapvaultError> {
        std::fs::create_dir_all(&self.log_dir)
            .map_err(|e| SnapvaultError::Io(format!("Failed to create log directory: {}", e)))
    }
}

impl Default for SnapvaultPaths {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_DIR)
    }
}
