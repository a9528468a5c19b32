//! Runtime settings for snapvault
//!
//! Settings are read from a dotenv-format file into an explicit structure.
//! Every required key is checked up front and all missing names are reported
//! together. Unknown keys are ignored. The file is parsed without touching the
//! process environment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{error, info};

use super::paths::{SnapvaultPaths, DEFAULT_LOG_DIR};
use super::secret::Passphrase;
use super::storage::StorageSettings;
use crate::error::{SnapvaultError, SnapvaultResult};

/// Keys that must be present (and non-empty) in the configuration file
pub const REQUIRED_KEYS: &[&str] = &[
    "BORG_REPO_BASE_PATH",
    "BORG_PASSPHRASE",
    "BORG_RSH",
    "ARCHIVE_PREFIX",
    "BORG_PRUNE_POLICY",
    "ZFS_PARENT_DATASET",
    "BORG_COMPRESSION",
    "BORG_EXCLUDES_FILE",
    "ADMIN_USER",
    "BORG_KEYS_DIR",
    "SERVICES_DIR",
];

/// Executables used to reach the host's tools
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub zfs: String,
    pub borg: String,
    pub docker: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            zfs: "zfs".to_string(),
            borg: "borg".to_string(),
            docker: "docker".to_string(),
        }
    }
}

/// Validated snapvault configuration
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root under which every per-volume repository lives (local path or `ssh://` URL)
    pub repo_base_path: String,
    /// Shared passphrase for all repositories
    pub passphrase: Passphrase,
    /// Remote-shell command handed to Borg as `BORG_RSH`
    pub rsh: String,
    /// Prefix for archive names
    pub archive_prefix: String,
    /// Retention tokens passed verbatim to `borg prune`, order preserved
    pub prune_policy: Vec<String>,
    /// Parent ZFS dataset whose children are the backed-up volumes
    pub parent_dataset: String,
    /// Borg compression spec, e.g. `zstd,10`
    pub compression: String,
    /// File of exclude patterns for `borg create`
    pub excludes_file: PathBuf,
    /// Owner of exported keys and extracted archives
    pub admin_user: String,
    /// Directory exported recovery keys are written to
    pub keys_dir: PathBuf,
    /// Root of the compose service groups
    pub services_dir: PathBuf,
    /// Directory for the log file and run journal
    pub log_dir: PathBuf,
    pub tools: ToolPaths,
    /// Host layout for `storage prepare`, if configured
    pub storage: Option<StorageSettings>,
}

impl Settings {
    /// Load settings from a dotenv-format file
    pub fn load(path: &Path) -> SnapvaultResult<Self> {
        info!("Loading configuration from: {}", path.display());
        if !path.exists() {
            error!("Configuration file not found at: {}", path.display());
            return Err(SnapvaultError::Config(format!(
                "Configuration file not found at: {}",
                path.display()
            )));
        }

        let iter = dotenvy::from_path_iter(path).map_err(|e| {
            SnapvaultError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let mut values = HashMap::new();
        for item in iter {
            let (key, value) = item.map_err(|e| {
                SnapvaultError::Config(format!("Failed to parse {}: {}", path.display(), e))
            })?;
            values.insert(key, value);
        }

        let settings = Self::from_map(&values)?;
        info!("Configuration loaded and validated successfully.");
        Ok(settings)
    }

    /// Build settings from already-parsed key/value pairs
    pub fn from_map(values: &HashMap<String, String>) -> SnapvaultResult<Self> {
        let get = |key: &str| -> Option<String> {
            values
                .get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let missing: Vec<&str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| get(key).is_none())
            .collect();
        if !missing.is_empty() {
            error!("Missing required configuration keys: {}", missing.join(", "));
            return Err(SnapvaultError::Config(format!(
                "Missing required configuration keys: {}",
                missing.join(", ")
            )));
        }

        // Presence was checked above.
        let required = |key: &str| get(key).unwrap_or_default();

        let prune_policy: Vec<String> = required("BORG_PRUNE_POLICY")
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let parent_dataset = required("ZFS_PARENT_DATASET")
            .trim_end_matches('/')
            .to_string();
        if parent_dataset.contains('@') {
            return Err(SnapvaultError::Config(format!(
                "ZFS_PARENT_DATASET must name a dataset, not a snapshot: '{}'",
                parent_dataset
            )));
        }

        let storage = StorageSettings::from_map(values)?;
        let defaults = ToolPaths::default();
        Ok(Self {
            repo_base_path: required("BORG_REPO_BASE_PATH")
                .trim_end_matches('/')
                .to_string(),
            passphrase: Passphrase::new(required("BORG_PASSPHRASE")),
            rsh: required("BORG_RSH"),
            archive_prefix: required("ARCHIVE_PREFIX"),
            prune_policy,
            parent_dataset,
            compression: required("BORG_COMPRESSION"),
            excludes_file: PathBuf::from(required("BORG_EXCLUDES_FILE")),
            admin_user: required("ADMIN_USER"),
            keys_dir: PathBuf::from(required("BORG_KEYS_DIR")),
            services_dir: PathBuf::from(required("SERVICES_DIR")),
            log_dir: get("SNAPVAULT_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
            tools: ToolPaths {
                zfs: get("ZFS_COMMAND").unwrap_or(defaults.zfs),
                borg: get("BORG_COMMAND").unwrap_or(defaults.borg),
                docker: get("DOCKER_COMMAND").unwrap_or(defaults.docker),
            },
            storage,
        })
    }

    /// Paths derived from the configured log directory
    pub fn paths(&self) -> SnapvaultPaths {
        SnapvaultPaths::new(&self.log_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_map() -> HashMap<String, String> {
        [
            ("BORG_REPO_BASE_PATH", "ssh://backup@host/./borg/"),
            ("BORG_PASSPHRASE", "s3cret"),
            ("BORG_RSH", "ssh -i /root/.ssh/id_ed25519"),
            ("ARCHIVE_PREFIX", "homelab"),
            ("BORG_PRUNE_POLICY", "--keep-daily=7  --keep-weekly=4 --keep-monthly=6"),
            ("ZFS_PARENT_DATASET", "pool/svcs"),
            ("BORG_COMPRESSION", "zstd,10"),
            ("BORG_EXCLUDES_FILE", "/etc/snapvault/excludes.txt"),
            ("ADMIN_USER", "admin"),
            ("BORG_KEYS_DIR", "/root/borg-keys"),
            ("SERVICES_DIR", "/srv/services"),
            ("SOMETHING_ELSE", "ignored"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_from_map() {
        let settings = Settings::from_map(&sample_map()).unwrap();

        assert_eq!(settings.repo_base_path, "ssh://backup@host/./borg");
        assert_eq!(
            settings.prune_policy,
            vec!["--keep-daily=7", "--keep-weekly=4", "--keep-monthly=6"]
        );
        assert_eq!(settings.parent_dataset, "pool/svcs");
        assert_eq!(settings.log_dir, PathBuf::from(DEFAULT_LOG_DIR));
        assert_eq!(settings.tools, ToolPaths::default());
        assert_eq!(settings.passphrase.expose(), "s3cret");
        assert!(settings.storage.is_none());
    }

    #[test]
    fn test_storage_section_loaded() {
        let mut map = sample_map();
        map.insert("ZFS_BASE_MOUNTPOINT".into(), "/srv/svcs".into());
        assert!(Settings::from_map(&map).is_err());

        for (key, value) in [
            ("DOCKER_USER", "dockremap"),
            ("SHARED_GROUP", "svcshare"),
            ("REMAPPED_ROOT_UID", "100000"),
            ("REMAPPED_POSTGRES_UID", "100999"),
            ("REMAPPED_APP_UID", "101000"),
            ("SERVICE_VOLUME_PATHS_AND_OWNERS", "web/data:REMAPPED_APP_UID"),
        ] {
            map.insert(key.into(), value.into());
        }
        let storage = Settings::from_map(&map).unwrap().storage.unwrap();
        assert_eq!(storage.services(), vec!["web"]);
    }

    #[test]
    fn test_all_missing_keys_reported_together() {
        let mut map = sample_map();
        map.remove("BORG_RSH");
        map.remove("ADMIN_USER");
        map.insert("BORG_COMPRESSION".into(), "   ".into());

        let err = Settings::from_map(&map).unwrap_err().to_string();
        assert!(err.contains("BORG_RSH"));
        assert!(err.contains("ADMIN_USER"));
        assert!(err.contains("BORG_COMPRESSION"));
        assert!(!err.contains("BORG_PASSPHRASE"));
    }

    #[test]
    fn test_snapshot_as_parent_rejected() {
        let mut map = sample_map();
        map.insert("ZFS_PARENT_DATASET".into(), "pool/svcs@x".into());
        assert!(Settings::from_map(&map).is_err());
    }

    #[test]
    fn test_optional_overrides() {
        let mut map = sample_map();
        map.insert("SNAPVAULT_LOG_DIR".into(), "/tmp/snapvault-logs".into());
        map.insert("BORG_COMMAND".into(), "/opt/borg/bin/borg".into());

        let settings = Settings::from_map(&map).unwrap();
        assert_eq!(settings.log_dir, PathBuf::from("/tmp/snapvault-logs"));
        assert_eq!(settings.tools.borg, "/opt/borg/bin/borg");
        assert_eq!(settings.tools.zfs, "zfs");
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let env_file = temp_dir.path().join("snapvault.env");
        let contents: String = sample_map()
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"\n", k, v))
            .collect();
        std::fs::write(&env_file, contents).unwrap();

        let settings = Settings::load(&env_file).unwrap();
        assert_eq!(settings.archive_prefix, "homelab");
        assert_eq!(settings.rsh, "ssh -i /root/.ssh/id_ed25519");
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = Settings::load(&temp_dir.path().join("absent.env")).unwrap_err();
        assert!(matches!(err, SnapvaultError::Config(_)));
    }
}
