//! Host layout settings used by `storage prepare`
//!
//! These keys are optional as a group: a host that never runs storage
//! preparation can leave all of them out. Once any of them is present, all
//! required ones must be, and missing names are reported together.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use crate::error::{SnapvaultError, SnapvaultResult};

/// Keys required once storage preparation is configured at all
pub const STORAGE_KEYS: &[&str] = &[
    "ZFS_BASE_MOUNTPOINT",
    "DOCKER_USER",
    "SHARED_GROUP",
    "REMAPPED_ROOT_UID",
    "REMAPPED_POSTGRES_UID",
    "REMAPPED_APP_UID",
    "SERVICE_VOLUME_PATHS_AND_OWNERS",
];

/// Size of the subordinate id range handed to the remapped user
pub const SUBID_RANGE: u32 = 65536;

const DEFAULT_SUBUID_FILE: &str = "/etc/subuid";
const DEFAULT_SUBGID_FILE: &str = "/etc/subgid";

/// Host uids that container uids 0, 999 and 1000 are remapped to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemappedUids {
    pub root: u32,
    pub postgres: u32,
    pub app: u32,
}

impl RemappedUids {
    /// Resolve an owner key such as `REMAPPED_APP_UID`
    pub fn resolve(&self, key: &str) -> Option<u32> {
        match key {
            "REMAPPED_ROOT_UID" => Some(self.root),
            "REMAPPED_POSTGRES_UID" => Some(self.postgres),
            "REMAPPED_APP_UID" => Some(self.app),
            _ => None,
        }
    }
}

/// One service directory and the host uid that owns it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeOwnership {
    /// Path relative to the base mount point; the first component is the service
    pub path: String,
    pub owner_uid: u32,
}

impl VolumeOwnership {
    pub fn service(&self) -> &str {
        self.path.split('/').next().unwrap_or(&self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSettings {
    /// Mount point of the parent dataset
    pub base_mountpoint: PathBuf,
    /// User the Docker daemon remaps container root to
    pub docker_user: String,
    /// Group shared by the admin user and every mirrored user
    pub shared_group: String,
    pub uids: RemappedUids,
    /// Service directories in configuration order
    pub volumes: Vec<VolumeOwnership>,
    pub subuid_file: PathBuf,
    pub subgid_file: PathBuf,
}

impl StorageSettings {
    /// `None` when no storage key is set at all
    pub fn from_map(values: &HashMap<String, String>) -> SnapvaultResult<Option<Self>> {
        let get = |key: &str| -> Option<String> {
            values
                .get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let missing: Vec<&str> = STORAGE_KEYS.iter().copied().filter(|k| get(k).is_none()).collect();
        if missing.len() == STORAGE_KEYS.len() {
            return Ok(None);
        }
        if !missing.is_empty() {
            return Err(SnapvaultError::Config(format!(
                "Incomplete storage configuration, missing: {}",
                missing.join(", ")
            )));
        }

        let required = |key: &str| get(key).unwrap_or_default();
        let uid = |key: &str| -> SnapvaultResult<u32> {
            required(key)
                .parse()
                .map_err(|_| SnapvaultError::Config(format!("{} must be a numeric uid", key)))
        };

        let uids = RemappedUids {
            root: uid("REMAPPED_ROOT_UID")?,
            postgres: uid("REMAPPED_POSTGRES_UID")?,
            app: uid("REMAPPED_APP_UID")?,
        };
        let volumes = parse_volume_owners(&required("SERVICE_VOLUME_PATHS_AND_OWNERS"), &uids)?;

        Ok(Some(Self {
            base_mountpoint: PathBuf::from(required("ZFS_BASE_MOUNTPOINT")),
            docker_user: required("DOCKER_USER"),
            shared_group: required("SHARED_GROUP"),
            uids,
            volumes,
            subuid_file: get("SUBUID_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SUBUID_FILE)),
            subgid_file: get("SUBGID_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SUBGID_FILE)),
        }))
    }

    /// Service names owning at least one directory, sorted and unique
    pub fn services(&self) -> Vec<String> {
        self.volumes
            .iter()
            .map(|v| v.service().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// `<docker user>:<remapped root uid>:65536`
    pub fn subid_mapping(&self) -> String {
        format!("{}:{}:{}", self.docker_user, self.uids.root, SUBID_RANGE)
    }

    /// Host users mirroring the container uids, in creation order
    pub fn mirrored_users(&self) -> Vec<(String, u32)> {
        vec![
            (self.docker_user.clone(), self.uids.root),
            ("docker_user_999".to_string(), self.uids.postgres),
            ("docker_user_1000".to_string(), self.uids.app),
        ]
    }
}

/// Parse `path:OWNER_KEY` lines; blank lines and lines without ':' are skipped
fn parse_volume_owners(text: &str, uids: &RemappedUids) -> SnapvaultResult<Vec<VolumeOwnership>> {
    let mut volumes: Vec<VolumeOwnership> = Vec::new();
    for line in text.lines().map(str::trim) {
        let Some((path, key)) = line.split_once(':') else {
            continue;
        };
        let (path, key) = (path.trim().trim_matches('/'), key.trim());
        if path.is_empty() || path.split('/').any(|part| part == "..") {
            return Err(SnapvaultError::Config(format!("Invalid service path '{}'", path)));
        }
        let owner_uid = uids.resolve(key).ok_or_else(|| {
            SnapvaultError::Config(format!("Invalid UID key '{}' for path '{}'", key, path))
        })?;

        // A repeated path keeps its last owner.
        volumes.retain(|v| v.path != path);
        volumes.push(VolumeOwnership {
            path: path.to_string(),
            owner_uid,
        });
    }

    if volumes.is_empty() {
        return Err(SnapvaultError::Config(
            "SERVICE_VOLUME_PATHS_AND_OWNERS defines no service directories".into(),
        ));
    }
    Ok(volumes)
}
