//! ZFS data models

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};

/// Directory under a mount point through which ZFS exposes snapshots
pub const SNAPSHOT_DIR: &str = ".zfs/snapshot";

/// A mounted dataset under the configured parent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalVolume {
    /// Full hierarchical name, e.g. `pool/services/app`
    pub name: String,
    pub mount_point: PathBuf,
}

impl LogicalVolume {
    pub fn new(name: impl Into<String>, mount_point: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            mount_point: mount_point.into(),
        }
    }

    /// Last path component of the name (`pool/services/app` -> `app`)
    pub fn short_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// Where the contents of snapshot `tag` are readable for this volume
    pub fn snapshot_path(&self, tag: &str) -> PathBuf {
        snapshot_path(&self.mount_point, tag)
    }
}

/// `<mount>/.zfs/snapshot/<tag>`
pub fn snapshot_path(mount_point: &Path, tag: &str) -> PathBuf {
    mount_point.join(SNAPSHOT_DIR).join(tag)
}

/// One row of a snapshot listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Full snapshot name, `dataset@tag`
    pub name: String,
    /// Space used, as reported by ZFS (e.g. `1.2M`)
    pub used: String,
    /// Creation timestamp, as reported by ZFS
    pub creation: String,
}

impl Snapshot {
    pub fn dataset(&self) -> &str {
        self.name.split_once('@').map(|(d, _)| d).unwrap_or(&self.name)
    }

    pub fn tag(&self) -> &str {
        self.name.split_once('@').map(|(_, t)| t).unwrap_or("")
    }
}

/// Canonical identity of a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotId {
    pub dataset: String,
    pub tag: String,
}

impl SnapshotId {
    pub fn new(dataset: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            tag: tag.into(),
        }
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.dataset, self.tag)
    }
}

/// Timestamp component used in generated tags and archive names
pub fn timestamp_now() -> String {
    Local::now().format("%Y-%m-%d_%H-%M-%S").to_string()
}

/// Tag for an ad-hoc snapshot created without an explicit name
pub fn generate_tag() -> String {
    format!("auto-{}", timestamp_now())
}

/// Tag for the snapshot a backup run works from
pub fn generate_run_tag() -> String {
    format!("auto-backup_{}", timestamp_now())
}

/// Tag for the snapshot taken by a partial maintenance run
pub fn generate_maintenance_tag() -> String {
    format!("partial-maintenance-{}", Local::now().format("%Y%m%d-%H%M%S"))
}
