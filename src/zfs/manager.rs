//! Volume and snapshot lifecycle over the `zfs` command
//!
//! Existence checks interpret `zfs list` exit codes: 0 is found, 1 is the
//! normal "does not exist" answer, anything else is a genuine fault. Every
//! mutation goes through `lifecycle::converge`, so state is re-queried after
//! the command runs instead of trusting its exit status.

use tracing::{debug, info};

use super::models::{generate_tag, LogicalVolume, Snapshot, SnapshotId};
use super::parse::{parse_snapshot_line, parse_volume_line};
use crate::error::{SnapvaultError, SnapvaultResult};
use crate::lifecycle::{converge, Outcome, Transition};
use crate::process::{self, CommandRunner, CommandSpec, Listing};

/// Exit code `zfs list` uses for a dataset or snapshot that does not exist
const ZFS_NOT_FOUND: i32 = 1;

/// Manages datasets and snapshots under one parent dataset
pub struct VolumeManager<'a> {
    runner: &'a dyn CommandRunner,
    zfs: String,
    parent: String,
}

impl<'a> VolumeManager<'a> {
    pub fn new(runner: &'a dyn CommandRunner, zfs: impl Into<String>, parent: impl Into<String>) -> SnapvaultResult<Self> {
        let parent = parent.into();
        if parent.trim().is_empty() {
            return Err(SnapvaultError::Config("parent dataset cannot be empty".into()));
        }
        info!("VolumeManager initialized for parent dataset: '{}'.", parent);
        Ok(Self {
            runner,
            zfs: zfs.into(),
            parent,
        })
    }

    pub fn parent(&self) -> &str {
        &self.parent
    }

    /// Full dataset name for a child of the parent, or the parent itself
    pub fn target(&self, volume: Option<&str>) -> String {
        match volume {
            Some(child) => format!("{}/{}", self.parent, child.trim_matches('/')),
            None => self.parent.clone(),
        }
    }

    fn zfs(&self) -> CommandSpec {
        CommandSpec::new(&self.zfs)
    }

    /// Check whether a dataset exists (`None` checks the parent itself)
    pub fn volume_exists(&self, volume: Option<&str>) -> SnapvaultResult<bool> {
        let target = self.target(volume);
        self.dataset_exists(&target)
    }

    fn dataset_exists(&self, full_name: &str) -> SnapvaultResult<bool> {
        debug!("Checking existence of dataset: {}", full_name);
        let spec = self.zfs().args(["list", "-H", "-t", "filesystem", full_name]);
        let exists = process::query_exists(self.runner, &spec, ZFS_NOT_FOUND)?;
        debug!("Dataset '{}' exists: {}", full_name, exists);
        Ok(exists)
    }

    /// Check whether a snapshot exists
    pub fn snapshot_exists(&self, id: &SnapshotId) -> SnapvaultResult<bool> {
        let full_name = id.to_string();
        debug!("Checking existence of snapshot: {}", full_name);
        let spec = self.zfs().args(["list", "-H", "-t", "snapshot", &full_name]);
        let exists = process::query_exists(self.runner, &spec, ZFS_NOT_FOUND)?;
        debug!("Snapshot '{}' exists: {}", full_name, exists);
        Ok(exists)
    }

    /// Create a child dataset; a no-op if it already exists
    pub fn create_volume(&self, volume: &str, create_parents: bool) -> SnapvaultResult<Outcome> {
        let full_name = self.target(Some(volume));

        let mut spec = self.zfs().arg("create");
        if create_parents {
            spec = spec.arg("-p");
        }
        let spec = spec.arg(&full_name);

        converge(
            &Transition::ensure_present("Dataset", &full_name),
            || self.dataset_exists(&full_name),
            || {
                info!("Attempting to create ZFS dataset: {}", full_name);
                process::execute(self.runner, &spec).map(|_| ())
            },
        )
    }

    /// Create a snapshot and return its identity
    ///
    /// Unlike dataset creation this is not idempotent: an existing snapshot
    /// with the same identity is reported as `AlreadyExists`.
    pub fn create_snapshot(
        &self,
        tag: Option<&str>,
        volume: Option<&str>,
        recursive: bool,
    ) -> SnapvaultResult<SnapshotId> {
        let tag = match tag {
            Some(tag) if !tag.trim().is_empty() => tag.trim().to_string(),
            _ => generate_tag(),
        };
        validate_tag(&tag)?;

        let id = SnapshotId::new(self.target(volume), tag);
        let full_name = id.to_string();

        let mut spec = self.zfs().arg("snapshot");
        if recursive {
            spec = spec.arg("-r");
        }
        let spec = spec.arg(&full_name);

        converge(
            &Transition::create_new("Snapshot", &full_name),
            || self.snapshot_exists(&id),
            || {
                info!("Attempting to create ZFS snapshot: {}", full_name);
                process::execute(self.runner, &spec).map(|_| ())
            },
        )?;

        Ok(id)
    }

    /// Destroy a snapshot; a no-op if it does not exist
    pub fn destroy_snapshot(
        &self,
        tag: &str,
        volume: Option<&str>,
        recursive: bool,
    ) -> SnapvaultResult<Outcome> {
        validate_tag(tag)?;
        let id = SnapshotId::new(self.target(volume), tag);
        let full_name = id.to_string();

        let mut spec = self.zfs().arg("destroy");
        if recursive {
            spec = spec.arg("-r");
        }
        let spec = spec.arg(&full_name);

        converge(
            &Transition::ensure_absent("Snapshot", &full_name),
            || self.snapshot_exists(&id),
            || {
                info!("Attempting to destroy ZFS snapshot: {}", full_name);
                process::execute(self.runner, &spec).map(|_| ())
            },
        )
    }

    /// Mounted datasets under the parent, streamed from `zfs list`
    pub fn volumes(&self) -> Listing<'a, LogicalVolume> {
        info!("Searching for all child datasets under '{}'.", self.parent);
        let spec = self.zfs().args([
            "list",
            "-r",
            "-t",
            "filesystem",
            "-o",
            "name,mountpoint",
            "-H",
            &self.parent,
        ]);
        Listing::new(self.runner, spec, parse_volume_line, "ZFS dataset list")
    }

    /// Snapshots under the parent or one child, oldest first
    pub fn snapshots(&self, volume: Option<&str>) -> Listing<'a, Snapshot> {
        let target = self.target(volume);
        info!("Listing snapshots under '{}'", target);
        let spec = self.zfs().args([
            "list",
            "-t",
            "snapshot",
            "-r",
            "-o",
            "name,used,creation",
            "-s",
            "creation",
            "-H",
            &target,
        ]);
        Listing::new(self.runner, spec, parse_snapshot_line, "ZFS snapshot list")
    }

    /// Look up a mounted volume by its full name
    pub fn find_volume(&self, full_name: &str) -> SnapvaultResult<Option<LogicalVolume>> {
        for volume in self.volumes().iter()? {
            let volume = volume?;
            if volume.name == full_name {
                return Ok(Some(volume));
            }
        }
        Ok(None)
    }
}

/// Reject tags that would change the meaning of the snapshot name
fn validate_tag(tag: &str) -> SnapvaultResult<()> {
    if tag.is_empty() || tag.contains(['@', '/']) || tag.contains(char::is_whitespace) {
        return Err(SnapvaultError::Validation(format!(
            "Invalid snapshot tag '{}': must be non-empty without '@', '/' or whitespace",
            tag
        )));
    }
    Ok(())
}
