//! Partial maintenance: take services down, snapshot everything, bring them up
//!
//! Services are brought back up whatever the snapshot outcome. When both
//! steps fail the snapshot error is the one reported.

use tracing::{error, info};

use crate::error::SnapvaultResult;
use crate::services::ComposeController;
use crate::zfs::{generate_maintenance_tag, SnapshotId, VolumeManager};

pub struct PartialMaintenance<'a> {
    volumes: &'a VolumeManager<'a>,
    compose: &'a ComposeController<'a>,
    tag: String,
}

impl<'a> PartialMaintenance<'a> {
    pub fn new(volumes: &'a VolumeManager<'a>, compose: &'a ComposeController<'a>) -> Self {
        Self {
            volumes,
            compose,
            tag: generate_maintenance_tag(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns the recursive snapshot taken of the parent dataset
    pub fn run(&self) -> SnapvaultResult<SnapshotId> {
        info!("--> Starting partial maintenance routine...");
        self.compose.down_all()?;

        info!("--> Creating recursive snapshot: {}...", self.tag);
        let snapshot = self.volumes.create_snapshot(Some(&self.tag), None, true);
        if let Err(e) = &snapshot {
            error!("Maintenance snapshot failed: {}", e);
        }

        let restart = self.compose.up_all();
        let id = snapshot?;
        restart?;

        info!("--- Partial Maintenance Complete! ---");
        Ok(id)
    }
}
