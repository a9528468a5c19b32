//! ZFS volume and snapshot management
//!
//! Volumes are mounted filesystem datasets under a configured parent. Names
//! passed to `VolumeManager` are relative to that parent; `None` targets the
//! parent itself.

pub mod manager;
pub mod models;
pub mod parse;

pub use manager::VolumeManager;
pub use models::{
    generate_maintenance_tag, generate_run_tag, generate_tag, snapshot_path, LogicalVolume, Snapshot, SnapshotId,
};
