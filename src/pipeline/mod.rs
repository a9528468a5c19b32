//! Backup pipeline
//!
//! Sequences the services bracket, the recursive snapshot, per-volume
//! archiving and checking, and snapshot cleanup for one run. Partial
//! maintenance reuses the snapshot step with a full compose down / up.

mod backup;
mod maintenance;
mod state;

pub use backup::BackupPipeline;
pub use maintenance::PartialMaintenance;
pub use state::{Phase, RunState, VolumeFailure};
