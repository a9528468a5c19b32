//! snapvault - consistent ZFS snapshot backups into per-volume Borg repositories
//!
//! This library provides the core of the `snapvault` tool: a check, execute,
//! verify lifecycle for datasets, snapshots and repositories, and a backup
//! pipeline that keeps the service downtime window down to one snapshot.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Settings file loading and path management
//! - `error`: Custom error types
//! - `process`: External command specs, runners and streamed listings
//! - `lifecycle`: The shared check / execute / verify engine
//! - `zfs`: Datasets and snapshots
//! - `borg`: One encrypted repository per dataset
//! - `services`: Docker Compose service groups
//! - `storage`: Host users, groups and service datasets
//! - `pipeline`: The full backup run
//! - `journal`: JSON Lines history of backup runs
//! - `keys`: Recovery key export for all repositories
//!
//! # Example
//!
//! ```rust,ignore
//! use snapvault::config::Settings;
//! use snapvault::pipeline::BackupPipeline;
//! use snapvault::process::SystemRunner;
//! use snapvault::services::ComposeController;
//!
//! let settings = Settings::load(Path::new("/etc/snapvault/snapvault.env"))?;
//! let runner = SystemRunner::new();
//! let services = ComposeController::from_settings(&runner, &settings);
//! BackupPipeline::new(&runner, &settings, &services)?.run()?;
//! ```

pub mod borg;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod host;
pub mod journal;
pub mod keys;
pub mod lifecycle;
pub mod logging;
pub mod pipeline;
pub mod process;
pub mod services;
pub mod storage;
pub mod zfs;

pub use error::{SnapvaultError, SnapvaultResult};
