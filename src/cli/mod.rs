//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the managers.

pub mod archive;
pub mod backup;
pub mod dataset;
pub mod keys;
pub mod privilege;
pub mod repos;
pub mod services;
pub mod snapshot;
pub mod storage;

pub use archive::{handle_archive_command, ArchiveCommands};
pub use backup::{handle_backup_command, BackupCommands};
pub use dataset::{handle_dataset_command, DatasetCommands};
pub use keys::{handle_keys_command, KeysCommands};
pub use privilege::require_root;
pub use repos::{handle_repos_command, ReposCommands};
pub use services::{handle_services_command, ServicesCommands};
pub use snapshot::{handle_snapshot_command, SnapshotCommands};
pub use storage::{handle_storage_command, StorageCommands};
