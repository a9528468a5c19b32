//! Configuration module for snapvault
//!
//! This module provides configuration management including:
//! - Configuration file and log path resolution
//! - Validated runtime settings
//! - Redacted handling of the repository passphrase
//! - The optional host layout used for storage preparation

pub mod paths;
pub mod secret;
pub mod settings;
pub mod storage;

pub use paths::SnapvaultPaths;
pub use secret::Passphrase;
pub use settings::{Settings, ToolPaths};
pub use storage::{StorageSettings, VolumeOwnership};
