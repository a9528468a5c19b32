//! Recovery key export for every volume's repository
//!
//! Keys land in the configured keys directory as `<sanitized volume>.key`,
//! owned by the admin user with mode 0600. One volume failing does not stop
//! the others; the summary says how many did.

use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::borg::{key_file_name, ArchiveRepository};
use crate::config::Settings;
use crate::error::SnapvaultResult;
use crate::host::HostFiles;
use crate::process::CommandRunner;
use crate::zfs::VolumeManager;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyExportSummary {
    pub exported: Vec<PathBuf>,
    /// Volume names whose export or verification failed
    pub failed: Vec<String>,
    pub location: PathBuf,
}

impl KeyExportSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Export and verify the recovery key of every mounted volume
///
/// Errors are returned only for problems before the per-volume loop: the
/// keys directory cannot be prepared or volumes cannot be listed.
pub fn export_all_keys(runner: &dyn CommandRunner, settings: &Settings) -> SnapvaultResult<KeyExportSummary> {
    info!("--> Exporting and verifying recovery keys for all services...");
    let keys_dir = settings.keys_dir.clone();
    let host = HostFiles::new(runner, &settings.admin_user);
    host.ensure_owned_dir(&keys_dir).inspect_err(|e| {
        error!(
            "Failed to create or set permissions on keys directory {}: {}",
            keys_dir.display(),
            e
        )
    })?;

    let mut summary = KeyExportSummary {
        exported: Vec::new(),
        failed: Vec::new(),
        location: keys_dir.clone(),
    };

    let zfs = VolumeManager::new(runner, &settings.tools.zfs, &settings.parent_dataset)?;
    let volumes = zfs.volumes().collect_all()?;
    if volumes.is_empty() {
        warn!("No ZFS datasets found. No keys to export.");
        return Ok(summary);
    }
    info!("Found {} services. Exporting keys...", volumes.len());

    for (i, volume) in volumes.iter().enumerate() {
        let key_path = keys_dir.join(key_file_name(&volume.name));
        info!("{}", "=".repeat(60));
        info!("Processing {}/{}: {}", i + 1, volumes.len(), volume.name);

        let result = ArchiveRepository::for_volume(runner, settings, &volume.name).and_then(|repo| {
            repo.export_recovery_key(&key_path)?;
            host.secure_key_file(&key_path)
        });

        match result {
            Ok(()) => {
                info!("Successfully exported and verified key for {}.", volume.short_name());
                summary.exported.push(key_path);
            }
            Err(e) => {
                error!("Failed to export or verify key for {}: {}", volume.name, e);
                summary.failed.push(volume.name.clone());
            }
        }
    }

    info!("{}", "#".repeat(80));
    info!("Key Export Summary:");
    info!("  Successfully exported: {}", summary.exported.len());
    info!("  Failed to export:      {}", summary.failed.len());
    info!("  Keys are located in: {}", summary.location.display());
    info!("{}", "#".repeat(80));
    Ok(summary)
}
