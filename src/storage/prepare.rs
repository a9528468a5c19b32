//! Host preparation for user-namespace-remapped services
//!
//! Seven steps in a fixed order: subordinate ids, shared group, mirrored
//! users, one dataset per service, nested directories, ownership and setgid
//! inheritance. Each step is safe to repeat. The first failure stops the run.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tracing::{error, info};
use walkdir::WalkDir;

use super::accounts::AccountManager;
use super::subids::ensure_mapping;
use crate::config::{Settings, StorageSettings};
use crate::error::{SnapvaultError, SnapvaultResult};
use crate::lifecycle::Outcome;
use crate::process::{self, CommandRunner, CommandSpec};
use crate::zfs::VolumeManager;

const SETGID_BIT: u32 = 0o2000;

/// What a preparation run changed; empty when the host was already prepared
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreparationReport {
    pub changes: Vec<String>,
}

impl PreparationReport {
    fn note(&mut self, outcome: Outcome, change: impl Into<String>) {
        if outcome.applied() {
            self.changes.push(change.into());
        }
    }

    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }
}

pub struct HostPreparer<'a> {
    runner: &'a dyn CommandRunner,
    layout: &'a StorageSettings,
    admin_user: &'a str,
    accounts: AccountManager<'a>,
    volumes: VolumeManager<'a>,
}

impl<'a> HostPreparer<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        layout: &'a StorageSettings,
        admin_user: &'a str,
        volumes: VolumeManager<'a>,
    ) -> Self {
        Self {
            runner,
            layout,
            admin_user,
            accounts: AccountManager::new(runner),
            volumes,
        }
    }

    /// Build from settings; fails if no storage layout is configured
    pub fn from_settings(runner: &'a dyn CommandRunner, settings: &'a Settings) -> SnapvaultResult<Self> {
        let layout = settings.storage.as_ref().ok_or_else(|| {
            SnapvaultError::Config(
                "Storage preparation is not configured (ZFS_BASE_MOUNTPOINT and related keys)".into(),
            )
        })?;
        let volumes = VolumeManager::new(runner, &settings.tools.zfs, &settings.parent_dataset)?;
        Ok(Self::new(runner, layout, &settings.admin_user, volumes))
    }

    pub fn prepare(&self) -> SnapvaultResult<PreparationReport> {
        info!("--- Starting Host Environment Setup ---");
        let mut report = PreparationReport::default();

        let result = self
            .configure_subids(&mut report)
            .and_then(|_| self.setup_shared_group(&mut report))
            .and_then(|_| self.create_mirrored_users(&mut report))
            .and_then(|_| self.create_datasets(&mut report))
            .and_then(|_| self.create_nested_dirs(&mut report))
            .and_then(|_| self.apply_ownership())
            .and_then(|_| self.enforce_group_inheritance(&mut report));

        if let Err(e) = result {
            error!("A host preparation step failed, halting execution: {}", e);
            return Err(e);
        }

        info!("--- Host Environment Setup Complete ---");
        Ok(report)
    }

    fn configure_subids(&self, report: &mut PreparationReport) -> SnapvaultResult<()> {
        info!(
            "[STEP 1/7] Configuring subordinate UID/GID mappings for '{}'...",
            self.layout.docker_user
        );
        let mapping = self.layout.subid_mapping();
        for file in [&self.layout.subuid_file, &self.layout.subgid_file] {
            let outcome = ensure_mapping(file, &mapping)?;
            report.note(outcome, format!("added {} to {}", mapping, file.display()));
        }
        Ok(())
    }

    fn setup_shared_group(&self, report: &mut PreparationReport) -> SnapvaultResult<()> {
        let group = &self.layout.shared_group;
        info!("[STEP 2/7] Configuring shared group '{}'...", group);
        report.note(self.accounts.ensure_group(group)?, format!("created group {}", group));
        report.note(
            self.accounts.ensure_member(self.admin_user, group)?,
            format!("added {} to {}", self.admin_user, group),
        );
        Ok(())
    }

    fn create_mirrored_users(&self, report: &mut PreparationReport) -> SnapvaultResult<()> {
        info!("[STEP 3/7] Creating mirrored host users for remapped UIDs...");
        for (user, uid) in self.layout.mirrored_users() {
            let outcome = self
                .accounts
                .ensure_system_user(&user, uid, &self.layout.shared_group)?;
            report.note(outcome, format!("created user {} ({})", user, uid));
        }
        Ok(())
    }

    fn create_datasets(&self, report: &mut PreparationReport) -> SnapvaultResult<()> {
        info!("[STEP 4/7] Creating ZFS datasets for each service...");
        for service in self.layout.services() {
            let outcome = self.volumes.create_volume(&service, true)?;
            report.note(outcome, format!("created dataset {}", self.volumes.target(Some(service.as_str()))));
        }
        Ok(())
    }

    fn create_nested_dirs(&self, report: &mut PreparationReport) -> SnapvaultResult<()> {
        info!("[STEP 5/7] Creating nested directories within service datasets...");
        for volume in &self.layout.volumes {
            let path = self.layout.base_mountpoint.join(&volume.path);
            if path.is_dir() {
                info!("--> Directory '{}' already exists.", path.display());
                continue;
            }
            info!("--> Creating directory: '{}'", path.display());
            fs::create_dir_all(&path).map_err(|e| {
                SnapvaultError::Io(format!("Failed to create directory {}: {}", path.display(), e))
            })?;
            report.changes.push(format!("created directory {}", path.display()));
        }
        Ok(())
    }

    /// Ownership is re-applied on every run
    fn apply_ownership(&self) -> SnapvaultResult<()> {
        info!("[STEP 6/7] Applying specific ownership to directories...");
        for volume in &self.layout.volumes {
            let path = self.layout.base_mountpoint.join(&volume.path);
            let owner = format!("{}:{}", volume.owner_uid, self.layout.shared_group);
            info!("--> Ensuring ownership for '{}' is {}.", path.display(), owner);
            let spec = CommandSpec::new("chown")
                .args(["-R", owner.as_str()])
                .arg(path.to_string_lossy());
            process::execute(self.runner, &spec)?;
        }
        Ok(())
    }

    fn enforce_group_inheritance(&self, report: &mut PreparationReport) -> SnapvaultResult<()> {
        info!("[STEP 7/7] Applying group inheritance ('setgid') recursively...");
        for service in self.layout.services() {
            let top = self.layout.base_mountpoint.join(&service);
            let updated = set_group_inheritance(&top)?;
            if updated > 0 {
                report
                    .changes
                    .push(format!("set setgid on {} directories under {}", updated, top.display()));
            }
        }
        Ok(())
    }
}

/// Set the setgid bit on `root` and every directory below it
///
/// Returns how many directories were changed.
pub fn set_group_inheritance(root: &Path) -> SnapvaultResult<usize> {
    let mut updated = 0;
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| SnapvaultError::Io(format!("Failed to walk {}: {}", root.display(), e)))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let path: PathBuf = entry.path().to_path_buf();
        let mut permissions = entry
            .metadata()
            .map_err(|e| SnapvaultError::Io(format!("Failed to stat {}: {}", path.display(), e)))?
            .permissions();
        if permissions.mode() & SETGID_BIT != 0 {
            continue;
        }
        permissions.set_mode(permissions.mode() | SETGID_BIT);
        fs::set_permissions(&path, permissions)?;
        updated += 1;
    }
    Ok(updated)
}
