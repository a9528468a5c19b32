//! Ownership and permissions of files handed to the admin user
//!
//! snapvault runs as root, so directories and key files it creates are
//! re-owned with `chown` before the operator touches them.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use tracing::info;

use crate::error::{SnapvaultError, SnapvaultResult};
use crate::process::{self, CommandRunner, CommandSpec};

/// Mode for exported key files: read/write for the owner only
pub const KEY_FILE_MODE: u32 = 0o600;

pub struct HostFiles<'a> {
    runner: &'a dyn CommandRunner,
    admin_user: String,
}

impl<'a> HostFiles<'a> {
    pub fn new(runner: &'a dyn CommandRunner, admin_user: impl Into<String>) -> Self {
        Self {
            runner,
            admin_user: admin_user.into(),
        }
    }

    /// Give `path` to the admin user and their group
    pub fn chown(&self, path: &Path) -> SnapvaultResult<()> {
        let owner = format!("{}:{}", self.admin_user, self.admin_user);
        let spec = CommandSpec::new("chown").arg(owner).arg(path.to_string_lossy());
        process::execute(self.runner, &spec)?;
        Ok(())
    }

    /// Create `dir` (and parents) and hand it to the admin user
    pub fn ensure_owned_dir(&self, dir: &Path) -> SnapvaultResult<()> {
        fs::create_dir_all(dir).map_err(|e| {
            SnapvaultError::Io(format!("Failed to create directory {}: {}", dir.display(), e))
        })?;
        self.chown(dir)?;
        info!("Ensured directory exists: {}", dir.display());
        Ok(())
    }

    /// Hand a key file to the admin user, readable only by them
    pub fn secure_key_file(&self, path: &Path) -> SnapvaultResult<()> {
        self.chown(path)?;
        fs::set_permissions(path, fs::Permissions::from_mode(KEY_FILE_MODE)).map_err(|e| {
            SnapvaultError::Io(format!("Failed to restrict permissions on {}: {}", path.display(), e))
        })?;
        Ok(())
    }
}
