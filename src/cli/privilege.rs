//! Root privilege check

use nix::unistd::geteuid;

use crate::error::{SnapvaultError, SnapvaultResult};

/// Fail unless the effective user is root
pub fn require_root() -> SnapvaultResult<()> {
    if !geteuid().is_root() {
        return Err(SnapvaultError::Privilege(
            "snapvault must be run as root (ZFS, Borg and Docker need elevated privileges)".into(),
        ));
    }
    Ok(())
}
