//! Credential bundle handed to every Borg invocation
//!
//! Each repository carries its own immutable copy; nothing is written to the
//! process environment. The bundle becomes per-command environment entries
//! when a command is built.

use std::path::Path;

use crate::config::{Passphrase, Settings};
use crate::error::{SnapvaultError, SnapvaultResult};
use crate::process::CommandSpec;

pub const ENV_PASSPHRASE: &str = "BORG_PASSPHRASE";
pub const ENV_RSH: &str = "BORG_RSH";
pub const ENV_REPO: &str = "BORG_REPO";
pub const ENV_KEY_FILE: &str = "BORG_KEY_FILE";

/// Keep-alive option added to the transport before long-running checks
const KEEPALIVE_OPTION: &str = "-o ServerAliveInterval=60";

/// Passphrase plus remote-shell command
#[derive(Debug, Clone)]
pub struct Credentials {
    passphrase: Passphrase,
    rsh: String,
}

impl Credentials {
    pub fn new(passphrase: Passphrase, rsh: impl Into<String>) -> SnapvaultResult<Self> {
        let rsh = rsh.into();
        let mut missing = Vec::new();
        if passphrase.is_empty() {
            missing.push(ENV_PASSPHRASE);
        }
        if rsh.trim().is_empty() {
            missing.push(ENV_RSH);
        }
        if !missing.is_empty() {
            return Err(SnapvaultError::Config(format!(
                "Borg credentials are missing: {}",
                missing.join(", ")
            )));
        }
        Ok(Self { passphrase, rsh })
    }

    pub fn from_settings(settings: &Settings) -> SnapvaultResult<Self> {
        Self::new(settings.passphrase.clone(), settings.rsh.clone())
    }

    pub fn rsh(&self) -> &str {
        &self.rsh
    }

    /// Attach the bundle to a command for one repository
    pub fn apply(&self, spec: CommandSpec, repo: &str, key_file: Option<&Path>) -> CommandSpec {
        let spec = spec
            .env(ENV_PASSPHRASE, self.passphrase.expose())
            .env(ENV_RSH, &self.rsh)
            .env(ENV_REPO, repo);
        match key_file {
            Some(path) => spec.env(ENV_KEY_FILE, path.to_string_lossy()),
            None => spec,
        }
    }
}

/// Insert the keep-alive option right after the `ssh` program token
///
/// Specs that do not start an `ssh` client, or already set the option, are
/// returned unchanged.
pub fn with_keepalive(rsh: &str) -> String {
    if rsh.contains("ServerAliveInterval") {
        return rsh.to_string();
    }

    // Walk the whitespace-separated tokens by byte offset so the rest of the
    // string, including any quoted spacing, is kept verbatim.
    let mut offset = 0;
    for token in rsh.split_whitespace() {
        let start = offset + rsh[offset..].find(token).unwrap_or(0);
        let end = start + token.len();
        if Path::new(token).file_name().is_some_and(|name| name == "ssh") {
            return format!("{} {}{}", &rsh[..end], KEEPALIVE_OPTION, &rsh[end..]);
        }
        offset = end;
    }
    rsh.to_string()
}
