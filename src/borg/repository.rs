//! Operations on one Borg repository
//!
//! An `ArchiveRepository` is bound to exactly one location and carries its
//! own credential bundle. Existence is always queried with `borg info`, never
//! remembered: exit 2 means the repository is absent, any other non-zero
//! status is a fault.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use super::credentials::{with_keepalive, Credentials, ENV_RSH};
use super::naming::repository_location;
use crate::config::Settings;
use crate::error::SnapvaultResult;
use crate::lifecycle::{converge, Outcome, Transition};
use crate::process::{self, CommandRunner, CommandSpec, Listing, ParsedLine};

/// Exit code `borg info` uses when no repository exists at the location
const BORG_REPO_NOT_FOUND: i32 = 2;

/// Encryption mode for newly initialized repositories
const ENCRYPTION_MODE: &str = "--encryption=repokey-blake2";

/// One encrypted archive store
#[derive(Clone)]
pub struct ArchiveRepository<'a> {
    runner: &'a dyn CommandRunner,
    borg: String,
    location: String,
    credentials: Credentials,
    key_file: Option<PathBuf>,
}

impl<'a> ArchiveRepository<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        borg: impl Into<String>,
        location: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        let location = location.into();
        info!("ArchiveRepository instance created for path: {}", location);
        Self {
            runner,
            borg: borg.into(),
            location,
            credentials,
            key_file: None,
        }
    }

    /// The dedicated repository of a volume, located under the configured base path
    pub fn for_volume(
        runner: &'a dyn CommandRunner,
        settings: &Settings,
        volume_name: &str,
    ) -> SnapvaultResult<Self> {
        Ok(Self::new(
            runner,
            &settings.tools.borg,
            repository_location(&settings.repo_base_path, volume_name),
            Credentials::from_settings(settings)?,
        ))
    }

    /// The same repository, authenticated through an exported key file
    pub fn using_key_file(&self, key_file: impl Into<PathBuf>) -> Self {
        Self {
            key_file: Some(key_file.into()),
            ..self.clone()
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn key_file(&self) -> Option<&Path> {
        self.key_file.as_deref()
    }

    fn borg(&self) -> CommandSpec {
        self.credentials.apply(
            CommandSpec::new(&self.borg),
            &self.location,
            self.key_file.as_deref(),
        )
    }

    /// Query with `borg info`
    pub fn repository_exists(&self) -> SnapvaultResult<bool> {
        info!("Checking for existing repository at: {}", self.location);
        let exists = process::query_exists(self.runner, &self.borg().arg("info"), BORG_REPO_NOT_FOUND)
            .inspect_err(|_| {
                error!(
                    "An unexpected error occurred while checking repository {}. \
                     This could be an SSH or permissions issue.",
                    self.location
                )
            })?;
        if !exists {
            info!("Repository does not exist (Borg exit code {}).", BORG_REPO_NOT_FOUND);
        }
        Ok(exists)
    }

    /// Initialize the repository unless it already exists
    pub fn initialize_if_needed(&self) -> SnapvaultResult<Outcome> {
        converge(
            &Transition::ensure_present("Repository", &self.location),
            || self.repository_exists(),
            || {
                warn!("Repository not found at {}. Attempting to initialize.", self.location);
                process::execute(self.runner, &self.borg().args(["init", ENCRYPTION_MODE])).map(|_| ())
            },
        )
    }

    /// Append one archive built from `source`; progress goes to the operator
    pub fn create_archive(
        &self,
        name: &str,
        source: &Path,
        compression: &str,
        excludes_file: &Path,
    ) -> SnapvaultResult<()> {
        info!("Starting Borg backup for '{}'", source.display());
        let spec = self
            .borg()
            .args(["create", "--verbose", "--stats", "--progress"])
            .arg(format!("--compression={}", compression))
            .arg(format!("--exclude-from={}", excludes_file.display()))
            .arg(format!("::{}", name))
            .arg(source.to_string_lossy())
            .passthrough();
        process::execute(self.runner, &spec)?;
        info!("Borg archive creation complete.");
        Ok(())
    }

    /// Apply retention tokens verbatim
    pub fn prune_archives(&self, policy: &[String]) -> SnapvaultResult<()> {
        info!("Pruning old archives in repository: {}", self.location);
        let spec = self
            .borg()
            .args(["prune", "--verbose", "--list", "--show-rc", "--progress"])
            .args(policy.iter().cloned())
            .passthrough();
        process::execute(self.runner, &spec)?;
        info!("Pruning of old archives complete.");
        Ok(())
    }

    /// Consistency check; `verify_data` also re-reads every stored object
    pub fn check_repository(&self, verify_data: bool) -> SnapvaultResult<()> {
        info!("Starting integrity check for repository: {}", self.location);
        let mut spec = self.borg().args(["check", "--verbose", "--progress"]);
        if verify_data {
            info!("Full data verification (--verify-data) is enabled. This may take a long time.");
            spec = spec.arg("--verify-data");
        } else {
            info!("Performing a metadata-only integrity check.");
        }

        let rsh = with_keepalive(self.credentials.rsh());
        if rsh != self.credentials.rsh() {
            info!("Using modified BORG_RSH for check: {}", rsh);
        }
        let spec = spec.env(ENV_RSH, rsh).passthrough();

        process::execute(self.runner, &spec)?;
        info!("Integrity check for {} complete.", self.location);
        Ok(())
    }

    /// Export a paper key to `destination` and prove it opens the repository
    ///
    /// The key is only kept if `borg list` succeeds with it as the sole key
    /// material. On any failure the file is removed and the error returned.
    pub fn export_recovery_key(&self, destination: &Path) -> SnapvaultResult<()> {
        info!("Exporting recovery key to: {}", destination.display());
        if destination.exists() {
            warn!(
                "Key file {} already exists and will be overwritten.",
                destination.display()
            );
        }
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }

        let spec = self.borg().args(["key", "export", "--paper"]).args([
            self.location.clone(),
            destination.to_string_lossy().into_owned(),
        ]);
        if let Err(e) = process::execute(self.runner, &spec) {
            error!("Failed to export recovery key for {}", self.location);
            remove_key_file(destination, "partial");
            return Err(e);
        }
        info!("Successfully saved key to {}.", destination.display());

        info!(
            "Verifying exported key at {} by using it to list archives...",
            destination.display()
        );
        let verifier = self.using_key_file(destination);
        if let Err(e) = process::execute(self.runner, &verifier.borg().arg("list")) {
            error!(
                "CRITICAL: Verification of exported key {} FAILED. The file will be deleted.",
                destination.display()
            );
            remove_key_file(destination, "invalid");
            return Err(e);
        }

        info!("Key verification successful: the exported key can decrypt and list the repository.");
        Ok(())
    }

    /// Archive names, oldest first
    pub fn archives(&self) -> Listing<'a, String> {
        Listing::new(
            self.runner,
            self.borg().args(["list", "--short"]),
            parse_archive_line,
            "Borg archive list",
        )
    }

    pub fn list_archives(&self) -> SnapvaultResult<Vec<String>> {
        self.archives().collect_all()
    }

    /// Full `borg list` output shown to the operator
    pub fn list_archives_interactive(&self) -> SnapvaultResult<()> {
        info!("Repository: {}", self.location);
        process::execute(self.runner, &self.borg().arg("list").passthrough())?;
        Ok(())
    }

    /// Extract an archive into `destination`, which must already exist
    pub fn extract_archive(&self, name: &str, destination: &Path) -> SnapvaultResult<()> {
        info!("Extracting archive '{}' into {}", name, destination.display());
        let spec = self
            .borg()
            .arg("extract")
            .arg(format!("::{}", name))
            .args(["--verbose", "--progress", "--list"])
            .current_dir(destination)
            .passthrough();
        process::execute(self.runner, &spec)?;
        info!("Extraction complete. Files are in: {}", destination.display());
        Ok(())
    }

    pub fn delete_archive(&self, name: &str) -> SnapvaultResult<()> {
        info!("Deleting archive '{}' from {}", name, self.location);
        let spec = self
            .borg()
            .arg("delete")
            .arg(format!("::{}", name))
            .args(["--verbose", "--progress", "--stats"])
            .passthrough();
        process::execute(self.runner, &spec)?;
        info!("Archive '{}' deleted.", name);
        Ok(())
    }

    /// Show repository statistics and archives; failures are logged only
    pub fn display_info(&self) {
        info!("Analyzing repository status for: {}", self.location);

        info!("{} Repository Statistics {}", "=".repeat(25), "=".repeat(25));
        if process::execute(self.runner, &self.borg().arg("info").passthrough()).is_err() {
            error!(
                "Failed to retrieve info for {}. The repository might not be initialized or is inaccessible.",
                self.location
            );
            return;
        }

        info!("{} Archives List {}", "=".repeat(28), "=".repeat(28));
        if process::execute(self.runner, &self.borg().arg("list").passthrough()).is_err() {
            error!(
                "Failed to list archives for {}. The repository might be corrupted or empty.",
                self.location
            );
        }
    }
}

fn parse_archive_line(line: &str) -> ParsedLine<String> {
    let name = line.trim();
    if name.contains(char::is_whitespace) {
        return Err(format!("unexpected archive name '{}'", name));
    }
    Ok(Some(name.to_string()))
}

fn remove_key_file(path: &Path, kind: &str) {
    if !path.exists() {
        return;
    }
    match fs::remove_file(path) {
        Ok(()) => info!("Removed {} key file: {}", kind, path.display()),
        Err(e) => error!("Failed to remove {} key file {}: {}", kind, path.display(), e),
    }
}
