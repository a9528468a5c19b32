//! Docker Compose service groups
//!
//! Every direct child directory of the services root is a group; each
//! `docker-compose.yml` found anywhere below it is one compose project, run
//! from its own directory.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use super::ServiceGroupController;
use crate::config::Settings;
use crate::error::{SnapvaultError, SnapvaultResult};
use crate::process::{self, CommandRunner, CommandSpec};

pub const COMPOSE_FILE_NAME: &str = "docker-compose.yml";

/// The only part of a compose file snapvault reads
#[derive(Debug, Default, Deserialize)]
struct ComposeFile {
    #[serde(default)]
    networks: Option<BTreeMap<String, Option<NetworkDefinition>>>,
}

#[derive(Debug, Default, Deserialize)]
struct NetworkDefinition {
    #[serde(default)]
    external: Option<serde_yaml::Value>,
}

impl NetworkDefinition {
    /// `external: true` or the older `external: { name: ... }` form
    fn is_external(&self) -> bool {
        match &self.external {
            Some(serde_yaml::Value::Bool(flag)) => *flag,
            Some(serde_yaml::Value::Mapping(_)) => true,
            _ => false,
        }
    }
}

/// Runs compose verbs across every discovered service group
pub struct ComposeController<'a> {
    runner: &'a dyn CommandRunner,
    docker: String,
    services_dir: PathBuf,
}

impl<'a> ComposeController<'a> {
    pub fn new(runner: &'a dyn CommandRunner, docker: impl Into<String>, services_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            docker: docker.into(),
            services_dir: services_dir.into(),
        }
    }

    pub fn from_settings(runner: &'a dyn CommandRunner, settings: &Settings) -> Self {
        Self::new(runner, &settings.tools.docker, &settings.services_dir)
    }

    pub fn services_dir(&self) -> &Path {
        &self.services_dir
    }

    /// All compose files under the service groups, sorted
    pub fn compose_files(&self) -> SnapvaultResult<Vec<PathBuf>> {
        info!("Scanning for services in: {}...", self.services_dir.display());
        if !self.services_dir.is_dir() {
            error!(
                "SERVICES_DIR '{}' is not a valid directory.",
                self.services_dir.display()
            );
            return Err(SnapvaultError::Config(format!(
                "SERVICES_DIR '{}' is not a valid directory",
                self.services_dir.display()
            )));
        }

        let mut service_dirs: Vec<PathBuf> = fs::read_dir(&self.services_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        service_dirs.sort();

        if service_dirs.is_empty() {
            warn!("No service directories found in '{}'.", self.services_dir.display());
            return Ok(Vec::new());
        }

        let mut compose_files = Vec::new();
        for service_dir in &service_dirs {
            let found: Vec<PathBuf> = WalkDir::new(service_dir)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && e.file_name() == COMPOSE_FILE_NAME)
                .map(|e| e.into_path())
                .collect();

            if found.is_empty() {
                warn!(
                    "Service '{}' is missing a {} file. Skipping.",
                    dir_name(service_dir),
                    COMPOSE_FILE_NAME
                );
            }
            compose_files.extend(found);
        }

        if compose_files.is_empty() {
            warn!("No valid services with {} files were found.", COMPOSE_FILE_NAME);
        } else {
            info!("Found {} {} file(s).", compose_files.len(), COMPOSE_FILE_NAME);
        }
        compose_files.sort();
        Ok(compose_files)
    }

    fn run_on_all(&self, verb: &[&str], ok_codes: &[i32]) -> SnapvaultResult<()> {
        let compose_files = self.compose_files()?;
        if compose_files.is_empty() {
            return Ok(());
        }

        let label = verb.join(" ");
        info!("--- Executing '{}' on all {} services ---", label, compose_files.len());

        for compose_file in &compose_files {
            let project_dir = compose_file.parent().unwrap_or(&self.services_dir);
            let spec = CommandSpec::new(&self.docker)
                .args(["compose", "-f"])
                .arg(compose_file.to_string_lossy())
                .args(verb.iter().copied())
                .current_dir(project_dir)
                .passthrough();

            info!("Running command in '{}': {}", project_dir.display(), spec);
            if let Err(e) = process::execute_accepting(self.runner, &spec, ok_codes) {
                error!(
                    "Command failed for {}. Halting execution.",
                    dir_name(project_dir)
                );
                return Err(e);
            }
            info!("Successfully executed command for {}.", dir_name(project_dir));
        }

        info!(
            "--- Successfully executed '{}' on all {} services. ---",
            label,
            compose_files.len()
        );
        Ok(())
    }

    /// Build, create and start every service
    pub fn up_all(&self) -> SnapvaultResult<()> {
        self.run_on_all(&["up", "-d", "--build"], &[0])
    }

    /// Stop and remove every service's containers
    pub fn down_all(&self) -> SnapvaultResult<()> {
        self.run_on_all(&["down"], &[0])
    }

    pub fn pull_all(&self) -> SnapvaultResult<()> {
        self.run_on_all(&["pull"], &[0])
    }

    /// Exit 1 means there was nothing to restart
    pub fn restart_all(&self) -> SnapvaultResult<()> {
        self.run_on_all(&["restart"], &[0, 1])
    }

    /// Create every external network the compose files expect
    pub fn create_networks(&self) -> SnapvaultResult<Vec<String>> {
        info!("--- Searching for external Docker networks ---");
        let wanted = self.external_networks()?;
        if wanted.is_empty() {
            info!("No external networks found to create.");
            return Ok(Vec::new());
        }
        info!(
            "Discovered external networks: {}",
            wanted.iter().cloned().collect::<Vec<_>>().join(", ")
        );

        let listing = CommandSpec::new(&self.docker).args(["network", "ls", "--format", "{{.Name}}"]);
        let existing: BTreeSet<String> = process::execute(self.runner, &listing)?
            .stdout
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();

        let mut created = Vec::new();
        for network in wanted {
            if existing.contains(&network) {
                info!("Network '{}' already exists. Skipping.", network);
                continue;
            }
            info!("Creating network: '{}'...", network);
            let spec = CommandSpec::new(&self.docker).args(["network", "create", network.as_str()]);
            process::execute(self.runner, &spec)?;
            info!("Successfully created network '{}'.", network);
            created.push(network);
        }
        Ok(created)
    }

    fn external_networks(&self) -> SnapvaultResult<BTreeSet<String>> {
        let mut networks = BTreeSet::new();
        for file in self.compose_files()? {
            let content = match fs::read_to_string(&file) {
                Ok(content) => content,
                Err(e) => {
                    error!("Could not read file {}: {}. Skipping.", file.display(), e);
                    continue;
                }
            };
            let parsed: ComposeFile = match serde_yaml::from_str(&content) {
                Ok(parsed) => parsed,
                Err(e) => {
                    error!("Error parsing YAML file {}: {}. Skipping.", file.display(), e);
                    continue;
                }
            };
            for (name, definition) in parsed.networks.unwrap_or_default() {
                if definition.is_some_and(|d| d.is_external()) {
                    networks.insert(name);
                }
            }
        }
        Ok(networks)
    }
}

impl ServiceGroupController for ComposeController<'_> {
    fn stop_all(&self) -> SnapvaultResult<()> {
        self.run_on_all(&["stop"], &[0])
    }

    /// Exit 1 from `start` means there were no containers to start
    fn start_all(&self) -> SnapvaultResult<()> {
        self.run_on_all(&["start"], &[0, 1])
    }
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
