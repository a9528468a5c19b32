//! Archive CLI commands
//!
//! Every command addresses a service by its short name; the repository is
//! the one dedicated to `<parent dataset>/<service>`.

use std::path::PathBuf;

use clap::Subcommand;
use tracing::{error, info};

use crate::borg::{archive_name, ArchiveRepository};
use crate::config::Settings;
use crate::error::{SnapvaultError, SnapvaultResult};
use crate::host::HostFiles;
use crate::process::CommandRunner;
use crate::zfs::{snapshot_path, VolumeManager};

#[derive(Subcommand)]
pub enum ArchiveCommands {
    /// Archive an existing snapshot of a service into its repository
    Create {
        #[arg(long)]
        volume: String,

        /// Tag of the snapshot to archive
        #[arg(long)]
        snapshot: String,
    },

    /// List the archives of a service
    List {
        #[arg(long)]
        volume: String,
    },

    /// Extract an archive into a directory
    Extract {
        #[arg(long)]
        volume: String,

        #[arg(long)]
        archive: String,

        /// Created if missing and handed to the admin user
        #[arg(long)]
        destination: PathBuf,
    },

    /// Delete one archive
    Delete {
        #[arg(long)]
        volume: String,

        #[arg(long)]
        archive: String,
    },

    /// Check a service's repository
    Check {
        #[arg(long)]
        volume: String,

        /// Also re-read and verify all stored data
        #[arg(long)]
        verify_data: bool,
    },
}

pub fn handle_archive_command(
    runner: &dyn CommandRunner,
    settings: &Settings,
    cmd: ArchiveCommands,
) -> SnapvaultResult<()> {
    let zfs = VolumeManager::new(runner, &settings.tools.zfs, &settings.parent_dataset)?;
    let repository = |service: &str| ArchiveRepository::for_volume(runner, settings, &zfs.target(Some(service)));

    match cmd {
        ArchiveCommands::Create { volume, snapshot } => {
            info!("--- Starting Borg backup for service: {} ---", volume);
            let full_name = zfs.target(Some(&volume));
            let mounted = zfs
                .find_volume(&full_name)?
                .ok_or_else(|| SnapvaultError::volume_not_found(&full_name))?;

            let source = snapshot_path(&mounted.mount_point, &snapshot);
            if !source.exists() {
                error!("Snapshot path not found: {}", source.display());
                return Err(SnapvaultError::NotFound {
                    entity_type: "Snapshot path",
                    identifier: source.display().to_string(),
                });
            }

            let name = archive_name(&settings.archive_prefix, &snapshot);
            let repo = repository(&volume)?;
            repo.initialize_if_needed()?;
            repo.create_archive(&name, &source, &settings.compression, &settings.excludes_file)?;
            println!("Created archive {} in {}", name, repo.location());
        }

        ArchiveCommands::List { volume } => {
            info!("--- Listing archives for service: {} ---", volume);
            repository(&volume)?.list_archives_interactive()?;
        }

        ArchiveCommands::Extract {
            volume,
            archive,
            destination,
        } => {
            let destination = if destination.is_absolute() {
                destination
            } else {
                std::env::current_dir()?.join(destination)
            };
            HostFiles::new(runner, &settings.admin_user).ensure_owned_dir(&destination)?;
            repository(&volume)?.extract_archive(&archive, &destination)?;
            println!("Extraction complete. Files are in: {}", destination.display());
        }

        ArchiveCommands::Delete { volume, archive } => {
            repository(&volume)?.delete_archive(&archive)?;
            println!("Archive '{}' deleted.", archive);
        }

        ArchiveCommands::Check { volume, verify_data } => {
            repository(&volume)?.check_repository(verify_data)?;
            println!("Repository for {} passed the integrity check.", volume);
        }
    }

    Ok(())
}
