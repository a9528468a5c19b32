//! Repository-wide CLI commands

use clap::Subcommand;
use tracing::{info, warn};

use crate::borg::ArchiveRepository;
use crate::config::Settings;
use crate::error::SnapvaultResult;
use crate::process::CommandRunner;
use crate::zfs::VolumeManager;

#[derive(Subcommand)]
pub enum ReposCommands {
    /// Initialize the repository of every mounted dataset, if needed
    Init,

    /// Show statistics and archives of every dataset's repository
    Analyze,
}

pub fn handle_repos_command(
    runner: &dyn CommandRunner,
    settings: &Settings,
    cmd: ReposCommands,
) -> SnapvaultResult<()> {
    let zfs = VolumeManager::new(runner, &settings.tools.zfs, &settings.parent_dataset)?;
    let volumes = zfs.volumes().collect_all()?;
    if volumes.is_empty() {
        warn!("No ZFS datasets found under '{}'.", settings.parent_dataset);
        return Ok(());
    }

    match cmd {
        ReposCommands::Init => {
            info!("--> Initializing Borg repositories...");
            let mut created = 0;
            for volume in &volumes {
                let repo = ArchiveRepository::for_volume(runner, settings, &volume.name)?;
                if repo.initialize_if_needed()?.applied() {
                    created += 1;
                }
            }
            println!(
                "{} repositories ready ({} newly initialized).",
                volumes.len(),
                created
            );
        }

        ReposCommands::Analyze => {
            for (i, volume) in volumes.iter().enumerate() {
                info!("{}", "#".repeat(80));
                info!(
                    "Analyzing repository for service {}/{}: {}",
                    i + 1,
                    volumes.len(),
                    volume.short_name()
                );
                info!("{}", "#".repeat(80));
                ArchiveRepository::for_volume(runner, settings, &volume.name)?.display_info();
            }
            info!("Analysis of all service repositories is complete.");
        }
    }

    Ok(())
}
