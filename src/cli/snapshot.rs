//! Snapshot CLI commands

use clap::Subcommand;

use crate::config::Settings;
use crate::display::format_snapshot_list;
use crate::error::SnapvaultResult;
use crate::pipeline::PartialMaintenance;
use crate::process::CommandRunner;
use crate::services::ComposeController;
use crate::zfs::VolumeManager;

/// Snapshot subcommands
#[derive(Subcommand)]
pub enum SnapshotCommands {
    /// Create a snapshot of one service volume, or of the parent dataset
    Create {
        /// Snapshot tag (generated from the current time if omitted)
        #[arg(short, long)]
        tag: Option<String>,

        /// Service name under the parent dataset
        #[arg(long)]
        volume: Option<String>,

        /// Include all descendant datasets
        #[arg(short, long)]
        recursive: bool,
    },

    /// Destroy a snapshot (no-op if it does not exist)
    Destroy {
        #[arg(short, long)]
        tag: String,

        #[arg(long)]
        volume: Option<String>,

        #[arg(short, long)]
        recursive: bool,
    },

    /// List snapshots, oldest first
    List {
        #[arg(long)]
        volume: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Take services down, snapshot everything recursively, bring them up
    Maintenance {
        /// Snapshot tag (partial-maintenance-<time> if omitted)
        #[arg(short, long)]
        tag: Option<String>,
    },
}

/// Handle a snapshot command
pub fn handle_snapshot_command(
    runner: &dyn CommandRunner,
    settings: &Settings,
    cmd: SnapshotCommands,
) -> SnapvaultResult<()> {
    let zfs = VolumeManager::new(runner, &settings.tools.zfs, &settings.parent_dataset)?;

    match cmd {
        SnapshotCommands::Create {
            tag,
            volume,
            recursive,
        } => {
            let id = zfs.create_snapshot(tag.as_deref(), volume.as_deref(), recursive)?;
            println!("Created snapshot: {}", id);
        }

        SnapshotCommands::Destroy {
            tag,
            volume,
            recursive,
        } => {
            let outcome = zfs.destroy_snapshot(&tag, volume.as_deref(), recursive)?;
            let target = format!("{}@{}", zfs.target(volume.as_deref()), tag);
            if outcome.applied() {
                println!("Destroyed snapshot: {}", target);
            } else {
                println!("Snapshot {} does not exist. Nothing to do.", target);
            }
        }

        SnapshotCommands::List { volume, json } => {
            let snapshots = zfs.snapshots(volume.as_deref()).collect_all()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshots)?);
            } else {
                println!("--- Snapshots under [{}] ---", zfs.target(volume.as_deref()));
                println!("{}", format_snapshot_list(&snapshots));
            }
        }

        SnapshotCommands::Maintenance { tag } => {
            let compose = ComposeController::from_settings(runner, settings);
            let mut maintenance = PartialMaintenance::new(&zfs, &compose);
            if let Some(tag) = tag {
                maintenance = maintenance.with_tag(tag);
            }
            let id = maintenance.run()?;
            println!("Maintenance snapshot: {}", id);
        }
    }

    Ok(())
}
