//! Dataset CLI commands

use clap::Subcommand;

use crate::config::Settings;
use crate::display::format_volume_list;
use crate::error::SnapvaultResult;
use crate::process::CommandRunner;
use crate::zfs::VolumeManager;

#[derive(Subcommand)]
pub enum DatasetCommands {
    /// Create the dataset for a service (parents included)
    Create {
        /// Service name under the parent dataset
        name: String,
    },

    /// List mounted datasets under the parent
    List {
        #[arg(long)]
        json: bool,
    },
}

pub fn handle_dataset_command(
    runner: &dyn CommandRunner,
    settings: &Settings,
    cmd: DatasetCommands,
) -> SnapvaultResult<()> {
    let zfs = VolumeManager::new(runner, &settings.tools.zfs, &settings.parent_dataset)?;

    match cmd {
        DatasetCommands::Create { name } => {
            let full_name = zfs.target(Some(&name));
            if zfs.create_volume(&name, true)?.applied() {
                println!("Created dataset: {}", full_name);
            } else {
                println!("Dataset {} already exists.", full_name);
            }
        }

        DatasetCommands::List { json } => {
            let volumes = zfs.volumes().collect_all()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&volumes)?);
            } else {
                println!("{}", format_volume_list(&volumes));
            }
        }
    }

    Ok(())
}
