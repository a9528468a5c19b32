//! Storage preparation CLI commands

use clap::Subcommand;

use crate::config::Settings;
use crate::error::SnapvaultResult;
use crate::process::CommandRunner;
use crate::services::ComposeController;
use crate::storage::HostPreparer;

#[derive(Subcommand)]
pub enum StorageCommands {
    /// Take services down and prepare datasets, users and permissions
    Prepare,
}

pub fn handle_storage_command(
    runner: &dyn CommandRunner,
    settings: &Settings,
    cmd: StorageCommands,
) -> SnapvaultResult<()> {
    match cmd {
        StorageCommands::Prepare => {
            let preparer = HostPreparer::from_settings(runner, settings)?;
            ComposeController::from_settings(runner, settings).down_all()?;
            let report = preparer.prepare()?;
            if report.is_noop() {
                println!("Host already prepared. Nothing to do.");
            } else {
                for change in &report.changes {
                    println!("  {}", change);
                }
                println!("Storage setup complete ({} changes).", report.changes.len());
            }
        }
    }

    Ok(())
}
