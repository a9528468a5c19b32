//! Key export CLI command

use clap::Subcommand;

use crate::config::Settings;
use crate::error::{SnapvaultError, SnapvaultResult};
use crate::keys::export_all_keys;
use crate::process::CommandRunner;

#[derive(Subcommand)]
pub enum KeysCommands {
    /// Export and verify the recovery key of every dataset's repository
    Export,
}

pub fn handle_keys_command(
    runner: &dyn CommandRunner,
    settings: &Settings,
    cmd: KeysCommands,
) -> SnapvaultResult<()> {
    match cmd {
        KeysCommands::Export => {
            let summary = export_all_keys(runner, settings)?;

            println!("Key Export Summary");
            println!("==================");
            println!("  Successfully exported: {}", summary.exported.len());
            println!("  Failed to export:      {}", summary.failed.len());
            println!("  Keys are located in:   {}", summary.location.display());

            if !summary.all_succeeded() {
                return Err(SnapvaultError::Validation(format!(
                    "Key export failed for: {}",
                    summary.failed.join(", ")
                )));
            }
        }
    }
    Ok(())
}
