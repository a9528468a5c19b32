//! Backup CLI commands
//!
//! Runs the full pipeline and reads back the run journal.

use clap::Subcommand;

use crate::config::Settings;
use crate::display::{format_history, format_run_summary};
use crate::error::SnapvaultResult;
use crate::journal::RunJournal;
use crate::pipeline::BackupPipeline;
use crate::process::CommandRunner;
use crate::services::ComposeController;

/// Backup subcommands
#[derive(Subcommand)]
pub enum BackupCommands {
    /// Snapshot, archive, prune and check every dataset
    Run,

    /// Show recent backup run events
    History {
        /// Number of events to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
}

/// Handle a backup command
pub fn handle_backup_command(
    runner: &dyn CommandRunner,
    settings: &Settings,
    cmd: BackupCommands,
) -> SnapvaultResult<()> {
    let journal = RunJournal::new(settings.paths().journal_file());

    match cmd {
        BackupCommands::Run => {
            let services = ComposeController::from_settings(runner, settings);
            let mut pipeline = BackupPipeline::new(runner, settings, &services)?.with_journal(&journal);

            let result = pipeline.run();

            println!();
            println!("Backup Run");
            println!("==========");
            print!("{}", format_run_summary(&settings.parent_dataset, pipeline.state()));
            result?;
            println!("Backup completed successfully.");
        }

        BackupCommands::History { limit } => {
            let events = journal.read_recent(limit)?;
            println!("{}", format_history(&events));
        }
    }

    Ok(())
}
