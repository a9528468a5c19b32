use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use snapvault::cli::{
    handle_archive_command, handle_backup_command, handle_dataset_command, handle_keys_command,
    handle_repos_command, handle_services_command, handle_snapshot_command, handle_storage_command,
    require_root,
};
use snapvault::config::{paths::resolve_env_file, Settings};
use snapvault::logging;
use snapvault::process::SystemRunner;

#[derive(Parser)]
#[command(
    name = "snapvault",
    version,
    about = "Consistent ZFS snapshots archived into per-volume BorgBackup repositories",
    long_about = "snapvault stops services just long enough to take one recursive ZFS \
                  snapshot, then archives every mounted dataset into its own encrypted \
                  Borg repository, prunes and checks each one, and cleans the snapshot \
                  up only when everything succeeded."
)]
struct Cli {
    /// Configuration file (dotenv format)
    #[arg(long, global = true, env = "SNAPVAULT_ENV_FILE")]
    env_file: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// ZFS snapshot management
    #[command(subcommand)]
    Snapshot(snapvault::cli::SnapshotCommands),

    /// ZFS dataset management
    #[command(subcommand)]
    Dataset(snapvault::cli::DatasetCommands),

    /// Borg archive management for one service
    #[command(subcommand)]
    Archive(snapvault::cli::ArchiveCommands),

    /// Operations across every dataset's repository
    #[command(subcommand)]
    Repos(snapvault::cli::ReposCommands),

    /// Recovery key management
    #[command(subcommand)]
    Keys(snapvault::cli::KeysCommands),

    /// Docker Compose service groups
    #[command(subcommand)]
    Services(snapvault::cli::ServicesCommands),

    /// Full backup runs
    #[command(subcommand)]
    Backup(snapvault::cli::BackupCommands),

    /// Host storage preparation
    #[command(subcommand)]
    Storage(snapvault::cli::StorageCommands),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_file = resolve_env_file(cli.env_file.as_deref());
    let settings = Settings::load(&env_file);
    let paths = settings.as_ref().ok().map(Settings::paths);
    logging::init(cli.verbose, paths.as_ref());

    require_root()?;
    let settings = settings?;
    let runner = SystemRunner::new();

    match cli.command {
        Commands::Snapshot(cmd) => handle_snapshot_command(&runner, &settings, cmd)?,
        Commands::Dataset(cmd) => handle_dataset_command(&runner, &settings, cmd)?,
        Commands::Archive(cmd) => handle_archive_command(&runner, &settings, cmd)?,
        Commands::Repos(cmd) => handle_repos_command(&runner, &settings, cmd)?,
        Commands::Keys(cmd) => handle_keys_command(&runner, &settings, cmd)?,
        Commands::Services(cmd) => handle_services_command(&runner, &settings, cmd)?,
        Commands::Backup(cmd) => handle_backup_command(&runner, &settings, cmd)?,
        Commands::Storage(cmd) => handle_storage_command(&runner, &settings, cmd)?,
    }

    Ok(())
}
