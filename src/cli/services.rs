//! Service group CLI commands

use clap::Subcommand;

use crate::config::Settings;
use crate::error::SnapvaultResult;
use crate::process::CommandRunner;
use crate::services::{ComposeController, ServiceGroupController};

#[derive(Subcommand)]
pub enum ServicesCommands {
    /// Stop every service's containers
    Stop,
    /// Start previously created containers
    Start,
    /// Build, create and start every service
    Up,
    /// Stop and remove every service's containers
    Down,
    /// Pull the latest images
    Pull,
    /// Restart running containers
    Restart,
    /// Create the external networks the compose files expect
    Networks,
}

pub fn handle_services_command(
    runner: &dyn CommandRunner,
    settings: &Settings,
    cmd: ServicesCommands,
) -> SnapvaultResult<()> {
    let compose = ComposeController::from_settings(runner, settings);

    match cmd {
        ServicesCommands::Stop => compose.stop_all()?,
        ServicesCommands::Start => compose.start_all()?,
        ServicesCommands::Up => compose.up_all()?,
        ServicesCommands::Down => compose.down_all()?,
        ServicesCommands::Pull => compose.pull_all()?,
        ServicesCommands::Restart => compose.restart_all()?,
        ServicesCommands::Networks => {
            let created = compose.create_networks()?;
            if created.is_empty() {
                println!("All external networks already exist.");
            } else {
                println!("Created networks: {}", created.join(", "));
            }
        }
    }

    Ok(())
}
