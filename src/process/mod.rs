//! External command execution for snapvault
//!
//! Every interaction with ZFS, Borg and Docker goes through this module.
//!
//! # Architecture
//!
//! - `CommandSpec`: an inert description of one invocation
//! - `CommandRunner`: executes specs (`SystemRunner` for the real host)
//! - `CommandOutput`: exit code plus captured streams, with helpers that turn
//!   non-zero exits into `CommandFailed` or interpret existence queries
//! - `Listing`: a restartable lazy producer over streamed output, decoupled
//!   from the parsing functions so those can be tested against canned text

mod command;
mod listing;
mod runner;

#[cfg(test)]
pub(crate) mod scripted;

pub use command::{CommandOutput, CommandSpec, OutputMode};
pub use listing::{Listing, ListingIter, ParsedLine};
pub use runner::{CommandRunner, LineStream, SystemRunner};

use tracing::{debug, info};

use crate::error::SnapvaultResult;

/// Run a command that must succeed
///
/// Logs the command line before running it; a non-zero exit is logged with
/// both output streams and returned as `CommandFailed`.
pub fn execute(runner: &dyn CommandRunner, spec: &CommandSpec) -> SnapvaultResult<CommandOutput> {
    info!("Running command: {}", spec);
    let output = runner.run(spec)?.into_result(spec)?;
    info!("Command '{}' executed successfully.", spec);
    Ok(output)
}

/// Run a command, accepting any of `ok_codes` as success
pub fn execute_accepting(
    runner: &dyn CommandRunner,
    spec: &CommandSpec,
    ok_codes: &[i32],
) -> SnapvaultResult<CommandOutput> {
    info!("Running command: {}", spec);
    runner.run(spec)?.accept_codes(spec, ok_codes)
}

/// Run an existence query and interpret it as found / not found / fault
pub fn query_exists(
    runner: &dyn CommandRunner,
    spec: &CommandSpec,
    not_found_code: i32,
) -> SnapvaultResult<bool> {
    debug!("Running query: {}", spec);
    runner.run(spec)?.presence(spec, not_found_code)
}
