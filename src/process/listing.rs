//! Restartable, lazily parsed command listings
//!
//! A `Listing` pairs a command with a line parser. Every call to `iter()`
//! re-executes the command, so the same listing can be walked more than once
//! without ever holding the whole output in memory.

use tracing::{info, warn};

use super::command::CommandSpec;
use super::runner::{CommandRunner, LineStream};
use crate::error::SnapvaultResult;

/// Result of parsing one listing line
///
/// `Ok(Some(item))` yields an item, `Ok(None)` skips a well-formed line the
/// caller is not interested in, and `Err(reason)` marks a malformed line.
pub type ParsedLine<T> = Result<Option<T>, String>;

/// A finite producer of parsed items over a command's output
pub struct Listing<'r, T> {
    runner: &'r dyn CommandRunner,
    spec: CommandSpec,
    parse: fn(&str) -> ParsedLine<T>,
    label: &'static str,
}

impl<'r, T> Listing<'r, T> {
    pub fn new(
        runner: &'r dyn CommandRunner,
        spec: CommandSpec,
        parse: fn(&str) -> ParsedLine<T>,
        label: &'static str,
    ) -> Self {
        Self {
            runner,
            spec,
            parse,
            label,
        }
    }

    /// The command this listing runs
    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    /// Start a fresh pass over the listing
    pub fn iter(&self) -> SnapvaultResult<ListingIter<'r, T>> {
        info!("Running command: {}", self.spec);
        Ok(ListingIter {
            lines: self.runner.stream(&self.spec)?,
            parse: self.parse,
            label: self.label,
        })
    }

    /// Drain one pass into a vector, stopping at the first error
    pub fn collect_all(&self) -> SnapvaultResult<Vec<T>> {
        self.iter()?.collect()
    }
}

/// One pass over a `Listing`
pub struct ListingIter<'r, T> {
    lines: LineStream<'r>,
    parse: fn(&str) -> ParsedLine<T>,
    label: &'static str,
}

impl<T> Iterator for ListingIter<'_, T> {
    type Item = SnapvaultResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e)),
            };
            if line.trim().is_empty() {
                continue;
            }
            match (self.parse)(&line) {
                Ok(Some(item)) => return Some(Ok(item)),
                Ok(None) => continue,
                Err(reason) => {
                    warn!(
                        "Could not parse {} line: '{}' ({}). Skipping.",
                        self.label,
                        line.trim(),
                        reason
                    );
                }
            }
        }
    }
}
