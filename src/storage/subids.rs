//! Subordinate id ranges in `/etc/subuid` and `/etc/subgid`

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

use crate::error::{SnapvaultError, SnapvaultResult};
use crate::lifecycle::{converge, Outcome, Transition};

/// Whether `file` holds `mapping` as a whole line; a missing file holds nothing
pub fn has_mapping(file: &Path, mapping: &str) -> SnapvaultResult<bool> {
    match fs::read_to_string(file) {
        Ok(content) => Ok(content.lines().any(|line| line.trim() == mapping)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(SnapvaultError::Io(format!("Failed to read {}: {}", file.display(), e))),
    }
}

/// Append `mapping` to `file` unless it is already there
pub fn ensure_mapping(file: &Path, mapping: &str) -> SnapvaultResult<Outcome> {
    let identifier = format!("{} in {}", mapping, file.display());
    converge(
        &Transition::ensure_present("Subordinate id mapping", &identifier),
        || has_mapping(file, mapping),
        || append_line(file, mapping),
    )
}

fn append_line(file: &Path, line: &str) -> SnapvaultResult<()> {
    let needs_newline = fs::read(file)
        .map(|bytes| !bytes.is_empty() && !bytes.ends_with(b"\n"))
        .unwrap_or(false);

    let mut handle = OpenOptions::new().create(true).append(true).open(file)?;
    if needs_newline {
        handle.write_all(b"\n")?;
    }
    writeln!(handle, "{}", line)?;
    handle.flush()?;
    Ok(())
}
