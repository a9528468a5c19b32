//! Logging setup
//!
//! Console output goes to stderr; when the log directory is writable the same
//! events are appended, without colour, to `snapvault.log` inside it.
//! `RUST_LOG` overrides the level chosen on the command line.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::SnapvaultPaths;

/// Default filter directive for a `-v` count
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber; returns the log file in use, if any
///
/// Calling this more than once leaves the first subscriber in place.
pub fn init(verbosity: u8, paths: Option<&SnapvaultPaths>) -> Option<PathBuf> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_for(verbosity)));

    let log_file = paths.and_then(|paths| {
        paths.ensure_directories().ok()?;
        let path = paths.log_file();
        let file = OpenOptions::new().create(true).append(true).open(&path).ok()?;
        Some((path, file))
    });

    let (path, file_layer) = match log_file {
        Some((path, file)) => (
            Some(path),
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file))),
        ),
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .try_init()
        .is_ok();

    if !installed {
        return None;
    }
    if path.is_none() {
        if let Some(paths) = paths {
            tracing::warn!(
                "Log directory {} is not writable; logging to the console only.",
                paths.log_dir().display()
            );
        }
    }
    path
}
