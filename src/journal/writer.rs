//! Append-only JSON Lines journal of backup runs
//!
//! Each pipeline milestone becomes one line, flushed immediately, so an
//! interrupted run still leaves a record of how far it got.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use super::entry::RunEvent;
use crate::error::{SnapvaultError, SnapvaultResult};

pub struct RunJournal {
    path: PathBuf,
}

impl RunJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Append one event
    pub fn log(&self, event: &RunEvent) -> SnapvaultResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| SnapvaultError::Io(format!("Failed to create journal directory: {}", e)))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| SnapvaultError::Io(format!("Failed to open run journal: {}", e)))?;

        let json = serde_json::to_string(event)
            .map_err(|e| SnapvaultError::Json(format!("Failed to serialize run event: {}", e)))?;

        writeln!(file, "{}", json)
            .map_err(|e| SnapvaultError::Io(format!("Failed to write run event: {}", e)))?;

        file.flush()
            .map_err(|e| SnapvaultError::Io(format!("Failed to flush run journal: {}", e)))?;

        Ok(())
    }

    /// Append one event; a failure is logged and otherwise ignored
    pub fn record(&self, event: &RunEvent) {
        if let Err(e) = self.log(event) {
            warn!("Could not record '{}' in {}: {}", event.kind, self.path.display(), e);
        }
    }

    /// All events, oldest first
    pub fn read_all(&self) -> SnapvaultResult<Vec<RunEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)
            .map_err(|e| SnapvaultError::Io(format!("Failed to open run journal: {}", e)))?;

        let mut events = Vec::new();
        for (line_num, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| {
                SnapvaultError::Io(format!("Failed to read journal line {}: {}", line_num + 1, e))
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let event: RunEvent = serde_json::from_str(&line).map_err(|e| {
                SnapvaultError::Json(format!(
                    "Failed to parse run event at line {}: {}",
                    line_num + 1,
                    e
                ))
            })?;
            events.push(event);
        }

        Ok(events)
    }

    /// The most recent `count` events, oldest first
    pub fn read_recent(&self, count: usize) -> SnapvaultResult<Vec<RunEvent>> {
        let mut events = self.read_all()?;
        let start = events.len().saturating_sub(count);
        Ok(events.split_off(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::entry::EventKind;
    use tempfile::TempDir;
    use uuid::Uuid;

    #[test]
    fn test_log_and_read() {
        let dir = TempDir::new().unwrap();
        let journal = RunJournal::new(dir.path().join("logs").join("runs.jsonl"));
        let run_id = Uuid::new_v4();

        journal.log(&RunEvent::new(run_id, EventKind::RunStarted, "t")).unwrap();
        journal
            .log(&RunEvent::new(run_id, EventKind::VolumeArchived, "t").with_volume("pool/svcs/a"))
            .unwrap();

        let events = journal.read_all().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].volume.as_deref(), Some("pool/svcs/a"));
        assert!(events.iter().all(|e| e.run_id == run_id));
    }

    #[test]
    fn test_read_recent() {
        let dir = TempDir::new().unwrap();
        let journal = RunJournal::new(dir.path().join("runs.jsonl"));
        for kind in [EventKind::RunStarted, EventKind::SnapshotCreated, EventKind::RunSucceeded] {
            journal.log(&RunEvent::new(Uuid::nil(), kind, "t")).unwrap();
        }

        let recent = journal.read_recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].kind, EventKind::SnapshotCreated);
        assert_eq!(journal.read_recent(10).unwrap().len(), 3);
    }

    #[test]
    fn test_missing_journal_is_empty() {
        let dir = TempDir::new().unwrap();
        let journal = RunJournal::new(dir.path().join("absent.jsonl"));
        assert!(!journal.exists());
        assert!(journal.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_record_swallows_errors() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be makes every append fail.
        let journal = RunJournal::new(dir.path().to_path_buf());
        journal.record(&RunEvent::new(Uuid::nil(), EventKind::RunStarted, "t"));
        assert!(journal.log(&RunEvent::new(Uuid::nil(), EventKind::RunStarted, "t")).is_err());
    }
}
