//! Run journal records

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Pipeline milestones recorded in the journal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    RunStarted,
    SnapshotCreated,
    VolumeArchived,
    VolumeChecked,
    SnapshotDestroyed,
    RunSucceeded,
    RunFailed,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EventKind::RunStarted => "RUN STARTED",
            EventKind::SnapshotCreated => "SNAPSHOT CREATED",
            EventKind::VolumeArchived => "VOLUME ARCHIVED",
            EventKind::VolumeChecked => "VOLUME CHECKED",
            EventKind::SnapshotDestroyed => "SNAPSHOT DESTROYED",
            EventKind::RunSucceeded => "RUN SUCCEEDED",
            EventKind::RunFailed => "RUN FAILED",
        };
        write!(f, "{}", label)
    }
}

/// One line of the run journal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    /// When the event was recorded (UTC)
    pub timestamp: DateTime<Utc>,

    /// Identifies all events of one pipeline run
    pub run_id: Uuid,

    pub kind: EventKind,

    /// Snapshot tag of the run
    pub tag: String,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub volume: Option<String>,

    /// Error text for failures
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub detail: Option<String>,

    /// Set on `run_failed` when the snapshot was left in place
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub retained_snapshot: Option<String>,
}

impl RunEvent {
    pub fn new(run_id: Uuid, kind: EventKind, tag: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            run_id,
            kind,
            tag: tag.into(),
            volume: None,
            detail: None,
            retained_snapshot: None,
        }
    }

    pub fn with_volume(mut self, volume: impl Into<String>) -> Self {
        self.volume = Some(volume.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_retained_snapshot(mut self, snapshot: impl Into<String>) -> Self {
        self.retained_snapshot = Some(snapshot.into());
        self
    }

    /// Single-line summary for `backup history`
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} [{}] {} {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            short_id(&self.run_id),
            self.kind,
            self.tag
        );
        if let Some(volume) = &self.volume {
            line.push_str(&format!(" volume={}", volume));
        }
        if let Some(snapshot) = &self.retained_snapshot {
            line.push_str(&format!(" retained={}", snapshot));
        }
        if let Some(detail) = &self.detail {
            line.push_str(&format!(" ({})", detail));
        }
        line
    }
}

fn short_id(id: &Uuid) -> String {
    id.to_string().chars().take(8).collect()
}
