//! Observable progress of a backup run

use std::fmt;

use serde::Serialize;

/// Per-volume phase of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Archive,
    Check,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Archive => write!(f, "archive"),
            Phase::Check => write!(f, "check"),
        }
    }
}

/// Which volume stopped the run, and where
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeFailure {
    pub volume: String,
    pub phase: Phase,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunState {
    /// Snapshot tag shared by every volume of the run
    pub tag: String,
    /// True from a verified snapshot creation until its verified destruction
    pub snapshot_created: bool,
    pub archived: Vec<String>,
    pub checked: Vec<String>,
    pub failure: Option<VolumeFailure>,
}

impl RunState {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            snapshot_created: false,
            archived: Vec::new(),
            checked: Vec::new(),
            failure: None,
        }
    }

    pub(crate) fn fail(&mut self, volume: &str, phase: Phase) {
        self.failure = Some(VolumeFailure {
            volume: volume.to_string(),
            phase,
        });
    }
}
