//! Custom error types for snapvault
//!
//! This module defines the error hierarchy for the application using thiserror
//! for ergonomic error definitions.

use thiserror::Error;

/// The main error type for snapvault operations
#[derive(Error, Debug)]
pub enum SnapvaultError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Invalid input supplied by the operator
    #[error("Validation error: {0}")]
    Validation(String),

    /// The process lacks the privileges it needs
    #[error("Privilege error: {0}")]
    Privilege(String),

    /// An external program could not be started at all
    #[error("Failed to execute '{command}': {reason}")]
    CommandSpawn { command: String, reason: String },

    /// An external program exited with an unexpected status
    #[error("Command '{command}' failed with exit code {exit_code}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    /// A mutating command reported success but the state did not change
    #[error("Verification failed: {resource} '{identifier}' was expected to be {expected} but is not")]
    PostconditionViolation {
        resource: &'static str,
        identifier: String,
        expected: &'static str,
    },

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// Non-idempotent creation of something that is already there
    #[error("{entity_type} already exists: {identifier}")]
    AlreadyExists {
        entity_type: &'static str,
        identifier: String,
    },

    /// Volume discovery came back empty
    #[error("Found 0 mounted volumes to back up under '{parent}'")]
    NoVolumesFound { parent: String },
}

impl SnapvaultError {
    /// Create a "not found" error for volumes
    pub fn volume_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Volume",
            identifier: identifier.into(),
        }
    }

    /// Create an "already exists" error
    pub fn already_exists(entity_type: &'static str, identifier: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity_type,
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is an "already exists" error
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Check if this is a failed post-mutation verification
    pub fn is_postcondition(&self) -> bool {
        matches!(self, Self::PostconditionViolation { .. })
    }

    /// Exit code of the external command behind this error, if any
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::CommandFailed { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SnapvaultError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SnapvaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for snapvault operations
pub type SnapvaultResult<T> = Result<T, SnapvaultError>;
