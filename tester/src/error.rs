//! Harness error types

use serde::{Deserialize, Serialize};
use shared::SharedError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Failed to spawn '{command}': {source}")]
    SpawnFailure {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with status {status}")]
    NonZeroExit {
        command: String,
        status: String,
        output: String,
    },

    #[error("Node at {endpoint} not healthy after {waited:?} ({attempts} probes, last error: {})", .last_error.as_deref().unwrap_or("none"))]
    DeadlineExceeded {
        endpoint: String,
        waited: Duration,
        attempts: u32,
        last_error: Option<String>,
    },

    #[error("Suite '{suite}' failed: {message}")]
    SuiteFailure { suite: String, message: String },

    #[error("Process {label} did not exit within {grace:?} of SIGTERM and was killed")]
    StopTimeout { label: String, grace: Duration },

    #[error("Process {label} is not running")]
    ProcessNotRunning { label: String },

    #[error("No managed process with handle {id}")]
    UnknownProcess { id: String },

    #[error("Suite registry is closed; cannot register '{suite}' once execution has started")]
    RegistryClosed { suite: String },

    #[error("Suite '{suite}' is already registered")]
    DuplicateSuite { suite: String },

    #[error("Health client error: {message}")]
    HealthClient { message: String },

    #[error("Run interrupted during {phase}")]
    Interrupted { phase: String },

    #[error("Shared component error: {0}")]
    Shared(#[from] SharedError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serializable classification of a [`HarnessError`] used in run reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    SpawnFailure,
    NonZeroExit,
    DeadlineExceeded,
    SuiteFailure,
    StopTimeout,
    ProcessNotRunning,
    UnknownProcess,
    RegistryClosed,
    DuplicateSuite,
    HealthClient,
    Interrupted,
    Configuration,
    Io,
}

impl HarnessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HarnessError::SpawnFailure { .. } => ErrorKind::SpawnFailure,
            HarnessError::NonZeroExit { .. } => ErrorKind::NonZeroExit,
            HarnessError::DeadlineExceeded { .. } => ErrorKind::DeadlineExceeded,
            HarnessError::SuiteFailure { .. } => ErrorKind::SuiteFailure,
            HarnessError::StopTimeout { .. } => ErrorKind::StopTimeout,
            HarnessError::ProcessNotRunning { .. } => ErrorKind::ProcessNotRunning,
            HarnessError::UnknownProcess { .. } => ErrorKind::UnknownProcess,
            HarnessError::RegistryClosed { .. } => ErrorKind::RegistryClosed,
            HarnessError::DuplicateSuite { .. } => ErrorKind::DuplicateSuite,
            HarnessError::HealthClient { .. } => ErrorKind::HealthClient,
            HarnessError::Interrupted { .. } => ErrorKind::Interrupted,
            HarnessError::Shared(_) => ErrorKind::Configuration,
            HarnessError::Io(_) | HarnessError::Json(_) => ErrorKind::Io,
        }
    }

    /// Captured output attached to the error, if any
    pub fn output(&self) -> Option<&str> {
        match self {
            HarnessError::NonZeroExit { output, .. } => Some(output),
            _ => None,
        }
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;
