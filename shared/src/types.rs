//! Core shared types and identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Global process ID singleton - set once at startup
static PROCESS_ID: OnceLock<ProcessId> = OnceLock::new();

/// Identifies who emitted a log line: the harness itself or one of its children
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessId {
    /// The harness process driving the run
    Harness,
    /// The node under test
    Node,
    /// Auxiliary tool launched by a suite (load generator, scripted client)
    Auxiliary(String),
}

impl ProcessId {
    /// Initialize the global process ID for the harness
    pub fn init_harness() -> &'static ProcessId {
        PROCESS_ID.get_or_init(|| ProcessId::Harness)
    }

    /// Get the global process ID, defaulting to the harness
    pub fn current() -> &'static ProcessId {
        PROCESS_ID.get_or_init(|| ProcessId::Harness)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessId::Harness => write!(f, "harness"),
            ProcessId::Node => write!(f, "node"),
            ProcessId::Auxiliary(name) => write!(f, "aux_{name}"),
        }
    }
}

impl Default for ProcessId {
    fn default() -> Self {
        ProcessId::Harness
    }
}

/// Lifecycle of a spawned child process
///
/// Transitions only move forward: `Running -> Stopping -> Stopped`, or
/// `Running -> Stopped` when the process exits on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessState {
    Running,
    Stopping,
    Stopped,
}

impl ProcessState {
    pub fn is_running(&self) -> bool {
        matches!(self, ProcessState::Running)
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessState::Running => write!(f, "running"),
            ProcessState::Stopping => write!(f, "stopping"),
            ProcessState::Stopped => write!(f, "stopped"),
        }
    }
}
