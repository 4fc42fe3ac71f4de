//! Runtime Management
//!
//! This module handles subprocess management and node readiness during test execution.

pub mod health;
pub mod output;
pub mod process;
pub mod readiness;
pub mod runner;

// Re-export main types
pub use health::{HealthCheck, HealthProbeResult, HttpHealthCheck, MockHealthCheck};
pub use output::OutputBuffer;
pub use process::{CommandOutput, CommandSpec, ManagedProcess, StopReport};
pub use readiness::{ReadinessProber, ReadyReport, RunContext};
pub use runner::{MockProcessRunner, ProcessHandle, ProcessRunner, SystemProcessRunner};
