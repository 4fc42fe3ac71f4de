//! Run report
//!
//! Everything a run produced: where the lifecycle ended, what the suites did,
//! and what went wrong during setup or teardown.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use uuid::Uuid;

use crate::error::{ErrorKind, HarnessError, HarnessResult};
use crate::runtime::ReadyReport;
use crate::suites::{AggregateResult, SuiteOutcome};
use shared::{ProcessId, process_error, process_info, process_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Idle,
    Starting,
    AwaitingHealth,
    Ready,
    Running,
    TearingDown,
    Done,
    Failed,
}

impl LifecycleState {
    /// Legal forward transitions
    ///
    /// `Failed` is only reachable while setting up; once suites run, the
    /// guard always tears down to `Done`.
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Idle, Starting)
                | (Starting, AwaitingHealth)
                | (Starting, Failed)
                | (AwaitingHealth, Ready)
                | (AwaitingHealth, Failed)
                | (Ready, Running)
                | (Running, TearingDown)
                | (TearingDown, Done)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, LifecycleState::Done | LifecycleState::Failed)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Idle => "idle",
            LifecycleState::Starting => "starting",
            LifecycleState::AwaitingHealth => "awaiting_health",
            LifecycleState::Ready => "ready",
            LifecycleState::Running => "running",
            LifecycleState::TearingDown => "tearing_down",
            LifecycleState::Done => "done",
            LifecycleState::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// Serializable record of a run-level error
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunFailure {
    pub phase: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl RunFailure {
    pub fn new<S: Into<String>>(phase: S, error: &HarnessError) -> Self {
        Self {
            phase: phase.into(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub final_state: LifecycleState,
    pub history: Vec<LifecycleState>,
    pub readiness: Option<ReadyReport>,
    pub suites: Option<AggregateResult>,
    /// Setup failure or interrupt
    pub run_failure: Option<RunFailure>,
    pub teardown_failure: Option<RunFailure>,
    pub teardown_invoked: bool,
    pub node_output_tail: Option<String>,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            final_state: LifecycleState::Idle,
            history: vec![LifecycleState::Idle],
            readiness: None,
            suites: None,
            run_failure: None,
            teardown_failure: None,
            teardown_invoked: false,
            node_output_tail: None,
        }
    }

    pub(crate) fn transition(&mut self, next: LifecycleState) {
        if !self.final_state.can_transition_to(next) {
            process_warn!(
                ProcessId::current(),
                "⚠️ Unexpected lifecycle transition {} -> {}",
                self.final_state,
                next
            );
        }
        process_info!(ProcessId::current(), "🔁 Lifecycle: {} -> {}", self.final_state, next);
        self.final_state = next;
        self.history.push(next);
    }

    /// Record a setup failure and move to `Failed`
    pub(crate) fn fail(&mut self, phase: &str, error: &HarnessError) {
        process_error!(ProcessId::current(), "❌ {} failed: {}", phase, error);
        self.run_failure = Some(RunFailure::new(phase, error));
        self.transition(LifecycleState::Failed);
    }

    pub fn setup_failed(&self) -> bool {
        self.final_state == LifecycleState::Failed
    }

    /// Setup succeeded, every suite passed and teardown was clean
    pub fn passed(&self) -> bool {
        self.run_failure.is_none()
            && self.teardown_failure.is_none()
            && self.suites.as_ref().is_some_and(AggregateResult::passed)
    }

    pub fn exit_code(&self) -> u8 {
        if self.passed() { 0 } else { 1 }
    }

    pub fn to_json(&self) -> HarnessResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> HarnessResult<()> {
        std::fs::write(path, self.to_json()?)?;
        process_info!(ProcessId::current(), "📝 Run report written to {}", path.display());
        Ok(())
    }

    pub fn log_summary(&self) {
        process_info!(ProcessId::current(), "📋 Run {} finished in state {}", self.run_id, self.final_state);

        if let Some(suites) = &self.suites {
            for report in &suites.suites {
                match &report.outcome {
                    SuiteOutcome::Passed => {
                        process_info!(ProcessId::current(), "  ✅ {} ({:?})", report.name, report.duration);
                    }
                    SuiteOutcome::Failed(message) => {
                        process_error!(ProcessId::current(), "  ❌ {}: {}", report.name, message);
                    }
                    SuiteOutcome::NotRun(reason) => {
                        process_warn!(ProcessId::current(), "  ⏸️ {}: not run ({})", report.name, reason);
                    }
                    SuiteOutcome::Skipped(reason) => {
                        process_info!(ProcessId::current(), "  ⏭️ {}: skipped ({})", report.name, reason);
                    }
                }
            }
        }

        if let Some(failure) = &self.run_failure {
            process_error!(ProcessId::current(), "❌ Run failed during {}: {}", failure.phase, failure.message);
        }
        if let Some(failure) = &self.teardown_failure {
            process_error!(ProcessId::current(), "❌ Teardown failed: {}", failure.message);
        }

        if let Some(first) = self.suites.as_ref().and_then(|suites| suites.failures().into_iter().next()) {
            process_error!(ProcessId::current(), "❌ First failure: {}", first);
        }

        if self.passed() {
            process_info!(ProcessId::current(), "🎉 All suites passed");
        } else {
            process_error!(ProcessId::current(), "💥 Run failed (exit code {})", self.exit_code());
        }
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}
