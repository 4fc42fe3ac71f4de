//! Subprocess runner
//!
//! Launches commands either to completion or in the background. Background
//! processes live in the runner's process table; callers only hold a
//! [`ProcessHandle`].

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use uuid::Uuid;

use super::process::{CommandOutput, CommandSpec, ManagedProcess, StopReport};
use crate::error::{HarnessError, HarnessResult};
use shared::{ProcessId, ProcessState, process_debug, process_info};

/// Opaque reference to a background process owned by a runner
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ProcessHandle {
    pub id: Uuid,
    pub pid: Option<u32>,
    pub label: String,
}

/// Process management abstraction
#[mockall::automock]
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run to completion, returning combined output
    ///
    /// A non-zero exit is an error that still carries the captured output.
    async fn run_sync(&self, spec: &CommandSpec) -> HarnessResult<CommandOutput>;

    /// Spawn without waiting
    async fn run_background(&self, spec: &CommandSpec) -> HarnessResult<ProcessHandle>;

    /// Terminate a background process and wait for it within the grace period
    async fn stop(&self, handle: &ProcessHandle) -> HarnessResult<StopReport>;

    /// Current state of a background process
    async fn status(&self, handle: &ProcessHandle) -> HarnessResult<ProcessState>;

    /// Output captured so far from a background process
    async fn output(&self, handle: &ProcessHandle) -> HarnessResult<String>;
}

struct Entry {
    process: Arc<tokio::sync::Mutex<ManagedProcess>>,
    state: watch::Receiver<ProcessState>,
}

/// Runner backed by real OS processes
///
/// Background processes stay in the table after they stop so their status and
/// output remain queryable; [`forget`](Self::forget) releases an entry.
pub struct SystemProcessRunner {
    processes: Mutex<HashMap<Uuid, Entry>>,
    stop_grace: Duration,
}

impl SystemProcessRunner {
    pub fn new(stop_grace: Duration) -> Self {
        Self {
            processes: Mutex::new(HashMap::new()),
            stop_grace,
        }
    }

    pub fn stop_grace(&self) -> Duration {
        self.stop_grace
    }

    /// Watch the state machine of a background process
    pub fn subscribe(&self, handle: &ProcessHandle) -> HarnessResult<watch::Receiver<ProcessState>> {
        let table = self.processes.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        table
            .get(&handle.id)
            .map(|entry| entry.state.clone())
            .ok_or_else(|| HarnessError::UnknownProcess { id: handle.id.to_string() })
    }

    /// Drop a background process from the table
    ///
    /// A process that is still running is killed along with its group.
    pub fn forget(&self, handle: &ProcessHandle) -> HarnessResult<()> {
        let removed = self
            .processes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&handle.id);

        match removed {
            Some(_) => {
                process_debug!(ProcessId::current(), "🗑️ Released {} from the process table", handle.label);
                Ok(())
            }
            None => Err(HarnessError::UnknownProcess { id: handle.id.to_string() }),
        }
    }

    fn lookup(&self, handle: &ProcessHandle) -> HarnessResult<(Arc<tokio::sync::Mutex<ManagedProcess>>, watch::Receiver<ProcessState>)> {
        let table = self.processes.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        table
            .get(&handle.id)
            .map(|entry| (entry.process.clone(), entry.state.clone()))
            .ok_or_else(|| HarnessError::UnknownProcess { id: handle.id.to_string() })
    }
}

impl Default for SystemProcessRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl ProcessRunner for SystemProcessRunner {
    async fn run_sync(&self, spec: &CommandSpec) -> HarnessResult<CommandOutput> {
        let started = Instant::now();
        process_info!(ProcessId::current(), "▶️ Running {}", spec);

        let mut process = ManagedProcess::spawn(spec, false)?;
        let status = process.wait().await?;
        let output = process.output();

        process_debug!(
            ProcessId::current(),
            "🏁 {} exited with {} after {:?}",
            spec.label(),
            status,
            started.elapsed()
        );

        if !status.success() {
            return Err(HarnessError::NonZeroExit {
                command: spec.to_string(),
                status: status.to_string(),
                output,
            });
        }

        Ok(CommandOutput {
            command: spec.to_string(),
            exit_code: status.code(),
            output,
            duration: started.elapsed(),
        })
    }

    async fn run_background(&self, spec: &CommandSpec) -> HarnessResult<ProcessHandle> {
        let process = ManagedProcess::spawn(spec, true)?;
        let handle = ProcessHandle {
            id: Uuid::new_v4(),
            pid: process.pid(),
            label: spec.label(),
        };

        let entry = Entry {
            state: process.subscribe(),
            process: Arc::new(tokio::sync::Mutex::new(process)),
        };
        self.processes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(handle.id, entry);

        process_info!(ProcessId::current(), "🔄 {} running in background (PID: {:?})", handle.label, handle.pid);
        Ok(handle)
    }

    async fn stop(&self, handle: &ProcessHandle) -> HarnessResult<StopReport> {
        let (process, _) = self.lookup(handle)?;
        let mut process = process.lock().await;
        let report = process.terminate(self.stop_grace).await?;

        process_info!(
            ProcessId::current(),
            "🛑 Stopped {} in {:?} (exit code: {:?})",
            handle.label,
            report.elapsed,
            report.exit_code
        );
        Ok(report)
    }

    async fn status(&self, handle: &ProcessHandle) -> HarnessResult<ProcessState> {
        let (process, state) = self.lookup(handle)?;

        // A stop in progress holds the lock; the watched state is current then
        let current = match process.try_lock() {
            Ok(mut process) => process.refresh(),
            Err(_) => *state.borrow(),
        };
        Ok(current)
    }

    async fn output(&self, handle: &ProcessHandle) -> HarnessResult<String> {
        let (process, _) = self.lookup(handle)?;
        let process = process.lock().await;
        Ok(process.output())
    }
}
