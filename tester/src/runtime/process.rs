//! Managed child processes
//!
//! A [`ManagedProcess`] owns one spawned OS process together with its
//! captured output and an explicit `Running -> Stopping -> Stopped` state
//! machine. Only the process runner creates and mutates these.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

use super::output::{OutputBuffer, configure_child_stdio, drain_consumers, spawn_output_consumers};
use crate::error::{HarnessError, HarnessResult};
use shared::{ProcessId, ProcessState, process_debug, process_warn};

/// How long to wait for output pumps after the child has exited
const OUTPUT_DRAIN_LIMIT: Duration = Duration::from_secs(2);

/// Liveness check cadence for a process group whose leader is gone
#[cfg(unix)]
const GROUP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// What to launch and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub workdir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            workdir: None,
            env: Vec::new(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn env<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Short name for logs: the program's file name
    pub fn label(&self) -> String {
        std::path::Path::new(&self.program)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.clone())
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        configure_child_stdio(&mut cmd);
        cmd.kill_on_drop(true);
        cmd
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Result of a synchronous run that exited successfully
#[derive(Debug, Clone, Serialize)]
pub struct CommandOutput {
    pub command: String,
    pub exit_code: Option<i32>,
    pub output: String,
    pub duration: Duration,
}

/// Result of a clean stop
#[derive(Debug, Clone, Serialize)]
pub struct StopReport {
    pub exit_code: Option<i32>,
    pub output: String,
    pub elapsed: Duration,
}

pub struct ManagedProcess {
    spec: CommandSpec,
    child: Child,
    pid: Option<u32>,
    own_group: bool,
    state: ProcessState,
    state_tx: watch::Sender<ProcessState>,
    output: OutputBuffer,
    consumers: Vec<JoinHandle<()>>,
    exit_status: Option<ExitStatus>,
    started_at: Instant,
}

impl ManagedProcess {
    /// Spawn `spec` with captured output
    ///
    /// With `own_group` the child leads a new process group, so stop signals
    /// also reach anything a wrapper script launched.
    pub fn spawn(spec: &CommandSpec, own_group: bool) -> HarnessResult<Self> {
        let mut cmd = spec.to_command();

        #[cfg(unix)]
        if own_group {
            cmd.process_group(0);
        }

        let mut child = cmd.spawn().map_err(|source| HarnessError::SpawnFailure {
            command: spec.to_string(),
            source,
        })?;

        let output = OutputBuffer::new();
        let consumers = spawn_output_consumers(&mut child, &output);
        let pid = child.id();
        let (state_tx, _) = watch::channel(ProcessState::Running);

        process_debug!(ProcessId::current(), "🚀 Spawned {} (PID: {:?})", spec, pid);

        Ok(Self {
            spec: spec.clone(),
            child,
            pid,
            own_group,
            state: ProcessState::Running,
            state_tx,
            output,
            consumers,
            exit_status: None,
            started_at: Instant::now(),
        })
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Everything captured so far
    pub fn output(&self) -> String {
        self.output.snapshot()
    }

    /// Watch state transitions as they happen
    pub fn subscribe(&self) -> watch::Receiver<ProcessState> {
        self.state_tx.subscribe()
    }

    fn set_state(&mut self, state: ProcessState) {
        self.state = state;
        self.state_tx.send_replace(state);
    }

    /// Pick up an exit that happened on its own
    pub fn refresh(&mut self) -> ProcessState {
        if self.state == ProcessState::Running {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    self.exit_status = Some(status);
                    self.set_state(ProcessState::Stopped);
                }
                Ok(None) => {}
                Err(e) => {
                    process_warn!(ProcessId::current(), "⚠️ Error checking {} status: {}", self.spec.label(), e);
                }
            }
        }
        self.state
    }

    /// Block until the process exits and its output is final
    pub async fn wait(&mut self) -> HarnessResult<ExitStatus> {
        let status = self.child.wait().await?;
        self.finish(status).await;
        Ok(status)
    }

    async fn finish(&mut self, status: ExitStatus) {
        self.exit_status = Some(status);
        drain_consumers(std::mem::take(&mut self.consumers), OUTPUT_DRAIN_LIMIT).await;
        self.set_state(ProcessState::Stopped);
    }

    /// SIGTERM, then wait up to `grace` for the exit
    ///
    /// A process still alive after `grace` is killed and the stop is reported
    /// as [`HarnessError::StopTimeout`]. When the group leader has already
    /// exited, whatever it left behind in its group is still terminated before
    /// [`HarnessError::ProcessNotRunning`] is returned.
    pub async fn terminate(&mut self, grace: Duration) -> HarnessResult<StopReport> {
        let label = self.spec.label();
        if self.refresh() != ProcessState::Running {
            self.sweep_group(grace).await;
            return Err(HarnessError::ProcessNotRunning { label });
        }

        let started = Instant::now();
        self.set_state(ProcessState::Stopping);
        process_debug!(ProcessId::current(), "📤 Sending SIGTERM to {} (PID: {:?})", label, self.pid);

        if let Err(e) = self.send_terminate() {
            process_warn!(ProcessId::current(), "⚠️ Failed to signal {}: {}", label, e);
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                self.finish(status).await;
                Ok(StopReport {
                    exit_code: status.code(),
                    output: self.output.snapshot(),
                    elapsed: started.elapsed(),
                })
            }
            Ok(Err(e)) => {
                self.set_state(ProcessState::Stopped);
                Err(e.into())
            }
            Err(_) => {
                process_warn!(
                    ProcessId::current(),
                    "🔨 {} did not exit within {:?}, force killing",
                    label,
                    grace
                );
                self.force_kill().await;
                Err(HarnessError::StopTimeout { label, grace })
            }
        }
    }

    async fn force_kill(&mut self) {
        #[cfg(unix)]
        if let Err(e) = self.signal(Signal::SIGKILL) {
            process_warn!(ProcessId::current(), "⚠️ SIGKILL to {} failed: {}", self.spec.label(), e);
        }

        if let Err(e) = self.child.start_kill() {
            process_debug!(ProcessId::current(), "start_kill on {}: {}", self.spec.label(), e);
        }

        match self.child.wait().await {
            Ok(status) => self.finish(status).await,
            Err(_) => self.set_state(ProcessState::Stopped),
        }
    }

    /// SIGTERM the leftover group members, SIGKILL them after `grace`
    #[cfg(unix)]
    async fn sweep_group(&self, grace: Duration) {
        let Some(group) = self.group() else {
            return;
        };
        let label = self.spec.label();

        match signal::killpg(group, Signal::SIGTERM) {
            Ok(()) => {}
            Err(Errno::ESRCH) => return,
            Err(errno) => {
                process_warn!(ProcessId::current(), "⚠️ Failed to signal process group of {}: {}", label, errno);
                return;
            }
        }
        process_debug!(ProcessId::current(), "📤 {} already exited, SIGTERM sent to its process group", label);

        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if signal::killpg(group, None) == Err(Errno::ESRCH) {
                return;
            }
            tokio::time::sleep(GROUP_POLL_INTERVAL).await;
        }

        process_warn!(
            ProcessId::current(),
            "🔨 Process group of {} outlived {:?}, force killing",
            label,
            grace
        );
        let _ = signal::killpg(group, Signal::SIGKILL);
    }

    #[cfg(not(unix))]
    async fn sweep_group(&self, _grace: Duration) {}

    #[cfg(unix)]
    fn group(&self) -> Option<Pid> {
        match (self.own_group, self.pid) {
            (true, Some(pid)) => Some(Pid::from_raw(pid as i32)),
            _ => None,
        }
    }

    #[cfg(unix)]
    fn send_terminate(&mut self) -> std::io::Result<()> {
        self.signal(Signal::SIGTERM)
    }

    #[cfg(not(unix))]
    fn send_terminate(&mut self) -> std::io::Result<()> {
        self.child.start_kill()
    }

    #[cfg(unix)]
    fn signal(&self, sig: Signal) -> std::io::Result<()> {
        let Some(pid) = self.pid else {
            return Ok(());
        };
        let target = Pid::from_raw(pid as i32);
        let result = if self.own_group {
            signal::killpg(target, sig)
        } else {
            signal::kill(target, sig)
        };

        match result {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(errno) => Err(std::io::Error::from(errno)),
        }
    }
}

impl fmt::Debug for ManagedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedProcess")
            .field("command", &self.spec.to_string())
            .field("pid", &self.pid)
            .field("state", &self.state)
            .field("exit_status", &self.exit_status)
            .finish()
    }
}

impl Drop for ManagedProcess {
    fn drop(&mut self) {
        if self.refresh() == ProcessState::Stopped {
            // The leader is gone but members of its group may not be
            #[cfg(unix)]
            if let Some(group) = self.group() {
                let _ = signal::killpg(group, Signal::SIGKILL);
            }
            return;
        }

        // Emergency cleanup: kill_on_drop only reaches the direct child
        process_warn!(ProcessId::current(), "🚨 Emergency cleanup: force killing {}", self.spec.label());
        #[cfg(unix)]
        let _ = self.signal(Signal::SIGKILL);
        let _ = self.child.start_kill();
    }
}
