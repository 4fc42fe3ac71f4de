//! Lifecycle Guard
//!
//! Wraps a run in setup and teardown:
//!
//! ```text
//! Idle -> Starting -> AwaitingHealth -> Ready -> Running -> TearingDown -> Done
//!            |              |
//!            +---> Failed <-+
//! ```
//!
//! Once the node has been launched it is stopped exactly once, whatever
//! happens afterwards: readiness timeout, failing suites or an interrupt.

pub mod report;

pub use report::{LifecycleState, RunFailure, RunReport};

use futures_util::FutureExt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::runtime::{HealthCheck, ProcessHandle, ProcessRunner, ReadinessProber, RunContext};
use crate::suites::{AggregateResult, SuiteContext, SuiteOrchestrator, SuiteRegistry};
use shared::logging::{log_captured_output, tail_lines};
use shared::{ProcessId, process_info, process_warn};

pub struct LifecycleGuard<R, H> {
    config: HarnessConfig,
    runner: Arc<R>,
    health: H,
    orchestrator: SuiteOrchestrator,
}

impl<R, H> LifecycleGuard<R, H>
where
    R: ProcessRunner + 'static,
    H: HealthCheck,
{
    pub fn new(config: HarnessConfig, runner: Arc<R>, health: H) -> Self {
        let orchestrator = SuiteOrchestrator::new().with_label_filter(config.label_filter.iter().cloned());
        Self {
            config,
            runner,
            health,
            orchestrator,
        }
    }

    /// Run setup, all suites and teardown
    pub async fn run(self, registry: SuiteRegistry) -> RunReport {
        self.run_until(registry, std::future::pending::<()>()).await
    }

    /// Like [`run`](Self::run), abandoning setup or suites when `shutdown` resolves
    ///
    /// Teardown is not interruptible.
    pub async fn run_until<S>(self, mut registry: SuiteRegistry, shutdown: S) -> RunReport
    where
        S: Future<Output = ()>,
    {
        let shutdown = shutdown.fuse();
        tokio::pin!(shutdown);

        let mut report = RunReport::new();
        process_info!(ProcessId::current(), "🚀 Starting run {}", report.run_id);

        let Some((handle, workdir)) = self.launch_node(&mut report).await else {
            return report;
        };

        if let Some(health_url) = self.await_health(&mut report, &mut shutdown).await {
            self.run_suites(&mut report, &mut registry, &mut shutdown, health_url, workdir)
                .await;
        }

        self.teardown(&mut report, &handle).await;
        report
    }

    async fn launch_node(&self, report: &mut RunReport) -> Option<(ProcessHandle, PathBuf)> {
        report.transition(LifecycleState::Starting);

        let launched = async {
            let workdir = self.config.working_dir()?;
            let spec = self.config.node_command_spec()?;
            let handle = self.runner.run_background(&spec).await?;
            Ok::<_, HarnessError>((handle, workdir))
        }
        .await;

        match launched {
            Ok((handle, workdir)) => {
                process_info!(
                    ProcessId::current(),
                    "🖥️ Node launched from {} (PID: {:?})",
                    workdir.display(),
                    handle.pid
                );
                Some((handle, workdir))
            }
            Err(e) => {
                report.fail("startup", &e);
                None
            }
        }
    }

    async fn await_health<S>(&self, report: &mut RunReport, shutdown: &mut Pin<&mut S>) -> Option<String>
    where
        S: Future<Output = ()>,
    {
        report.transition(LifecycleState::AwaitingHealth);

        let health_url = match self.config.health_url() {
            Ok(url) => url,
            Err(e) => {
                report.fail("readiness", &HarnessError::from(e));
                return None;
            }
        };

        let ctx = RunContext::new(health_url.clone(), self.config.ready_timeout);
        let prober = ReadinessProber::new(self.config.poll_interval);
        process_info!(
            ProcessId::current(),
            "⏳ Waiting up to {:?} for {} (polling every {:?})",
            self.config.ready_timeout,
            health_url,
            self.config.poll_interval
        );

        match unless_interrupted(shutdown, prober.await_ready(&self.health, &ctx)).await {
            Some(Ok(ready)) => {
                report.readiness = Some(ready);
                report.transition(LifecycleState::Ready);
                Some(health_url)
            }
            Some(Err(e)) => {
                report.fail("readiness", &e);
                None
            }
            None => {
                report.fail(
                    "readiness",
                    &HarnessError::Interrupted {
                        phase: "readiness".to_string(),
                    },
                );
                None
            }
        }
    }

    async fn run_suites<S>(
        &self,
        report: &mut RunReport,
        registry: &mut SuiteRegistry,
        shutdown: &mut Pin<&mut S>,
        health_url: String,
        workdir: PathBuf,
    ) where
        S: Future<Output = ()>,
    {
        report.transition(LifecycleState::Running);

        let runner: Arc<dyn ProcessRunner> = self.runner.clone();
        let ctx = SuiteContext::new(self.config.node_uri.clone(), health_url, workdir, runner);

        let mut result = AggregateResult::default();
        let completed = unless_interrupted(shutdown, self.orchestrator.run_into(registry, &ctx, &mut result)).await;
        if completed.is_none() {
            let interrupted = HarnessError::Interrupted {
                phase: "suites".to_string(),
            };
            process_warn!(ProcessId::current(), "🛑 {}", interrupted);
            result.mark_unfinished(registry, "interrupted");
            report.run_failure = Some(RunFailure::new("suites", &interrupted));
        }
        report.suites = Some(result);
    }

    async fn teardown(&self, report: &mut RunReport, handle: &ProcessHandle) {
        let setup_failed = report.setup_failed();
        if !setup_failed {
            report.transition(LifecycleState::TearingDown);
        }

        if setup_failed {
            match self.runner.output(handle).await {
                Ok(output) => {
                    log_captured_output(&ProcessId::Node, &output, self.config.output_tail_lines);
                    report.node_output_tail = Some(tail_lines(&output, self.config.output_tail_lines));
                }
                Err(e) => {
                    process_warn!(ProcessId::current(), "⚠️ Could not read node output: {}", e);
                }
            }
        }

        process_info!(ProcessId::current(), "🧹 Stopping node {}", handle.label);
        report.teardown_invoked = true;
        if let Err(e) = self.runner.stop(handle).await {
            process_warn!(ProcessId::current(), "⚠️ Teardown: {}", e);
            report.teardown_failure = Some(RunFailure::new("teardown", &e));
        }

        if !setup_failed {
            report.transition(LifecycleState::Done);
        }
    }
}

/// Drive `work` unless `shutdown` resolves first
async fn unless_interrupted<S, F>(shutdown: &mut Pin<&mut S>, work: F) -> Option<F::Output>
where
    S: Future<Output = ()>,
    F: Future,
{
    tokio::select! {
        biased;
        _ = shutdown.as_mut() => None,
        output = work => Some(output),
    }
}
