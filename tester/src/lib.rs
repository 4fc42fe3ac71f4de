//! E2E Testing Framework
//!
//! Black-box end-to-end harness for a node that is launched by script and
//! exposes an HTTP health API.
//!
//! ## Main Interface
//!
//! The primary interface is [`LifecycleGuard`], which launches the node, gates
//! on readiness, runs every suite in a [`SuiteRegistry`] and always stops the
//! node again.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tester::*;
//!
//! # async fn run() -> anyhow::Result<u8> {
//! let config = HarnessConfig::builder()
//!     .node_command("./scripts/run.sh")
//!     .load_script(None)
//!     .build();
//!
//! let mut registry = SuiteRegistry::new();
//! registry.register("node answers", |ctx: SuiteContext| async move {
//!     let output = ctx.run_command(&ctx.command("./scripts/ping.sh")).await?;
//!     anyhow::ensure!(output.output.contains("pong"), "unexpected reply");
//!     Ok(())
//! })?;
//!
//! let runner = Arc::new(SystemProcessRunner::new(config.stop_grace));
//! let health = HttpHealthCheck::new(config.probe_timeout)?;
//! let report = LifecycleGuard::new(config, runner, health).run(registry).await;
//! Ok(report.exit_code())
//! # }
//! ```

// Core modules
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod runtime;
pub mod scenarios;
pub mod suites;

// Main interfaces - re-exported at crate root for convenience
pub use config::{HarnessConfig, HarnessConfigBuilder, parse_script_pair};
pub use error::{ErrorKind, HarnessError, HarnessResult};
pub use lifecycle::{LifecycleGuard, LifecycleState, RunFailure, RunReport};
pub use suites::{AggregateResult, SuiteContext, SuiteOrchestrator, SuiteOutcome, SuiteRegistration, SuiteRegistry};

// Supporting types
pub use runtime::{
    CommandOutput, CommandSpec, HealthCheck, HealthProbeResult, HttpHealthCheck, ProcessHandle, ProcessRunner,
    ReadinessProber, ReadyReport, RunContext, StopReport, SystemProcessRunner,
};
pub use scenarios::register_default_suites;
