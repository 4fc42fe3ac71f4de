//! Readiness gating
//!
//! Polls a [`HealthCheck`] until the node reports healthy or the deadline in
//! the [`RunContext`] passes. Queries are strictly sequential: the next one is
//! only issued after the previous one has returned.

use serde::Serialize;
use std::time::Duration;
use tokio::time::{Instant, sleep_until, timeout};

use super::health::{HealthCheck, HealthProbeResult};
use crate::error::{HarnessError, HarnessResult};
use shared::{ProcessId, process_debug, process_info};

/// Target endpoint plus the instant readiness must be reached by
#[derive(Debug, Clone)]
pub struct RunContext {
    endpoint: String,
    deadline: Instant,
}

impl RunContext {
    /// Deadline is fixed at construction: now + `timeout`
    pub fn new<S: Into<String>>(endpoint: S, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            deadline: Instant::now() + timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

/// How readiness was reached
#[derive(Debug, Clone, Serialize)]
pub struct ReadyReport {
    pub attempts: u32,
    pub elapsed: Duration,
}

pub struct ReadinessProber {
    poll_interval: Duration,
}

impl ReadinessProber {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Poll until healthy or [`HarnessError::DeadlineExceeded`]
    ///
    /// The first query goes out immediately and later ones on a fixed
    /// `poll_interval` cadence. A query that errors only means "not yet";
    /// each query is cut off at the deadline.
    pub async fn await_ready(&self, check: &dyn HealthCheck, ctx: &RunContext) -> HarnessResult<ReadyReport> {
        let started = Instant::now();
        let mut attempts = 0u32;
        let mut last_error = None;

        loop {
            let tick = Instant::now();
            attempts += 1;

            let probe = match timeout(ctx.remaining(), check.check(ctx.endpoint())).await {
                Ok(result) => result,
                Err(_) => HealthProbeResult::unhealthy("health query still pending at deadline"),
            };

            if probe.healthy {
                process_info!(
                    ProcessId::current(),
                    "💚 {} healthy after {} probe(s) in {:?}",
                    ctx.endpoint(),
                    attempts,
                    started.elapsed()
                );
                return Ok(ReadyReport {
                    attempts,
                    elapsed: started.elapsed(),
                });
            }

            process_debug!(
                ProcessId::current(),
                "⏳ Probe {} of {} not healthy: {}",
                attempts,
                ctx.endpoint(),
                probe.error.as_deref().unwrap_or("unhealthy")
            );
            last_error = probe.error;

            // A probe slower than the interval starts the next one right away
            let next_tick = (tick + self.poll_interval).max(Instant::now());
            if next_tick >= ctx.deadline() {
                sleep_until(ctx.deadline()).await;
                break;
            }
            sleep_until(next_tick).await;
        }

        Err(HarnessError::DeadlineExceeded {
            endpoint: ctx.endpoint().to_string(),
            waited: started.elapsed(),
            attempts,
            last_error,
        })
    }
}
