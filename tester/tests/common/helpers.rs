//! Test helpers and builder patterns for tester tests
//!
//! Scripted health checks, a mocked process runner builder, a fake HTTP
//! health endpoint and small polling helpers for real processes.

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;

use super::fixtures::TestFixtures;
use shared::ProcessState;
use tester::runtime::MockProcessRunner;
use tester::*;

/// Health check that turns healthy after a fixed number of failed calls
#[derive(Clone)]
pub struct ScriptedHealth {
    inner: Arc<ScriptedState>,
}

struct ScriptedState {
    healthy_from: Option<u32>,
    delay: Duration,
    calls: AtomicU32,
    in_flight: AtomicU32,
    max_in_flight: AtomicU32,
}

impl ScriptedHealth {
    /// Unhealthy for the first `failures` calls, healthy afterwards
    pub fn healthy_after(failures: u32) -> Self {
        Self::scripted(Some(failures + 1), Duration::ZERO)
    }

    pub fn never_healthy() -> Self {
        Self::scripted(None, Duration::ZERO)
    }

    /// Same script, but every call takes `delay` to answer
    pub fn with_delay(self, delay: Duration) -> Self {
        Self::scripted(self.inner.healthy_from, delay)
    }

    fn scripted(healthy_from: Option<u32>, delay: Duration) -> Self {
        Self {
            inner: Arc::new(ScriptedState {
                healthy_from,
                delay,
                calls: AtomicU32::new(0),
                in_flight: AtomicU32::new(0),
                max_in_flight: AtomicU32::new(0),
            }),
        }
    }

    pub fn calls(&self) -> u32 {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// Highest number of queries that were ever outstanding at once
    pub fn max_in_flight(&self) -> u32 {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthCheck for ScriptedHealth {
    async fn check(&self, _endpoint: &str) -> HealthProbeResult {
        let state = &self.inner;
        let call = state.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let outstanding = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_in_flight.fetch_max(outstanding, Ordering::SeqCst);

        if !state.delay.is_zero() {
            tokio::time::sleep(state.delay).await;
        }
        state.in_flight.fetch_sub(1, Ordering::SeqCst);

        match state.healthy_from {
            Some(first_healthy) if call >= first_healthy => HealthProbeResult::healthy(),
            _ => HealthProbeResult::unhealthy("connection refused"),
        }
    }
}

/// Builder for a mocked runner that plays the node's part
pub struct RunnerBuilder {
    runner: MockProcessRunner,
}

impl RunnerBuilder {
    pub fn new() -> Self {
        Self {
            runner: MockProcessRunner::new(),
        }
    }

    /// The node launches and gets its fixture handle
    pub fn launches_node(mut self) -> Self {
        self.runner
            .expect_run_background()
            .withf(|spec| spec.program == TestFixtures::NODE_COMMAND)
            .times(1)
            .returning(|_| Ok(TestFixtures::node_handle()));
        self
    }

    /// The node command cannot be spawned
    pub fn fails_to_launch(mut self) -> Self {
        self.runner.expect_run_background().times(1).returning(|spec| {
            Err(HarnessError::SpawnFailure {
                command: spec.to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        });
        self
    }

    /// Exactly one clean stop of the node
    pub fn stops_cleanly(mut self) -> Self {
        self.runner
            .expect_stop()
            .withf(|handle| *handle == TestFixtures::node_handle())
            .times(1)
            .returning(|_| Ok(TestFixtures::stop_report()));
        self
    }

    /// Exactly one stop, which has to force kill
    pub fn stop_times_out(mut self) -> Self {
        self.runner.expect_stop().times(1).returning(|handle| {
            Err(HarnessError::StopTimeout {
                label: handle.label.clone(),
                grace: Duration::from_secs(2),
            })
        });
        self
    }

    pub fn never_stopped(mut self) -> Self {
        self.runner.expect_stop().never();
        self
    }

    /// Node output is read once for diagnosis
    pub fn serves_node_output(mut self) -> Self {
        self.runner
            .expect_output()
            .times(1)
            .returning(|_| Ok(TestFixtures::node_boot_log()));
        self
    }

    pub fn build(self) -> Arc<MockProcessRunner> {
        Arc::new(self.runner)
    }
}

/// Fake node health endpoint served by axum
pub struct HealthServer {
    pub addr: SocketAddr,
    state: Arc<ServerState>,
}

struct ServerState {
    responses: Vec<(StatusCode, &'static str)>,
    hits: AtomicU32,
}

impl HealthServer {
    /// Serve `responses` in order on `/ext/health`; the last one repeats
    pub async fn start(responses: Vec<(StatusCode, &'static str)>) -> Self {
        assert!(!responses.is_empty(), "health server needs at least one response");

        let state = Arc::new(ServerState {
            responses,
            hits: AtomicU32::new(0),
        });
        let app = Router::new()
            .route("/ext/health", get(respond))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn uri(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn health_url(&self) -> String {
        format!("http://{}/ext/health", self.addr)
    }

    pub fn hits(&self) -> u32 {
        self.state.hits.load(Ordering::SeqCst)
    }
}

async fn respond(State(state): State<Arc<ServerState>>) -> (StatusCode, &'static str) {
    let hit = state.hits.fetch_add(1, Ordering::SeqCst) as usize;
    state.responses[hit.min(state.responses.len() - 1)]
}

/// Common test operations
pub struct TestHelpers;

impl TestHelpers {
    /// `sh -c <script>`
    pub fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh").arg("-c").arg(script)
    }

    /// Poll a background process's output until it contains `needle`
    pub async fn wait_for_output(
        runner: &SystemProcessRunner,
        handle: &ProcessHandle,
        needle: &str,
        limit: Duration,
    ) -> bool {
        let deadline = tokio::time::Instant::now() + limit;
        while tokio::time::Instant::now() < deadline {
            if runner.output(handle).await.unwrap().contains(needle) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    /// Poll a background process until it reaches `expected`
    pub async fn wait_for_state(
        runner: &SystemProcessRunner,
        handle: &ProcessHandle,
        expected: ProcessState,
        limit: Duration,
    ) -> bool {
        let deadline = tokio::time::Instant::now() + limit;
        while tokio::time::Instant::now() < deadline {
            if runner.status(handle).await.unwrap() == expected {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }
}
