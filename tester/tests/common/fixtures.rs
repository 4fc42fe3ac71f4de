//! Test fixtures and data for tester tests
//!
//! This module provides consistent test data and fixtures used across all test suites.

use std::sync::Arc;
use std::time::Duration;
use tester::runtime::MockProcessRunner;
use tester::*;
use uuid::Uuid;

/// Standard test data and fixtures
pub struct TestFixtures;

impl TestFixtures {
    /// Standard endpoint values
    pub const NODE_URI: &'static str = "http://127.0.0.1:9650";
    pub const HEALTH_URL: &'static str = "http://127.0.0.1:9650/ext/health";
    pub const NODE_COMMAND: &'static str = "./scripts/run.sh";
    pub const NODE_PID: u32 = 4242;

    /// Handle id used for the node in mocked runs
    pub const NODE_HANDLE_ID: &'static str = "550e8400-e29b-41d4-a716-446655440001";

    /// Handle the mocked runner hands out for the node
    pub fn node_handle() -> ProcessHandle {
        ProcessHandle {
            id: Uuid::parse_str(Self::NODE_HANDLE_ID).unwrap(),
            pid: Some(Self::NODE_PID),
            label: "run.sh".to_string(),
        }
    }

    /// Clean stop of the node
    pub fn stop_report() -> StopReport {
        StopReport {
            exit_code: Some(0),
            output: "node: shutting down\n".to_string(),
            elapsed: Duration::from_millis(120),
        }
    }

    /// Node output seen when the node never became healthy
    pub fn node_boot_log() -> String {
        (1..=80).map(|i| format!("node log line {i}\n")).collect()
    }

    /// Config with a 1s poll, 5s readiness deadline and no built-in load suite
    pub fn config() -> HarnessConfig {
        HarnessConfig::builder()
            .node_command(Self::NODE_COMMAND)
            .node_uri(Self::NODE_URI)
            .poll_interval(Duration::from_secs(1))
            .ready_timeout(Duration::from_secs(5))
            .stop_grace(Duration::from_secs(2))
            .source_root(std::env::temp_dir())
            .load_script(None)
            .output_tail_lines(10)
            .build()
    }

    /// Suite context backed by a runner that expects no calls
    pub fn suite_context() -> SuiteContext {
        SuiteContext::new(
            Self::NODE_URI,
            Self::HEALTH_URL,
            std::env::temp_dir(),
            Arc::new(MockProcessRunner::new()),
        )
    }
}
