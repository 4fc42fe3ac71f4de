//! Harness Configuration Builder
//!
//! Provides a flexible builder pattern for constructing harness configurations

use super::HarnessConfig;
use std::path::PathBuf;
use std::time::Duration;

pub struct HarnessConfigBuilder {
    config: HarnessConfig,
}

impl HarnessConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: HarnessConfig::default(),
        }
    }

    /// Set the node launch command
    pub fn node_command<S: Into<String>>(mut self, command: S) -> Self {
        self.config.node_command = command.into();
        self
    }

    /// Append an argument to the node launch command
    pub fn node_arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.config.node_args.push(arg.into());
        self
    }

    /// Set the node base URI
    pub fn node_uri<S: Into<String>>(mut self, uri: S) -> Self {
        self.config.node_uri = uri.into();
        self
    }

    /// Set the health API path
    pub fn health_path<S: Into<String>>(mut self, path: S) -> Self {
        self.config.health_path = path.into();
        self
    }

    /// Set the readiness polling cadence
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set how long to wait for the node to become healthy
    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.config.ready_timeout = timeout;
        self
    }

    /// Set the per-request timeout for a single health query
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.config.probe_timeout = timeout;
        self
    }

    /// Set the grace period between SIGTERM and force kill
    pub fn stop_grace(mut self, grace: Duration) -> Self {
        self.config.stop_grace = grace;
        self
    }

    /// Set the root working directory
    pub fn source_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.config.source_root = Some(root.into());
        self
    }

    /// Set the load simulator script (None disables the load suite)
    pub fn load_script(mut self, script: Option<String>) -> Self {
        self.config.load_script = script;
        self
    }

    /// Register an extra script suite
    pub fn script<N: Into<String>, P: Into<String>>(mut self, name: N, path: P) -> Self {
        self.config.scripts.push((name.into(), path.into()));
        self
    }

    /// Only run suites carrying this label
    pub fn label<S: Into<String>>(mut self, label: S) -> Self {
        self.config.label_filter.push(label.into());
        self
    }

    /// Write a JSON run report to this path
    pub fn report_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.report_path = Some(path.into());
        self
    }

    /// Set log level (trace, debug, info, warn, error)
    pub fn log_level<S: Into<String>>(mut self, level: S) -> Self {
        self.config.log_level = level.into();
        self
    }

    /// Force `debug` logging when set
    pub fn verbose(mut self, verbose: bool) -> Self {
        if verbose {
            self.config.log_level = "debug".to_string();
        }
        self
    }

    /// Number of output lines kept when dumping a failed process's output
    pub fn output_tail_lines(mut self, lines: usize) -> Self {
        self.config.output_tail_lines = lines;
        self
    }

    /// Build the configuration
    pub fn build(self) -> HarnessConfig {
        self.config
    }
}

impl Default for HarnessConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
