//! Harness Configuration
//!
//! Everything the lifecycle guard needs to boot, probe and stop the node,
//! plus the knobs for which suites run and where the report goes.

use crate::error::HarnessResult;
use crate::runtime::CommandSpec;
use shared::{SharedError, SharedResult};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Default node launch script, relative to the source root
pub const DEFAULT_NODE_COMMAND: &str = "./scripts/run.sh";

/// Default load simulator script, relative to the source root
pub const DEFAULT_LOAD_SCRIPT: &str = "./scripts/run_simulator.sh";

/// Default node HTTP endpoint
pub const DEFAULT_NODE_URI: &str = "http://127.0.0.1:9650";

/// Default health API path on the node
pub const DEFAULT_HEALTH_PATH: &str = "/ext/health";

/// Levels accepted for `log_level`
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub node_command: String,
    pub node_args: Vec<String>,
    pub node_uri: String,
    pub health_path: String,
    pub poll_interval: Duration,
    pub ready_timeout: Duration,
    pub probe_timeout: Duration,
    pub stop_grace: Duration,
    /// Root working directory for the node and every suite script
    pub source_root: Option<PathBuf>,
    pub load_script: Option<String>,
    /// Extra `(suite name, script path)` pairs run as an ordered group
    pub scripts: Vec<(String, String)>,
    pub label_filter: Vec<String>,
    pub report_path: Option<PathBuf>,
    /// Base tracing level the binary initialises logging with
    pub log_level: String,
    pub output_tail_lines: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            node_command: DEFAULT_NODE_COMMAND.to_string(),
            node_args: Vec::new(),
            node_uri: DEFAULT_NODE_URI.to_string(),
            health_path: DEFAULT_HEALTH_PATH.to_string(),
            poll_interval: Duration::from_secs(5),
            ready_timeout: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(5),
            stop_grace: Duration::from_secs(10),
            source_root: None,
            load_script: Some(DEFAULT_LOAD_SCRIPT.to_string()),
            scripts: Vec::new(),
            label_filter: Vec::new(),
            report_path: None,
            log_level: "info".to_string(),
            output_tail_lines: 50,
        }
    }
}

impl HarnessConfig {
    /// Create a new builder
    pub fn builder() -> crate::config::builder::HarnessConfigBuilder {
        crate::config::builder::HarnessConfigBuilder::new()
    }

    /// Full URL of the node's health endpoint
    pub fn health_url(&self) -> SharedResult<String> {
        let base = Url::parse(&self.node_uri).map_err(|e| SharedError::InvalidEndpoint {
            input: self.node_uri.clone(),
            reason: e.to_string(),
        })?;

        if base.cannot_be_a_base() {
            return Err(SharedError::InvalidEndpoint {
                input: self.node_uri.clone(),
                reason: "not a base URL".to_string(),
            });
        }

        let joined = base.join(&self.health_path).map_err(|e| SharedError::InvalidEndpoint {
            input: format!("{}{}", self.node_uri, self.health_path),
            reason: e.to_string(),
        })?;

        Ok(joined.to_string())
    }

    /// Directory every spawned process runs in
    pub fn working_dir(&self) -> HarnessResult<PathBuf> {
        match &self.source_root {
            Some(root) => Ok(root.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    /// Command that launches the node
    pub fn node_command_spec(&self) -> HarnessResult<CommandSpec> {
        Ok(CommandSpec::new(&self.node_command)
            .args(self.node_args.iter().cloned())
            .current_dir(self.working_dir()?))
    }

    /// Check the configuration for values that would make a run meaningless
    pub fn validate(&self) -> SharedResult<()> {
        if self.node_command.trim().is_empty() {
            return Err(SharedError::invalid_config("node_command", "<empty>"));
        }
        if self.poll_interval.is_zero() {
            return Err(SharedError::invalid_config("poll_interval", "0s"));
        }
        if self.ready_timeout.is_zero() {
            return Err(SharedError::invalid_config("ready_timeout", "0s"));
        }
        if self.probe_timeout.is_zero() {
            return Err(SharedError::invalid_config("probe_timeout", "0s"));
        }
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(SharedError::invalid_config("log_level", &self.log_level));
        }
        for (name, script) in &self.scripts {
            if name.trim().is_empty() || script.trim().is_empty() {
                return Err(SharedError::invalid_config("scripts", format!("{name}={script}")));
            }
        }
        self.health_url()?;
        Ok(())
    }
}

/// Parse a `NAME=PATH` pair as accepted by `--script`
pub fn parse_script_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, path)) if !name.trim().is_empty() && !path.trim().is_empty() => {
            Ok((name.trim().to_string(), path.trim().to_string()))
        }
        _ => Err(format!("expected NAME=PATH, got '{raw}'")),
    }
}
