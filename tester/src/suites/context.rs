//! What a suite body gets to work with

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::HarnessResult;
use crate::runtime::{CommandOutput, CommandSpec, ProcessRunner};

/// Handed to every suite body by value
///
/// Carries the node's endpoint and a runner for auxiliary commands. The node
/// process itself stays with the lifecycle guard.
#[derive(Clone)]
pub struct SuiteContext {
    node_uri: String,
    health_url: String,
    workdir: PathBuf,
    runner: Arc<dyn ProcessRunner>,
}

impl SuiteContext {
    pub fn new<U, H, W>(node_uri: U, health_url: H, workdir: W, runner: Arc<dyn ProcessRunner>) -> Self
    where
        U: Into<String>,
        H: Into<String>,
        W: Into<PathBuf>,
    {
        Self {
            node_uri: node_uri.into(),
            health_url: health_url.into(),
            workdir: workdir.into(),
            runner,
        }
    }

    pub fn node_uri(&self) -> &str {
        &self.node_uri
    }

    pub fn health_url(&self) -> &str {
        &self.health_url
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn runner(&self) -> &Arc<dyn ProcessRunner> {
        &self.runner
    }

    /// Command preset to run in the suite working directory
    pub fn command<S: Into<String>>(&self, program: S) -> CommandSpec {
        CommandSpec::new(program).current_dir(&self.workdir)
    }

    /// Run an auxiliary command to completion
    pub async fn run_command(&self, spec: &CommandSpec) -> HarnessResult<CommandOutput> {
        self.runner.run_sync(spec).await
    }
}

impl fmt::Debug for SuiteContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuiteContext")
            .field("node_uri", &self.node_uri)
            .field("health_url", &self.health_url)
            .field("workdir", &self.workdir)
            .finish_non_exhaustive()
    }
}
