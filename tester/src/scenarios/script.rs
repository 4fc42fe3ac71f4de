//! Script Suites
//!
//! Runs an external script (load simulator, contract test runner) against the
//! live node and fails the suite on a non-zero exit.

use async_trait::async_trait;

use crate::suites::{SuiteBody, SuiteContext};
use shared::ProcessId;
use shared::logging::tail_lines;

/// Environment variable carrying the node URI into scripts
pub const NODE_URI_ENV: &str = "NODE_URI";

#[derive(Debug, Clone)]
pub struct ScriptSuite {
    script: String,
    args: Vec<String>,
    tail_lines: usize,
}

impl ScriptSuite {
    pub fn new<S: Into<String>>(script: S) -> Self {
        Self {
            script: script.into(),
            args: Vec::new(),
            tail_lines: 50,
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Lines of output kept in the failure message
    pub fn tail_lines(mut self, lines: usize) -> Self {
        self.tail_lines = lines;
        self
    }

    pub fn script(&self) -> &str {
        &self.script
    }
}

#[async_trait]
impl SuiteBody for ScriptSuite {
    async fn run(&self, ctx: SuiteContext) -> anyhow::Result<()> {
        let spec = ctx
            .command(&self.script)
            .args(self.args.iter().cloned())
            .env(NODE_URI_ENV, ctx.node_uri());
        let process = ProcessId::Auxiliary(spec.label());

        tracing::info!(process = %process, "▶️ Running script: {}", spec);

        match ctx.run_command(&spec).await {
            Ok(output) => {
                tracing::info!(process = %process, "Combined output:\n\n{}", output.output);
                tracing::info!(process = %process, "✅ {} finished in {:?}", spec.label(), output.duration);
                Ok(())
            }
            Err(e) => {
                let tail = e.output().map(|output| tail_lines(output, self.tail_lines)).unwrap_or_default();
                tracing::error!(process = %process, "Combined output:\n\n{}", tail);
                anyhow::bail!("{e}\n--- last {} lines of output ---\n{tail}", self.tail_lines)
            }
        }
    }
}
