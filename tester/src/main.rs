//! E2E Test Runner
//!
//! Single entry point for a black-box run against a locally launched node:
//! - Switches to the source root (`TEST_SOURCE_ROOT`) before anything else
//! - Launches the node and waits for its health endpoint
//! - Runs the registered suites in order
//! - Stops the node exactly once and exits non-zero on any failure

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

use shared::{ProcessId, logging, process_info};
use tester::config::harness::{DEFAULT_HEALTH_PATH, DEFAULT_LOAD_SCRIPT, DEFAULT_NODE_COMMAND, DEFAULT_NODE_URI};
use tester::{
    HarnessConfig, HttpHealthCheck, LifecycleGuard, SuiteRegistry, SystemProcessRunner, parse_script_pair,
    register_default_suites,
};

#[derive(Parser)]
#[command(name = "tester")]
#[command(about = "Boots a node, waits for it to report healthy, runs the e2e suites and tears it down")]
struct Args {
    /// Root working directory for the node and every suite script
    #[arg(long, env = "TEST_SOURCE_ROOT")]
    source_root: Option<PathBuf>,

    /// Node launch command, relative to the source root
    #[arg(long, default_value = DEFAULT_NODE_COMMAND)]
    node_command: String,

    /// Extra argument for the node launch command (repeatable)
    #[arg(long = "node-arg")]
    node_args: Vec<String>,

    /// Node HTTP base URI
    #[arg(long, default_value = DEFAULT_NODE_URI)]
    node_uri: String,

    /// Health API path on the node
    #[arg(long, default_value = DEFAULT_HEALTH_PATH)]
    health_path: String,

    /// Seconds between health queries
    #[arg(long, default_value = "5")]
    poll_interval_secs: u64,

    /// Seconds to wait for the node to become healthy
    #[arg(long, default_value = "60")]
    ready_timeout_secs: u64,

    /// Seconds between SIGTERM and force kill at teardown
    #[arg(long, default_value = "10")]
    stop_grace_secs: u64,

    /// Load simulator script run by the "basic load test" suite
    #[arg(long, default_value = DEFAULT_LOAD_SCRIPT)]
    load_script: String,

    /// Extra script suite as NAME=PATH (repeatable, run in order)
    #[arg(long = "script", value_parser = parse_script_pair)]
    scripts: Vec<(String, String)>,

    /// Only run suites with this label (repeatable)
    #[arg(long = "label-filter")]
    label_filter: Vec<String>,

    /// Write a JSON run report to this path
    #[arg(long)]
    report_json: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Shorthand for --log-level debug
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let args = Args::parse();
    let source_root = args.source_root.clone();
    let config = build_config(args);

    ProcessId::init_harness();
    logging::init_tracing_with_level(Some(&config.log_level));

    match run(source_root, config).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            logging::log_error(ProcessId::current(), "Harness", &format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

async fn run(source_root: Option<PathBuf>, mut config: HarnessConfig) -> anyhow::Result<u8> {
    if let Some(root) = source_root {
        let root = root
            .canonicalize()
            .with_context(|| format!("source root {} is not accessible", root.display()))?;
        std::env::set_current_dir(&root).with_context(|| format!("cannot enter {}", root.display()))?;
        config.source_root = Some(root);
    }

    config.validate()?;
    logging::log_startup(
        ProcessId::current(),
        &format!("e2e run of '{}' against {}", config.node_command, config.node_uri),
    );

    let mut registry = SuiteRegistry::new();
    register_default_suites(&mut registry, &config)?;
    process_info!(ProcessId::current(), "📚 Registered suites: {}", registry.names().join(", "));

    let health = HttpHealthCheck::new(config.probe_timeout)?;
    let runner = Arc::new(SystemProcessRunner::new(config.stop_grace));
    let report_path = config.report_path.clone();

    let report = LifecycleGuard::new(config, runner, health)
        .run_until(registry, shutdown_signal())
        .await;

    report.log_summary();
    if let Some(path) = report_path {
        report.write_json(&path)?;
    }

    Ok(report.exit_code())
}

fn build_config(args: Args) -> HarnessConfig {
    let mut builder = HarnessConfig::builder()
        .node_command(args.node_command)
        .node_uri(args.node_uri)
        .health_path(args.health_path)
        .poll_interval(Duration::from_secs(args.poll_interval_secs))
        .ready_timeout(Duration::from_secs(args.ready_timeout_secs))
        .stop_grace(Duration::from_secs(args.stop_grace_secs))
        .load_script(Some(args.load_script))
        .log_level(args.log_level)
        .verbose(args.verbose);

    for arg in args.node_args {
        builder = builder.node_arg(arg);
    }
    for (name, path) in args.scripts {
        builder = builder.script(name, path);
    }
    for label in args.label_filter {
        builder = builder.label(label);
    }
    if let Some(path) = args.report_json {
        builder = builder.report_path(path);
    }

    builder.build()
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => logging::log_shutdown(ProcessId::current(), "Received Ctrl+C signal"),
        Err(err) => {
            logging::log_error(ProcessId::current(), "Signal handling", &err);
            std::future::pending::<()>().await;
        }
    }
}
