//! Test Scenarios
//!
//! The suites a default run registers, in the order they execute

pub mod script;
pub mod smoke;

pub use script::ScriptSuite;

use crate::config::HarnessConfig;
use crate::error::HarnessResult;
use crate::suites::{SuiteRegistration, SuiteRegistry};

pub const SMOKE_SUITE: &str = "node reports healthy";
pub const LOAD_SUITE: &str = "basic load test";

/// Register the built-in suites plus any `--script` suites
///
/// The load test and the extra scripts each form an ordered group.
pub fn register_default_suites(registry: &mut SuiteRegistry, config: &HarnessConfig) -> HarnessResult<()> {
    let probe_timeout = config.probe_timeout;
    registry.register_suite(
        SuiteRegistration::new(SMOKE_SUITE, move |ctx| smoke::node_healthy(ctx, probe_timeout)).with_label("smoke"),
    )?;

    if let Some(load_script) = &config.load_script {
        registry.register_suite(
            SuiteRegistration::from_body(
                LOAD_SUITE,
                ScriptSuite::new(load_script.as_str()).tail_lines(config.output_tail_lines),
            )
            .in_group("load")
            .with_label("load"),
        )?;
    }

    for (name, path) in &config.scripts {
        registry.register_suite(
            SuiteRegistration::from_body(
                name.as_str(),
                ScriptSuite::new(path.as_str()).tail_lines(config.output_tail_lines),
            )
            .in_group("scripts")
            .with_label("script"),
        )?;
    }

    Ok(())
}
