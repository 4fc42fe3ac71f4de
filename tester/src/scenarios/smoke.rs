//! Smoke Tests
//!
//! Cheap checks that the node is still serving once setup is done

use std::time::Duration;

use crate::runtime::{HealthCheck, HttpHealthCheck};
use crate::suites::SuiteContext;

/// Re-query the health endpoint from inside the suite phase
pub async fn node_healthy(ctx: SuiteContext, probe_timeout: Duration) -> anyhow::Result<()> {
    tracing::info!("🧪 Smoke: node health at {}", ctx.health_url());

    let check = HttpHealthCheck::new(probe_timeout)?;
    let probe = check.check(ctx.health_url()).await;

    anyhow::ensure!(
        probe.healthy,
        "node at {} stopped reporting healthy: {}",
        ctx.node_uri(),
        probe.error.as_deref().unwrap_or("unhealthy")
    );

    tracing::info!("✅ Smoke: PASSED");
    Ok(())
}
