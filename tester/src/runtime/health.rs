//! Node health queries
//!
//! The node's wire format is its own business; all the harness needs from a
//! query is a boolean and, when unhealthy, why.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{HarnessError, HarnessResult};

/// Outcome of one health query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthProbeResult {
    pub healthy: bool,
    pub error: Option<String>,
}

impl HealthProbeResult {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            error: None,
        }
    }

    pub fn unhealthy<S: Into<String>>(error: S) -> Self {
        Self {
            healthy: false,
            error: Some(error.into()),
        }
    }
}

/// Health query abstraction for dependency injection
#[mockall::automock]
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Issue one read-only health query against `endpoint`
    ///
    /// Transport failures are reported as unhealthy results, never as errors.
    async fn check(&self, endpoint: &str) -> HealthProbeResult;
}

#[derive(Deserialize)]
struct HealthReply {
    healthy: bool,
}

/// Health check over HTTP
///
/// `GET <endpoint>`; a JSON body with a boolean `healthy` field decides the
/// result, otherwise any 2xx status counts as healthy.
#[derive(Clone)]
pub struct HttpHealthCheck {
    client: reqwest::Client,
}

impl HttpHealthCheck {
    pub fn new(request_timeout: Duration) -> HarnessResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| HarnessError::HealthClient { message: e.to_string() })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HealthCheck for HttpHealthCheck {
    async fn check(&self, endpoint: &str) -> HealthProbeResult {
        let response = match self.client.get(endpoint).send().await {
            Ok(response) => response,
            Err(e) => return HealthProbeResult::unhealthy(e.to_string()),
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return HealthProbeResult::unhealthy(format!("HTTP {status}: unreadable body: {e}")),
        };

        match serde_json::from_str::<HealthReply>(&body) {
            Ok(HealthReply { healthy: true }) => HealthProbeResult::healthy(),
            Ok(HealthReply { healthy: false }) => {
                HealthProbeResult::unhealthy(format!("node reports unhealthy (HTTP {status})"))
            }
            Err(_) if status.is_success() => HealthProbeResult::healthy(),
            Err(_) => HealthProbeResult::unhealthy(format!("HTTP {status}")),
        }
    }
}
