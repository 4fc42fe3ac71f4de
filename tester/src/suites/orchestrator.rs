//! Suite execution
//!
//! Runs every registered suite in order. A failing or panicking suite is
//! recorded and the run moves on; only later members of the same ordered
//! group are held back.

use futures_util::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use super::context::SuiteContext;
use super::registry::{SuiteRegistration, SuiteRegistry};
use crate::error::HarnessError;
use shared::{ProcessId, process_error, process_info, process_warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum SuiteOutcome {
    Passed,
    Failed(String),
    /// Held back because an earlier member of its group failed
    NotRun(String),
    /// Excluded by the label filter
    Skipped(String),
}

impl SuiteOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, SuiteOutcome::Passed)
    }

    /// Whether this outcome makes the run fail
    pub fn is_failure(&self) -> bool {
        matches!(self, SuiteOutcome::Failed(_) | SuiteOutcome::NotRun(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub name: String,
    pub group: Option<String>,
    pub outcome: SuiteOutcome,
    pub duration: Duration,
}

/// Per-suite reports in registration order
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregateResult {
    pub suites: Vec<SuiteReport>,
}

impl AggregateResult {
    pub fn passed(&self) -> bool {
        !self.suites.iter().any(|report| report.outcome.is_failure())
    }

    pub fn outcome_of(&self, name: &str) -> Option<&SuiteOutcome> {
        self.suites
            .iter()
            .find(|report| report.name == name)
            .map(|report| &report.outcome)
    }

    pub fn failed_count(&self) -> usize {
        self.suites.iter().filter(|report| report.outcome.is_failure()).count()
    }

    pub fn passed_count(&self) -> usize {
        self.suites.iter().filter(|report| report.outcome.is_passed()).count()
    }

    /// Report every registered suite without an outcome yet as `NotRun(reason)`
    pub fn mark_unfinished(&mut self, registry: &SuiteRegistry, reason: &str) {
        let unfinished: Vec<SuiteReport> = registry
            .iter()
            .skip(self.suites.len())
            .map(|suite| SuiteReport {
                name: suite.name().to_string(),
                group: suite.group().map(str::to_string),
                outcome: SuiteOutcome::NotRun(reason.to_string()),
                duration: Duration::ZERO,
            })
            .collect();
        self.suites.extend(unfinished);
    }

    /// One [`HarnessError::SuiteFailure`] per failed or unrun suite, in order
    pub fn failures(&self) -> Vec<HarnessError> {
        self.suites
            .iter()
            .filter_map(|report| match &report.outcome {
                SuiteOutcome::Failed(message) | SuiteOutcome::NotRun(message) => Some(HarnessError::SuiteFailure {
                    suite: report.name.clone(),
                    message: message.clone(),
                }),
                SuiteOutcome::Passed | SuiteOutcome::Skipped(_) => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SuiteOrchestrator {
    label_filter: Vec<String>,
}

impl SuiteOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only run suites carrying at least one of `labels`; empty runs everything
    pub fn with_label_filter<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.label_filter = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn selects(&self, suite: &SuiteRegistration) -> bool {
        self.label_filter.is_empty() || suite.labels().iter().any(|label| self.label_filter.contains(label))
    }

    /// Close the registry and run every suite in registration order
    pub async fn run_all(&self, registry: &mut SuiteRegistry, ctx: &SuiteContext) -> AggregateResult {
        let mut result = AggregateResult::default();
        self.run_into(registry, ctx, &mut result).await;
        result
    }

    /// Like [`run_all`](Self::run_all), recording each report into `result` as soon as the suite ends
    ///
    /// If this future is dropped part way, `result` keeps the reports of the
    /// suites that completed.
    pub async fn run_into(&self, registry: &mut SuiteRegistry, ctx: &SuiteContext, result: &mut AggregateResult) {
        registry.close();
        process_info!(ProcessId::current(), "🧪 Running {} suite(s)", registry.len());

        // group name -> first suite that failed in it
        let mut failed_groups: HashMap<String, String> = HashMap::new();

        for suite in registry.iter() {
            let started = Instant::now();
            let held_back = suite.group().and_then(|group| failed_groups.get(group));

            let outcome = if !self.selects(suite) {
                process_info!(ProcessId::current(), "⏭️ {}: skipped by label filter", suite.name());
                SuiteOutcome::Skipped("excluded by label filter".to_string())
            } else if let Some(failed) = held_back {
                process_warn!(
                    ProcessId::current(),
                    "⏭️ {}: not run, '{}' failed earlier in its group",
                    suite.name(),
                    failed
                );
                SuiteOutcome::NotRun(format!("'{failed}' failed earlier in the group"))
            } else {
                Self::execute(suite, ctx).await
            };

            if let (SuiteOutcome::Failed(_), Some(group)) = (&outcome, suite.group()) {
                failed_groups
                    .entry(group.to_string())
                    .or_insert_with(|| suite.name().to_string());
            }

            result.suites.push(SuiteReport {
                name: suite.name().to_string(),
                group: suite.group().map(str::to_string),
                outcome,
                duration: started.elapsed(),
            });
        }

        process_info!(
            ProcessId::current(),
            "📊 Suites finished: {} passed, {} failed",
            result.passed_count(),
            result.failed_count()
        );
    }

    async fn execute(suite: &SuiteRegistration, ctx: &SuiteContext) -> SuiteOutcome {
        process_info!(ProcessId::current(), "🧪 {}: starting", suite.name());
        let started = Instant::now();

        let run = AssertUnwindSafe(suite.body().run(ctx.clone())).catch_unwind().await;
        let outcome = match run {
            Ok(Ok(())) => SuiteOutcome::Passed,
            Ok(Err(e)) => SuiteOutcome::Failed(format!("{e:#}")),
            Err(panic) => SuiteOutcome::Failed(format!("panicked: {}", panic_message(panic.as_ref()))),
        };

        match &outcome {
            SuiteOutcome::Passed => {
                process_info!(ProcessId::current(), "✅ {}: PASSED in {:?}", suite.name(), started.elapsed());
            }
            SuiteOutcome::Failed(message) => {
                process_error!(ProcessId::current(), "❌ {}: FAILED: {}", suite.name(), message);
            }
            _ => {}
        }
        outcome
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
