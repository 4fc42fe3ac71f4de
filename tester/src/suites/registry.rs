//! Explicit, ordered suite registry
//!
//! Suites are appended by the entry point before the run starts. Once the
//! orchestrator closes the registry it becomes read-only.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

use super::context::SuiteContext;
use crate::error::{HarnessError, HarnessResult};

/// Body of one test suite
#[async_trait]
pub trait SuiteBody: Send + Sync {
    async fn run(&self, ctx: SuiteContext) -> anyhow::Result<()>;
}

struct FnSuite<F>(F);

#[async_trait]
impl<F, Fut> SuiteBody for FnSuite<F>
where
    F: Fn(SuiteContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn run(&self, ctx: SuiteContext) -> anyhow::Result<()> {
        (self.0)(ctx).await
    }
}

/// One named suite plus where it sits in the run
#[derive(Clone)]
pub struct SuiteRegistration {
    name: String,
    group: Option<String>,
    labels: Vec<String>,
    body: Arc<dyn SuiteBody>,
}

impl SuiteRegistration {
    /// Suite from an async closure
    pub fn new<S, F, Fut>(name: S, body: F) -> Self
    where
        S: Into<String>,
        F: Fn(SuiteContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::from_body(name, FnSuite(body))
    }

    /// Suite from any [`SuiteBody`] implementation
    pub fn from_body<S, B>(name: S, body: B) -> Self
    where
        S: Into<String>,
        B: SuiteBody + 'static,
    {
        Self {
            name: name.into(),
            group: None,
            labels: Vec::new(),
            body: Arc::new(body),
        }
    }

    /// Place the suite in an ordered group; a failure skips the group's later members
    pub fn in_group<S: Into<String>>(mut self, group: S) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_label<S: Into<String>>(mut self, label: S) -> Self {
        self.labels.push(label.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn body(&self) -> &Arc<dyn SuiteBody> {
        &self.body
    }
}

impl std::fmt::Debug for SuiteRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuiteRegistration")
            .field("name", &self.name)
            .field("group", &self.group)
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct SuiteRegistry {
    suites: Vec<SuiteRegistration>,
    closed: bool,
}

impl SuiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a standalone suite
    pub fn register<S, F, Fut>(&mut self, name: S, body: F) -> HarnessResult<()>
    where
        S: Into<String>,
        F: Fn(SuiteContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.register_suite(SuiteRegistration::new(name, body))
    }

    pub fn register_suite(&mut self, suite: SuiteRegistration) -> HarnessResult<()> {
        if self.closed {
            return Err(HarnessError::RegistryClosed { suite: suite.name });
        }
        if self.suites.iter().any(|existing| existing.name == suite.name) {
            return Err(HarnessError::DuplicateSuite { suite: suite.name });
        }

        self.suites.push(suite);
        Ok(())
    }

    /// No further registrations once closed
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn len(&self) -> usize {
        self.suites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suites.is_empty()
    }

    /// Suites in registration order
    pub fn iter(&self) -> impl Iterator<Item = &SuiteRegistration> {
        self.suites.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.suites.iter().map(SuiteRegistration::name).collect()
    }
}
