//! Suite registration and execution

pub mod context;
pub mod orchestrator;
pub mod registry;

pub use context::SuiteContext;
pub use orchestrator::{AggregateResult, SuiteOrchestrator, SuiteOutcome, SuiteReport};
pub use registry::{SuiteBody, SuiteRegistration, SuiteRegistry};
