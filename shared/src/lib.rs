//! Shared types for the node e2e harness
//!
//! Process identity, process state and logging helpers used by every crate
//! in the workspace.

pub mod errors;
pub mod logging;
pub mod types;

pub use errors::*;
pub use types::*;
