//! Workflow execution runtime
//!
//! This crate compiles workflow graphs into phased execution plans, keeps
//! the executor registry, and runs plans against a per-run environment
//! while persisting every state transition.

mod error;
mod executor;
mod planner;
mod registry;
mod runtime;

pub use error::{ScrapeError, SetupError, TriggerError};
pub use executor::{RunOutcome, WorkflowExecutor};
pub use planner::{plan, ExecutionPlan, Phase};
pub use registry::ExecutorRegistry;
pub use runtime::{ExecutionReport, PhaseDetails, RuntimeConfig, ScrapeRuntime, TriggerRequest};
