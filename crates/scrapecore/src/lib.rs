//! Core abstractions for the scrape engine
//!
//! This crate provides the fundamental types and traits that all other
//! components depend on: the task catalog, the graph model, run records,
//! the executor plugin contract and the per-run execution environment.

mod browser;
mod environment;
mod error;
mod events;
mod executor;
mod graph;
mod log;
mod record;
mod task;
mod value;

pub use browser::{Browser, BrowserLauncher, Page};
pub use environment::{ExecutionEnvironment, NodeIo};
pub use error::{BrowserError, ExecutorError, PlanningError};
pub use events::{EventBus, ExecutionEvent};
pub use executor::{ExecutionContext, Executor};
pub use graph::{FlowDefinition, GraphEdge, GraphNode, NodeData};
pub use log::LogCollector;
pub use record::{
    ExecutionId, ExecutionPhase, ExecutionStatus, ExecutionTrigger, LogEntry, LogLevel, PhaseId,
    PhaseStatus, WorkflowExecution, WorkflowId, WorkflowRecord,
};
pub use task::{names, ParamKind, TaskCatalog, TaskDefinition, TaskParam, TaskType};
pub use value::TaskValue;
