use crate::TaskType;
use thiserror::Error;

/// Reasons a graph cannot be compiled into an execution plan.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanningError {
    #[error("no entry point")]
    NoEntryPoint,

    #[error("unsatisfiable inputs on node {node_id}: {}", inputs.join(", "))]
    UnsatisfiableInputs {
        node_id: String,
        inputs: Vec<String>,
    },

    #[error("planning stuck, unplanned nodes: {}", node_ids.join(", "))]
    Stuck { node_ids: Vec<String> },

    #[error("unknown task type {task_type} on node {node_id}")]
    UnknownTaskType { node_id: String, task_type: TaskType },

    #[error("edge references unknown node: {0}")]
    UnknownNode(String),

    #[error("duplicate node id: {0}")]
    DuplicateNode(String),
}

/// Unexpected failures raised by an executor.
///
/// Expected failures (missing input, selector not found) are logged by the
/// executor itself and reported as `Ok(false)`.
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Timeout after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Execution failed: {0}")]
    Failed(String),
}

#[derive(Error, Debug, Clone)]
pub enum BrowserError {
    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("Browser already closed")]
    Closed,

    #[error("Driver error: {0}")]
    Driver(String),
}
