use scrapecore::{ExecutionId, PlanningError, WorkflowId};
use scrapestore::StoreError;
use thiserror::Error;

/// Failures that prevent a run from starting at all.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("execution {0} not found")]
    ExecutionNotFound(ExecutionId),

    #[error("execution {0} already finished")]
    AlreadyFinished(ExecutionId),

    #[error("execution {execution_id} has an invalid definition: {reason}")]
    InvalidDefinition {
        execution_id: ExecutionId,
        reason: String,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Rejections of a run request. No execution is created.
#[derive(Error, Debug)]
pub enum TriggerError {
    #[error("workflow {0} not found")]
    WorkflowNotFound(WorkflowId),

    #[error("user {user_id} may not run workflow {workflow_id}")]
    Unauthorized {
        workflow_id: WorkflowId,
        user_id: String,
    },

    #[error("invalid workflow definition: {0}")]
    InvalidDefinition(String),

    #[error("planning failed: {0}")]
    Planning(#[from] PlanningError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Top-level error type for the runtime facade.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error(transparent)]
    Trigger(#[from] TriggerError),

    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid workflow definition: {0}")]
    InvalidDefinition(String),
}
