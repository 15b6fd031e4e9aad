//! Run-record store
//!
//! The [`RunStore`] trait persists everything the run loop and the status
//! queries need:
//! - workflows and their "last run" summary
//! - workflow executions and their phases
//! - append-only phase logs
//!
//! Terminal executions and phases are immutable; updates to them are
//! rejected with [`StoreError::Terminal`].

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scrapecore::{
    ExecutionId, ExecutionPhase, ExecutionStatus, LogEntry, PhaseId, PhaseStatus,
    WorkflowExecution, WorkflowId, WorkflowRecord,
};

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested record was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The record already reached a terminal status.
    #[error("record {0} is in a terminal state")]
    Terminal(String),

    /// A conditional update lost to a newer writer.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A stored value could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Storage trait for workflows, executions, phases and logs.
///
/// Implementations must allow independent concurrent updates for
/// different execution ids.
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn create_workflow(&self, workflow: &WorkflowRecord) -> Result<(), StoreError>;

    async fn get_workflow(&self, workflow_id: WorkflowId) -> Result<WorkflowRecord, StoreError>;

    /// Point the workflow's last run at `execution_id`.
    async fn record_last_run_start(
        &self,
        workflow_id: WorkflowId,
        execution_id: ExecutionId,
        status: ExecutionStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Update the last-run status only while the workflow still points at
    /// `execution_id`; otherwise [`StoreError::Conflict`].
    async fn record_last_run_status(
        &self,
        workflow_id: WorkflowId,
        execution_id: ExecutionId,
        status: ExecutionStatus,
    ) -> Result<(), StoreError>;

    /// Create an execution together with its phases.
    async fn create_execution(
        &self,
        execution: &WorkflowExecution,
        phases: &[ExecutionPhase],
    ) -> Result<(), StoreError>;

    async fn get_execution(&self, execution_id: ExecutionId) -> Result<WorkflowExecution, StoreError>;

    /// Replace the mutable fields of an execution.
    async fn update_execution(&self, execution: &WorkflowExecution) -> Result<(), StoreError>;

    async fn list_executions(&self, workflow_id: WorkflowId) -> Result<Vec<WorkflowExecution>, StoreError>;

    async fn list_executions_by_status(
        &self,
        status: ExecutionStatus,
    ) -> Result<Vec<WorkflowExecution>, StoreError>;

    /// Flag a run as stopped; the run loop checks this between phases.
    async fn request_stop(&self, execution_id: ExecutionId) -> Result<(), StoreError>;

    /// Phases of an execution in plan order.
    async fn list_phases(&self, execution_id: ExecutionId) -> Result<Vec<ExecutionPhase>, StoreError>;

    async fn get_phase(&self, phase_id: PhaseId) -> Result<ExecutionPhase, StoreError>;

    /// Replace the mutable fields of a phase.
    async fn update_phase(&self, phase: &ExecutionPhase) -> Result<(), StoreError>;

    /// Move every phase of the execution currently in `from` to `to`.
    async fn set_phase_statuses(
        &self,
        execution_id: ExecutionId,
        from: PhaseStatus,
        to: PhaseStatus,
    ) -> Result<u64, StoreError>;

    async fn append_logs(&self, phase_id: PhaseId, logs: &[LogEntry]) -> Result<(), StoreError>;

    /// Logs of a phase, oldest first.
    async fn list_logs(&self, phase_id: PhaseId) -> Result<Vec<LogEntry>, StoreError>;
}
