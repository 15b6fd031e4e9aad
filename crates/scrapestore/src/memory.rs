use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scrapecore::{
    ExecutionId, ExecutionPhase, ExecutionStatus, LogEntry, PhaseId, PhaseStatus,
    WorkflowExecution, WorkflowId, WorkflowRecord,
};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::{RunStore, StoreError};

#[derive(Default)]
struct Inner {
    workflows: HashMap<WorkflowId, WorkflowRecord>,
    executions: HashMap<ExecutionId, WorkflowExecution>,
    phases: HashMap<PhaseId, ExecutionPhase>,
    logs: HashMap<PhaseId, Vec<LogEntry>>,
}

/// In-process store, used by the CLI and tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunStore for MemoryStore {
    async fn create_workflow(&self, workflow: &WorkflowRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.workflows.insert(workflow.id, workflow.clone());
        Ok(())
    }

    async fn get_workflow(&self, workflow_id: WorkflowId) -> Result<WorkflowRecord, StoreError> {
        self.inner
            .read()
            .await
            .workflows
            .get(&workflow_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("workflow {}", workflow_id)))
    }

    async fn record_last_run_start(
        &self,
        workflow_id: WorkflowId,
        execution_id: ExecutionId,
        status: ExecutionStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let workflow = inner
            .workflows
            .get_mut(&workflow_id)
            .ok_or_else(|| StoreError::NotFound(format!("workflow {}", workflow_id)))?;
        workflow.last_run_id = Some(execution_id);
        workflow.last_run_at = Some(at);
        workflow.last_run_status = Some(status);
        Ok(())
    }

    async fn record_last_run_status(
        &self,
        workflow_id: WorkflowId,
        execution_id: ExecutionId,
        status: ExecutionStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let workflow = inner
            .workflows
            .get_mut(&workflow_id)
            .ok_or_else(|| StoreError::NotFound(format!("workflow {}", workflow_id)))?;
        if workflow.last_run_id != Some(execution_id) {
            return Err(StoreError::Conflict(format!(
                "workflow {} last run is no longer {}",
                workflow_id, execution_id
            )));
        }
        workflow.last_run_status = Some(status);
        Ok(())
    }

    async fn create_execution(
        &self,
        execution: &WorkflowExecution,
        phases: &[ExecutionPhase],
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.executions.insert(execution.id, execution.clone());
        for phase in phases {
            inner.phases.insert(phase.id, phase.clone());
        }
        Ok(())
    }

    async fn get_execution(&self, execution_id: ExecutionId) -> Result<WorkflowExecution, StoreError> {
        self.inner
            .read()
            .await
            .executions
            .get(&execution_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("execution {}", execution_id)))
    }

    async fn update_execution(&self, execution: &WorkflowExecution) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .executions
            .get_mut(&execution.id)
            .ok_or_else(|| StoreError::NotFound(format!("execution {}", execution.id)))?;
        if stored.status.is_terminal() {
            return Err(StoreError::Terminal(execution.id.to_string()));
        }
        // The stop flag is only ever raised, never cleared by a stale copy.
        let stop_requested = stored.stop_requested || execution.stop_requested;
        *stored = execution.clone();
        stored.stop_requested = stop_requested;
        Ok(())
    }

    async fn list_executions(&self, workflow_id: WorkflowId) -> Result<Vec<WorkflowExecution>, StoreError> {
        let inner = self.inner.read().await;
        let mut executions: Vec<_> = inner
            .executions
            .values()
            .filter(|e| e.workflow_id == workflow_id)
            .cloned()
            .collect();
        executions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(executions)
    }

    async fn list_executions_by_status(
        &self,
        status: ExecutionStatus,
    ) -> Result<Vec<WorkflowExecution>, StoreError> {
        let inner = self.inner.read().await;
        let mut executions: Vec<_> = inner
            .executions
            .values()
            .filter(|e| e.status == status)
            .cloned()
            .collect();
        executions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(executions)
    }

    async fn request_stop(&self, execution_id: ExecutionId) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let execution = inner
            .executions
            .get_mut(&execution_id)
            .ok_or_else(|| StoreError::NotFound(format!("execution {}", execution_id)))?;
        if execution.status.is_terminal() {
            return Err(StoreError::Terminal(execution_id.to_string()));
        }
        execution.stop_requested = true;
        Ok(())
    }

    async fn list_phases(&self, execution_id: ExecutionId) -> Result<Vec<ExecutionPhase>, StoreError> {
        let inner = self.inner.read().await;
        let mut phases: Vec<_> = inner
            .phases
            .values()
            .filter(|p| p.execution_id == execution_id)
            .cloned()
            .collect();
        phases.sort_by_key(|p| (p.number, p.position));
        Ok(phases)
    }

    async fn get_phase(&self, phase_id: PhaseId) -> Result<ExecutionPhase, StoreError> {
        self.inner
            .read()
            .await
            .phases
            .get(&phase_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("phase {}", phase_id)))
    }

    async fn update_phase(&self, phase: &ExecutionPhase) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .phases
            .get_mut(&phase.id)
            .ok_or_else(|| StoreError::NotFound(format!("phase {}", phase.id)))?;
        if stored.status.is_terminal() {
            return Err(StoreError::Terminal(phase.id.to_string()));
        }
        *stored = phase.clone();
        Ok(())
    }

    async fn set_phase_statuses(
        &self,
        execution_id: ExecutionId,
        from: PhaseStatus,
        to: PhaseStatus,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let mut changed = 0;
        for phase in inner
            .phases
            .values_mut()
            .filter(|p| p.execution_id == execution_id && p.status == from)
        {
            phase.status = to;
            changed += 1;
        }
        Ok(changed)
    }

    async fn append_logs(&self, phase_id: PhaseId, logs: &[LogEntry]) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.phases.contains_key(&phase_id) {
            return Err(StoreError::NotFound(format!("phase {}", phase_id)));
        }
        inner
            .logs
            .entry(phase_id)
            .or_default()
            .extend(logs.iter().cloned());
        Ok(())
    }

    async fn list_logs(&self, phase_id: PhaseId) -> Result<Vec<LogEntry>, StoreError> {
        let inner = self.inner.read().await;
        let mut logs = inner.logs.get(&phase_id).cloned().unwrap_or_default();
        // Stable: entries with equal timestamps keep insertion order.
        logs.sort_by_key(|l| l.timestamp);
        Ok(logs)
    }
}
