use crate::{ExecutionId, ExecutionStatus, PhaseId, TaskType, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events emitted during workflow execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExecutionEvent {
    ExecutionStarted {
        execution_id: ExecutionId,
        workflow_id: WorkflowId,
        phases: usize,
        timestamp: DateTime<Utc>,
    },
    PhaseStarted {
        execution_id: ExecutionId,
        phase_id: PhaseId,
        node_id: String,
        task_type: TaskType,
        timestamp: DateTime<Utc>,
    },
    PhaseCompleted {
        execution_id: ExecutionId,
        phase_id: PhaseId,
        node_id: String,
        credits: u32,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    PhaseFailed {
        execution_id: ExecutionId,
        phase_id: PhaseId,
        node_id: String,
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },
    ExecutionFinished {
        execution_id: ExecutionId,
        status: ExecutionStatus,
        credits_consumed: u32,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

impl ExecutionEvent {
    pub fn execution_id(&self) -> ExecutionId {
        match self {
            ExecutionEvent::ExecutionStarted { execution_id, .. }
            | ExecutionEvent::PhaseStarted { execution_id, .. }
            | ExecutionEvent::PhaseCompleted { execution_id, .. }
            | ExecutionEvent::PhaseFailed { execution_id, .. }
            | ExecutionEvent::ExecutionFinished { execution_id, .. } => *execution_id,
        }
    }
}

/// Process-wide broadcast of execution events.
pub struct EventBus {
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: ExecutionEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("No event subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}
