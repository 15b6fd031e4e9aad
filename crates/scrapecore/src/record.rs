use crate::TaskType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type WorkflowId = Uuid;
pub type ExecutionId = Uuid;
pub type PhaseId = Uuid;

macro_rules! status_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

status_enum! {
    /// `PENDING -> RUNNING -> {COMPLETED, FAILED}`.
    ExecutionStatus {
        Pending => "PENDING",
        Running => "RUNNING",
        Completed => "COMPLETED",
        Failed => "FAILED",
    }
}

status_enum! {
    /// `CREATED -> PENDING -> RUNNING -> {COMPLETED, FAILED}`.
    PhaseStatus {
        Created => "CREATED",
        Pending => "PENDING",
        Running => "RUNNING",
        Completed => "COMPLETED",
        Failed => "FAILED",
    }
}

status_enum! {
    ExecutionTrigger {
        Manual => "MANUAL",
        Cron => "CRON",
    }
}

status_enum! {
    LogLevel {
        Info => "info",
        Error => "error",
    }
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }
}

impl PhaseStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PhaseStatus::Completed | PhaseStatus::Failed)
    }
}

/// A saved workflow and its "last run" summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRecord {
    pub id: WorkflowId,
    pub user_id: String,
    pub name: String,
    pub definition: String,
    pub created_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_run_id: Option<ExecutionId>,
    pub last_run_status: Option<ExecutionStatus>,
}

impl WorkflowRecord {
    pub fn new(user_id: impl Into<String>, name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            name: name.into(),
            definition: definition.into(),
            created_at: Utc::now(),
            last_run_at: None,
            last_run_id: None,
            last_run_status: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub user_id: String,
    pub status: ExecutionStatus,
    pub trigger: ExecutionTrigger,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Serialized graph the plan was compiled from.
    pub definition: String,
    pub credits_consumed: u32,
    pub stop_requested: bool,
}

impl WorkflowExecution {
    pub fn new(workflow_id: WorkflowId, user_id: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            user_id: user_id.into(),
            status: ExecutionStatus::Pending,
            trigger: ExecutionTrigger::Manual,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            definition: definition.into(),
            credits_consumed: 0,
            stop_requested: false,
        }
    }
}

/// One planned node of an execution, persisted in plan order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPhase {
    pub id: PhaseId,
    pub execution_id: ExecutionId,
    /// Plan phase number (1-based).
    pub number: u32,
    /// Position within the execution, for a stable order inside a phase.
    pub position: u32,
    pub name: String,
    pub task_type: TaskType,
    /// Serialized `GraphNode`.
    pub node: String,
    pub status: PhaseStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub inputs: Option<String>,
    pub outputs: Option<String>,
    pub credits_consumed: u32,
}

impl ExecutionPhase {
    pub fn new(
        execution_id: ExecutionId,
        number: u32,
        position: u32,
        name: impl Into<String>,
        task_type: TaskType,
        node: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            execution_id,
            number,
            position,
            name: name.into(),
            task_type,
            node: node.into(),
            status: PhaseStatus::Created,
            started_at: None,
            completed_at: None,
            inputs: None,
            outputs: None,
            credits_consumed: 0,
        }
    }

    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}
