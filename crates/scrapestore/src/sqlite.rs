use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scrapecore::{
    ExecutionId, ExecutionPhase, ExecutionStatus, ExecutionTrigger, LogEntry, LogLevel, PhaseId,
    PhaseStatus, TaskType, WorkflowExecution, WorkflowId, WorkflowRecord,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

use crate::{RunStore, StoreError};

const EXECUTION_COLUMNS: &str = "id, workflow_id, user_id, status, trigger_kind, created_at, \
     started_at, completed_at, definition, credits_consumed, stop_requested";

const PHASE_COLUMNS: &str = "id, execution_id, number, position, name, task_type, node, status, \
     started_at, completed_at, inputs, outputs, credits_consumed";

/// SQLite-based store implementation.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `url` and migrate it.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Distinguish "missing" from "terminal" after an update touched no row.
    async fn explain_untouched(&self, table: &str, id: Uuid) -> StoreError {
        let query = format!("SELECT COUNT(*) FROM {} WHERE id = ?", table);
        let count: Result<i64, sqlx::Error> = sqlx::query_scalar(&query)
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await;
        match count {
            Ok(0) => StoreError::NotFound(format!("{} {}", table, id)),
            Ok(_) => StoreError::Terminal(id.to_string()),
            Err(e) => StoreError::Database(e),
        }
    }
}

fn parse_uuid(value: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(value).map_err(|e| StoreError::Corrupt(format!("bad id {}: {}", value, e)))
}

fn parse_opt_uuid(value: Option<String>) -> Result<Option<Uuid>, StoreError> {
    value.as_deref().map(parse_uuid).transpose()
}

fn parse_with<T>(value: &str, what: &str, parse: fn(&str) -> Option<T>) -> Result<T, StoreError> {
    parse(value).ok_or_else(|| StoreError::Corrupt(format!("unknown {}: {}", what, value)))
}

fn to_u32(value: i64) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("out of range: {}", value)))
}

fn workflow_from_row(row: &SqliteRow) -> Result<WorkflowRecord, StoreError> {
    let last_run_status: Option<String> = row.try_get("last_run_status")?;
    Ok(WorkflowRecord {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        definition: row.try_get("definition")?,
        created_at: row.try_get("created_at")?,
        last_run_at: row.try_get("last_run_at")?,
        last_run_id: parse_opt_uuid(row.try_get("last_run_id")?)?,
        last_run_status: last_run_status
            .as_deref()
            .map(|s| parse_with(s, "execution status", ExecutionStatus::parse))
            .transpose()?,
    })
}

fn execution_from_row(row: &SqliteRow) -> Result<WorkflowExecution, StoreError> {
    Ok(WorkflowExecution {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        workflow_id: parse_uuid(&row.try_get::<String, _>("workflow_id")?)?,
        user_id: row.try_get("user_id")?,
        status: parse_with(
            &row.try_get::<String, _>("status")?,
            "execution status",
            ExecutionStatus::parse,
        )?,
        trigger: parse_with(
            &row.try_get::<String, _>("trigger_kind")?,
            "trigger",
            ExecutionTrigger::parse,
        )?,
        created_at: row.try_get("created_at")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        definition: row.try_get("definition")?,
        credits_consumed: to_u32(row.try_get("credits_consumed")?)?,
        stop_requested: row.try_get("stop_requested")?,
    })
}

fn phase_from_row(row: &SqliteRow) -> Result<ExecutionPhase, StoreError> {
    Ok(ExecutionPhase {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        execution_id: parse_uuid(&row.try_get::<String, _>("execution_id")?)?,
        number: to_u32(row.try_get("number")?)?,
        position: to_u32(row.try_get("position")?)?,
        name: row.try_get("name")?,
        task_type: parse_with(&row.try_get::<String, _>("task_type")?, "task type", TaskType::parse)?,
        node: row.try_get("node")?,
        status: parse_with(&row.try_get::<String, _>("status")?, "phase status", PhaseStatus::parse)?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        inputs: row.try_get("inputs")?,
        outputs: row.try_get("outputs")?,
        credits_consumed: to_u32(row.try_get("credits_consumed")?)?,
    })
}

#[async_trait]
impl RunStore for SqliteStore {
    async fn create_workflow(&self, workflow: &WorkflowRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO workflows (id, user_id, name, definition, created_at, last_run_at, last_run_id, last_run_status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(workflow.id.to_string())
        .bind(&workflow.user_id)
        .bind(&workflow.name)
        .bind(&workflow.definition)
        .bind(workflow.created_at)
        .bind(workflow.last_run_at)
        .bind(workflow.last_run_id.map(|id| id.to_string()))
        .bind(workflow.last_run_status.map(|s| s.as_str()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_workflow(&self, workflow_id: WorkflowId) -> Result<WorkflowRecord, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, name, definition, created_at, last_run_at, last_run_id, last_run_status
            FROM workflows
            WHERE id = ?
            "#,
        )
        .bind(workflow_id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("workflow {}", workflow_id)))?;

        workflow_from_row(&row)
    }

    async fn record_last_run_start(
        &self,
        workflow_id: WorkflowId,
        execution_id: ExecutionId,
        status: ExecutionStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE workflows
            SET last_run_id = ?, last_run_at = ?, last_run_status = ?
            WHERE id = ?
            "#,
        )
        .bind(execution_id.to_string())
        .bind(at)
        .bind(status.as_str())
        .bind(workflow_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("workflow {}", workflow_id)));
        }
        Ok(())
    }

    async fn record_last_run_status(
        &self,
        workflow_id: WorkflowId,
        execution_id: ExecutionId,
        status: ExecutionStatus,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE workflows
            SET last_run_status = ?
            WHERE id = ? AND last_run_id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(workflow_id.to_string())
        .bind(execution_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "workflow {} last run is no longer {}",
                workflow_id, execution_id
            )));
        }
        Ok(())
    }

    async fn create_execution(
        &self,
        execution: &WorkflowExecution,
        phases: &[ExecutionPhase],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "INSERT INTO workflow_executions ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            EXECUTION_COLUMNS
        ))
        .bind(execution.id.to_string())
        .bind(execution.workflow_id.to_string())
        .bind(&execution.user_id)
        .bind(execution.status.as_str())
        .bind(execution.trigger.as_str())
        .bind(execution.created_at)
        .bind(execution.started_at)
        .bind(execution.completed_at)
        .bind(&execution.definition)
        .bind(i64::from(execution.credits_consumed))
        .bind(execution.stop_requested)
        .execute(&mut *tx)
        .await?;

        for phase in phases {
            sqlx::query(&format!(
                "INSERT INTO execution_phases ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                PHASE_COLUMNS
            ))
            .bind(phase.id.to_string())
            .bind(phase.execution_id.to_string())
            .bind(i64::from(phase.number))
            .bind(i64::from(phase.position))
            .bind(&phase.name)
            .bind(phase.task_type.as_str())
            .bind(&phase.node)
            .bind(phase.status.as_str())
            .bind(phase.started_at)
            .bind(phase.completed_at)
            .bind(&phase.inputs)
            .bind(&phase.outputs)
            .bind(i64::from(phase.credits_consumed))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_execution(&self, execution_id: ExecutionId) -> Result<WorkflowExecution, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM workflow_executions WHERE id = ?",
            EXECUTION_COLUMNS
        ))
        .bind(execution_id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("execution {}", execution_id)))?;

        execution_from_row(&row)
    }

    async fn update_execution(&self, execution: &WorkflowExecution) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_executions
            SET status = ?, started_at = ?, completed_at = ?, credits_consumed = ?,
                stop_requested = (stop_requested OR ?)
            WHERE id = ? AND status NOT IN ('COMPLETED', 'FAILED')
            "#,
        )
        .bind(execution.status.as_str())
        .bind(execution.started_at)
        .bind(execution.completed_at)
        .bind(i64::from(execution.credits_consumed))
        .bind(execution.stop_requested)
        .bind(execution.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.explain_untouched("workflow_executions", execution.id).await);
        }
        Ok(())
    }

    async fn list_executions(&self, workflow_id: WorkflowId) -> Result<Vec<WorkflowExecution>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM workflow_executions WHERE workflow_id = ? ORDER BY created_at DESC",
            EXECUTION_COLUMNS
        ))
        .bind(workflow_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(execution_from_row).collect()
    }

    async fn list_executions_by_status(
        &self,
        status: ExecutionStatus,
    ) -> Result<Vec<WorkflowExecution>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM workflow_executions WHERE status = ? ORDER BY created_at ASC",
            EXECUTION_COLUMNS
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(execution_from_row).collect()
    }

    async fn request_stop(&self, execution_id: ExecutionId) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_executions
            SET stop_requested = TRUE
            WHERE id = ? AND status NOT IN ('COMPLETED', 'FAILED')
            "#,
        )
        .bind(execution_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.explain_untouched("workflow_executions", execution_id).await);
        }
        Ok(())
    }

    async fn list_phases(&self, execution_id: ExecutionId) -> Result<Vec<ExecutionPhase>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM execution_phases WHERE execution_id = ? ORDER BY number ASC, position ASC",
            PHASE_COLUMNS
        ))
        .bind(execution_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(phase_from_row).collect()
    }

    async fn get_phase(&self, phase_id: PhaseId) -> Result<ExecutionPhase, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM execution_phases WHERE id = ?",
            PHASE_COLUMNS
        ))
        .bind(phase_id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("phase {}", phase_id)))?;

        phase_from_row(&row)
    }

    async fn update_phase(&self, phase: &ExecutionPhase) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE execution_phases
            SET status = ?, started_at = ?, completed_at = ?, inputs = ?, outputs = ?, credits_consumed = ?
            WHERE id = ? AND status NOT IN ('COMPLETED', 'FAILED')
            "#,
        )
        .bind(phase.status.as_str())
        .bind(phase.started_at)
        .bind(phase.completed_at)
        .bind(&phase.inputs)
        .bind(&phase.outputs)
        .bind(i64::from(phase.credits_consumed))
        .bind(phase.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.explain_untouched("execution_phases", phase.id).await);
        }
        Ok(())
    }

    async fn set_phase_statuses(
        &self,
        execution_id: ExecutionId,
        from: PhaseStatus,
        to: PhaseStatus,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE execution_phases
            SET status = ?
            WHERE execution_id = ? AND status = ?
            "#,
        )
        .bind(to.as_str())
        .bind(execution_id.to_string())
        .bind(from.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn append_logs(&self, phase_id: PhaseId, logs: &[LogEntry]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for log in logs {
            sqlx::query(
                r#"
                INSERT INTO execution_logs (phase_id, level, message, timestamp)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(phase_id.to_string())
            .bind(log.level.as_str())
            .bind(&log.message)
            .bind(log.timestamp)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_logs(&self, phase_id: PhaseId) -> Result<Vec<LogEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT level, message, timestamp
            FROM execution_logs
            WHERE phase_id = ?
            ORDER BY timestamp ASC, id ASC
            "#,
        )
        .bind(phase_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<LogEntry, StoreError> {
                Ok(LogEntry {
                    level: parse_with(&row.try_get::<String, _>("level")?, "log level", LogLevel::parse)?,
                    message: row.try_get("message")?,
                    timestamp: row.try_get("timestamp")?,
                })
            })
            .collect()
    }
}
