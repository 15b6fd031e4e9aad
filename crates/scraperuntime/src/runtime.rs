use crate::executor::mirror_last_run;
use crate::{
    plan, ExecutionPlan, ExecutorRegistry, RunOutcome, ScrapeError, SetupError, TriggerError,
    WorkflowExecutor,
};
use chrono::Utc;
use scrapecore::{
    EventBus, ExecutionEvent, ExecutionId, ExecutionPhase, ExecutionStatus, FlowDefinition,
    LogEntry, PhaseId, PhaseStatus, TaskCatalog, WorkflowExecution, WorkflowId, WorkflowRecord,
};
use scrapestore::{RunStore, StoreError};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Configuration for the runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub event_buffer_size: usize,
    /// How long `shutdown` waits for in-flight runs.
    pub shutdown_grace: Duration,
    /// Close any browser a workflow left open when its run ends.
    pub close_browser_on_finish: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 1000,
            shutdown_grace: Duration::from_secs(30),
            close_browser_on_finish: true,
        }
    }
}

/// A request to run a saved workflow with the given graph.
#[derive(Debug, Clone)]
pub struct TriggerRequest {
    pub workflow_id: WorkflowId,
    pub user_id: String,
    pub definition: String,
}

/// Current state of an execution and its phases in plan order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionReport {
    pub execution: WorkflowExecution,
    pub phases: Vec<ExecutionPhase>,
}

/// One phase with its decoded inputs, outputs and logs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseDetails {
    pub phase: ExecutionPhase,
    pub node_id: Option<String>,
    pub inputs: Option<serde_json::Value>,
    pub outputs: Option<serde_json::Value>,
    pub duration_ms: Option<i64>,
    pub logs: Vec<LogEntry>,
}

/// Main runtime: triggers, supervises and reports workflow runs.
pub struct ScrapeRuntime {
    catalog: Arc<TaskCatalog>,
    store: Arc<dyn RunStore>,
    executor: Arc<WorkflowExecutor>,
    event_bus: Arc<EventBus>,
    config: RuntimeConfig,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    runs: Arc<Mutex<HashMap<ExecutionId, CancellationToken>>>,
}

impl ScrapeRuntime {
    pub fn new(
        catalog: Arc<TaskCatalog>,
        registry: Arc<ExecutorRegistry>,
        store: Arc<dyn RunStore>,
        config: RuntimeConfig,
    ) -> Self {
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        let executor = Arc::new(
            WorkflowExecutor::new(
                catalog.clone(),
                registry,
                store.clone(),
                event_bus.clone(),
            )
            .with_browser_cleanup(config.close_browser_on_finish),
        );

        Self {
            catalog,
            store,
            executor,
            event_bus,
            config,
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            runs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn catalog(&self) -> &Arc<TaskCatalog> {
        &self.catalog
    }

    pub fn store(&self) -> &Arc<dyn RunStore> {
        &self.store
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }

    /// Save a new workflow after checking that its graph parses.
    pub async fn create_workflow(
        &self,
        user_id: &str,
        name: &str,
        definition: String,
    ) -> Result<WorkflowRecord, ScrapeError> {
        FlowDefinition::parse(&definition)
            .map_err(|e| ScrapeError::InvalidDefinition(e.to_string()))?;
        let workflow = WorkflowRecord::new(user_id, name, definition);
        self.store.create_workflow(&workflow).await?;
        tracing::info!(workflow_id = %workflow.id, user_id, "Workflow created");
        Ok(workflow)
    }

    /// Parse and plan a serialized graph without running it.
    pub fn plan(&self, definition: &str) -> Result<ExecutionPlan, TriggerError> {
        let flow = FlowDefinition::parse(definition)
            .map_err(|e| TriggerError::InvalidDefinition(e.to_string()))?;
        Ok(plan(&self.catalog, &flow)?)
    }

    /// Create an execution for the request and start it in the background.
    ///
    /// Returns as soon as the execution and its phases are persisted.
    pub async fn trigger(&self, request: TriggerRequest) -> Result<ExecutionId, TriggerError> {
        let execution = self.create_execution(request).await?;
        let execution_id = execution.id;
        self.spawn(execution_id).await;
        Ok(execution_id)
    }

    /// Create an execution for the request and run it on the caller's task.
    pub async fn trigger_and_wait(&self, request: TriggerRequest) -> Result<RunOutcome, ScrapeError> {
        let execution = self.create_execution(request).await?;
        Ok(self.run(execution.id).await?)
    }

    /// Run an already persisted execution to completion.
    pub async fn run(&self, execution_id: ExecutionId) -> Result<RunOutcome, SetupError> {
        let token = self.register_run(execution_id).await;
        let outcome = self.executor.execute(execution_id, &token).await;
        self.runs.lock().await.remove(&execution_id);
        outcome
    }

    /// Validate the request and persist a `PENDING` execution with one
    /// `CREATED` phase per planned node, without starting it.
    pub async fn create_execution(
        &self,
        request: TriggerRequest,
    ) -> Result<WorkflowExecution, TriggerError> {
        let workflow = match self.store.get_workflow(request.workflow_id).await {
            Ok(workflow) => workflow,
            Err(StoreError::NotFound(_)) => {
                return Err(TriggerError::WorkflowNotFound(request.workflow_id))
            }
            Err(e) => return Err(e.into()),
        };
        if workflow.user_id != request.user_id {
            return Err(TriggerError::Unauthorized {
                workflow_id: workflow.id,
                user_id: request.user_id,
            });
        }

        let plan = self.plan(&request.definition)?;
        let execution = WorkflowExecution::new(workflow.id, request.user_id, request.definition);

        let mut phases = Vec::with_capacity(plan.node_count());
        for (position, (number, node)) in plan.nodes().enumerate() {
            let snapshot = serde_json::to_string(node)
                .map_err(|e| TriggerError::InvalidDefinition(e.to_string()))?;
            let name = self
                .catalog
                .get(node.task_type())
                .map(|d| d.label.clone())
                .unwrap_or_else(|| node.task_type().to_string());
            phases.push(ExecutionPhase::new(
                execution.id,
                number,
                position as u32,
                name,
                node.task_type(),
                snapshot,
            ));
        }

        self.store.create_execution(&execution, &phases).await?;
        self.store
            .record_last_run_start(
                workflow.id,
                execution.id,
                ExecutionStatus::Pending,
                execution.created_at,
            )
            .await?;

        tracing::info!(
            workflow_id = %workflow.id,
            execution_id = %execution.id,
            phases = phases.len(),
            "Execution created"
        );
        Ok(execution)
    }

    async fn register_run(&self, execution_id: ExecutionId) -> CancellationToken {
        let token = self.shutdown.child_token();
        self.runs.lock().await.insert(execution_id, token.clone());
        token
    }

    async fn spawn(&self, execution_id: ExecutionId) {
        let token = self.register_run(execution_id).await;
        let executor = self.executor.clone();
        let runs = self.runs.clone();

        self.tracker.spawn(async move {
            match executor.execute(execution_id, &token).await {
                Ok(outcome) => {
                    tracing::info!(%execution_id, status = %outcome.status, "Run finished");
                }
                Err(e) => {
                    tracing::error!(%execution_id, error = %e, "Run could not complete");
                }
            }
            runs.lock().await.remove(&execution_id);
        });
    }

    /// Ask a run to stop before its next phase.
    pub async fn stop(&self, execution_id: ExecutionId) -> Result<(), ScrapeError> {
        self.store.request_stop(execution_id).await?;
        if let Some(token) = self.runs.lock().await.get(&execution_id) {
            token.cancel();
        }
        tracing::info!(%execution_id, "Stop requested");
        Ok(())
    }

    pub async fn execution_report(&self, execution_id: ExecutionId) -> Result<ExecutionReport, ScrapeError> {
        let execution = self.store.get_execution(execution_id).await?;
        let phases = self.store.list_phases(execution_id).await?;
        Ok(ExecutionReport { execution, phases })
    }

    pub async fn phase_details(&self, phase_id: PhaseId) -> Result<PhaseDetails, ScrapeError> {
        let phase = self.store.get_phase(phase_id).await?;
        let logs = self.store.list_logs(phase_id).await?;

        let node_id = serde_json::from_str::<serde_json::Value>(&phase.node)
            .ok()
            .and_then(|node| node.get("id").and_then(|id| id.as_str()).map(str::to_string));
        let decode = |raw: &Option<String>| {
            raw.as_deref()
                .and_then(|text| serde_json::from_str::<serde_json::Value>(text).ok())
        };

        Ok(PhaseDetails {
            node_id,
            inputs: decode(&phase.inputs),
            outputs: decode(&phase.outputs),
            duration_ms: phase.duration_ms(),
            logs,
            phase,
        })
    }

    /// Fail every execution a previous process left `PENDING` or `RUNNING`.
    ///
    /// Must run before this process triggers anything.
    pub async fn recover_orphans(&self) -> Result<usize, ScrapeError> {
        let mut recovered = 0;
        for status in [ExecutionStatus::Running, ExecutionStatus::Pending] {
            for mut execution in self.store.list_executions_by_status(status).await? {
                self.store
                    .set_phase_statuses(execution.id, PhaseStatus::Running, PhaseStatus::Failed)
                    .await?;
                execution.status = ExecutionStatus::Failed;
                execution.completed_at = Some(Utc::now());
                match self.store.update_execution(&execution).await {
                    Ok(()) => {}
                    Err(StoreError::Terminal(_)) => continue,
                    Err(e) => return Err(e.into()),
                }
                mirror_last_run(
                    self.store.as_ref(),
                    execution.workflow_id,
                    execution.id,
                    ExecutionStatus::Failed,
                )
                .await;
                tracing::warn!(execution_id = %execution.id, previous = %status, "Marked orphaned execution as failed");
                recovered += 1;
            }
        }
        Ok(recovered)
    }

    /// Runs currently supervised by this runtime.
    pub fn active_runs(&self) -> usize {
        self.tracker.len()
    }

    /// Stop accepting work, cancel runs between phases and wait for them.
    pub async fn shutdown(&self) {
        tracing::info!(active = self.tracker.len(), "Shutting down runtime");
        self.shutdown.cancel();
        self.tracker.close();
        if tokio::time::timeout(self.config.shutdown_grace, self.tracker.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                remaining = self.tracker.len(),
                "Shutdown grace period elapsed with runs still active"
            );
        }
    }
}
