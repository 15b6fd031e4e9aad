use crate::{ExecutorRegistry, SetupError};
use chrono::Utc;
use futures::FutureExt;
use scrapecore::{
    EventBus, ExecutionContext, ExecutionEnvironment, ExecutionEvent, ExecutionId,
    ExecutionPhase, ExecutionStatus, FlowDefinition, GraphNode, LogCollector, PhaseStatus,
    TaskCatalog, TaskValue, WorkflowExecution, WorkflowId,
};
use scrapestore::{RunStore, StoreError};
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Final state of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub execution_id: ExecutionId,
    pub status: ExecutionStatus,
    pub credits_consumed: u32,
    pub stop_requested: bool,
    /// Phases that reached a terminal status.
    pub phases_run: usize,
}

struct PhaseResult {
    success: bool,
    credits: u32,
}

/// Runs persisted executions phase by phase.
///
/// Phases run strictly one after another against a single
/// [`ExecutionEnvironment`]; the first failing phase halts the run.
pub struct WorkflowExecutor {
    catalog: Arc<TaskCatalog>,
    registry: Arc<ExecutorRegistry>,
    store: Arc<dyn RunStore>,
    events: Arc<EventBus>,
    close_browser_on_finish: bool,
}

impl WorkflowExecutor {
    pub fn new(
        catalog: Arc<TaskCatalog>,
        registry: Arc<ExecutorRegistry>,
        store: Arc<dyn RunStore>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            catalog,
            registry,
            store,
            events,
            close_browser_on_finish: true,
        }
    }

    pub fn with_browser_cleanup(mut self, enabled: bool) -> Self {
        self.close_browser_on_finish = enabled;
        self
    }

    /// Run execution `execution_id` to completion.
    ///
    /// Only setup problems are returned as errors; phase failures end up in
    /// the persisted records and in the returned outcome.
    #[tracing::instrument(skip_all, fields(execution_id = %execution_id))]
    pub async fn execute(
        &self,
        execution_id: ExecutionId,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, SetupError> {
        let mut execution = match self.store.get_execution(execution_id).await {
            Ok(execution) => execution,
            Err(StoreError::NotFound(_)) => return Err(SetupError::ExecutionNotFound(execution_id)),
            Err(e) => return Err(e.into()),
        };
        if execution.status.is_terminal() {
            return Err(SetupError::AlreadyFinished(execution_id));
        }
        let flow = FlowDefinition::parse(&execution.definition).map_err(|e| {
            SetupError::InvalidDefinition {
                execution_id,
                reason: e.to_string(),
            }
        })?;
        let phases = self.store.list_phases(execution_id).await?;

        let start = Instant::now();
        execution.status = ExecutionStatus::Running;
        execution.started_at = Some(Utc::now());
        self.store.update_execution(&execution).await?;
        self.store
            .set_phase_statuses(execution_id, PhaseStatus::Created, PhaseStatus::Pending)
            .await?;
        mirror_last_run(
            self.store.as_ref(),
            execution.workflow_id,
            execution_id,
            ExecutionStatus::Running,
        )
        .await;

        tracing::info!(phases = phases.len(), "Starting workflow execution");
        self.events.emit(ExecutionEvent::ExecutionStarted {
            execution_id,
            workflow_id: execution.workflow_id,
            phases: phases.len(),
            timestamp: Utc::now(),
        });

        let mut environment = ExecutionEnvironment::new();
        let looped = self
            .run_phases(&execution, &flow, phases, &mut environment, cancel)
            .await;

        if self.close_browser_on_finish {
            release_handles(&mut environment).await;
        }

        let (failed, stopped, credits, phases_run) = match looped {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!(error = %e, "Run aborted by store error");
                let current = self.store.get_execution(execution_id).await.ok();
                let credits = current.as_ref().map(|c| c.credits_consumed).unwrap_or(0);
                let stopped = current.is_some_and(|c| c.stop_requested);
                self.finalize(&mut execution, ExecutionStatus::Failed, credits, stopped, start)
                    .await?;
                return Err(e.into());
            }
        };

        let status = if failed || stopped {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Completed
        };
        self.finalize(&mut execution, status, credits, stopped, start)
            .await?;

        Ok(RunOutcome {
            execution_id,
            status,
            credits_consumed: credits,
            stop_requested: execution.stop_requested,
            phases_run,
        })
    }

    /// Walk the phases in plan order. Returns (failed, stopped, credits, phases run).
    async fn run_phases(
        &self,
        execution: &WorkflowExecution,
        flow: &FlowDefinition,
        phases: Vec<ExecutionPhase>,
        environment: &mut ExecutionEnvironment,
        cancel: &CancellationToken,
    ) -> Result<(bool, bool, u32, usize), StoreError> {
        let mut credits = 0;
        let mut phases_run = 0;

        for mut phase in phases {
            if self.stop_requested(execution.id, cancel).await? {
                tracing::info!(phase = phase.number, "Stop requested, halting run");
                return Ok((false, true, credits, phases_run));
            }

            let result = self.run_phase(flow, &mut phase, environment).await?;
            phases_run += 1;
            credits += result.credits;

            if !result.success {
                return Ok((true, false, credits, phases_run));
            }

            let mut progress = execution.clone();
            progress.status = ExecutionStatus::Running;
            progress.credits_consumed = credits;
            self.store.update_execution(&progress).await?;
        }

        Ok((false, false, credits, phases_run))
    }

    async fn stop_requested(
        &self,
        execution_id: ExecutionId,
        cancel: &CancellationToken,
    ) -> Result<bool, StoreError> {
        if cancel.is_cancelled() {
            return Ok(true);
        }
        Ok(self.store.get_execution(execution_id).await?.stop_requested)
    }

    async fn run_phase(
        &self,
        flow: &FlowDefinition,
        phase: &mut ExecutionPhase,
        environment: &mut ExecutionEnvironment,
    ) -> Result<PhaseResult, StoreError> {
        let start = Instant::now();
        let mut log = LogCollector::new();

        let node: Option<GraphNode> = match serde_json::from_str(&phase.node) {
            Ok(node) => Some(node),
            Err(e) => {
                log.error(format!("invalid node snapshot: {}", e));
                None
            }
        };
        let node_id = node.as_ref().map(|n| n.id.clone()).unwrap_or_default();

        if let Some(node) = &node {
            environment.prepare_node(&node.id);
            self.wire_inputs(flow, node, environment, &mut log);
        }

        phase.status = PhaseStatus::Running;
        phase.started_at = Some(Utc::now());
        phase.inputs = Some(serialize_values(
            environment.node(&node_id).map(|io| &io.inputs),
        ));
        self.store.update_phase(phase).await?;

        tracing::info!(phase = phase.number, node_id = %node_id, task = %phase.task_type, "Phase started");
        self.events.emit(ExecutionEvent::PhaseStarted {
            execution_id: phase.execution_id,
            phase_id: phase.id,
            node_id: node_id.clone(),
            task_type: phase.task_type,
            timestamp: Utc::now(),
        });

        let success = match (&node, self.registry.get(phase.task_type)) {
            (None, _) => false,
            (Some(_), None) => {
                log.error(format!("executor not found for {}", phase.task_type));
                false
            }
            (Some(node), Some(executor)) => {
                let outcome = {
                    let mut ctx = ExecutionContext::new(&node.id, environment, &mut log);
                    AssertUnwindSafe(executor.execute(&mut ctx))
                        .catch_unwind()
                        .await
                };
                match outcome {
                    Ok(Ok(success)) => success,
                    Ok(Err(e)) => {
                        log.error(e.to_string());
                        false
                    }
                    Err(panic) => {
                        log.error(format!("executor panicked: {}", panic_message(panic.as_ref())));
                        false
                    }
                }
            }
        };

        let credits = if success {
            self.catalog.credits(phase.task_type)
        } else {
            0
        };
        phase.status = if success {
            PhaseStatus::Completed
        } else {
            PhaseStatus::Failed
        };
        phase.completed_at = Some(Utc::now());
        phase.outputs = Some(serialize_values(
            environment.node(&node_id).map(|io| &io.outputs),
        ));
        phase.credits_consumed = credits;
        self.store.update_phase(phase).await?;
        self.store.append_logs(phase.id, log.entries()).await?;

        let duration_ms = start.elapsed().as_millis() as u64;
        if success {
            tracing::info!(phase = phase.number, node_id = %node_id, duration_ms, credits, "Phase completed");
            self.events.emit(ExecutionEvent::PhaseCompleted {
                execution_id: phase.execution_id,
                phase_id: phase.id,
                node_id,
                credits,
                duration_ms,
                timestamp: Utc::now(),
            });
        } else {
            let error = log
                .entries()
                .iter()
                .rev()
                .find(|e| e.level == scrapecore::LogLevel::Error)
                .map(|e| e.message.clone());
            tracing::error!(phase = phase.number, node_id = %node_id, error = ?error, "Phase failed");
            self.events.emit(ExecutionEvent::PhaseFailed {
                execution_id: phase.execution_id,
                phase_id: phase.id,
                node_id,
                error,
                timestamp: Utc::now(),
            });
        }

        Ok(PhaseResult { success, credits })
    }

    /// Resolve each declared non-browser input: literal first, then the
    /// producing node's recorded output.
    fn wire_inputs(
        &self,
        flow: &FlowDefinition,
        node: &GraphNode,
        environment: &mut ExecutionEnvironment,
        log: &mut LogCollector,
    ) {
        let Some(definition) = self.catalog.get(node.task_type()) else {
            log.error(format!("unknown task type {}", node.task_type()));
            return;
        };

        for param in definition.inputs.iter().filter(|p| !p.is_browser()) {
            if let Some(value) = node.literal(&param.name) {
                environment.set_input(&node.id, param.name.clone(), value);
                continue;
            }

            let wired = flow
                .incoming_edge(&node.id, &param.name)
                .and_then(|edge| environment.get_output(&edge.source, &edge.source_handle))
                .cloned();
            match wired {
                Some(value) => environment.set_input(&node.id, param.name.clone(), value),
                None if param.required => {
                    log.error(format!("input {} has no value", param.name));
                }
                None => {}
            }
        }
    }

    async fn finalize(
        &self,
        execution: &mut WorkflowExecution,
        status: ExecutionStatus,
        credits: u32,
        stopped: bool,
        start: Instant,
    ) -> Result<(), StoreError> {
        execution.status = status;
        execution.completed_at = Some(Utc::now());
        execution.credits_consumed = credits;
        execution.stop_requested = execution.stop_requested || stopped;
        self.store.update_execution(execution).await?;

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(status = %status, credits, duration_ms, "Workflow execution finished");
        self.events.emit(ExecutionEvent::ExecutionFinished {
            execution_id: execution.id,
            status,
            credits_consumed: credits,
            duration_ms,
            timestamp: Utc::now(),
        });

        mirror_last_run(self.store.as_ref(), execution.workflow_id, execution.id, status).await;
        Ok(())
    }
}

/// Copy a run's status onto its workflow's last-run fields.
///
/// A newer run may already own those fields; that conflict is ignored.
pub(crate) async fn mirror_last_run(
    store: &dyn RunStore,
    workflow_id: WorkflowId,
    execution_id: ExecutionId,
    status: ExecutionStatus,
) {
    match store
        .record_last_run_status(workflow_id, execution_id, status)
        .await
    {
        Ok(()) => {}
        Err(StoreError::Conflict(reason)) => {
            tracing::debug!(%workflow_id, %execution_id, %reason, "Last run superseded");
        }
        Err(e) => {
            tracing::warn!(%workflow_id, %execution_id, error = %e, "Failed to record last run status");
        }
    }
}

async fn release_handles(environment: &mut ExecutionEnvironment) {
    let (browser, page) = environment.take_handles();
    if let Some(page) = page {
        if !page.is_closed() {
            if let Err(e) = page.close().await {
                tracing::debug!(error = %e, "Failed to close leftover page");
            }
        }
    }
    if let Some(browser) = browser {
        tracing::debug!("Closing browser left open by the workflow");
        if let Err(e) = browser.close().await {
            tracing::warn!(error = %e, "Failed to close leftover browser");
        }
    }
}

fn serialize_values(values: Option<&HashMap<String, TaskValue>>) -> String {
    let map: serde_json::Map<String, serde_json::Value> = values
        .into_iter()
        .flatten()
        .map(|(name, value)| (name.clone(), serde_json::Value::String(value.as_text())))
        .collect();
    serde_json::Value::Object(map).to_string()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
