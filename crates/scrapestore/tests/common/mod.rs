//! Behaviour shared by every `RunStore` implementation.

use chrono::{Duration, Utc};
use scrapecore::{
    ExecutionPhase, ExecutionStatus, LogEntry, LogLevel, PhaseStatus, TaskType, WorkflowExecution,
    WorkflowRecord,
};
use scrapestore::{RunStore, StoreError};

pub fn workflow() -> WorkflowRecord {
    WorkflowRecord::new("user-1", "scrape titles", r#"{"nodes":[],"edges":[]}"#)
}

/// An execution with three phases, inserted deliberately out of order.
pub async fn seeded_execution(store: &dyn RunStore) -> (WorkflowExecution, Vec<ExecutionPhase>) {
    let workflow = workflow();
    store.create_workflow(&workflow).await.unwrap();

    let execution = WorkflowExecution::new(workflow.id, "user-1", workflow.definition.clone());
    let phases = vec![
        ExecutionPhase::new(execution.id, 3, 2, "Close Browser", TaskType::CloseBrowser, "{}"),
        ExecutionPhase::new(execution.id, 1, 0, "Launch browser", TaskType::LaunchBrowser, "{}"),
        ExecutionPhase::new(execution.id, 2, 1, "Navigate Url", TaskType::NavigateUrl, "{}"),
    ];
    store.create_execution(&execution, &phases).await.unwrap();
    (execution, phases)
}

pub async fn workflow_round_trip(store: &dyn RunStore) {
    let workflow = workflow();
    store.create_workflow(&workflow).await.unwrap();

    let loaded = store.get_workflow(workflow.id).await.unwrap();
    assert_eq!(loaded.id, workflow.id);
    assert_eq!(loaded.user_id, "user-1");
    assert_eq!(loaded.definition, workflow.definition);
    assert!(loaded.last_run_id.is_none());

    let missing = store.get_workflow(uuid::Uuid::new_v4()).await;
    assert!(matches!(missing, Err(StoreError::NotFound(_))));
}

pub async fn last_run_mirror_detects_newer_run(store: &dyn RunStore) {
    let workflow = workflow();
    store.create_workflow(&workflow).await.unwrap();
    let first = uuid::Uuid::new_v4();
    let second = uuid::Uuid::new_v4();

    store
        .record_last_run_start(workflow.id, first, ExecutionStatus::Pending, Utc::now())
        .await
        .unwrap();
    store
        .record_last_run_status(workflow.id, first, ExecutionStatus::Running)
        .await
        .unwrap();
    store
        .record_last_run_start(workflow.id, second, ExecutionStatus::Pending, Utc::now())
        .await
        .unwrap();

    let stale = store
        .record_last_run_status(workflow.id, first, ExecutionStatus::Completed)
        .await;
    assert!(matches!(stale, Err(StoreError::Conflict(_))));

    let loaded = store.get_workflow(workflow.id).await.unwrap();
    assert_eq!(loaded.last_run_id, Some(second));
    assert_eq!(loaded.last_run_status, Some(ExecutionStatus::Pending));
}

pub async fn phases_are_listed_in_plan_order(store: &dyn RunStore) {
    let (execution, _) = seeded_execution(store).await;

    let phases = store.list_phases(execution.id).await.unwrap();
    let numbers: Vec<_> = phases.iter().map(|p| p.number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert_eq!(phases[0].task_type, TaskType::LaunchBrowser);
    assert!(phases.iter().all(|p| p.status == PhaseStatus::Created));
}

pub async fn terminal_records_are_immutable(store: &dyn RunStore) {
    let (mut execution, phases) = seeded_execution(store).await;

    let mut phase = store.get_phase(phases[1].id).await.unwrap();
    phase.status = PhaseStatus::Completed;
    phase.credits_consumed = 5;
    phase.completed_at = Some(Utc::now());
    store.update_phase(&phase).await.unwrap();

    phase.status = PhaseStatus::Failed;
    let rejected = store.update_phase(&phase).await;
    assert!(matches!(rejected, Err(StoreError::Terminal(_))));
    let stored = store.get_phase(phase.id).await.unwrap();
    assert_eq!(stored.status, PhaseStatus::Completed);
    assert_eq!(stored.credits_consumed, 5);

    execution.status = ExecutionStatus::Completed;
    execution.credits_consumed = 5;
    store.update_execution(&execution).await.unwrap();

    execution.status = ExecutionStatus::Failed;
    let rejected = store.update_execution(&execution).await;
    assert!(matches!(rejected, Err(StoreError::Terminal(_))));
    let stop = store.request_stop(execution.id).await;
    assert!(matches!(stop, Err(StoreError::Terminal(_))));

    let first = store.get_execution(execution.id).await.unwrap();
    let second = store.get_execution(execution.id).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.status, ExecutionStatus::Completed);
}

pub async fn missing_records_are_not_found(store: &dyn RunStore) {
    let (execution, phases) = seeded_execution(store).await;

    let mut ghost = execution.clone();
    ghost.id = uuid::Uuid::new_v4();
    assert!(matches!(
        store.update_execution(&ghost).await,
        Err(StoreError::NotFound(_))
    ));

    let mut ghost_phase = phases[0].clone();
    ghost_phase.id = uuid::Uuid::new_v4();
    assert!(matches!(
        store.update_phase(&ghost_phase).await,
        Err(StoreError::NotFound(_))
    ));
}

pub async fn stop_flag_survives_stale_update(store: &dyn RunStore) {
    let (mut execution, _) = seeded_execution(store).await;

    execution.status = ExecutionStatus::Running;
    store.update_execution(&execution).await.unwrap();
    store.request_stop(execution.id).await.unwrap();

    // `execution` still carries stop_requested = false.
    execution.started_at = Some(Utc::now());
    store.update_execution(&execution).await.unwrap();

    let stored = store.get_execution(execution.id).await.unwrap();
    assert!(stored.stop_requested);
    assert!(stored.started_at.is_some());
}

pub async fn bulk_phase_status_change(store: &dyn RunStore) {
    let (execution, phases) = seeded_execution(store).await;

    let changed = store
        .set_phase_statuses(execution.id, PhaseStatus::Created, PhaseStatus::Pending)
        .await
        .unwrap();
    assert_eq!(changed, 3);

    let mut running = store.get_phase(phases[1].id).await.unwrap();
    running.status = PhaseStatus::Running;
    store.update_phase(&running).await.unwrap();

    let changed = store
        .set_phase_statuses(execution.id, PhaseStatus::Running, PhaseStatus::Failed)
        .await
        .unwrap();
    assert_eq!(changed, 1);

    let statuses: Vec<_> = store
        .list_phases(execution.id)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.status)
        .collect();
    assert_eq!(
        statuses,
        vec![PhaseStatus::Failed, PhaseStatus::Pending, PhaseStatus::Pending]
    );
}

pub async fn logs_are_ordered_by_timestamp(store: &dyn RunStore) {
    let (_, phases) = seeded_execution(store).await;
    let phase_id = phases[0].id;
    let base = Utc::now();

    let late = LogEntry {
        level: LogLevel::Error,
        message: "second".to_string(),
        timestamp: base + Duration::milliseconds(20),
    };
    let early = LogEntry {
        level: LogLevel::Info,
        message: "first".to_string(),
        timestamp: base,
    };
    store.append_logs(phase_id, &[late]).await.unwrap();
    store.append_logs(phase_id, &[early]).await.unwrap();

    let logs = store.list_logs(phase_id).await.unwrap();
    let messages: Vec<_> = logs.iter().map(|l| l.message.as_str()).collect();
    assert_eq!(messages, vec!["first", "second"]);
    assert_eq!(logs[1].level, LogLevel::Error);

    assert!(store.list_logs(phases[1].id).await.unwrap().is_empty());
}

pub async fn executions_by_status(store: &dyn RunStore) {
    let (mut running, _) = seeded_execution(store).await;
    let (pending, _) = seeded_execution(store).await;

    running.status = ExecutionStatus::Running;
    store.update_execution(&running).await.unwrap();

    let found = store
        .list_executions_by_status(ExecutionStatus::Running)
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, running.id);

    let found = store
        .list_executions_by_status(ExecutionStatus::Pending)
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, pending.id);

    let listed = store.list_executions(pending.workflow_id).await.unwrap();
    assert_eq!(listed.len(), 1);
}
