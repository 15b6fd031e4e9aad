mod common;

use common::{harness, harness_with, recorder, registry, scenario_a, GateExecutor, USER};
use scrapecore::{
    ExecutionPhase, ExecutionStatus, Executor, PhaseStatus, PlanningError, TaskType,
    WorkflowExecution,
};
use scraperuntime::{RuntimeConfig, ScrapeError, TriggerError, TriggerRequest};
use scrapestore::{RunStore, StoreError};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_trigger_returns_before_the_run_finishes() {
    let calls = recorder();
    let gate = Arc::new(GateExecutor::new(TaskType::NavigateUrl));
    let h = harness(registry(&calls, vec![gate.clone() as Arc<dyn Executor>])).await;

    let execution_id = h.runtime.trigger(h.request(&scenario_a())).await.unwrap();
    gate.entered.notified().await;

    let report = h.runtime.execution_report(execution_id).await.unwrap();
    assert_eq!(report.execution.status, ExecutionStatus::Running);
    assert_eq!(report.phases.len(), 4);
    assert_eq!(report.phases[1].status, PhaseStatus::Running);
    assert_eq!(h.runtime.active_runs(), 1);

    gate.release.notify_one();
    h.wait_until_finished(execution_id).await;

    let report = h.runtime.execution_report(execution_id).await.unwrap();
    assert_eq!(report.execution.status, ExecutionStatus::Completed);
}

#[tokio::test]
async fn test_trigger_persists_plan_in_order() {
    let calls = recorder();
    let gate = Arc::new(GateExecutor::new(TaskType::LaunchBrowser));
    let h = harness(registry(&calls, vec![gate.clone() as Arc<dyn Executor>])).await;

    let execution_id = h.runtime.trigger(h.request(&scenario_a())).await.unwrap();

    let workflow = h.store.get_workflow(h.workflow.id).await.unwrap();
    assert_eq!(workflow.last_run_id, Some(execution_id));
    assert!(workflow.last_run_at.is_some());

    gate.entered.notified().await;
    let report = h.runtime.execution_report(execution_id).await.unwrap();
    let names: Vec<_> = report.phases.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Launch browser", "Navigate Url", "Get html from page", "Close Browser"]
    );
    let numbers: Vec<_> = report.phases.iter().map(|p| p.number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);
    assert_eq!(report.execution.user_id, USER);

    gate.release.notify_one();
    h.wait_until_finished(execution_id).await;
}

#[tokio::test]
async fn test_trigger_rejections_create_no_execution() {
    let calls = recorder();
    let h = harness(registry(&calls, vec![])).await;

    let unknown = h
        .runtime
        .trigger(TriggerRequest {
            workflow_id: uuid::Uuid::new_v4(),
            ..h.request(&scenario_a())
        })
        .await;
    assert!(matches!(unknown, Err(TriggerError::WorkflowNotFound(_))));

    let stranger = h
        .runtime
        .trigger(TriggerRequest {
            user_id: "someone-else".to_string(),
            ..h.request(&scenario_a())
        })
        .await;
    assert!(matches!(stranger, Err(TriggerError::Unauthorized { .. })));

    let garbled = h
        .runtime
        .trigger(TriggerRequest {
            definition: "{not json".to_string(),
            ..h.request(&scenario_a())
        })
        .await;
    assert!(matches!(garbled, Err(TriggerError::InvalidDefinition(_))));

    let mut flow = scenario_a();
    flow.nodes.remove(0);
    flow.edges.clear();
    let unplannable = h.runtime.trigger(h.request(&flow)).await;
    assert!(matches!(
        unplannable,
        Err(TriggerError::Planning(PlanningError::NoEntryPoint))
    ));

    assert!(h.store.list_executions(h.workflow.id).await.unwrap().is_empty());
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_create_workflow_rejects_invalid_graph() {
    let calls = recorder();
    let h = harness(registry(&calls, vec![])).await;

    let result = h
        .runtime
        .create_workflow(USER, "broken", "[]".to_string())
        .await;
    assert!(matches!(result, Err(ScrapeError::InvalidDefinition(_))));
}

#[tokio::test]
async fn test_stop_halts_before_next_phase() {
    let calls = recorder();
    let gate = Arc::new(GateExecutor::new(TaskType::NavigateUrl));
    let h = harness(registry(&calls, vec![gate.clone() as Arc<dyn Executor>])).await;

    let execution_id = h.runtime.trigger(h.request(&scenario_a())).await.unwrap();
    gate.entered.notified().await;

    h.runtime.stop(execution_id).await.unwrap();
    gate.release.notify_one();
    h.wait_until_finished(execution_id).await;

    let report = h.runtime.execution_report(execution_id).await.unwrap();
    assert_eq!(report.execution.status, ExecutionStatus::Failed);
    assert!(report.execution.stop_requested);
    let statuses: Vec<_> = report.phases.iter().map(|p| p.status).collect();
    // The in-flight phase is allowed to finish.
    assert_eq!(
        statuses,
        vec![
            PhaseStatus::Completed,
            PhaseStatus::Completed,
            PhaseStatus::Pending,
            PhaseStatus::Pending,
        ]
    );
    assert_eq!(report.execution.credits_consumed, 7);

    let again = h.runtime.stop(execution_id).await;
    assert!(matches!(again, Err(ScrapeError::Store(StoreError::Terminal(_)))));
}

#[tokio::test]
async fn test_shutdown_cancels_runs_between_phases() {
    let calls = recorder();
    let gate = Arc::new(GateExecutor::new(TaskType::NavigateUrl));
    let config = RuntimeConfig {
        shutdown_grace: Duration::from_secs(5),
        ..RuntimeConfig::default()
    };
    let h = harness_with(registry(&calls, vec![gate.clone() as Arc<dyn Executor>]), config).await;

    let execution_id = h.runtime.trigger(h.request(&scenario_a())).await.unwrap();
    gate.entered.notified().await;

    tokio::join!(h.runtime.shutdown(), async {
        gate.release.notify_one();
    });

    assert_eq!(h.runtime.active_runs(), 0);
    let execution = h.store.get_execution(execution_id).await.unwrap();
    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(execution.stop_requested);
}

#[tokio::test]
async fn test_recover_orphans_fails_unfinished_runs() {
    let calls = recorder();
    let h = harness(registry(&calls, vec![])).await;

    let mut running = WorkflowExecution::new(h.workflow.id, USER, h.workflow.definition.clone());
    running.status = ExecutionStatus::Running;
    let mut active = ExecutionPhase::new(running.id, 1, 0, "Launch browser", TaskType::LaunchBrowser, "{}");
    active.status = PhaseStatus::Running;
    let waiting = ExecutionPhase::new(running.id, 2, 1, "Navigate Url", TaskType::NavigateUrl, "{}");
    h.store
        .create_execution(&running, &[active.clone(), waiting.clone()])
        .await
        .unwrap();
    h.store
        .record_last_run_start(h.workflow.id, running.id, ExecutionStatus::Running, running.created_at)
        .await
        .unwrap();

    let pending = WorkflowExecution::new(h.workflow.id, USER, h.workflow.definition.clone());
    h.store.create_execution(&pending, &[]).await.unwrap();

    let mut done = WorkflowExecution::new(h.workflow.id, USER, h.workflow.definition.clone());
    done.status = ExecutionStatus::Completed;
    h.store.create_execution(&done, &[]).await.unwrap();

    assert_eq!(h.runtime.recover_orphans().await.unwrap(), 2);

    let recovered = h.store.get_execution(running.id).await.unwrap();
    assert_eq!(recovered.status, ExecutionStatus::Failed);
    assert!(recovered.completed_at.is_some());
    assert_eq!(h.store.get_phase(active.id).await.unwrap().status, PhaseStatus::Failed);
    assert_eq!(h.store.get_phase(waiting.id).await.unwrap().status, PhaseStatus::Created);
    assert_eq!(
        h.store.get_execution(pending.id).await.unwrap().status,
        ExecutionStatus::Failed
    );
    assert_eq!(
        h.store.get_execution(done.id).await.unwrap().status,
        ExecutionStatus::Completed
    );

    let workflow = h.store.get_workflow(h.workflow.id).await.unwrap();
    assert_eq!(workflow.last_run_status, Some(ExecutionStatus::Failed));

    assert_eq!(h.runtime.recover_orphans().await.unwrap(), 0);
}

#[tokio::test]
async fn test_superseded_run_keeps_its_own_status() {
    let calls = recorder();
    let h = harness(registry(&calls, vec![])).await;

    let older = h.runtime.create_execution(h.request(&scenario_a())).await.unwrap();
    let newer = h.runtime.create_execution(h.request(&scenario_a())).await.unwrap();

    let outcome = h.runtime.run(older.id).await.unwrap();
    assert_eq!(outcome.status, ExecutionStatus::Completed);

    let workflow = h.store.get_workflow(h.workflow.id).await.unwrap();
    assert_eq!(workflow.last_run_id, Some(newer.id));
    assert_eq!(workflow.last_run_status, Some(ExecutionStatus::Pending));
    assert_eq!(
        h.store.get_execution(older.id).await.unwrap().status,
        ExecutionStatus::Completed
    );
}

#[tokio::test]
async fn test_concurrent_runs_are_independent() {
    let calls = recorder();
    let h = harness(registry(&calls, vec![])).await;

    let first = h.runtime.trigger(h.request(&scenario_a())).await.unwrap();
    let second = h.runtime.trigger(h.request(&scenario_a())).await.unwrap();
    h.wait_until_finished(first).await;
    h.wait_until_finished(second).await;

    for id in [first, second] {
        let report = h.runtime.execution_report(id).await.unwrap();
        assert_eq!(report.execution.status, ExecutionStatus::Completed);
        assert_eq!(report.execution.credits_consumed, 10);
    }
    assert_eq!(calls.lock().unwrap().len(), 8);
}
