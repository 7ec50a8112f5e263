// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow-timeout handler tests

use super::*;

fn timeout_task(task_id: i64) -> TimerTaskInfo {
    TaskBuilder::new(TimerTaskType::WorkflowTimeout, task_id, ts(30)).build()
}

#[tokio::test]
async fn times_out_running_workflow_and_schedules_deletion() {
    let h = harness();
    seed(&h, FakeMutableState::default());
    h.clock.advance(Duration::from_secs(100));

    process(&h, &timeout_task(1)).await.unwrap();

    let state = stored_state(&h);
    assert!(!state.running);
    assert!(state.history.contains(&HistoryEvent::WorkflowExecutionTimedOut));

    let updates = h.store.updates();
    assert_eq!(updates.len(), 1);
    assert!(updates[0]
        .transfer_tasks
        .contains(&TransferTask::DeleteExecution));
    assert!(
        updates[0].timer_tasks.iter().any(|t| matches!(
            t,
            TimerTask::DeleteHistoryEvent { visibility_timestamp }
                if *visibility_timestamp > ts(100)
        )),
        "retention deletion timer is persisted alongside the timeout"
    );
}

#[tokio::test]
async fn completed_workflow_is_a_noop() {
    let h = harness();
    let mut ms = FakeMutableState::default();
    ms.running = false;
    seed(&h, ms);

    process(&h, &timeout_task(1)).await.unwrap();
    assert!(h.store.updates().is_empty());
}

#[tokio::test]
async fn version_mismatch_drops_the_task() {
    let h = harness();
    h.domains.insert(global_domain("d1", CLUSTER_A));
    let mut ms = FakeMutableState::default();
    ms.start_version = 5;
    seed(&h, ms);

    let task = TaskBuilder::new(TimerTaskType::WorkflowTimeout, 1, ts(30))
        .version(3)
        .build();
    process(&h, &task).await.unwrap();
    assert!(h.store.updates().is_empty());
    assert!(stored_state(&h).running);
}

#[tokio::test]
async fn deletion_task_failure_surfaces() {
    let h = harness();
    seed(&h, FakeMutableState::default());
    h.engine
        .fail_delete_tasks(EngineError::Store("retention lookup failed".into()));

    let err = process(&h, &timeout_task(1)).await.unwrap_err();
    assert!(matches!(err, EngineError::Store(_)));
    assert!(
        h.store.updates().is_empty(),
        "the commit must not happen without its deletion tasks"
    );
}

#[tokio::test]
async fn conflict_reloads_and_commits_once() {
    let h = harness();
    seed(&h, FakeMutableState::default());
    h.store.inject_conflicts(1);

    process(&h, &timeout_task(1)).await.unwrap();

    let state = stored_state(&h);
    let timeouts = state
        .history
        .iter()
        .filter(|e| matches!(e, HistoryEvent::WorkflowExecutionTimedOut))
        .count();
    assert_eq!(timeouts, 1);
    assert_eq!(h.store.updates().len(), 1);
}
