// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Decision-timeout handler tests

use super::*;

fn timeout_task(task_id: i64, kind: TimeoutKind, schedule_id: i64, attempt: i64) -> TimerTaskInfo {
    TaskBuilder::new(TimerTaskType::DecisionTimeout, task_id, ts(30))
        .timeout_kind(kind)
        .event_id(schedule_id)
        .attempt(attempt)
        .build()
}

#[tokio::test]
async fn start_to_close_times_out_and_reschedules() {
    let h = harness();
    let mut ms = FakeMutableState::default();
    let mut di = pending_decision(12);
    di.started_id = Some(13);
    ms.decision = Some(di);
    seed(&h, ms);

    process(&h, &timeout_task(1, TimeoutKind::StartToClose, 12, 0))
        .await
        .unwrap();

    let state = stored_state(&h);
    assert!(state.history.contains(&HistoryEvent::DecisionTaskTimedOut {
        schedule_id: 12,
        started_id: Some(13),
        timeout_kind: TimeoutKind::StartToClose,
    }));
    assert!(
        state
            .history
            .iter()
            .any(|e| matches!(e, HistoryEvent::DecisionTaskScheduled { .. })),
        "a replacement decision is scheduled"
    );
    assert!(h.store.updates()[0].transfer_tasks.iter().any(|t| matches!(
        t,
        TransferTask::DecisionTask { .. }
    )));
}

#[tokio::test]
async fn sticky_schedule_to_start_reschedules_on_original_task_list() {
    let h = harness();
    let mut ms = FakeMutableState::default();
    ms.sticky_enabled = true;
    ms.sticky_timeout = Duration::from_secs(10);
    ms.decision = Some(pending_decision(12));
    seed(&h, ms);
    h.clock.advance(Duration::from_secs(30));

    process(&h, &timeout_task(1, TimeoutKind::ScheduleToStart, 12, 0))
        .await
        .unwrap();

    let state = stored_state(&h);
    assert!(state.history.contains(&HistoryEvent::DecisionTaskTimedOut {
        schedule_id: 12,
        started_id: None,
        timeout_kind: TimeoutKind::ScheduleToStart,
    }));

    let updates = h.store.updates();
    // Rescheduled on the execution's original (non-sticky) task list.
    assert!(updates[0].transfer_tasks.iter().any(|t| matches!(
        t,
        TransferTask::DecisionTask { task_list, .. } if task_list == "default-tl"
    )));
    // Sticky execution gets a fresh pickup timer for the new decision.
    assert!(
        updates[0].timer_tasks.iter().any(|t| matches!(
            t,
            TimerTask::DecisionTimeout {
                timeout_kind: TimeoutKind::ScheduleToStart,
                visibility_timestamp,
                ..
            } if *visibility_timestamp == ts(40)
        )),
        "pickup timer fires sticky_timeout after virtual now"
    );
}

#[tokio::test]
async fn schedule_to_start_is_ignored_without_sticky() {
    let h = harness();
    let mut ms = FakeMutableState::default();
    ms.decision = Some(pending_decision(12));
    seed(&h, ms);

    process(&h, &timeout_task(1, TimeoutKind::ScheduleToStart, 12, 0))
        .await
        .unwrap();
    assert!(h.store.updates().is_empty());
}

#[tokio::test]
async fn schedule_to_start_is_ignored_once_started() {
    let h = harness();
    let mut ms = FakeMutableState::default();
    ms.sticky_enabled = true;
    let mut di = pending_decision(12);
    di.started_id = Some(13);
    ms.decision = Some(di);
    seed(&h, ms);

    process(&h, &timeout_task(1, TimeoutKind::ScheduleToStart, 12, 0))
        .await
        .unwrap();
    assert!(h.store.updates().is_empty());
}

#[tokio::test]
async fn attempt_mismatch_is_a_noop() {
    let h = harness();
    let mut ms = FakeMutableState::default();
    let mut di = pending_decision(12);
    di.attempt = 3;
    ms.decision = Some(di);
    seed(&h, ms);

    process(&h, &timeout_task(1, TimeoutKind::StartToClose, 12, 0))
        .await
        .unwrap();
    assert!(h.store.updates().is_empty());
    assert!(stored_state(&h).history.is_empty());
}

#[tokio::test]
async fn missing_decision_is_a_duplicate() {
    let h = harness();
    seed(&h, FakeMutableState::default());

    process(&h, &timeout_task(1, TimeoutKind::StartToClose, 12, 0))
        .await
        .unwrap();
    assert!(h.store.updates().is_empty());
}

#[tokio::test]
async fn missing_decision_beyond_next_event_id_refreshes_cache() {
    let h = harness();
    let mut fresh = FakeMutableState::default();
    fresh.next_event_id = 150;
    let mut di = pending_decision(120);
    di.started_id = Some(121);
    fresh.decision = Some(di);
    seed(&h, fresh);

    let mut stale = FakeMutableState::default();
    stale.next_event_id = 50;
    h.store.serve_stale_once(stale);

    process(&h, &timeout_task(1, TimeoutKind::StartToClose, 120, 0))
        .await
        .unwrap();

    assert_eq!(h.store.load_count(), 2);
    assert!(stored_state(&h)
        .history
        .iter()
        .any(|e| matches!(e, HistoryEvent::DecisionTaskTimedOut { schedule_id: 120, .. })));
}

#[tokio::test]
async fn version_mismatch_drops_the_task() {
    let h = harness();
    h.domains.insert(global_domain("d1", CLUSTER_A));
    let mut ms = FakeMutableState::default();
    let mut di = pending_decision(12);
    di.version = 5;
    ms.decision = Some(di);
    seed(&h, ms);

    let task = TaskBuilder::new(TimerTaskType::DecisionTimeout, 1, ts(30))
        .timeout_kind(TimeoutKind::StartToClose)
        .event_id(12)
        .version(3)
        .build();
    process(&h, &task).await.unwrap();
    assert!(h.store.updates().is_empty());
    assert!(stored_state(&h).history.is_empty());
}

#[tokio::test]
async fn completed_workflow_is_a_noop() {
    let h = harness();
    let mut ms = FakeMutableState::default();
    ms.running = false;
    ms.decision = Some(pending_decision(12));
    seed(&h, ms);

    process(&h, &timeout_task(1, TimeoutKind::StartToClose, 12, 0))
        .await
        .unwrap();
    assert!(h.store.updates().is_empty());
}
