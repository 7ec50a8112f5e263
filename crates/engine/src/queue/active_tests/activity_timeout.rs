// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Activity-timeout handler tests

use super::*;

fn timeout_task(
    task_id: i64,
    fire_secs: u64,
    kind: TimeoutKind,
    event_id: i64,
    attempt: i64,
) -> TimerTaskInfo {
    TaskBuilder::new(TimerTaskType::ActivityTimeout, task_id, ts(fire_secs))
        .timeout_kind(kind)
        .event_id(event_id)
        .attempt(attempt)
        .build()
}

#[tokio::test]
async fn heartbeat_timeout_is_preempted_by_retry() {
    let h = harness();
    let mut ms = FakeMutableState::default();
    let mut ai = started_activity(7, 8, ts(0), ts(0));
    ai.heartbeat_timeout = Some(Duration::from_secs(5));
    ai.mark_timer_created(TimeoutKind::Heartbeat);
    ms.activities.insert(7, ai);
    ms.retry_fire_at = Some(ts(6));
    seed(&h, ms);

    process(&h, &timeout_task(1, 5, TimeoutKind::Heartbeat, 7, 0))
        .await
        .unwrap();

    let state = stored_state(&h);
    assert!(
        !state
            .history
            .iter()
            .any(|e| matches!(e, HistoryEvent::ActivityTaskTimedOut { .. })),
        "retry pre-empts the timeout event"
    );
    assert_eq!(state.activities[&7].attempt, 1, "retry advanced the attempt");

    let updates = h.store.updates();
    assert_eq!(updates.len(), 1, "a single commit");
    assert!(updates[0].timer_tasks.contains(&TimerTask::RetryTimer {
        visibility_timestamp: ts(6),
        event_id: 7,
        attempt: 1,
    }));
    assert_eq!(state.retry_reasons, vec!["timeout: heartbeat".to_string()]);
}

#[tokio::test]
async fn schedule_to_close_with_retries_exhausted_times_out() {
    let h = harness();
    let mut ms = FakeMutableState::default();
    let mut ai = started_activity(7, 8, ts(0), ts(0));
    // Keep start-to-close far out so schedule-to-close expires first.
    ai.start_to_close_timeout = Duration::from_secs(300);
    ms.activities.insert(7, ai);
    ms.retry_fire_at = None;
    seed(&h, ms);

    process(&h, &timeout_task(1, 60, TimeoutKind::ScheduleToClose, 7, 0))
        .await
        .unwrap();

    let state = stored_state(&h);
    assert!(state.history.contains(&HistoryEvent::ActivityTaskTimedOut {
        schedule_id: 7,
        started_id: Some(8),
        timeout_kind: TimeoutKind::ScheduleToClose,
        details: None,
    }));
    assert!(
        state
            .history
            .iter()
            .any(|e| matches!(e, HistoryEvent::DecisionTaskScheduled { .. })),
        "timing out must wake the workflow"
    );
    assert!(state.activities.is_empty(), "the activity closed");
}

#[tokio::test]
async fn schedule_to_close_applies_across_attempts() {
    let h = harness();
    let mut ms = FakeMutableState::default();
    let mut ai = started_activity(7, 8, ts(0), ts(0));
    ai.attempt = 2;
    ai.start_to_close_timeout = Duration::from_secs(300);
    ms.activities.insert(7, ai);
    seed(&h, ms);

    // The task was created for attempt 0; schedule-to-close spans attempts.
    process(&h, &timeout_task(1, 60, TimeoutKind::ScheduleToClose, 7, 0))
        .await
        .unwrap();

    assert!(stored_state(&h).history.iter().any(|e| matches!(
        e,
        HistoryEvent::ActivityTaskTimedOut { timeout_kind: TimeoutKind::ScheduleToClose, .. }
    )));
}

#[tokio::test]
async fn older_attempt_timer_is_ignored() {
    let h = harness();
    let mut ms = FakeMutableState::default();
    let mut ai = started_activity(7, 8, ts(0), ts(0));
    ai.attempt = 2;
    ms.activities.insert(7, ai);
    seed(&h, ms);

    process(&h, &timeout_task(1, 30, TimeoutKind::StartToClose, 7, 0))
        .await
        .unwrap();

    assert!(h.store.updates().is_empty());
    assert!(stored_state(&h).history.is_empty());
}

#[tokio::test]
async fn heartbeat_task_reschedules_from_latest_heartbeat() {
    let h = harness();
    let mut ms = FakeMutableState::default();
    let mut ai = started_activity(7, 8, ts(0), ts(0));
    ai.heartbeat_timeout = Some(Duration::from_secs(5));
    // The worker heartbeated at 8s, after the 5s timer was persisted.
    ai.last_heartbeat = Some(ts(8));
    ai.mark_timer_created(TimeoutKind::Heartbeat);
    ms.activities.insert(7, ai);
    seed(&h, ms);

    process(&h, &timeout_task(1, 5, TimeoutKind::Heartbeat, 7, 0))
        .await
        .unwrap();

    let state = stored_state(&h);
    assert!(state.history.is_empty(), "activity is healthy; no timeout");
    assert!(
        state.activities[&7].timer_created(TimeoutKind::Heartbeat),
        "a fresh heartbeat timer is tracked"
    );
    let updates = h.store.updates();
    assert_eq!(
        updates[0].timer_tasks,
        vec![TimerTask::ActivityTimeout {
            visibility_timestamp: ts(13),
            timeout_kind: TimeoutKind::Heartbeat,
            event_id: 7,
            attempt: 0,
        }],
        "next heartbeat timer is based on the latest recorded heartbeat"
    );
}

#[tokio::test]
async fn schedule_to_start_times_out_unstarted_activity() {
    let h = harness();
    let mut ms = FakeMutableState::default();
    ms.activities.insert(7, pending_activity(7, ts(0)));
    // Retry budget present, but queue timeouts are not retriable.
    ms.retry_fire_at = Some(ts(99));
    seed(&h, ms);

    process(&h, &timeout_task(1, 10, TimeoutKind::ScheduleToStart, 7, 0))
        .await
        .unwrap();

    let state = stored_state(&h);
    assert!(state.history.contains(&HistoryEvent::ActivityTaskTimedOut {
        schedule_id: 7,
        started_id: None,
        timeout_kind: TimeoutKind::ScheduleToStart,
        details: None,
    }));
    assert!(
        state.retry_reasons.is_empty(),
        "schedule-to-start must not consult the retry policy"
    );
}

#[tokio::test]
async fn heartbeat_timeout_event_carries_details() {
    let h = harness();
    let mut ms = FakeMutableState::default();
    let mut ai = started_activity(7, 8, ts(0), ts(0));
    ai.heartbeat_timeout = Some(Duration::from_secs(5));
    ai.details = Some(b"progress: 42".to_vec());
    ms.activities.insert(7, ai);
    ms.retry_fire_at = None;
    seed(&h, ms);

    process(&h, &timeout_task(1, 5, TimeoutKind::Heartbeat, 7, 0))
        .await
        .unwrap();

    assert!(stored_state(&h).history.contains(&HistoryEvent::ActivityTaskTimedOut {
        schedule_id: 7,
        started_id: Some(8),
        timeout_kind: TimeoutKind::Heartbeat,
        details: Some(b"progress: 42".to_vec()),
    }));
}

#[tokio::test]
async fn stale_mutable_state_is_discarded_and_reloaded() {
    let h = harness();
    let mut fresh = FakeMutableState::default();
    fresh.next_event_id = 150;
    let mut ai = started_activity(100, 101, ts(0), ts(0));
    ai.start_to_close_timeout = Duration::from_secs(300);
    fresh.activities.insert(100, ai);
    fresh.retry_fire_at = None;
    seed(&h, fresh);

    let mut stale = FakeMutableState::default();
    stale.next_event_id = 50;
    h.store.serve_stale_once(stale);

    process(&h, &timeout_task(1, 60, TimeoutKind::ScheduleToClose, 100, 0))
        .await
        .unwrap();

    assert_eq!(h.store.load_count(), 2, "stale snapshot forces a reload");
    assert!(stored_state(&h).history.iter().any(|e| matches!(
        e,
        HistoryEvent::ActivityTaskTimedOut { schedule_id: 100, .. }
    )));
}

#[tokio::test]
async fn closed_activity_is_a_noop() {
    let h = harness();
    seed(&h, FakeMutableState::default());

    process(&h, &timeout_task(1, 30, TimeoutKind::StartToClose, 7, 0))
        .await
        .unwrap();
    assert!(h.store.updates().is_empty());
}

#[tokio::test]
async fn completed_workflow_is_a_noop() {
    let h = harness();
    let mut ms = FakeMutableState::default();
    ms.running = false;
    ms.activities.insert(7, pending_activity(7, ts(0)));
    seed(&h, ms);

    process(&h, &timeout_task(1, 30, TimeoutKind::ScheduleToStart, 7, 0))
        .await
        .unwrap();
    assert!(h.store.updates().is_empty());
}

#[tokio::test]
async fn missing_timeout_kind_is_an_internal_error() {
    let h = harness();
    seed(&h, FakeMutableState::default());

    let task = TaskBuilder::new(TimerTaskType::ActivityTimeout, 1, ts(30))
        .event_id(7)
        .build();
    let err = process(&h, &task).await.unwrap_err();
    assert!(matches!(err, EngineError::Internal(_)));
}
