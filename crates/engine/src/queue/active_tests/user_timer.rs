// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-timer handler tests

use super::*;

fn timer_task(task_id: i64, fire_secs: u64) -> TimerTaskInfo {
    TaskBuilder::new(TimerTaskType::UserTimer, task_id, ts(fire_secs)).build()
}

#[tokio::test]
async fn expired_timer_fires_and_schedules_decision() {
    let h = harness();
    let mut ms = FakeMutableState::default();
    ms.user_timers
        .insert("u1".into(), user_timer("u1", 42, ts(10)));
    seed(&h, ms);

    process(&h, &timer_task(1, 10)).await.unwrap();

    let state = stored_state(&h);
    assert!(state.user_timers.is_empty(), "fired timer is consumed");
    assert!(state.history.contains(&HistoryEvent::TimerFired {
        started_event_id: 42,
        timer_id: TimerId::new("u1"),
    }));
    assert!(
        state
            .history
            .iter()
            .any(|e| matches!(e, HistoryEvent::DecisionTaskScheduled { .. })),
        "a decision must be scheduled to react to the fired timer"
    );

    let updates = h.store.updates();
    assert_eq!(updates.len(), 1);
    assert!(updates[0].transfer_tasks.iter().any(|t| matches!(
        t,
        TransferTask::DecisionTask { task_list, .. } if task_list == "default-tl"
    )));
}

#[tokio::test]
async fn multiple_expired_timers_fire_in_one_pass() {
    let h = harness();
    let mut ms = FakeMutableState::default();
    ms.user_timers.insert("a".into(), user_timer("a", 10, ts(5)));
    ms.user_timers.insert("b".into(), user_timer("b", 11, ts(8)));
    seed(&h, ms);

    process(&h, &timer_task(1, 10)).await.unwrap();

    let state = stored_state(&h);
    let fired: Vec<&HistoryEvent> = state
        .history
        .iter()
        .filter(|e| matches!(e, HistoryEvent::TimerFired { .. }))
        .collect();
    assert_eq!(fired.len(), 2);
    assert_eq!(h.store.updates().len(), 1, "one commit covers both timers");
}

#[tokio::test]
async fn unexpired_timer_gets_a_task_materialised() {
    let h = harness();
    let mut ms = FakeMutableState::default();
    ms.user_timers
        .insert("u1".into(), user_timer("u1", 42, ts(10)));
    let mut deferred = user_timer("u2", 43, ts(30));
    deferred.task_created = false;
    ms.user_timers.insert("u2".into(), deferred);
    let mut later = user_timer("u3", 44, ts(50));
    later.task_created = false;
    ms.user_timers.insert("u3".into(), later);
    seed(&h, ms);

    process(&h, &timer_task(1, 10)).await.unwrap();

    let state = stored_state(&h);
    assert!(
        state.user_timers["u2"].task_created,
        "head deferred timer gets exactly one persisted task"
    );
    assert!(
        !state.user_timers["u3"].task_created,
        "the walk stops at the first unexpired timer"
    );
    let updates = h.store.updates();
    assert_eq!(
        updates[0].timer_tasks,
        vec![TimerTask::UserTimer {
            visibility_timestamp: ts(30),
            event_id: 43,
        }]
    );
}

#[tokio::test]
async fn completed_workflow_is_a_noop() {
    let h = harness();
    let mut ms = FakeMutableState::default();
    ms.running = false;
    ms.user_timers
        .insert("u1".into(), user_timer("u1", 42, ts(10)));
    seed(&h, ms);

    process(&h, &timer_task(1, 10)).await.unwrap();
    assert!(h.store.updates().is_empty());
}

#[tokio::test]
async fn no_decision_scheduled_when_one_is_pending() {
    let h = harness();
    let mut ms = FakeMutableState::default();
    ms.user_timers
        .insert("u1".into(), user_timer("u1", 42, ts(10)));
    ms.decision = Some(pending_decision(90));
    seed(&h, ms);

    process(&h, &timer_task(1, 10)).await.unwrap();

    let state = stored_state(&h);
    assert!(state.history.contains(&HistoryEvent::TimerFired {
        started_event_id: 42,
        timer_id: TimerId::new("u1"),
    }));
    assert!(h.store.updates()[0].transfer_tasks.is_empty());
}

#[tokio::test]
async fn phantom_timer_is_an_internal_error() {
    let h = harness();
    let mut ms = FakeMutableState::default();
    ms.phantom_user_timers.push(user_timer("ghost", 42, ts(5)));
    seed(&h, ms);

    let err = process(&h, &timer_task(1, 10)).await.unwrap_err();
    assert!(matches!(err, EngineError::Internal(_)));
    assert!(h.store.updates().is_empty());
}

#[tokio::test]
async fn conflict_reloads_and_retries() {
    let h = harness();
    let mut ms = FakeMutableState::default();
    ms.user_timers
        .insert("u1".into(), user_timer("u1", 42, ts(10)));
    seed(&h, ms);
    h.store.inject_conflicts(1);

    process(&h, &timer_task(1, 10)).await.unwrap();

    assert_eq!(h.store.load_count(), 2, "conflict forces a fresh load");
    assert_eq!(h.store.updates().len(), 1);
    let fired: usize = stored_state(&h)
        .history
        .iter()
        .filter(|e| matches!(e, HistoryEvent::TimerFired { .. }))
        .count();
    assert_eq!(fired, 1, "the retried pass must not double-fire");
}

#[tokio::test]
async fn conflict_exhaustion_surfaces_max_attempts() {
    let h = harness();
    let mut ms = FakeMutableState::default();
    ms.user_timers
        .insert("u1".into(), user_timer("u1", 42, ts(10)));
    seed(&h, ms);
    h.store.inject_conflicts(100);

    let err = process(&h, &timer_task(1, 10)).await.unwrap_err();
    assert!(matches!(err, EngineError::MaxAttemptsExceeded));
}
