// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{ts, FakeDomainCache, FakeShard, TaskBuilder, CLUSTER_A, CLUSTER_B};
use std::time::Duration;
use tempo_core::{FakeClock, TimerTaskType};

fn shard() -> (FakeClock, Arc<FakeShard>) {
    let clock = FakeClock::new();
    let shard = FakeShard::new(clock.clone(), FakeDomainCache::new());
    (clock, shard)
}

fn user_task(task_id: i64, fire_secs: u64) -> TimerTaskInfo {
    TaskBuilder::new(TimerTaskType::UserTimer, task_id, ts(fire_secs)).build()
}

#[tokio::test]
async fn reads_only_due_tasks_in_order() {
    let (clock, shard) = shard();
    shard.add_task(user_task(2, 20));
    shard.add_task(user_task(1, 10));
    shard.add_task(user_task(3, 300));

    clock.advance(Duration::from_secs(30));
    let ack = TimerQueueAckManager::new_active(shard.clone(), 10);
    let batch = ack.read_timer_tasks().await.unwrap();

    let ids: Vec<i64> = batch.tasks.iter().map(|t| t.task_id).collect();
    assert_eq!(ids, vec![1, 2], "future task must not be dispatched");
    assert!(!batch.more);
    assert_eq!(batch.next_fire, Some(ts(300)));
}

#[tokio::test]
async fn read_does_not_redeliver_outstanding_tasks() {
    let (clock, shard) = shard();
    shard.add_task(user_task(1, 10));
    clock.advance(Duration::from_secs(30));

    let ack = TimerQueueAckManager::new_active(shard.clone(), 10);
    let first = ack.read_timer_tasks().await.unwrap();
    assert_eq!(first.tasks.len(), 1);

    let second = ack.read_timer_tasks().await.unwrap();
    assert!(second.tasks.is_empty(), "un-acked task must not reappear");
}

#[tokio::test]
async fn paging_respects_batch_size() {
    let (clock, shard) = shard();
    for id in 1..=5 {
        shard.add_task(user_task(id, 10));
    }
    clock.advance(Duration::from_secs(30));

    let ack = TimerQueueAckManager::new_active(shard.clone(), 2);
    let first = ack.read_timer_tasks().await.unwrap();
    assert_eq!(first.tasks.len(), 2);
    assert!(first.more);

    let second = ack.read_timer_tasks().await.unwrap();
    let third = ack.read_timer_tasks().await.unwrap();
    let mut ids: Vec<i64> = Vec::new();
    ids.extend(second.tasks.iter().map(|t| t.task_id));
    ids.extend(third.tasks.iter().map(|t| t.task_id));
    assert_eq!(ids, vec![3, 4, 5]);
    assert!(!third.more);
}

#[tokio::test]
async fn cursor_advances_only_over_contiguous_prefix() {
    let (clock, shard) = shard();
    let tasks: Vec<TimerTaskInfo> = (1..=3).map(|id| user_task(id, 10)).collect();
    for task in &tasks {
        shard.add_task(task.clone());
    }
    clock.advance(Duration::from_secs(30));

    let ack = TimerQueueAckManager::new_active(shard.clone(), 10);
    ack.read_timer_tasks().await.unwrap();

    // Completing task 2 first must not move the cursor past task 1.
    ack.complete_timer_task(&tasks[1]).await;
    assert_eq!(ack.ack_level(), SystemTime::UNIX_EPOCH);
    assert!(shard.completed_task_ids().is_empty());

    ack.complete_timer_task(&tasks[0]).await;
    assert_eq!(ack.ack_level(), ts(10));
    assert_eq!(shard.completed_task_ids(), vec![1, 2]);
    assert_eq!(shard.timer_ack_level(CLUSTER_A), ts(10));

    ack.complete_timer_task(&tasks[2]).await;
    assert_eq!(shard.completed_task_ids(), vec![1, 2, 3]);
}

#[tokio::test]
async fn complete_is_idempotent() {
    let (clock, shard) = shard();
    let task = user_task(1, 10);
    shard.add_task(task.clone());
    clock.advance(Duration::from_secs(30));

    let ack = TimerQueueAckManager::new_active(shard.clone(), 10);
    ack.read_timer_tasks().await.unwrap();
    ack.complete_timer_task(&task).await;
    ack.complete_timer_task(&task).await;
    assert_eq!(shard.completed_task_ids(), vec![1]);
}

#[tokio::test]
async fn active_window_grows_with_virtual_time() {
    let (clock, shard) = shard();
    shard.add_task(user_task(1, 10));
    shard.add_task(user_task(2, 50));

    clock.advance(Duration::from_secs(10));
    let ack = TimerQueueAckManager::new_active(shard.clone(), 10);
    let first = ack.read_timer_tasks().await.unwrap();
    assert_eq!(first.tasks.len(), 1);
    assert_eq!(first.next_fire, Some(ts(50)));

    clock.advance(Duration::from_secs(40));
    let second = ack.read_timer_tasks().await.unwrap();
    assert_eq!(second.tasks.len(), 1);
    assert_eq!(second.tasks[0].task_id, 2);
}

#[tokio::test]
async fn failover_window_is_fixed_at_construction() {
    let (clock, shard) = shard();
    shard.add_task(user_task(1, 10));
    clock.advance(Duration::from_secs(30));

    let ack = TimerQueueAckManager::new_failover(shard.clone(), CLUSTER_B, 10);

    // A task landing after construction, inside wall time but outside the
    // captured window, must not be read.
    clock.advance(Duration::from_secs(100));
    shard.add_task(user_task(2, 60));

    let batch = ack.read_timer_tasks().await.unwrap();
    let ids: Vec<i64> = batch.tasks.iter().map(|t| t.task_id).collect();
    assert_eq!(ids, vec![1]);
}

#[tokio::test]
async fn failover_starts_from_standby_ack_level() {
    let (clock, shard) = shard();
    shard.add_task(user_task(1, 10));
    shard.add_task(user_task(2, 20));
    shard.set_ack_level(CLUSTER_B, ts(15));
    clock.advance(Duration::from_secs(30));

    let ack = TimerQueueAckManager::new_failover(shard.clone(), CLUSTER_B, 10);
    let batch = ack.read_timer_tasks().await.unwrap();
    let ids: Vec<i64> = batch.tasks.iter().map(|t| t.task_id).collect();
    assert_eq!(ids, vec![2], "tasks below the standby cursor are already done");
}

#[tokio::test]
async fn failover_signals_drained_when_window_fully_acked() {
    let (clock, shard) = shard();
    let task = user_task(1, 10);
    shard.add_task(task.clone());
    clock.advance(Duration::from_secs(30));

    let ack = TimerQueueAckManager::new_failover(shard.clone(), CLUSTER_B, 10);
    let drained = ack.drained();
    assert!(!*drained.borrow());

    ack.read_timer_tasks().await.unwrap();
    assert!(!*drained.borrow(), "outstanding task blocks the drain signal");

    ack.complete_timer_task(&task).await;
    assert!(*drained.borrow());
    assert_eq!(shard.timer_ack_level(CLUSTER_B), ts(10));
}

#[tokio::test]
async fn failover_with_empty_window_drains_on_first_read() {
    let (clock, shard) = shard();
    clock.advance(Duration::from_secs(30));

    let ack = TimerQueueAckManager::new_failover(shard.clone(), CLUSTER_B, 10);
    let drained = ack.drained();
    ack.read_timer_tasks().await.unwrap();
    assert!(*drained.borrow());
}

#[tokio::test]
async fn read_error_propagates() {
    let (clock, shard) = shard();
    clock.advance(Duration::from_secs(30));
    shard.fail_next_read(EngineError::Store("backend flake".into()));

    let ack = TimerQueueAckManager::new_active(shard.clone(), 10);
    let err = ack.read_timer_tasks().await.unwrap_err();
    assert!(matches!(err, EngineError::Store(_)));
}
