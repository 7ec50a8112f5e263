// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Activity retry-dispatch handler tests

use super::*;
use crate::domain::DomainEntry;
use crate::execution::WorkflowCache;
use crate::matching::{AddActivityTaskRequest, MatchingClient};
use crate::mutable_state::HistoryEngine;
use crate::queue::active::ActiveTimerProcessor;
use crate::shard::ShardContext;
use crate::TimerQueueConfig;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tempo_core::{DomainId, FakeClock};

fn retry_task(task_id: i64, schedule_id: i64, attempt: i64) -> TimerTaskInfo {
    TaskBuilder::new(TimerTaskType::RetryTimer, task_id, ts(30))
        .event_id(schedule_id)
        .attempt(attempt)
        .build()
}

fn seeded_activity(attempt: i64) -> FakeMutableState {
    let mut ms = FakeMutableState::default();
    let mut ai = pending_activity(7, ts(0));
    ai.attempt = attempt;
    ms.activities.insert(7, ai);
    ms
}

#[tokio::test]
async fn dispatches_activity_to_matching() {
    let h = harness();
    seed(&h, seeded_activity(1));

    process(&h, &retry_task(1, 7, 1)).await.unwrap();

    let requests = h.matching.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.schedule_id, 7);
    assert_eq!(request.task_list, "activity-tl");
    assert_eq!(request.source_domain_id, DomainId::new("d1"));
    assert_eq!(request.target_domain_id, DomainId::new("d1"));
    assert_eq!(request.schedule_to_start_timeout, Duration::from_secs(10));
    assert_eq!(request.execution, execution_key().execution());
    assert!(
        h.store.updates().is_empty(),
        "retry dispatch never mutates the execution"
    );
}

#[tokio::test]
async fn stale_attempt_is_dropped() {
    let h = harness();
    seed(&h, seeded_activity(2));

    process(&h, &retry_task(1, 7, 1)).await.unwrap();
    assert!(h.matching.requests().is_empty());
}

#[tokio::test]
async fn missing_activity_is_a_noop() {
    let h = harness();
    seed(&h, FakeMutableState::default());

    process(&h, &retry_task(1, 7, 0)).await.unwrap();
    assert!(h.matching.requests().is_empty());
}

#[tokio::test]
async fn completed_workflow_is_a_noop() {
    let h = harness();
    let mut ms = seeded_activity(0);
    ms.running = false;
    seed(&h, ms);

    process(&h, &retry_task(1, 7, 0)).await.unwrap();
    assert!(h.matching.requests().is_empty());
}

#[tokio::test]
async fn deleted_execution_is_a_duplicate_replay() {
    let h = harness();
    // No execution seeded at all.
    process(&h, &retry_task(1, 7, 0)).await.unwrap();
    assert!(h.matching.requests().is_empty());
}

#[tokio::test]
async fn version_mismatch_drops_the_task() {
    let h = harness();
    h.domains.insert(global_domain("d1", CLUSTER_A));
    let mut ms = seeded_activity(0);
    if let Some(ai) = ms.activities.get_mut(&7) {
        ai.version = 5;
    }
    seed(&h, ms);

    let task = TaskBuilder::new(TimerTaskType::RetryTimer, 1, ts(30))
        .event_id(7)
        .version(3)
        .build();
    process(&h, &task).await.unwrap();
    assert!(h.matching.requests().is_empty());
}

#[tokio::test]
async fn cross_domain_retry_resolves_target_domain() {
    let h = harness();
    h.domains.insert(DomainEntry {
        id: DomainId::new("d-other"),
        name: "other-name".to_string(),
        is_global: false,
        active_cluster: CLUSTER_A.to_string(),
    });
    let mut ms = seeded_activity(0);
    ms.activity_target_domains.insert(7, "other-name".to_string());
    seed(&h, ms);

    process(&h, &retry_task(1, 7, 0)).await.unwrap();

    let request = &h.matching.requests()[0];
    assert_eq!(request.target_domain_id, DomainId::new("d-other"));
    assert_eq!(request.source_domain_id, DomainId::new("d1"));
}

#[tokio::test]
async fn cross_domain_resolution_failure_is_not_retried() {
    let h = harness();
    let mut ms = seeded_activity(0);
    ms.activity_target_domains.insert(7, "vanished".to_string());
    seed(&h, ms);

    let err = process(&h, &retry_task(1, 7, 0)).await.unwrap_err();
    assert!(
        matches!(err, EngineError::Internal(_)),
        "a deterministic resolution failure must surface, not burn retries"
    );
    assert_eq!(h.store.load_count(), 1, "no pointless retry attempts");
}

#[tokio::test]
async fn transient_matching_failures_are_retried() {
    let h = harness();
    seed(&h, seeded_activity(0));
    h.matching.fail_times(2);

    process(&h, &retry_task(1, 7, 0)).await.unwrap();
    assert_eq!(h.matching.requests().len(), 1);
    assert_eq!(
        h.store.load_count(),
        1,
        "clean releases keep the state cached across attempts"
    );
}

#[tokio::test]
async fn persistent_matching_failure_exhausts_the_budget() {
    let h = harness();
    seed(&h, seeded_activity(0));
    h.matching.fail_times(100);

    let err = process(&h, &retry_task(1, 7, 0)).await.unwrap_err();
    assert!(matches!(err, EngineError::MaxAttemptsExceeded));
}

/// Matching client that proves the per-execution lock is free during the
/// dispatch RPC by re-acquiring it with a timeout.
struct LockProbeMatchingClient {
    cache: Arc<WorkflowCache>,
    observed_free: Mutex<Vec<bool>>,
}

#[async_trait]
impl MatchingClient for LockProbeMatchingClient {
    async fn add_activity_task(
        &self,
        request: AddActivityTaskRequest,
    ) -> Result<(), EngineError> {
        let key = tempo_core::ExecutionKey {
            domain_id: request.source_domain_id.clone(),
            workflow_id: request.execution.workflow_id.clone(),
            run_id: request.execution.run_id.clone(),
        };
        let acquired = tokio::time::timeout(
            Duration::from_millis(200),
            self.cache.acquire(&key),
        )
        .await;
        match acquired {
            Ok(mut guard) => {
                guard.release(false);
                self.observed_free.lock().push(true);
            }
            Err(_) => self.observed_free.lock().push(false),
        }
        Ok(())
    }
}

#[tokio::test]
async fn lock_is_released_before_dispatch() {
    let clock = FakeClock::new();
    let domains = FakeDomainCache::new();
    domains.insert(local_domain("d1"));
    let shard = FakeShard::new(clock.clone(), Arc::clone(&domains));
    let store = FakeExecutionStore::new();
    store.put(execution_key(), seeded_activity(0));
    let engine = FakeHistoryEngine::new(Arc::clone(&store), clock.clone());
    let probe = Arc::new(LockProbeMatchingClient {
        cache: engine.execution_cache(),
        observed_free: Mutex::new(Vec::new()),
    });
    let processor = ActiveTimerProcessor::new_active(
        shard as Arc<dyn ShardContext>,
        engine as Arc<dyn HistoryEngine>,
        Arc::clone(&probe) as Arc<dyn MatchingClient>,
        clock,
        TimerQueueConfig::default(),
    );

    processor.process(&retry_task(1, 7, 0)).await.unwrap();
    assert_eq!(
        *probe.observed_free.lock(),
        vec![true],
        "the execution lock must be free while matching is called"
    );
}
