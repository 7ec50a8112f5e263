// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mutable-state contract: the per-execution aggregate the handlers mutate.
//!
//! The builder behind this trait owns the execution's event history, pending
//! decision, pending activities, and pending user timers. Event emitters
//! return `None` when the state machine is already past the point where the
//! event could apply (e.g. the workflow completed concurrently); handlers
//! treat that as "someone else got here first".

use crate::error::EngineError;
use crate::execution::WorkflowCache;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tempo_core::{
    ActivityInfo, DecisionInfo, DomainId, HistoryEvent, TimeoutKind, TimerId, TimerInfo,
    TimerTask, TransferTask,
};

/// Per-execution mutable state.
///
/// `Sync` because shared references cross await points on the commit path;
/// all mutation still happens behind the per-execution lock.
pub trait MutableState: Send + Sync {
    fn is_running(&self) -> bool;
    fn has_pending_decision(&self) -> bool;
    fn is_sticky_enabled(&self) -> bool;
    fn sticky_schedule_to_start_timeout(&self) -> Duration;

    /// Id the next accepted event will receive.
    fn next_event_id(&self) -> i64;
    /// Domain failover version recorded when the execution started.
    fn start_version(&self) -> i64;

    /// Pending activities, unordered.
    fn pending_activities(&self) -> Vec<ActivityInfo>;
    /// Pending user timers, unordered.
    fn pending_user_timers(&self) -> Vec<TimerInfo>;

    /// Look up a pending activity by its schedule event id.
    fn activity_info(&self, schedule_id: i64) -> Option<ActivityInfo>;
    fn update_activity(&mut self, info: ActivityInfo);

    /// Look up the pending decision, if it matches `schedule_id`.
    fn pending_decision(&self, schedule_id: i64) -> Option<DecisionInfo>;

    fn user_timer(&self, timer_id: &TimerId) -> Option<TimerInfo>;
    fn update_user_timer(&mut self, info: TimerInfo);

    fn add_timer_fired_event(
        &mut self,
        started_id: i64,
        timer_id: &TimerId,
    ) -> Option<HistoryEvent>;

    fn add_activity_timed_out_event(
        &mut self,
        schedule_id: i64,
        started_id: Option<i64>,
        timeout_kind: TimeoutKind,
        details: Option<Vec<u8>>,
    ) -> Option<HistoryEvent>;

    fn add_decision_timed_out_event(
        &mut self,
        schedule_id: i64,
        started_id: Option<i64>,
    ) -> Option<HistoryEvent>;

    fn add_decision_schedule_to_start_timeout_event(
        &mut self,
        schedule_id: i64,
    ) -> Option<HistoryEvent>;

    fn add_workflow_timed_out_event(&mut self) -> Option<HistoryEvent>;

    /// Schedule a fresh decision task; returns its info, or `None` if the
    /// execution can no longer accept one.
    fn add_decision_scheduled_event(&mut self) -> Option<DecisionInfo>;

    /// Consult the activity's retry policy. On `Some`, the activity's
    /// attempt has been advanced and the returned retry timer must be
    /// persisted; `None` means retries are exhausted.
    fn create_retry_timer(&mut self, activity: &ActivityInfo, reason: &str) -> Option<TimerTask>;

    /// Domain *name* the activity was scheduled against, when it targets a
    /// domain other than the execution's own.
    fn activity_target_domain(&self, schedule_id: i64) -> Option<String>;

    /// Snapshot for the execution cache.
    fn boxed_clone(&self) -> Box<dyn MutableState>;

    /// Concrete access for execution stores, which persist their own
    /// builder representation rather than going through this trait.
    fn as_any(&self) -> &dyn std::any::Any;
}

/// The surrounding history engine: owns the execution cache and computes
/// retention-driven deletion tasks.
#[async_trait]
pub trait HistoryEngine: Send + Sync {
    fn execution_cache(&self) -> Arc<WorkflowCache>;

    /// Build the transfer/timer task pair that removes a closed execution
    /// once the domain's retention window passes.
    async fn delete_workflow_tasks(
        &self,
        domain_id: &DomainId,
    ) -> Result<(TransferTask, TimerTask), EngineError>;
}
