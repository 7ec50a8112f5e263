// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The active timer processor: per-task-type handlers and the optimistic
//! update helper.
//!
//! Every handler follows the same shape: acquire the per-execution lock,
//! load mutable state, decide what the timer means for the current state,
//! and commit through [`ActiveTimerProcessor::update_workflow_execution`].
//! A commit conflict reloads and retries up to `CONDITIONAL_RETRY_COUNT`
//! times. Handlers are idempotent: a replayed task finds the state machine
//! already past the event and becomes a no-op.

use crate::config::TimerQueueConfig;
use crate::domain::verify_task_version;
use crate::error::EngineError;
use crate::execution::{ExecutionGuard, WorkflowCache};
use crate::matching::{AddActivityTaskRequest, MatchingClient};
use crate::metric_definitions::{
    STALE_MUTABLE_STATE, TIMER_TASK_FAILURES, TIMER_TASK_LATENCY, TIMER_TASK_REQUESTS,
    TIMER_TIMEOUTS,
};
use crate::mutable_state::HistoryEngine;
use crate::queue::ack::TimerQueueAckManager;
use crate::queue::base::{TimerQueueProcessorBase, TimerTaskHandler};
use crate::queue::filter::{ActiveTaskFilter, FailoverTaskFilter, TimerTaskFilter};
use crate::queue::gate::TimerGate;
use crate::shard::ShardContext;
use crate::timer_builder::{TimerBuilder, TimerTarget};
use async_trait::async_trait;
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;
use tempo_core::{
    Clock, DomainId, TimeoutKind, TimerTask, TimerTaskInfo, TimerTaskType, TransferTask,
};
use tracing::{debug, warn};

/// Bound on reload-and-retry after an optimistic-concurrency conflict.
const CONDITIONAL_RETRY_COUNT: usize = 5;

/// Processor firing one shard's timer tasks for the cluster that owns them.
pub struct ActiveTimerProcessor<C: Clock> {
    shard: Arc<dyn ShardContext>,
    engine: Arc<dyn HistoryEngine>,
    cache: Arc<WorkflowCache>,
    matching: Arc<dyn MatchingClient>,
    filter: Arc<dyn TimerTaskFilter>,
    ack: Arc<TimerQueueAckManager>,
    base: Arc<TimerQueueProcessorBase<C>>,
    timer_builder: TimerBuilder,
    current_cluster: String,
}

impl<C: Clock> ActiveTimerProcessor<C> {
    /// Processor bound to the current cluster's live timer stream.
    pub fn new_active(
        shard: Arc<dyn ShardContext>,
        engine: Arc<dyn HistoryEngine>,
        matching: Arc<dyn MatchingClient>,
        clock: C,
        config: TimerQueueConfig,
    ) -> Arc<Self> {
        let current_cluster = shard.current_cluster().to_string();
        let filter = Arc::new(ActiveTaskFilter {
            domain_cache: shard.domain_cache(),
            current_cluster: current_cluster.clone(),
        });
        let ack = Arc::new(TimerQueueAckManager::new_active(
            Arc::clone(&shard),
            config.batch_size,
        ));
        Self::build(shard, engine, matching, clock, config, filter, ack, current_cluster)
    }

    /// One-shot processor draining the standby cluster's backlog for one
    /// domain during failover. Terminates once its window is fully acked.
    pub fn new_failover(
        shard: Arc<dyn ShardContext>,
        engine: Arc<dyn HistoryEngine>,
        domain_id: DomainId,
        standby_cluster: impl Into<String>,
        matching: Arc<dyn MatchingClient>,
        clock: C,
        config: TimerQueueConfig,
    ) -> Arc<Self> {
        let current_cluster = shard.current_cluster().to_string();
        let filter = Arc::new(FailoverTaskFilter { domain_id });
        let ack = Arc::new(TimerQueueAckManager::new_failover(
            Arc::clone(&shard),
            standby_cluster,
            config.batch_size,
        ));
        Self::build(shard, engine, matching, clock, config, filter, ack, current_cluster)
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        shard: Arc<dyn ShardContext>,
        engine: Arc<dyn HistoryEngine>,
        matching: Arc<dyn MatchingClient>,
        clock: C,
        config: TimerQueueConfig,
        filter: Arc<dyn TimerTaskFilter>,
        ack: Arc<TimerQueueAckManager>,
        current_cluster: String,
    ) -> Arc<Self> {
        let gate = Arc::new(TimerGate::new(clock));
        // Fire immediately so the backlog is read as soon as the pump runs.
        gate.fire_now();
        let cache = engine.execution_cache();
        let base = Arc::new(TimerQueueProcessorBase::new(
            config,
            Arc::clone(&ack),
            gate,
            cache.store(),
        ));
        Arc::new(Self {
            shard,
            engine,
            cache,
            matching,
            filter,
            ack,
            base,
            timer_builder: TimerBuilder::new(),
            current_cluster,
        })
    }

    pub fn start(self: &Arc<Self>) {
        let handler: Arc<dyn TimerTaskHandler> = Arc::clone(self) as Arc<dyn TimerTaskHandler>;
        self.base.start(handler);
    }

    pub async fn stop(&self) {
        self.base.stop().await;
    }

    /// Notify the gate about newly persisted timer tasks.
    pub fn notify_new_timers(&self, tasks: &[TimerTask]) {
        self.base.notify_new_timers(tasks);
    }

    /// The gate, for composition with other timer sources.
    pub fn timer_gate(&self) -> Arc<TimerGate<C>> {
        self.base.timer_gate()
    }

    /// Monotonic count of timer tasks fired.
    pub fn timer_fired_count(&self) -> u64 {
        self.base.timer_fired_count()
    }

    async fn process_task(&self, task: &TimerTaskInfo) -> Result<(), EngineError> {
        if !self.filter.accept(task)? {
            self.ack.complete_timer_task(task).await;
            return Ok(());
        }

        debug!(
            task = %task.sequence_id(),
            workflow = %task.workflow_id,
            run = %task.run_id,
            task_type = %task.task_type,
            event_id = task.event_id,
            attempt = task.schedule_attempt,
            "processing timer task"
        );
        let label = task.task_type.as_label();
        counter!(TIMER_TASK_REQUESTS, "type" => label).increment(1);
        let started = Instant::now();

        let result = match task.task_type {
            TimerTaskType::UserTimer => self.process_user_timer(task).await,
            TimerTaskType::ActivityTimeout => self.process_activity_timeout(task).await,
            TimerTaskType::DecisionTimeout => self.process_decision_timeout(task).await,
            TimerTaskType::WorkflowTimeout => self.process_workflow_timeout(task).await,
            TimerTaskType::RetryTimer => self.process_retry_timer(task).await,
            TimerTaskType::DeleteHistoryEvent => {
                self.base.process_delete_history_event(task).await
            }
        };
        histogram!(TIMER_TASK_LATENCY, "type" => label).record(started.elapsed().as_secs_f64());

        match result {
            Ok(()) => {
                self.ack.complete_timer_task(task).await;
                Ok(())
            }
            Err(EngineError::EntityNotExists(_)) => {
                // The timer outlived its execution; completing is correct.
                debug!(task_id = task.task_id, "execution gone; acking timer task");
                self.ack.complete_timer_task(task).await;
                Ok(())
            }
            Err(err) => {
                counter!(TIMER_TASK_FAILURES, "type" => label).increment(1);
                Err(err)
            }
        }
    }

    // === User timer ===

    async fn process_user_timer(&self, task: &TimerTaskInfo) -> Result<(), EngineError> {
        let mut guard = self.cache.acquire(&task.execution_key()).await;
        let result = self.user_timer_locked(&mut guard, task).await;
        guard.release(result.is_err());
        result
    }

    async fn user_timer_locked(
        &self,
        guard: &mut ExecutionGuard,
        task: &TimerTaskInfo,
    ) -> Result<(), EngineError> {
        for _ in 0..CONDITIONAL_RETRY_COUNT {
            let ctx = guard.context_mut()?;
            let ms = ctx.load().await?;
            if !ms.is_running() {
                return Ok(());
            }

            let mut timer_tasks: Vec<TimerTask> = Vec::new();
            let mut schedule_new_decision = false;

            for td in self.timer_builder.user_timers(&*ms) {
                let TimerTarget::UserTimer { timer_id, .. } = &td.target else {
                    continue;
                };
                let Some(mut ti) = ms.user_timer(timer_id) else {
                    return Err(EngineError::Internal(format!(
                        "pending user timer {timer_id} missing from mutable state"
                    )));
                };
                if self.timer_builder.is_expired(&td, task.visibility_timestamp) {
                    if ms.add_timer_fired_event(ti.started_id, timer_id).is_none() {
                        return Err(EngineError::Internal(
                            "failed to add timer-fired event".into(),
                        ));
                    }
                    schedule_new_decision = !ms.has_pending_decision();
                } else {
                    // Candidates are ordered; nothing further is expired.
                    // Make sure the head has a persisted task before bailing.
                    if !td.task_created {
                        timer_tasks.push(self.timer_builder.new_timer_task(&td));
                        ti.task_created = true;
                        ms.update_user_timer(ti);
                    }
                    break;
                }
            }

            match self
                .update_workflow_execution(
                    guard,
                    schedule_new_decision,
                    false,
                    timer_tasks.clone(),
                    None,
                )
                .await
            {
                Ok(()) => {
                    self.base.notify_new_timers(&timer_tasks);
                    return Ok(());
                }
                Err(EngineError::Conflict) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(EngineError::MaxAttemptsExceeded)
    }

    // === Activity timeout ===

    async fn process_activity_timeout(&self, task: &TimerTaskInfo) -> Result<(), EngineError> {
        let mut guard = self.cache.acquire(&task.execution_key()).await;
        let result = self.activity_timeout_locked(&mut guard, task).await;
        guard.release(result.is_err());
        result
    }

    async fn activity_timeout_locked(
        &self,
        guard: &mut ExecutionGuard,
        task: &TimerTaskInfo,
    ) -> Result<(), EngineError> {
        let Some(task_timeout_kind) = task.timeout_kind else {
            return Err(EngineError::Internal(
                "activity timeout task without a timeout kind".into(),
            ));
        };

        for _ in 0..CONDITIONAL_RETRY_COUNT {
            let ctx = guard.context_mut()?;
            let ms = ctx.load().await?;
            let schedule_id = task.event_id;

            // The cache can hold a snapshot from before this timer's
            // scheduling event was written. Discard and reload.
            if schedule_id >= ms.next_event_id() {
                counter!(STALE_MUTABLE_STATE).increment(1);
                debug!(
                    schedule_id,
                    next_event_id = ms.next_event_id(),
                    "stale mutable state; clearing cached execution"
                );
                ctx.clear();
                continue;
            }

            if !ms.is_running() {
                return Ok(());
            }
            let Some(mut heartbeat_activity) = ms.activity_info(schedule_id) else {
                // Activity already closed.
                return Ok(());
            };
            if heartbeat_activity.attempt != task.schedule_attempt
                && task_timeout_kind != TimeoutKind::ScheduleToClose
            {
                // Timer from an older attempt.
                return Ok(());
            }

            // A heartbeat task consumes its created-bit so the walk below
            // can materialise the next heartbeat timer from the latest
            // recorded heartbeat time.
            if task_timeout_kind == TimeoutKind::Heartbeat {
                heartbeat_activity.clear_timer_created(TimeoutKind::Heartbeat);
                ms.update_activity(heartbeat_activity);
            }

            let mut timer_tasks: Vec<TimerTask> = Vec::new();
            let mut update_history = false;
            let mut create_new_timer = false;

            for td in self.timer_builder.activity_timers(&*ms) {
                let TimerTarget::Activity {
                    schedule_id: td_schedule_id,
                    timeout_kind,
                } = &td.target
                else {
                    continue;
                };
                let (td_schedule_id, timeout_kind) = (*td_schedule_id, *timeout_kind);
                let Some(mut ai) = ms.activity_info(td_schedule_id) else {
                    // Timed out or completed earlier in this walk.
                    continue;
                };

                if self.timer_builder.is_expired(&td, task.visibility_timestamp) {
                    if td.attempt < ai.attempt && timeout_kind != TimeoutKind::ScheduleToClose {
                        // A retry advanced the attempt; this expiry belongs
                        // to the previous one.
                        continue;
                    }

                    if timeout_kind != TimeoutKind::ScheduleToStart {
                        // Queue timeouts are not retriable; everything else
                        // consults the retry policy before timing out.
                        if let Some(retry) =
                            ms.create_retry_timer(&ai, timeout_kind.retry_reason())
                        {
                            debug!(
                                schedule_id = ai.schedule_id,
                                kind = %timeout_kind,
                                "activity timeout pre-empted by retry"
                            );
                            timer_tasks.push(retry);
                            create_new_timer = true;
                            continue;
                        }
                    }

                    counter!(TIMER_TIMEOUTS, "kind" => timeout_kind.as_label()).increment(1);
                    let emit = match timeout_kind {
                        TimeoutKind::ScheduleToClose => true,
                        TimeoutKind::StartToClose => ai.started_id.is_some(),
                        TimeoutKind::Heartbeat => true,
                        TimeoutKind::ScheduleToStart => ai.started_id.is_none(),
                    };
                    if emit {
                        let details = if timeout_kind == TimeoutKind::Heartbeat {
                            ai.details.clone()
                        } else {
                            None
                        };
                        if ms
                            .add_activity_timed_out_event(
                                ai.schedule_id,
                                ai.started_id,
                                timeout_kind,
                                details,
                            )
                            .is_none()
                        {
                            return Err(EngineError::Internal(
                                "failed to add activity timeout event".into(),
                            ));
                        }
                        update_history = true;
                    }
                } else {
                    if !td.task_created {
                        timer_tasks.push(self.timer_builder.new_timer_task(&td));
                        ai.mark_timer_created(timeout_kind);
                        ms.update_activity(ai);
                        create_new_timer = true;
                    }
                    break;
                }
            }

            if update_history || create_new_timer {
                let schedule_new_decision = update_history && !ms.has_pending_decision();
                match self
                    .update_workflow_execution(
                        guard,
                        schedule_new_decision,
                        false,
                        timer_tasks.clone(),
                        None,
                    )
                    .await
                {
                    Ok(()) => {
                        self.base.notify_new_timers(&timer_tasks);
                        return Ok(());
                    }
                    Err(EngineError::Conflict) => continue,
                    Err(err) => return Err(err),
                }
            }
            return Ok(());
        }
        Err(EngineError::MaxAttemptsExceeded)
    }

    // === Decision timeout ===

    async fn process_decision_timeout(&self, task: &TimerTaskInfo) -> Result<(), EngineError> {
        let mut guard = self.cache.acquire(&task.execution_key()).await;
        let result = self.decision_timeout_locked(&mut guard, task).await;
        guard.release(result.is_err());
        result
    }

    async fn decision_timeout_locked(
        &self,
        guard: &mut ExecutionGuard,
        task: &TimerTaskInfo,
    ) -> Result<(), EngineError> {
        let Some(timeout_kind) = task.timeout_kind else {
            return Err(EngineError::Internal(
                "decision timeout task without a timeout kind".into(),
            ));
        };

        for _ in 0..CONDITIONAL_RETRY_COUNT {
            let ctx = guard.context_mut()?;
            let ms = ctx.load().await?;
            if !ms.is_running() {
                return Ok(());
            }

            let schedule_id = task.event_id;
            let Some(di) = ms.pending_decision(schedule_id) else {
                if schedule_id >= ms.next_event_id() {
                    counter!(STALE_MUTABLE_STATE).increment(1);
                    ctx.clear();
                    continue;
                }
                debug!(schedule_id, "no pending decision; duplicate timeout task");
                return Ok(());
            };
            if !verify_task_version(self.shard.as_ref(), &task.domain_id, di.version, task)? {
                return Ok(());
            }

            let mut schedule_new_decision = false;
            match timeout_kind {
                TimeoutKind::StartToClose => {
                    counter!(TIMER_TIMEOUTS, "kind" => timeout_kind.as_label()).increment(1);
                    if di.attempt == task.schedule_attempt {
                        ms.add_decision_timed_out_event(schedule_id, di.started_id);
                        schedule_new_decision = true;
                    }
                }
                TimeoutKind::ScheduleToStart => {
                    counter!(TIMER_TIMEOUTS, "kind" => timeout_kind.as_label()).increment(1);
                    // Only sticky decisions time out waiting for pickup; a
                    // normal task list just waits.
                    if di.attempt == task.schedule_attempt
                        && di.started_id.is_none()
                        && ms.is_sticky_enabled()
                    {
                        if ms
                            .add_decision_schedule_to_start_timeout_event(schedule_id)
                            .is_none()
                        {
                            return Err(EngineError::Internal(
                                "failed to add decision schedule-to-start timeout event".into(),
                            ));
                        }
                        // Reschedules on the original, non-sticky task list.
                        schedule_new_decision = true;
                    }
                }
                TimeoutKind::ScheduleToClose | TimeoutKind::Heartbeat => {
                    // Not produced for decision tasks.
                }
            }

            if schedule_new_decision {
                match self
                    .update_workflow_execution(guard, true, false, Vec::new(), None)
                    .await
                {
                    Ok(()) => return Ok(()),
                    Err(EngineError::Conflict) => continue,
                    Err(err) => return Err(err),
                }
            }
            return Ok(());
        }
        Err(EngineError::MaxAttemptsExceeded)
    }

    // === Workflow timeout ===

    async fn process_workflow_timeout(&self, task: &TimerTaskInfo) -> Result<(), EngineError> {
        let mut guard = self.cache.acquire(&task.execution_key()).await;
        let result = self.workflow_timeout_locked(&mut guard, task).await;
        guard.release(result.is_err());
        result
    }

    async fn workflow_timeout_locked(
        &self,
        guard: &mut ExecutionGuard,
        task: &TimerTaskInfo,
    ) -> Result<(), EngineError> {
        for _ in 0..CONDITIONAL_RETRY_COUNT {
            let ctx = guard.context_mut()?;
            let ms = ctx.load().await?;
            if !ms.is_running() {
                return Ok(());
            }
            let start_version = ms.start_version();
            if !verify_task_version(self.shard.as_ref(), &task.domain_id, start_version, task)? {
                return Ok(());
            }

            if ms.add_workflow_timed_out_event().is_none() {
                // Completed concurrently; drop the timeout.
                return Ok(());
            }

            match self
                .update_workflow_execution(guard, false, true, Vec::new(), None)
                .await
            {
                Ok(()) => return Ok(()),
                Err(EngineError::Conflict) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(EngineError::MaxAttemptsExceeded)
    }

    // === Activity retry dispatch ===

    async fn process_retry_timer(&self, task: &TimerTaskInfo) -> Result<(), EngineError> {
        for _ in 0..CONDITIONAL_RETRY_COUNT {
            match self.retry_timer_once(task).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_transient() => {
                    debug!(task_id = task.task_id, %err, "retry dispatch failed; retrying");
                }
                Err(err) => return Err(err),
            }
        }
        Err(EngineError::MaxAttemptsExceeded)
    }

    async fn retry_timer_once(&self, task: &TimerTaskInfo) -> Result<(), EngineError> {
        let mut guard = self.cache.acquire(&task.execution_key()).await;
        let prepared = self.prepare_retry_dispatch(&mut guard, task).await;
        let request = match prepared {
            Ok(request) => {
                // The dispatch RPC must not run under the per-execution
                // lock; it can block on matching for a long time.
                guard.release(false);
                request
            }
            Err(err) => {
                guard.release(true);
                return Err(err);
            }
        };
        let Some(request) = request else {
            return Ok(());
        };
        debug!(
            workflow = %request.execution.workflow_id,
            schedule_id = request.schedule_id,
            task_list = %request.task_list,
            attempt = task.schedule_attempt,
            "dispatching activity retry"
        );
        self.matching.add_activity_task(request).await
    }

    /// Decide under the lock whether the retry should dispatch, and build
    /// the request if so. `Ok(None)` means the retry is stale or duplicate.
    async fn prepare_retry_dispatch(
        &self,
        guard: &mut ExecutionGuard,
        task: &TimerTaskInfo,
    ) -> Result<Option<AddActivityTaskRequest>, EngineError> {
        let ctx = guard.context_mut()?;
        let ms = match ctx.load().await {
            Ok(ms) => ms,
            // Duplicate replay after the execution completed and was
            // deleted.
            Err(EngineError::EntityNotExists(_)) => return Ok(None),
            Err(err) => return Err(err),
        };
        if !ms.is_running() {
            return Ok(None);
        }

        let schedule_id = task.event_id;
        let Some(ai) = ms.activity_info(schedule_id) else {
            return Ok(None);
        };
        if task.schedule_attempt < ai.attempt {
            // A newer attempt is already in flight.
            return Ok(None);
        }
        if !verify_task_version(self.shard.as_ref(), &task.domain_id, ai.version, task)? {
            return Ok(None);
        }

        let source_domain_id = task.domain_id.clone();
        let target_domain_id = match ms.activity_target_domain(schedule_id) {
            Some(name) => self
                .shard
                .domain_cache()
                .domain_by_name(&name)
                .map_err(|err| {
                    EngineError::Internal(format!(
                        "unable to re-schedule activity across domain {name}: {err}"
                    ))
                })?
                .id
                .clone(),
            None => source_domain_id.clone(),
        };

        Ok(Some(AddActivityTaskRequest {
            target_domain_id,
            source_domain_id,
            execution: task.execution(),
            task_list: ai.task_list.clone(),
            schedule_id,
            schedule_to_start_timeout: ai.schedule_to_start_timeout,
        }))
    }

    // === Shared commit path ===

    /// Commit the mutated state: optionally schedule a fresh decision task
    /// (with a sticky pickup timer when sticky is enabled), optionally
    /// append the retention-deletion task pair, then write everything under
    /// optimistic concurrency. A lost shard stops the processor. New timer
    /// tasks are always pushed to the gate, even when the commit failed;
    /// the notification is monotone and at worst fires an extra read.
    async fn update_workflow_execution(
        &self,
        guard: &mut ExecutionGuard,
        schedule_new_decision: bool,
        create_deletion_task: bool,
        mut timer_tasks: Vec<TimerTask>,
        clear_timer_task: Option<tempo_core::TimerSequenceId>,
    ) -> Result<(), EngineError> {
        let ctx = guard.context_mut()?;
        let domain_id = ctx.key().domain_id.clone();
        let mut transfer_tasks: Vec<TransferTask> = Vec::new();

        if schedule_new_decision {
            let ms = ctx.state_mut()?;
            let Some(di) = ms.add_decision_scheduled_event() else {
                return Err(EngineError::Internal(
                    "failed to schedule decision task".into(),
                ));
            };
            transfer_tasks.push(TransferTask::DecisionTask {
                domain_id: domain_id.clone(),
                task_list: di.task_list.clone(),
                schedule_id: di.schedule_id,
            });
            if ms.is_sticky_enabled() {
                let timeout = ms.sticky_schedule_to_start_timeout();
                let now = self.shard.current_time(&self.current_cluster);
                timer_tasks.push(self.timer_builder.sticky_decision_timeout_task(
                    di.schedule_id,
                    di.attempt,
                    timeout,
                    now,
                ));
            }
        }

        if create_deletion_task {
            let (transfer_delete, timer_delete) =
                self.engine.delete_workflow_tasks(&domain_id).await?;
            transfer_tasks.push(transfer_delete);
            timer_tasks.push(timer_delete);
        }

        let transaction_id = self.shard.next_task_id()?;
        let ctx = guard.context_mut()?;
        let result = ctx
            .update(
                transfer_tasks,
                timer_tasks.clone(),
                clear_timer_task,
                transaction_id,
            )
            .await;

        if let Err(EngineError::ShardOwnershipLost(reason)) = &result {
            warn!(%reason, "shard ownership lost; stopping timer processor");
            self.base.signal_stop();
        }
        self.base.notify_new_timers(&timer_tasks);
        result
    }
}

#[async_trait]
impl<C: Clock> TimerTaskHandler for ActiveTimerProcessor<C> {
    async fn process(&self, task: &TimerTaskInfo) -> Result<(), EngineError> {
        self.process_task(task).await
    }
}

#[cfg(test)]
#[path = "active_tests/mod.rs"]
mod tests;
