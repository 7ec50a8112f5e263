// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fakes and harness for engine tests.

use crate::config::TimerQueueConfig;
use crate::domain::{DomainCache, DomainEntry};
use crate::error::EngineError;
use crate::execution::{ExecutionStore, UpdateExecutionRequest, WorkflowCache};
use crate::matching::{AddActivityTaskRequest, MatchingClient};
use crate::mutable_state::{HistoryEngine, MutableState};
use crate::queue::active::ActiveTimerProcessor;
use crate::shard::{ShardContext, TimerTaskPage};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempo_core::{
    ActivityInfo, Clock, DecisionInfo, DomainId, ExecutionKey, FakeClock, HistoryEvent,
    TimeoutKind, TimerId, TimerInfo, TimerSequenceId, TimerTask, TimerTaskInfo, TimerTaskType,
    TransferTask,
};

pub(crate) const CLUSTER_A: &str = "cluster-a";
pub(crate) const CLUSTER_B: &str = "cluster-b";

pub(crate) fn ts(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
}

// === Domain cache ===

#[derive(Default)]
pub(crate) struct FakeDomainCache {
    entries: Mutex<Vec<Arc<DomainEntry>>>,
    error: Mutex<Option<EngineError>>,
}

impl FakeDomainCache {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Insert or replace (by id) a domain entry.
    pub(crate) fn insert(&self, entry: DomainEntry) {
        let mut entries = self.entries.lock();
        entries.retain(|e| e.id != entry.id);
        entries.push(Arc::new(entry));
    }

    /// Make every lookup fail with `err` until cleared.
    pub(crate) fn fail_with(&self, err: EngineError) {
        *self.error.lock() = Some(err);
    }

    fn lookup<F>(&self, pred: F, what: &str) -> Result<Arc<DomainEntry>, EngineError>
    where
        F: Fn(&DomainEntry) -> bool,
    {
        if let Some(err) = self.error.lock().clone() {
            return Err(err);
        }
        self.entries
            .lock()
            .iter()
            .find(|e| pred(e))
            .cloned()
            .ok_or_else(|| EngineError::EntityNotExists(format!("domain {what}")))
    }
}

impl DomainCache for FakeDomainCache {
    fn domain_by_id(&self, id: &DomainId) -> Result<Arc<DomainEntry>, EngineError> {
        self.lookup(|e| &e.id == id, id.as_str())
    }

    fn domain_by_name(&self, name: &str) -> Result<Arc<DomainEntry>, EngineError> {
        self.lookup(|e| e.name == name, name)
    }
}

pub(crate) fn local_domain(id: &str) -> DomainEntry {
    DomainEntry {
        id: DomainId::new(id),
        name: format!("{id}-name"),
        is_global: false,
        active_cluster: CLUSTER_A.to_string(),
    }
}

pub(crate) fn global_domain(id: &str, active_cluster: &str) -> DomainEntry {
    DomainEntry {
        id: DomainId::new(id),
        name: format!("{id}-name"),
        is_global: true,
        active_cluster: active_cluster.to_string(),
    }
}

// === Shard ===

#[derive(Default)]
struct FakeShardState {
    tasks: BTreeMap<TimerSequenceId, TimerTaskInfo>,
    ack_levels: HashMap<String, SystemTime>,
    completed: Vec<i64>,
    next_task_id: i64,
}

pub(crate) struct FakeShard {
    clock: FakeClock,
    cluster: String,
    domains: Arc<FakeDomainCache>,
    state: Mutex<FakeShardState>,
    read_error: Mutex<Option<EngineError>>,
}

impl FakeShard {
    pub(crate) fn new(clock: FakeClock, domains: Arc<FakeDomainCache>) -> Arc<Self> {
        Arc::new(Self {
            clock,
            cluster: CLUSTER_A.to_string(),
            domains,
            state: Mutex::new(FakeShardState {
                next_task_id: 1000,
                ..Default::default()
            }),
            read_error: Mutex::new(None),
        })
    }

    pub(crate) fn add_task(&self, task: TimerTaskInfo) {
        self.state.lock().tasks.insert(task.sequence_id(), task);
    }

    /// Task ids of durably deleted (fully acked) tasks, in completion order.
    pub(crate) fn completed_task_ids(&self) -> Vec<i64> {
        self.state.lock().completed.clone()
    }

    pub(crate) fn set_ack_level(&self, cluster: &str, level: SystemTime) {
        self.state
            .lock()
            .ack_levels
            .insert(cluster.to_string(), level);
    }

    pub(crate) fn fail_next_read(&self, err: EngineError) {
        *self.read_error.lock() = Some(err);
    }
}

#[async_trait]
impl ShardContext for FakeShard {
    fn current_cluster(&self) -> &str {
        &self.cluster
    }

    fn current_time(&self, _cluster: &str) -> SystemTime {
        self.clock.now()
    }

    fn domain_cache(&self) -> Arc<dyn DomainCache> {
        Arc::clone(&self.domains) as Arc<dyn DomainCache>
    }

    fn next_task_id(&self) -> Result<i64, EngineError> {
        let mut state = self.state.lock();
        state.next_task_id += 1;
        Ok(state.next_task_id)
    }

    fn timer_ack_level(&self, cluster: &str) -> SystemTime {
        self.state
            .lock()
            .ack_levels
            .get(cluster)
            .copied()
            .unwrap_or(SystemTime::UNIX_EPOCH)
    }

    async fn update_timer_ack_level(
        &self,
        cluster: &str,
        level: SystemTime,
    ) -> Result<(), EngineError> {
        self.set_ack_level(cluster, level);
        Ok(())
    }

    async fn get_timer_tasks(
        &self,
        min: TimerSequenceId,
        max: SystemTime,
        batch_size: usize,
    ) -> Result<TimerTaskPage, EngineError> {
        if let Some(err) = self.read_error.lock().take() {
            return Err(err);
        }
        let state = self.state.lock();
        let mut in_window: Vec<TimerTaskInfo> = state
            .tasks
            .iter()
            .filter(|(seq, _)| **seq > min && seq.visibility_timestamp <= max)
            .map(|(_, task)| task.clone())
            .collect();
        let more = in_window.len() > batch_size;
        in_window.truncate(batch_size);
        let next_fire = state
            .tasks
            .values()
            .filter(|t| t.visibility_timestamp > max)
            .map(|t| t.visibility_timestamp)
            .min();
        Ok(TimerTaskPage {
            tasks: in_window,
            more,
            next_fire,
        })
    }

    async fn complete_timer_task(&self, task: &TimerTaskInfo) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        state.tasks.remove(&task.sequence_id());
        state.completed.push(task.task_id);
        Ok(())
    }
}

// === Matching client ===

#[derive(Default)]
pub(crate) struct FakeMatchingClient {
    requests: Mutex<Vec<AddActivityTaskRequest>>,
    failures_remaining: Mutex<usize>,
}

impl FakeMatchingClient {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn fail_times(&self, n: usize) {
        *self.failures_remaining.lock() = n;
    }

    pub(crate) fn requests(&self) -> Vec<AddActivityTaskRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl MatchingClient for FakeMatchingClient {
    async fn add_activity_task(
        &self,
        request: AddActivityTaskRequest,
    ) -> Result<(), EngineError> {
        {
            let mut failures = self.failures_remaining.lock();
            if *failures > 0 {
                *failures -= 1;
                return Err(EngineError::Remote("matching unavailable".into()));
            }
        }
        self.requests.lock().push(request);
        Ok(())
    }
}

// === Mutable state ===

/// Scripted mutable state covering the queries and mutations the handlers
/// exercise. History events are appended to `history` for assertions.
#[derive(Debug, Clone)]
pub(crate) struct FakeMutableState {
    pub running: bool,
    pub next_event_id: i64,
    pub start_version: i64,
    pub sticky_enabled: bool,
    pub sticky_timeout: Duration,
    pub task_list: String,
    pub activities: BTreeMap<i64, ActivityInfo>,
    pub user_timers: BTreeMap<String, TimerInfo>,
    pub decision: Option<DecisionInfo>,
    pub history: Vec<HistoryEvent>,
    /// When set, the next `create_retry_timer` consumes it and produces a
    /// retry timer firing at that time; `None` means retries exhausted.
    pub retry_fire_at: Option<SystemTime>,
    pub retry_reasons: Vec<String>,
    pub activity_target_domains: HashMap<i64, String>,
    /// Timers reported by `pending_user_timers` but unknown to
    /// `user_timer`, to exercise the internal-inconsistency path.
    pub phantom_user_timers: Vec<TimerInfo>,
}

impl Default for FakeMutableState {
    fn default() -> Self {
        Self {
            running: true,
            next_event_id: 100,
            start_version: 0,
            sticky_enabled: false,
            sticky_timeout: Duration::from_secs(10),
            task_list: "default-tl".to_string(),
            activities: BTreeMap::new(),
            user_timers: BTreeMap::new(),
            decision: None,
            history: Vec::new(),
            retry_fire_at: None,
            retry_reasons: Vec::new(),
            activity_target_domains: HashMap::new(),
            phantom_user_timers: Vec::new(),
        }
    }
}

impl FakeMutableState {
    fn accept_event(&mut self, event: HistoryEvent) -> HistoryEvent {
        self.next_event_id += 1;
        self.history.push(event.clone());
        event
    }
}

impl MutableState for FakeMutableState {
    fn is_running(&self) -> bool {
        self.running
    }

    fn has_pending_decision(&self) -> bool {
        self.decision.is_some()
    }

    fn is_sticky_enabled(&self) -> bool {
        self.sticky_enabled
    }

    fn sticky_schedule_to_start_timeout(&self) -> Duration {
        self.sticky_timeout
    }

    fn next_event_id(&self) -> i64 {
        self.next_event_id
    }

    fn start_version(&self) -> i64 {
        self.start_version
    }

    fn pending_activities(&self) -> Vec<ActivityInfo> {
        self.activities.values().cloned().collect()
    }

    fn pending_user_timers(&self) -> Vec<TimerInfo> {
        let mut timers: Vec<TimerInfo> = self.user_timers.values().cloned().collect();
        timers.extend(self.phantom_user_timers.iter().cloned());
        timers
    }

    fn activity_info(&self, schedule_id: i64) -> Option<ActivityInfo> {
        self.activities.get(&schedule_id).cloned()
    }

    fn update_activity(&mut self, info: ActivityInfo) {
        self.activities.insert(info.schedule_id, info);
    }

    fn pending_decision(&self, schedule_id: i64) -> Option<DecisionInfo> {
        self.decision
            .clone()
            .filter(|di| di.schedule_id == schedule_id)
    }

    fn user_timer(&self, timer_id: &TimerId) -> Option<TimerInfo> {
        self.user_timers.get(timer_id.as_str()).cloned()
    }

    fn update_user_timer(&mut self, info: TimerInfo) {
        self.user_timers
            .insert(info.timer_id.as_str().to_string(), info);
    }

    fn add_timer_fired_event(
        &mut self,
        started_id: i64,
        timer_id: &TimerId,
    ) -> Option<HistoryEvent> {
        if !self.running || self.user_timers.remove(timer_id.as_str()).is_none() {
            return None;
        }
        Some(self.accept_event(HistoryEvent::TimerFired {
            started_event_id: started_id,
            timer_id: timer_id.clone(),
        }))
    }

    fn add_activity_timed_out_event(
        &mut self,
        schedule_id: i64,
        started_id: Option<i64>,
        timeout_kind: TimeoutKind,
        details: Option<Vec<u8>>,
    ) -> Option<HistoryEvent> {
        if !self.running || self.activities.remove(&schedule_id).is_none() {
            return None;
        }
        Some(self.accept_event(HistoryEvent::ActivityTaskTimedOut {
            schedule_id,
            started_id,
            timeout_kind,
            details,
        }))
    }

    fn add_decision_timed_out_event(
        &mut self,
        schedule_id: i64,
        started_id: Option<i64>,
    ) -> Option<HistoryEvent> {
        if !self.running || self.decision.take().is_none() {
            return None;
        }
        Some(self.accept_event(HistoryEvent::DecisionTaskTimedOut {
            schedule_id,
            started_id,
            timeout_kind: TimeoutKind::StartToClose,
        }))
    }

    fn add_decision_schedule_to_start_timeout_event(
        &mut self,
        schedule_id: i64,
    ) -> Option<HistoryEvent> {
        if !self.running || self.decision.take().is_none() {
            return None;
        }
        Some(self.accept_event(HistoryEvent::DecisionTaskTimedOut {
            schedule_id,
            started_id: None,
            timeout_kind: TimeoutKind::ScheduleToStart,
        }))
    }

    fn add_workflow_timed_out_event(&mut self) -> Option<HistoryEvent> {
        if !self.running {
            return None;
        }
        self.running = false;
        Some(self.accept_event(HistoryEvent::WorkflowExecutionTimedOut))
    }

    fn add_decision_scheduled_event(&mut self) -> Option<DecisionInfo> {
        if !self.running {
            return None;
        }
        let attempt = self.decision.as_ref().map(|d| d.attempt + 1).unwrap_or(0);
        let di = DecisionInfo {
            schedule_id: self.next_event_id,
            started_id: None,
            attempt,
            version: self.start_version,
            task_list: self.task_list.clone(),
        };
        self.accept_event(HistoryEvent::DecisionTaskScheduled {
            schedule_id: di.schedule_id,
            task_list: di.task_list.clone(),
            attempt: di.attempt,
        });
        self.decision = Some(di.clone());
        Some(di)
    }

    fn create_retry_timer(
        &mut self,
        activity: &ActivityInfo,
        reason: &str,
    ) -> Option<TimerTask> {
        let fire_at = self.retry_fire_at.take()?;
        self.retry_reasons.push(reason.to_string());
        let next_attempt = activity.attempt + 1;
        if let Some(ai) = self.activities.get_mut(&activity.schedule_id) {
            ai.attempt = next_attempt;
            ai.started_id = None;
            ai.started_time = None;
            ai.timer_task_status = 0;
        }
        Some(TimerTask::RetryTimer {
            visibility_timestamp: fire_at,
            event_id: activity.schedule_id,
            attempt: next_attempt,
        })
    }

    fn activity_target_domain(&self, schedule_id: i64) -> Option<String> {
        self.activity_target_domains.get(&schedule_id).cloned()
    }

    fn boxed_clone(&self) -> Box<dyn MutableState> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

// === Execution store ===

#[derive(Debug, Clone)]
pub(crate) struct RecordedUpdate {
    pub key: ExecutionKey,
    pub transfer_tasks: Vec<TransferTask>,
    pub timer_tasks: Vec<TimerTask>,
    pub clear_timer_task: Option<TimerSequenceId>,
    pub condition: i64,
}

#[derive(Default)]
pub(crate) struct FakeExecutionStore {
    executions: Mutex<HashMap<ExecutionKey, FakeMutableState>>,
    updates: Mutex<Vec<RecordedUpdate>>,
    deleted: Mutex<Vec<ExecutionKey>>,
    loads: Mutex<usize>,
    inject_conflicts: Mutex<usize>,
    fail_update_with: Mutex<Option<EngineError>>,
    stale_once: Mutex<Option<FakeMutableState>>,
}

impl FakeExecutionStore {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn put(&self, key: ExecutionKey, state: FakeMutableState) {
        self.executions.lock().insert(key, state);
    }

    pub(crate) fn mutable_state(&self, key: &ExecutionKey) -> Option<FakeMutableState> {
        self.executions.lock().get(key).cloned()
    }

    pub(crate) fn updates(&self) -> Vec<RecordedUpdate> {
        self.updates.lock().clone()
    }

    pub(crate) fn deleted(&self) -> Vec<ExecutionKey> {
        self.deleted.lock().clone()
    }

    pub(crate) fn load_count(&self) -> usize {
        *self.loads.lock()
    }

    /// Fail the next `n` updates with a conflict regardless of condition.
    pub(crate) fn inject_conflicts(&self, n: usize) {
        *self.inject_conflicts.lock() = n;
    }

    pub(crate) fn fail_next_update(&self, err: EngineError) {
        *self.fail_update_with.lock() = Some(err);
    }

    /// Serve `state` for the next load only, simulating a stale snapshot
    /// that a cache refresh then replaces with the canonical state.
    pub(crate) fn serve_stale_once(&self, state: FakeMutableState) {
        *self.stale_once.lock() = Some(state);
    }

    /// Mutate the canonical state behind the processor's back, as a
    /// concurrent writer would.
    pub(crate) fn mutate(&self, key: &ExecutionKey, f: impl FnOnce(&mut FakeMutableState)) {
        let mut executions = self.executions.lock();
        if let Some(state) = executions.get_mut(key) {
            f(state);
        }
    }
}

#[async_trait]
impl ExecutionStore for FakeExecutionStore {
    async fn load_mutable_state(
        &self,
        key: &ExecutionKey,
    ) -> Result<Box<dyn MutableState>, EngineError> {
        *self.loads.lock() += 1;
        if let Some(stale) = self.stale_once.lock().take() {
            return Ok(Box::new(stale));
        }
        self.executions
            .lock()
            .get(key)
            .map(|state| Box::new(state.clone()) as Box<dyn MutableState>)
            .ok_or_else(|| EngineError::EntityNotExists(format!("execution {key}")))
    }

    async fn update_execution(
        &self,
        key: &ExecutionKey,
        state: &dyn MutableState,
        request: UpdateExecutionRequest,
    ) -> Result<(), EngineError> {
        if let Some(err) = self.fail_update_with.lock().take() {
            return Err(err);
        }
        {
            let mut conflicts = self.inject_conflicts.lock();
            if *conflicts > 0 {
                *conflicts -= 1;
                return Err(EngineError::Conflict);
            }
        }
        let fake = state
            .as_any()
            .downcast_ref::<FakeMutableState>()
            .ok_or_else(|| EngineError::Internal("unexpected mutable state type".into()))?;
        let mut executions = self.executions.lock();
        let Some(stored) = executions.get_mut(key) else {
            return Err(EngineError::EntityNotExists(format!("execution {key}")));
        };
        if stored.next_event_id != request.condition {
            return Err(EngineError::Conflict);
        }
        *stored = fake.clone();
        self.updates.lock().push(RecordedUpdate {
            key: key.clone(),
            transfer_tasks: request.transfer_tasks,
            timer_tasks: request.timer_tasks,
            clear_timer_task: request.clear_timer_task,
            condition: request.condition,
        });
        Ok(())
    }

    async fn delete_execution(&self, key: &ExecutionKey) -> Result<(), EngineError> {
        let removed = self.executions.lock().remove(key).is_some();
        if !removed {
            return Err(EngineError::EntityNotExists(format!("execution {key}")));
        }
        self.deleted.lock().push(key.clone());
        Ok(())
    }
}

// === History engine ===

pub(crate) struct FakeHistoryEngine {
    cache: Arc<WorkflowCache>,
    clock: FakeClock,
    retention: Duration,
    fail_delete_tasks: Mutex<Option<EngineError>>,
}

impl FakeHistoryEngine {
    pub(crate) fn new(store: Arc<FakeExecutionStore>, clock: FakeClock) -> Arc<Self> {
        Arc::new(Self {
            cache: WorkflowCache::new(store as Arc<dyn ExecutionStore>),
            clock,
            retention: Duration::from_secs(24 * 3600),
            fail_delete_tasks: Mutex::new(None),
        })
    }

    pub(crate) fn fail_delete_tasks(&self, err: EngineError) {
        *self.fail_delete_tasks.lock() = Some(err);
    }
}

#[async_trait]
impl HistoryEngine for FakeHistoryEngine {
    fn execution_cache(&self) -> Arc<WorkflowCache> {
        Arc::clone(&self.cache)
    }

    async fn delete_workflow_tasks(
        &self,
        _domain_id: &DomainId,
    ) -> Result<(TransferTask, TimerTask), EngineError> {
        if let Some(err) = self.fail_delete_tasks.lock().take() {
            return Err(err);
        }
        Ok((
            TransferTask::DeleteExecution,
            TimerTask::DeleteHistoryEvent {
                visibility_timestamp: self.clock.now() + self.retention,
            },
        ))
    }
}

// === Harness ===

pub(crate) struct TestHarness {
    pub clock: FakeClock,
    pub domains: Arc<FakeDomainCache>,
    pub shard: Arc<FakeShard>,
    pub store: Arc<FakeExecutionStore>,
    pub engine: Arc<FakeHistoryEngine>,
    pub matching: Arc<FakeMatchingClient>,
    pub processor: Arc<ActiveTimerProcessor<FakeClock>>,
}

pub(crate) fn harness() -> TestHarness {
    harness_with_config(TimerQueueConfig::default())
}

pub(crate) fn harness_with_config(config: TimerQueueConfig) -> TestHarness {
    let clock = FakeClock::new();
    let domains = FakeDomainCache::new();
    domains.insert(local_domain("d1"));
    let shard = FakeShard::new(clock.clone(), Arc::clone(&domains));
    let store = FakeExecutionStore::new();
    let engine = FakeHistoryEngine::new(Arc::clone(&store), clock.clone());
    let matching = FakeMatchingClient::new();
    let processor = ActiveTimerProcessor::new_active(
        shard.clone() as Arc<dyn ShardContext>,
        engine.clone() as Arc<dyn HistoryEngine>,
        matching.clone() as Arc<dyn MatchingClient>,
        clock.clone(),
        config,
    );
    TestHarness {
        clock,
        domains,
        shard,
        store,
        engine,
        matching,
        processor,
    }
}

/// Failover harness. The clock is advanced to `now` before construction so
/// the drain window's fixed upper bound covers tasks written before `now`.
pub(crate) fn failover_harness(
    domain_id: &str,
    standby_cluster: &str,
    now: SystemTime,
) -> TestHarness {
    let clock = FakeClock::new();
    clock.set(now);
    let domains = FakeDomainCache::new();
    domains.insert(local_domain(domain_id));
    let shard = FakeShard::new(clock.clone(), Arc::clone(&domains));
    let store = FakeExecutionStore::new();
    let engine = FakeHistoryEngine::new(Arc::clone(&store), clock.clone());
    let matching = FakeMatchingClient::new();
    let processor = ActiveTimerProcessor::new_failover(
        shard.clone() as Arc<dyn ShardContext>,
        engine.clone() as Arc<dyn HistoryEngine>,
        DomainId::new(domain_id),
        standby_cluster,
        matching.clone() as Arc<dyn MatchingClient>,
        clock.clone(),
        TimerQueueConfig::default(),
    );
    TestHarness {
        clock,
        domains,
        shard,
        store,
        engine,
        matching,
        processor,
    }
}

// === Task builders ===

pub(crate) fn execution_key() -> ExecutionKey {
    ExecutionKey::new("d1", "wf-1", "run-1")
}

pub(crate) struct TaskBuilder {
    task: TimerTaskInfo,
}

impl TaskBuilder {
    pub(crate) fn new(task_type: TimerTaskType, task_id: i64, fire_at: SystemTime) -> Self {
        let key = execution_key();
        Self {
            task: TimerTaskInfo {
                domain_id: key.domain_id,
                workflow_id: key.workflow_id,
                run_id: key.run_id,
                task_id,
                visibility_timestamp: fire_at,
                task_type,
                timeout_kind: None,
                event_id: 0,
                schedule_attempt: 0,
                version: 0,
            },
        }
    }

    pub(crate) fn domain(mut self, domain_id: &str) -> Self {
        self.task.domain_id = DomainId::new(domain_id);
        self
    }

    pub(crate) fn timeout_kind(mut self, kind: TimeoutKind) -> Self {
        self.task.timeout_kind = Some(kind);
        self
    }

    pub(crate) fn event_id(mut self, event_id: i64) -> Self {
        self.task.event_id = event_id;
        self
    }

    pub(crate) fn attempt(mut self, attempt: i64) -> Self {
        self.task.schedule_attempt = attempt;
        self
    }

    pub(crate) fn version(mut self, version: i64) -> Self {
        self.task.version = version;
        self
    }

    pub(crate) fn build(self) -> TimerTaskInfo {
        self.task
    }
}

/// A pending, not-yet-started activity with sensible timeouts.
pub(crate) fn pending_activity(schedule_id: i64, scheduled_at: SystemTime) -> ActivityInfo {
    ActivityInfo {
        schedule_id,
        started_id: None,
        attempt: 0,
        version: 0,
        task_list: "activity-tl".to_string(),
        scheduled_time: scheduled_at,
        started_time: None,
        last_heartbeat: None,
        schedule_to_start_timeout: Duration::from_secs(10),
        schedule_to_close_timeout: Duration::from_secs(60),
        start_to_close_timeout: Duration::from_secs(30),
        heartbeat_timeout: None,
        details: None,
        timer_task_status: 0,
    }
}

/// The same activity after a worker picked it up at `started_at`.
pub(crate) fn started_activity(
    schedule_id: i64,
    started_id: i64,
    scheduled_at: SystemTime,
    started_at: SystemTime,
) -> ActivityInfo {
    let mut ai = pending_activity(schedule_id, scheduled_at);
    ai.started_id = Some(started_id);
    ai.started_time = Some(started_at);
    ai
}

pub(crate) fn user_timer(id: &str, started_id: i64, expiry: SystemTime) -> TimerInfo {
    TimerInfo {
        timer_id: TimerId::new(id),
        started_id,
        expiry,
        task_created: true,
    }
}

pub(crate) fn pending_decision(schedule_id: i64) -> DecisionInfo {
    DecisionInfo {
        schedule_id,
        started_id: None,
        attempt: 0,
        version: 0,
        task_list: "default-tl".to_string(),
    }
}
