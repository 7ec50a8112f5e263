// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The fetch/dispatch loop shared by the active and failover processors.
//!
//! The base owns the pump: wait on the timer gate, page due tasks from the
//! ack manager, hand each to the injected [`TimerTaskHandler`], and reprogram
//! the gate from the ack manager's next-fire hint or from notifications
//! about newly persisted timers. A bounded worker pool invokes the handler
//! concurrently on independent tasks and redelivers failed ones with capped
//! backoff, so every due task is fired at least once.

use crate::config::TimerQueueConfig;
use crate::error::EngineError;
use crate::execution::ExecutionStore;
use crate::metric_definitions::{NEW_TIMER_NOTIFICATIONS, TIMER_TASKS_FIRED};
use crate::queue::ack::TimerQueueAckManager;
use crate::queue::gate::TimerGate;
use async_trait::async_trait;
use metrics::counter;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempo_core::{Clock, TimerTask, TimerTaskInfo};
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Per-task semantics plugged into the base loop.
#[async_trait]
pub trait TimerTaskHandler: Send + Sync + 'static {
    /// Process one timer task. Implementations ack the task themselves
    /// (directly or by treating it as filtered/benign); an error means the
    /// base should redeliver it.
    async fn process(&self, task: &TimerTaskInfo) -> Result<(), EngineError>;
}

struct NewTimerSignal {
    earliest: Mutex<Option<SystemTime>>,
    notify: Notify,
}

impl NewTimerSignal {
    fn merge(&self, t: SystemTime) {
        let mut slot = self.earliest.lock();
        match *slot {
            Some(current) if current <= t => {}
            _ => *slot = Some(t),
        }
    }

    fn take(&self) -> Option<SystemTime> {
        self.earliest.lock().take()
    }
}

/// Drives one shard's timer queue against an injected task handler.
pub struct TimerQueueProcessorBase<C: Clock> {
    config: TimerQueueConfig,
    ack: Arc<TimerQueueAckManager>,
    gate: Arc<TimerGate<C>>,
    store: Arc<dyn ExecutionStore>,
    new_timers: NewTimerSignal,
    fired_count: AtomicU64,
    started: AtomicBool,
    stopping: watch::Sender<bool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<C: Clock> TimerQueueProcessorBase<C> {
    pub fn new(
        config: TimerQueueConfig,
        ack: Arc<TimerQueueAckManager>,
        gate: Arc<TimerGate<C>>,
        store: Arc<dyn ExecutionStore>,
    ) -> Self {
        let (stopping, _) = watch::channel(false);
        Self {
            config,
            ack,
            gate,
            store,
            new_timers: NewTimerSignal {
                earliest: Mutex::new(None),
                notify: Notify::new(),
            },
            fired_count: AtomicU64::new(0),
            started: AtomicBool::new(false),
            stopping,
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn timer_gate(&self) -> Arc<TimerGate<C>> {
        Arc::clone(&self.gate)
    }

    /// Monotonic count of tasks handed to the worker pool.
    pub fn timer_fired_count(&self) -> u64 {
        self.fired_count.load(Ordering::Relaxed)
    }

    /// Spawn the pump and worker pool. Idempotent.
    pub fn start(self: &Arc<Self>, handler: Arc<dyn TimerTaskHandler>) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let (tx, rx) = mpsc::channel::<TimerTaskInfo>(self.config.batch_size.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let mut handles = Vec::with_capacity(self.config.worker_count + 1);
        for worker_id in 0..self.config.worker_count.max(1) {
            let this = Arc::clone(self);
            let handler = Arc::clone(&handler);
            let rx = Arc::clone(&rx);
            handles.push(tokio::spawn(async move {
                this.worker_loop(worker_id, handler, rx).await;
            }));
        }
        {
            let this = Arc::clone(self);
            handles.push(tokio::spawn(async move {
                this.pump(tx).await;
            }));
        }
        self.workers.lock().extend(handles);
        info!(workers = self.config.worker_count, "timer queue processor started");
    }

    /// Request the pump and workers to wind down without waiting for them.
    /// In-flight handlers finish naturally.
    pub fn signal_stop(&self) {
        self.gate.close();
        let _ = self.stopping.send(true);
    }

    /// Stop and wait for the pump and workers to drain.
    pub async fn stop(&self) {
        self.signal_stop();
        let handles = std::mem::take(&mut *self.workers.lock());
        for handle in handles {
            let _ = handle.await;
        }
        info!("timer queue processor stopped");
    }

    /// Tell the gate about newly persisted timer tasks so it can fire
    /// earlier. Safe from any task; merges are monotone toward the earliest
    /// time.
    pub fn notify_new_timers(&self, tasks: &[TimerTask]) {
        let Some(earliest) = tasks.iter().map(|t| t.visibility_timestamp()).min() else {
            return;
        };
        counter!(NEW_TIMER_NOTIFICATIONS).increment(1);
        self.new_timers.merge(earliest);
        self.new_timers.notify.notify_one();
    }

    /// Remove a closed execution whose retention window has passed.
    pub async fn process_delete_history_event(
        &self,
        task: &TimerTaskInfo,
    ) -> Result<(), EngineError> {
        match self.store.delete_execution(&task.execution_key()).await {
            Ok(()) => Ok(()),
            Err(EngineError::EntityNotExists(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn pump(self: Arc<Self>, tx: mpsc::Sender<TimerTaskInfo>) {
        let mut stop_rx = self.stopping.subscribe();
        let mut drained_rx = self.ack.drained();
        loop {
            tokio::select! {
                // Biased so a consumed gate fire is never discarded in
                // favour of a concurrently-ready branch.
                biased;
                fired = self.gate.fired() => {
                    if !fired {
                        break;
                    }
                    if !self.drain_due_tasks(&tx).await {
                        break;
                    }
                }
                _ = self.new_timers.notify.notified() => {
                    if let Some(earliest) = self.new_timers.take() {
                        self.gate.update(earliest);
                    }
                }
                _ = stop_rx.changed() => {
                    if *stop_rx.borrow() {
                        break;
                    }
                }
                _ = drained_rx.changed() => {
                    if *drained_rx.borrow() {
                        info!("failover timer window drained; stopping pump");
                        self.gate.close();
                        break;
                    }
                }
            }
        }
        // Dropping the sender lets the workers drain the channel and exit.
        drop(tx);
        debug!("timer queue pump exited");
    }

    /// Page all currently-due tasks to the workers. Returns `false` when
    /// the worker channel is gone and the pump should exit.
    async fn drain_due_tasks(&self, tx: &mpsc::Sender<TimerTaskInfo>) -> bool {
        loop {
            let batch = match self.ack.read_timer_tasks().await {
                Ok(batch) => batch,
                Err(err) => {
                    warn!(%err, "failed to read timer tasks; retrying shortly");
                    self.gate.fire_in(Duration::from_secs(1));
                    return true;
                }
            };
            for task in batch.tasks {
                self.fired_count.fetch_add(1, Ordering::Relaxed);
                counter!(TIMER_TASKS_FIRED).increment(1);
                if tx.send(task).await.is_err() {
                    return false;
                }
            }
            if !batch.more {
                match batch.next_fire {
                    Some(next_fire) => self.gate.update(next_fire),
                    None => self.gate.fire_in(self.config.poll_interval),
                }
                return true;
            }
            if let Some(next_fire) = batch.next_fire {
                self.gate.update(next_fire);
            }
        }
    }

    async fn worker_loop(
        &self,
        worker_id: usize,
        handler: Arc<dyn TimerTaskHandler>,
        rx: Arc<tokio::sync::Mutex<mpsc::Receiver<TimerTaskInfo>>>,
    ) {
        let mut stop_rx = self.stopping.subscribe();
        loop {
            let task = {
                let mut rx = rx.lock().await;
                rx.recv().await
            };
            let Some(task) = task else { break };
            self.process_with_redelivery(&handler, &task, &mut stop_rx)
                .await;
        }
        debug!(worker_id, "timer task worker exited");
    }

    /// Run the handler until it succeeds, backing off between attempts.
    /// Gives up only when a stop is requested; the un-acked task will be
    /// redelivered by the next processor incarnation.
    async fn process_with_redelivery(
        &self,
        handler: &Arc<dyn TimerTaskHandler>,
        task: &TimerTaskInfo,
        stop_rx: &mut watch::Receiver<bool>,
    ) {
        let mut backoff = Duration::from_millis(50);
        loop {
            match handler.process(task).await {
                Ok(()) => return,
                Err(err) => {
                    warn!(
                        task_id = task.task_id,
                        task_type = %task.task_type,
                        %err,
                        "timer task failed; will redeliver"
                    );
                }
            }
            if *stop_rx.borrow() {
                return;
            }
            tokio::select! {
                _ = stop_rx.changed() => {
                    if *stop_rx.borrow() {
                        return;
                    }
                }
                _ = tokio::time::sleep(backoff) => {}
            }
            backoff = (backoff * 2).min(self.config.redeliver_backoff_ceiling);
        }
    }
}

#[cfg(test)]
#[path = "base_tests.rs"]
mod tests;
