// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracks which timer tasks have been read and which are done, and advances
//! the shard's durable read-cursor over the contiguous completed prefix.
//!
//! The active variant reads up to the shard's virtual "now" for its cluster
//! and runs forever. The failover variant is bounded: it starts from the
//! standby cluster's persisted cursor, reads up to a fixed upper bound
//! captured at construction, and reports through a watch channel once every
//! task in that window is complete.

use crate::error::EngineError;
use crate::shard::ShardContext;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;
use tempo_core::{TimerSequenceId, TimerTaskInfo};
use tokio::sync::watch;
use tracing::{debug, warn};

/// One batch of dispatchable timer tasks.
#[derive(Debug, Clone, Default)]
pub struct TimerTaskBatch {
    /// Un-acked tasks in ascending sequence order, all due at or before the
    /// read window's upper bound.
    pub tasks: Vec<TimerTaskInfo>,
    /// Whether more tasks remain inside the window.
    pub more: bool,
    /// Earliest known future fire time, for reprogramming the gate.
    pub next_fire: Option<SystemTime>,
}

#[derive(Debug, Clone, Copy)]
enum WindowBound {
    /// Read up to the shard's virtual now each poll.
    CurrentTime,
    /// Fixed upper bound captured at construction (failover drain).
    Fixed(SystemTime),
}

struct Outstanding {
    task: TimerTaskInfo,
    done: bool,
}

struct AckState {
    read_level: TimerSequenceId,
    ack_level: SystemTime,
    outstanding: BTreeMap<TimerSequenceId, Outstanding>,
    /// Whether the last page reported nothing further inside the window.
    window_read: bool,
}

/// Thread-safe completion tracker for one shard's timer stream.
pub struct TimerQueueAckManager {
    shard: Arc<dyn ShardContext>,
    /// Cluster whose persisted ack level this manager owns.
    ack_cluster: String,
    batch_size: usize,
    bound: WindowBound,
    one_shot: bool,
    state: Mutex<AckState>,
    drained: watch::Sender<bool>,
}

impl TimerQueueAckManager {
    /// Ack manager for the current cluster's live timer stream.
    pub fn new_active(shard: Arc<dyn ShardContext>, batch_size: usize) -> Self {
        let cluster = shard.current_cluster().to_string();
        let ack_level = shard.timer_ack_level(&cluster);
        Self::new(shard, cluster, ack_level, WindowBound::CurrentTime, batch_size, false)
    }

    /// Bounded ack manager draining the standby cluster's backlog during a
    /// domain failover. The window closes at the current cluster's virtual
    /// now, captured here.
    pub fn new_failover(
        shard: Arc<dyn ShardContext>,
        standby_cluster: impl Into<String>,
        batch_size: usize,
    ) -> Self {
        let standby = standby_cluster.into();
        let ack_level = shard.timer_ack_level(&standby);
        let max = shard.current_time(shard.current_cluster());
        Self::new(shard, standby, ack_level, WindowBound::Fixed(max), batch_size, true)
    }

    fn new(
        shard: Arc<dyn ShardContext>,
        ack_cluster: String,
        ack_level: SystemTime,
        bound: WindowBound,
        batch_size: usize,
        one_shot: bool,
    ) -> Self {
        let (drained, _) = watch::channel(false);
        Self {
            shard,
            ack_cluster,
            batch_size,
            bound,
            one_shot,
            state: Mutex::new(AckState {
                read_level: TimerSequenceId {
                    visibility_timestamp: ack_level,
                    task_id: i64::MIN,
                },
                ack_level,
                outstanding: BTreeMap::new(),
                window_read: false,
            }),
            drained,
        }
    }

    /// Observer that flips to `true` once a failover window is fully acked.
    /// Never fires for the active variant.
    pub fn drained(&self) -> watch::Receiver<bool> {
        self.drained.subscribe()
    }

    /// Highest timestamp such that every task below it is complete.
    pub fn ack_level(&self) -> SystemTime {
        self.state.lock().ack_level
    }

    /// Read the next batch of due, un-acked tasks.
    pub async fn read_timer_tasks(&self) -> Result<TimerTaskBatch, EngineError> {
        let (min, max) = {
            let state = self.state.lock();
            let max = match self.bound {
                WindowBound::CurrentTime => {
                    self.shard.current_time(self.shard.current_cluster())
                }
                WindowBound::Fixed(t) => t,
            };
            (state.read_level, max)
        };

        let page = self.shard.get_timer_tasks(min, max, self.batch_size).await?;

        let mut state = self.state.lock();
        let mut tasks = Vec::with_capacity(page.tasks.len());
        for task in page.tasks {
            let seq = task.sequence_id();
            if seq <= state.read_level || state.outstanding.contains_key(&seq) {
                continue;
            }
            state.read_level = seq;
            state.outstanding.insert(seq, Outstanding { task: task.clone(), done: false });
            tasks.push(task);
        }
        if self.one_shot {
            state.window_read = !page.more;
            if state.window_read && state.outstanding.is_empty() && tasks.is_empty() {
                drop(state);
                self.signal_drained();
                return Ok(TimerTaskBatch {
                    tasks,
                    more: false,
                    next_fire: None,
                });
            }
        }
        debug!(
            count = tasks.len(),
            more = page.more,
            "read timer task batch"
        );
        // Timers beyond a failover window belong to the live processor, so
        // the one-shot variant never feeds the gate a future fire time.
        let next_fire = if self.one_shot { None } else { page.next_fire };
        Ok(TimerTaskBatch {
            tasks,
            more: page.more,
            next_fire,
        })
    }

    /// Mark a task complete and advance the durable cursor over the
    /// contiguous completed prefix. Idempotent; safe from any handler.
    pub async fn complete_timer_task(&self, task: &TimerTaskInfo) {
        let seq = task.sequence_id();
        let (completed, new_ack) = {
            let mut state = self.state.lock();
            match state.outstanding.get_mut(&seq) {
                Some(entry) => entry.done = true,
                // Unknown sequence: either already acked past (idempotent
                // re-complete) or never read here. Nothing to do.
                None => return,
            }

            let mut completed = Vec::new();
            while let Some(first) = state.outstanding.first_entry() {
                if !first.get().done {
                    break;
                }
                let (first_seq, entry) = first.remove_entry();
                state.ack_level = first_seq.visibility_timestamp;
                completed.push(entry.task);
            }
            let new_ack = if completed.is_empty() {
                None
            } else {
                Some(state.ack_level)
            };
            (completed, new_ack)
        };

        for done in &completed {
            if let Err(err) = self.shard.complete_timer_task(done).await {
                warn!(task_id = done.task_id, %err, "failed to delete completed timer task");
            }
        }
        if let Some(level) = new_ack {
            if let Err(err) = self
                .shard
                .update_timer_ack_level(&self.ack_cluster, level)
                .await
            {
                warn!(%err, "failed to persist timer ack level");
            }
        }

        if self.one_shot {
            let finished = {
                let state = self.state.lock();
                state.window_read && state.outstanding.is_empty()
            };
            if finished {
                self.signal_drained();
            }
        }
    }

    fn signal_drained(&self) {
        if !self.drained.send_replace(true) {
            debug!(cluster = %self.ack_cluster, "failover timer window drained");
        }
    }
}

#[cfg(test)]
#[path = "ack_tests.rs"]
mod tests;
