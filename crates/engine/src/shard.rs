// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shard-context contract: the slice of shard state the timer queue needs.

use crate::domain::DomainCache;
use crate::error::EngineError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::SystemTime;
use tempo_core::{TimerSequenceId, TimerTaskInfo};

/// One page of timer tasks read from the shard's timer stream.
#[derive(Debug, Clone, Default)]
pub struct TimerTaskPage {
    /// Tasks in ascending [`TimerSequenceId`] order, strictly after the
    /// requested minimum and with visibility at or before the requested
    /// maximum.
    pub tasks: Vec<TimerTaskInfo>,
    /// Whether more tasks remain inside the queried window.
    pub more: bool,
    /// Earliest visibility timestamp after the window's upper bound, if any
    /// task exists there. Used to reprogram the timer gate.
    pub next_fire: Option<SystemTime>,
}

/// The shard-owned facilities the timer queue depends on.
///
/// One processor instance is bound to one shard; the shard supplies virtual
/// time per cluster, domain metadata, task-id allocation, the persisted ack
/// cursor, and paged access to the timer stream.
#[async_trait]
pub trait ShardContext: Send + Sync {
    /// Name of the cluster this shard's service instance runs in.
    fn current_cluster(&self) -> &str;

    /// The shard's virtual "now" for a cluster. For the local cluster this
    /// tracks wall clock; for remote clusters it tracks replicated progress.
    fn current_time(&self, cluster: &str) -> SystemTime;

    fn domain_cache(&self) -> Arc<dyn DomainCache>;

    /// Allocate the next shard-monotonic task/transaction id.
    fn next_task_id(&self) -> Result<i64, EngineError>;

    /// Persisted timer read-cursor for a cluster.
    fn timer_ack_level(&self, cluster: &str) -> SystemTime;

    /// Durably advance the timer read-cursor for a cluster.
    async fn update_timer_ack_level(
        &self,
        cluster: &str,
        level: SystemTime,
    ) -> Result<(), EngineError>;

    /// Read timer tasks strictly after `min` with visibility at or before
    /// `max`.
    async fn get_timer_tasks(
        &self,
        min: TimerSequenceId,
        max: SystemTime,
        batch_size: usize,
    ) -> Result<TimerTaskPage, EngineError>;

    /// Durably delete a fired task record. Idempotent.
    async fn complete_timer_task(&self, task: &TimerTaskInfo) -> Result<(), EngineError>;
}
