// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer-queue tuning knobs

/// Configuration for a shard's timer-queue processor.
#[derive(Debug, Clone)]
pub struct TimerQueueConfig {
    /// Maximum number of timer tasks fetched per page.
    pub batch_size: usize,
    /// Number of concurrent task workers.
    pub worker_count: usize,
    /// Upper bound on the delay between redeliveries of a failed task.
    pub redeliver_backoff_ceiling: std::time::Duration,
    /// Re-poll interval when the stream has no known future timer; bounds
    /// how stale the queue can get if a notification is ever missed.
    pub poll_interval: std::time::Duration,
}

impl Default for TimerQueueConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            worker_count: 10,
            redeliver_backoff_ceiling: std::time::Duration::from_secs(5),
            poll_interval: std::time::Duration::from_secs(60),
        }
    }
}
