// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pending-activity record held in mutable state.

use crate::task::TimeoutKind;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// Bit set in [`ActivityInfo::timer_task_status`] once a timer task of the
/// given kind has been persisted for the current attempt. Prevents the
/// processor from materialising the same timer twice.
pub fn timer_created_bit(kind: TimeoutKind) -> u32 {
    match kind {
        TimeoutKind::StartToClose => 1 << 0,
        TimeoutKind::ScheduleToStart => 1 << 1,
        TimeoutKind::ScheduleToClose => 1 << 2,
        TimeoutKind::Heartbeat => 1 << 3,
    }
}

/// State of one pending (scheduled, possibly started) activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityInfo {
    /// Event id of the `ActivityTaskScheduled` event.
    pub schedule_id: i64,
    /// Event id of the `ActivityTaskStarted` event; `None` until a worker
    /// picks the task up.
    pub started_id: Option<i64>,
    /// Current attempt; bumped each time a retry is scheduled.
    pub attempt: i64,
    /// Domain failover version at scheduling time.
    pub version: i64,
    pub task_list: String,
    pub scheduled_time: SystemTime,
    pub started_time: Option<SystemTime>,
    pub last_heartbeat: Option<SystemTime>,
    pub schedule_to_start_timeout: Duration,
    pub schedule_to_close_timeout: Duration,
    pub start_to_close_timeout: Duration,
    /// `None` when the activity does not heartbeat.
    pub heartbeat_timeout: Option<Duration>,
    /// Last recorded heartbeat payload.
    pub details: Option<Vec<u8>>,
    /// Bitmask of timer kinds already persisted for this attempt.
    pub timer_task_status: u32,
}

impl ActivityInfo {
    pub fn is_started(&self) -> bool {
        self.started_id.is_some()
    }

    /// Has a timer task of this kind already been persisted?
    pub fn timer_created(&self, kind: TimeoutKind) -> bool {
        self.timer_task_status & timer_created_bit(kind) != 0
    }

    pub fn mark_timer_created(&mut self, kind: TimeoutKind) {
        self.timer_task_status |= timer_created_bit(kind);
    }

    pub fn clear_timer_created(&mut self, kind: TimeoutKind) {
        self.timer_task_status &= !timer_created_bit(kind);
    }
}

#[cfg(test)]
#[path = "activity_tests.rs"]
mod tests;
