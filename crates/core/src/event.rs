// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! History events appended to a workflow execution by timer handlers.
//!
//! Event ids are assigned by the mutable state when an event is accepted;
//! this enum carries only the event payloads the timer subsystem produces.

use crate::id::TimerId;
use crate::task::TimeoutKind;
use serde::{Deserialize, Serialize};

/// Events the timer handlers append to workflow history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HistoryEvent {
    /// A user timer reached its expiry.
    TimerFired {
        /// Event id of the `TimerStarted` event.
        started_event_id: i64,
        timer_id: TimerId,
    },

    /// An activity exceeded one of its timeouts.
    ActivityTaskTimedOut {
        schedule_id: i64,
        started_id: Option<i64>,
        timeout_kind: TimeoutKind,
        /// Last recorded heartbeat payload, for heartbeat timeouts.
        details: Option<Vec<u8>>,
    },

    /// A decision task exceeded a timeout. `timeout_kind` distinguishes a
    /// started decision that ran too long from a sticky decision that was
    /// never picked up.
    DecisionTaskTimedOut {
        schedule_id: i64,
        started_id: Option<i64>,
        timeout_kind: TimeoutKind,
    },

    /// The whole execution exceeded its run timeout.
    WorkflowExecutionTimedOut,

    /// A fresh decision task was scheduled.
    DecisionTaskScheduled {
        schedule_id: i64,
        task_list: String,
        attempt: i64,
    },
}

impl HistoryEvent {
    /// Event name for log spans.
    pub fn name(&self) -> &'static str {
        match self {
            HistoryEvent::TimerFired { .. } => "timer_fired",
            HistoryEvent::ActivityTaskTimedOut { .. } => "activity_task_timed_out",
            HistoryEvent::DecisionTaskTimedOut { .. } => "decision_task_timed_out",
            HistoryEvent::WorkflowExecutionTimedOut => "workflow_execution_timed_out",
            HistoryEvent::DecisionTaskScheduled { .. } => "decision_task_scheduled",
        }
    }

    /// One-line summary for structured logging.
    pub fn log_summary(&self) -> String {
        match self {
            HistoryEvent::TimerFired {
                started_event_id,
                timer_id,
            } => format!("timer_fired started={} timer={}", started_event_id, timer_id),
            HistoryEvent::ActivityTaskTimedOut {
                schedule_id,
                timeout_kind,
                ..
            } => format!(
                "activity_task_timed_out sched={} kind={}",
                schedule_id, timeout_kind
            ),
            HistoryEvent::DecisionTaskTimedOut {
                schedule_id,
                timeout_kind,
                ..
            } => format!(
                "decision_task_timed_out sched={} kind={}",
                schedule_id, timeout_kind
            ),
            HistoryEvent::WorkflowExecutionTimedOut => "workflow_execution_timed_out".to_string(),
            HistoryEvent::DecisionTaskScheduled {
                schedule_id,
                task_list,
                ..
            } => format!(
                "decision_task_scheduled sched={} task_list={}",
                schedule_id, task_list
            ),
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
