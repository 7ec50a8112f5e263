// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted timer tasks and the tasks handlers emit.
//!
//! A `TimerTaskInfo` is a row already persisted in the shard's timer stream:
//! immutable once written, identified by `(visibility_timestamp, task_id)`.
//! `TimerTask` and `TransferTask` are *new* tasks a handler wants persisted as
//! part of a workflow update; the store assigns their task ids at commit.

use crate::execution::{ExecutionKey, WorkflowExecution};
use crate::id::{DomainId, RunId, WorkflowId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// Kind of a persisted timer task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerTaskType {
    UserTimer,
    ActivityTimeout,
    DecisionTimeout,
    WorkflowTimeout,
    RetryTimer,
    DeleteHistoryEvent,
}

impl TimerTaskType {
    /// Stable label for metrics and logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            TimerTaskType::UserTimer => "user_timer",
            TimerTaskType::ActivityTimeout => "activity_timeout",
            TimerTaskType::DecisionTimeout => "decision_timeout",
            TimerTaskType::WorkflowTimeout => "workflow_timeout",
            TimerTaskType::RetryTimer => "retry_timer",
            TimerTaskType::DeleteHistoryEvent => "delete_history_event",
        }
    }
}

impl fmt::Display for TimerTaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Which timeout of an activity or decision a timer guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeoutKind {
    ScheduleToStart,
    ScheduleToClose,
    StartToClose,
    Heartbeat,
}

impl TimeoutKind {
    /// Stable label for metrics and logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            TimeoutKind::ScheduleToStart => "schedule_to_start",
            TimeoutKind::ScheduleToClose => "schedule_to_close",
            TimeoutKind::StartToClose => "start_to_close",
            TimeoutKind::Heartbeat => "heartbeat",
        }
    }

    /// Failure reason recorded when an activity is retried because this
    /// timeout fired.
    pub fn retry_reason(&self) -> &'static str {
        match self {
            TimeoutKind::ScheduleToStart => "timeout: schedule-to-start",
            TimeoutKind::ScheduleToClose => "timeout: schedule-to-close",
            TimeoutKind::StartToClose => "timeout: start-to-close",
            TimeoutKind::Heartbeat => "timeout: heartbeat",
        }
    }
}

impl fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// A persisted timer task, read back from the shard's timer stream.
///
/// Immutable once persisted; forward progress happens by completing it or by
/// persisting new tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerTaskInfo {
    pub domain_id: DomainId,
    pub workflow_id: WorkflowId,
    pub run_id: RunId,
    /// Monotonically increasing within the shard.
    pub task_id: i64,
    /// Virtual fire time.
    pub visibility_timestamp: SystemTime,
    pub task_type: TimerTaskType,
    /// Present only on activity and decision timeout tasks.
    pub timeout_kind: Option<TimeoutKind>,
    /// The scheduling event this timer guards.
    pub event_id: i64,
    /// Which attempt the timer was created for.
    pub schedule_attempt: i64,
    /// Domain failover version at creation time.
    pub version: i64,
}

impl TimerTaskInfo {
    /// Cursor coordinate of this task.
    pub fn sequence_id(&self) -> TimerSequenceId {
        TimerSequenceId {
            visibility_timestamp: self.visibility_timestamp,
            task_id: self.task_id,
        }
    }

    pub fn execution_key(&self) -> ExecutionKey {
        ExecutionKey {
            domain_id: self.domain_id.clone(),
            workflow_id: self.workflow_id.clone(),
            run_id: self.run_id.clone(),
        }
    }

    pub fn execution(&self) -> WorkflowExecution {
        WorkflowExecution {
            workflow_id: self.workflow_id.clone(),
            run_id: self.run_id.clone(),
        }
    }
}

/// Total order over timer tasks within a shard: fire time first, then the
/// shard-monotonic task id. This is the ack cursor's coordinate system.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TimerSequenceId {
    pub visibility_timestamp: SystemTime,
    pub task_id: i64,
}

impl fmt::Display for TimerSequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = self
            .visibility_timestamp
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        write!(f, "{}@{}", self.task_id, millis)
    }
}

/// A new timer task to persist as part of a workflow update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TimerTask {
    UserTimer {
        visibility_timestamp: SystemTime,
        /// Started event id of the earliest pending user timer.
        event_id: i64,
    },
    ActivityTimeout {
        visibility_timestamp: SystemTime,
        timeout_kind: TimeoutKind,
        /// Activity schedule event id.
        event_id: i64,
        attempt: i64,
    },
    DecisionTimeout {
        visibility_timestamp: SystemTime,
        timeout_kind: TimeoutKind,
        /// Decision schedule event id.
        event_id: i64,
        attempt: i64,
    },
    WorkflowTimeout {
        visibility_timestamp: SystemTime,
    },
    /// Re-dispatch an activity after a backoff interval.
    RetryTimer {
        visibility_timestamp: SystemTime,
        /// Activity schedule event id.
        event_id: i64,
        attempt: i64,
    },
    /// Delete a closed execution once its retention window passes.
    DeleteHistoryEvent {
        visibility_timestamp: SystemTime,
    },
}

impl TimerTask {
    pub fn visibility_timestamp(&self) -> SystemTime {
        match self {
            TimerTask::UserTimer {
                visibility_timestamp,
                ..
            }
            | TimerTask::ActivityTimeout {
                visibility_timestamp,
                ..
            }
            | TimerTask::DecisionTimeout {
                visibility_timestamp,
                ..
            }
            | TimerTask::WorkflowTimeout {
                visibility_timestamp,
            }
            | TimerTask::RetryTimer {
                visibility_timestamp,
                ..
            }
            | TimerTask::DeleteHistoryEvent {
                visibility_timestamp,
            } => *visibility_timestamp,
        }
    }

    pub fn task_type(&self) -> TimerTaskType {
        match self {
            TimerTask::UserTimer { .. } => TimerTaskType::UserTimer,
            TimerTask::ActivityTimeout { .. } => TimerTaskType::ActivityTimeout,
            TimerTask::DecisionTimeout { .. } => TimerTaskType::DecisionTimeout,
            TimerTask::WorkflowTimeout { .. } => TimerTaskType::WorkflowTimeout,
            TimerTask::RetryTimer { .. } => TimerTaskType::RetryTimer,
            TimerTask::DeleteHistoryEvent { .. } => TimerTaskType::DeleteHistoryEvent,
        }
    }

    /// Timeout kind, for the task types that carry one.
    pub fn timeout_kind(&self) -> Option<TimeoutKind> {
        match self {
            TimerTask::ActivityTimeout { timeout_kind, .. }
            | TimerTask::DecisionTimeout { timeout_kind, .. } => Some(*timeout_kind),
            _ => None,
        }
    }
}

/// A new transfer task to persist as part of a workflow update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransferTask {
    /// Deliver a decision task to a workflow worker.
    DecisionTask {
        domain_id: DomainId,
        task_list: String,
        schedule_id: i64,
    },
    /// Remove a closed execution and its history.
    DeleteExecution,
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
