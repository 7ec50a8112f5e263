// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pending-decision record held in mutable state.

use serde::{Deserialize, Serialize};

/// State of the currently scheduled decision task, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionInfo {
    /// Event id of the `DecisionTaskScheduled` event.
    pub schedule_id: i64,
    /// Event id of the `DecisionTaskStarted` event; `None` until a worker
    /// picks the decision up.
    pub started_id: Option<i64>,
    pub attempt: i64,
    /// Domain failover version at scheduling time.
    pub version: i64,
    /// Task list the decision was scheduled on (may be a sticky list).
    pub task_list: String,
}

impl DecisionInfo {
    pub fn is_started(&self) -> bool {
        self.started_id.is_some()
    }
}
