// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pending user-timer record held in mutable state.

use crate::id::TimerId;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// State of one pending user timer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerInfo {
    pub timer_id: TimerId,
    /// Event id of the `TimerStarted` event.
    pub started_id: i64,
    /// Virtual time at which the timer fires.
    pub expiry: SystemTime,
    /// Whether a persisted timer task already covers this timer. Task ids
    /// are assigned by the store at commit, so creation is tracked as a flag.
    pub task_created: bool,
}
