// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for the active timer processor, split per task type.

mod activity_timeout;
mod decision_timeout;
mod dispatch;
mod retry_timer;
mod user_timer;
mod workflow_timeout;

pub(crate) use crate::error::EngineError;
pub(crate) use crate::queue::base::TimerTaskHandler;
pub(crate) use crate::shard::ShardContext;
pub(crate) use crate::test_support::*;
pub(crate) use std::time::Duration;
pub(crate) use tempo_core::{
    HistoryEvent, TimeoutKind, TimerId, TimerTask, TimerTaskInfo, TimerTaskType, TransferTask,
};

/// Seed the store with `state` under the default execution key.
pub(crate) fn seed(h: &TestHarness, state: FakeMutableState) {
    h.store.put(execution_key(), state);
}

/// The canonical (committed) state of the default execution.
pub(crate) fn stored_state(h: &TestHarness) -> FakeMutableState {
    h.store
        .mutable_state(&execution_key())
        .expect("execution must exist")
}

pub(crate) async fn process(h: &TestHarness, task: &TimerTaskInfo) -> Result<(), EngineError> {
    h.processor.process(task).await
}
