// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tempo-engine: shard timer-queue processing.
//!
//! Each shard owns a stream of persisted timer tasks. The components here
//! fire those tasks in virtual-time order and apply the resulting mutations
//! to workflow state under optimistic concurrency: a timer gate schedules the
//! next wake-up, an ack manager pages due tasks and tracks completion, and
//! the active processor dispatches each task to its per-type handler.

pub mod config;
pub mod domain;
pub mod error;
pub mod execution;
pub mod matching;
pub mod metric_definitions;
pub mod mutable_state;
pub mod queue;
pub mod shard;
pub mod timer_builder;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::TimerQueueConfig;
pub use domain::{verify_task_version, DomainCache, DomainEntry};
pub use error::EngineError;
pub use execution::{
    ExecutionContext, ExecutionGuard, ExecutionStore, UpdateExecutionRequest, WorkflowCache,
};
pub use matching::{AddActivityTaskRequest, MatchingClient};
pub use mutable_state::{HistoryEngine, MutableState};
pub use queue::active::ActiveTimerProcessor;
pub use queue::ack::{TimerQueueAckManager, TimerTaskBatch};
pub use queue::base::{TimerQueueProcessorBase, TimerTaskHandler};
pub use queue::filter::{ActiveTaskFilter, FailoverTaskFilter, TimerTaskFilter};
pub use queue::gate::TimerGate;
pub use shard::{ShardContext, TimerTaskPage};
pub use timer_builder::{TimerBuilder, TimerCandidate, TimerTarget};
