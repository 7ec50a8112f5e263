// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Matching-service client contract (activity dispatch).

use crate::error::EngineError;
use async_trait::async_trait;
use std::time::Duration;
use tempo_core::{DomainId, WorkflowExecution};

/// Request to enqueue an activity task on a task list.
#[derive(Debug, Clone, PartialEq)]
pub struct AddActivityTaskRequest {
    /// Domain the activity runs in (differs from the source on
    /// cross-domain activities).
    pub target_domain_id: DomainId,
    pub source_domain_id: DomainId,
    pub execution: WorkflowExecution,
    pub task_list: String,
    pub schedule_id: i64,
    pub schedule_to_start_timeout: Duration,
}

/// Client for the matching service.
///
/// `add_activity_task` is idempotent on the service side, keyed by
/// `(workflow, run, schedule_id, attempt)`; re-sending on replay is safe.
#[async_trait]
pub trait MatchingClient: Send + Sync {
    async fn add_activity_task(&self, request: AddActivityTaskRequest)
        -> Result<(), EngineError>;
}
