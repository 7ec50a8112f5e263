// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Domain metadata lookup and the task-version check.

use crate::error::EngineError;
use crate::shard::ShardContext;
use std::sync::Arc;
use tempo_core::{DomainId, TimerTaskInfo};

/// Resolved metadata for a domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainEntry {
    pub id: DomainId,
    pub name: String,
    /// Whether the domain is replicated across clusters.
    pub is_global: bool,
    /// Cluster currently allowed to mutate the domain. Meaningful for
    /// global domains; local domains are active wherever they live.
    pub active_cluster: String,
}

impl DomainEntry {
    /// Is `cluster` allowed to act on this domain right now?
    pub fn is_active_in(&self, cluster: &str) -> bool {
        !self.is_global || self.active_cluster == cluster
    }
}

/// Read-through cache over the domain metadata service.
///
/// Unknown domains surface [`EngineError::EntityNotExists`]; callers decide
/// whether that is benign (the active task filter treats it as "active
/// here" so deleted domains can drain their timers).
pub trait DomainCache: Send + Sync {
    fn domain_by_id(&self, id: &DomainId) -> Result<Arc<DomainEntry>, EngineError>;
    fn domain_by_name(&self, name: &str) -> Result<Arc<DomainEntry>, EngineError>;
}

/// Check whether a timer task's creation version still matches the version
/// recorded in mutable state.
///
/// Local domains always pass. For global domains a mismatch means the task
/// was written by a different failover incarnation and must be dropped
/// (acked without acting).
pub fn verify_task_version(
    shard: &dyn ShardContext,
    domain_id: &DomainId,
    state_version: i64,
    task: &TimerTaskInfo,
) -> Result<bool, EngineError> {
    let entry = shard.domain_cache().domain_by_id(domain_id)?;
    if !entry.is_global {
        return Ok(true);
    }
    Ok(state_version == task.version)
}

#[cfg(test)]
#[path = "domain_tests.rs"]
mod tests;
