// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Decides whether a timer task belongs to this processor.
//!
//! Rejected tasks are not errors: the caller acks them immediately so the
//! cursor keeps advancing through streams that mix local and foreign work.

use crate::domain::DomainCache;
use crate::error::EngineError;
use std::sync::Arc;
use tempo_core::{DomainId, TimerTaskInfo};

/// Pure accept/reject decision over timer tasks.
pub trait TimerTaskFilter: Send + Sync {
    fn accept(&self, task: &TimerTaskInfo) -> Result<bool, EngineError>;
}

/// Accepts tasks whose domain is active in this cluster.
///
/// A domain that no longer resolves is treated as active here so its
/// leftover timers can drain instead of wedging the cursor.
pub struct ActiveTaskFilter {
    pub domain_cache: Arc<dyn DomainCache>,
    pub current_cluster: String,
}

impl TimerTaskFilter for ActiveTaskFilter {
    fn accept(&self, task: &TimerTaskInfo) -> Result<bool, EngineError> {
        match self.domain_cache.domain_by_id(&task.domain_id) {
            Ok(entry) => Ok(entry.is_active_in(&self.current_cluster)),
            Err(EngineError::EntityNotExists(_)) => Ok(true),
            Err(err) => Err(err),
        }
    }
}

/// Accepts only tasks of the domain being failed over.
pub struct FailoverTaskFilter {
    pub domain_id: DomainId,
}

impl TimerTaskFilter for FailoverTaskFilter {
    fn accept(&self, task: &TimerTaskInfo) -> Result<bool, EngineError> {
        Ok(task.domain_id == self.domain_id)
    }
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
