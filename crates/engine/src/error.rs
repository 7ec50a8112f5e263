// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for timer-queue processing

use thiserror::Error;

/// Errors surfaced by timer-queue components and their collaborators.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Optimistic concurrency lost: another writer updated the execution
    /// between our load and our commit. Retriable after a reload.
    #[error("workflow update conflict")]
    Conflict,

    /// A handler exhausted its conditional-retry budget.
    #[error("max attempts exceeded")]
    MaxAttemptsExceeded,

    /// The shard was reassigned to another owner; this processor must stop.
    #[error("shard ownership lost: {0}")]
    ShardOwnershipLost(String),

    /// The referenced entity (execution, domain) no longer exists.
    #[error("entity not exists: {0}")]
    EntityNotExists(String),

    /// Internal inconsistency an operator must investigate.
    #[error("internal error: {0}")]
    Internal(String),

    /// Persistence failure other than the cases above.
    #[error("store error: {0}")]
    Store(String),

    /// RPC failure talking to a remote service (e.g. matching).
    #[error("remote call failed: {0}")]
    Remote(String),
}

impl EngineError {
    /// Whether retrying the whole operation can plausibly succeed.
    /// Conflicts are excluded: they have their own reload-and-retry loop.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Store(_) | EngineError::Remote(_))
    }
}
