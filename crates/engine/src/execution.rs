// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-execution contexts: the cache, the lock, and the optimistic commit.
//!
//! Handlers for the same execution serialize through an async mutex held by
//! an [`ExecutionGuard`]. The guard's `release(failed)` is explicit and
//! idempotent; releasing with `failed = true` (or dropping an unreleased
//! guard) discards the cached mutable state so the next load starts fresh.

use crate::error::EngineError;
use crate::mutable_state::MutableState;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tempo_core::{ExecutionKey, TimerSequenceId, TimerTask, TransferTask};
use tokio::sync::OwnedMutexGuard;

/// One atomic update of an execution.
#[derive(Debug, Clone)]
pub struct UpdateExecutionRequest {
    pub transfer_tasks: Vec<TransferTask>,
    pub timer_tasks: Vec<TimerTask>,
    /// Fired timer task to remove alongside the update, if any.
    pub clear_timer_task: Option<TimerSequenceId>,
    /// Expected next-event-id; the store rejects the write with
    /// [`EngineError::Conflict`] if another writer moved it.
    pub condition: i64,
    pub transaction_id: i64,
}

/// Persistence contract for workflow executions.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Load the execution's mutable state. Unknown executions surface
    /// [`EngineError::EntityNotExists`].
    async fn load_mutable_state(
        &self,
        key: &ExecutionKey,
    ) -> Result<Box<dyn MutableState>, EngineError>;

    /// Commit `state` plus the request's tasks, conditioned on
    /// `request.condition`.
    async fn update_execution(
        &self,
        key: &ExecutionKey,
        state: &dyn MutableState,
        request: UpdateExecutionRequest,
    ) -> Result<(), EngineError>;

    /// Remove a closed execution. Idempotent.
    async fn delete_execution(&self, key: &ExecutionKey) -> Result<(), EngineError>;
}

/// Cached view of one execution, protected by the per-execution lock.
pub struct ExecutionContext {
    key: ExecutionKey,
    store: Arc<dyn ExecutionStore>,
    state: Option<Box<dyn MutableState>>,
    condition: i64,
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("key", &self.key)
            .field("condition", &self.condition)
            .field("state_loaded", &self.state.is_some())
            .finish()
    }
}

impl ExecutionContext {
    fn new(key: ExecutionKey, store: Arc<dyn ExecutionStore>) -> Self {
        Self {
            key,
            store,
            state: None,
            condition: 0,
        }
    }

    pub fn key(&self) -> &ExecutionKey {
        &self.key
    }

    /// Load mutable state, reusing the cached copy when present.
    pub async fn load(&mut self) -> Result<&mut (dyn MutableState + '_), EngineError> {
        if self.state.is_none() {
            let state = self.store.load_mutable_state(&self.key).await?;
            self.condition = state.next_event_id();
            self.state = Some(state);
        }
        self.state
            .as_deref_mut()
            .map(|s| s as &mut (dyn MutableState + '_))
            .ok_or_else(|| EngineError::Internal("mutable state missing after load".into()))
    }

    /// The loaded mutable state. Errors if `load` has not run.
    pub fn state_mut(&mut self) -> Result<&mut (dyn MutableState + '_), EngineError> {
        self.state
            .as_deref_mut()
            .map(|s| s as &mut (dyn MutableState + '_))
            .ok_or_else(|| EngineError::Internal("mutable state not loaded".into()))
    }

    /// Drop the cached state so the next load reads from the store.
    pub fn clear(&mut self) {
        self.state = None;
    }

    /// Commit the cached state under optimistic concurrency. Any error
    /// invalidates the cache, so a conflict retry reloads fresh state.
    pub async fn update(
        &mut self,
        transfer_tasks: Vec<TransferTask>,
        timer_tasks: Vec<TimerTask>,
        clear_timer_task: Option<TimerSequenceId>,
        transaction_id: i64,
    ) -> Result<(), EngineError> {
        let condition = self.condition;
        let state = self
            .state
            .as_deref()
            .ok_or_else(|| EngineError::Internal("update without loaded state".into()))?;
        let next_condition = state.next_event_id();
        let result = self
            .store
            .update_execution(
                &self.key,
                state,
                UpdateExecutionRequest {
                    transfer_tasks,
                    timer_tasks,
                    clear_timer_task,
                    condition,
                    transaction_id,
                },
            )
            .await;
        match result {
            Ok(()) => {
                self.condition = next_condition;
                Ok(())
            }
            Err(err) => {
                self.clear();
                Err(err)
            }
        }
    }
}

struct CacheSlot {
    context: Arc<tokio::sync::Mutex<ExecutionContext>>,
    pins: usize,
}

const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Keyed map of execution contexts with per-execution locking.
///
/// Contexts stay cached after a clean release so the next task for the same
/// execution reuses the loaded state. Slots are pinned while any guard
/// references them; once the map grows past capacity, unpinned slots are
/// evicted (pinned ones never are, so two guards for the same key always
/// contend on the same lock).
pub struct WorkflowCache {
    store: Arc<dyn ExecutionStore>,
    capacity: usize,
    slots: Mutex<HashMap<ExecutionKey, CacheSlot>>,
}

impl WorkflowCache {
    pub fn new(store: Arc<dyn ExecutionStore>) -> Arc<Self> {
        Self::with_capacity(store, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(store: Arc<dyn ExecutionStore>, capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            store,
            capacity: capacity.max(1),
            slots: Mutex::new(HashMap::new()),
        })
    }

    pub fn store(&self) -> Arc<dyn ExecutionStore> {
        Arc::clone(&self.store)
    }

    /// Acquire the per-execution lock, creating the context on first use.
    pub async fn acquire(self: &Arc<Self>, key: &ExecutionKey) -> ExecutionGuard {
        let context = {
            let mut slots = self.slots.lock();
            let slot = slots.entry(key.clone()).or_insert_with(|| CacheSlot {
                context: Arc::new(tokio::sync::Mutex::new(ExecutionContext::new(
                    key.clone(),
                    Arc::clone(&self.store),
                ))),
                pins: 0,
            });
            slot.pins += 1;
            let context = Arc::clone(&slot.context);
            Self::evict_idle(&mut slots, self.capacity);
            context
        };
        let permit = context.lock_owned().await;
        ExecutionGuard {
            cache: Arc::clone(self),
            key: key.clone(),
            permit: Some(permit),
        }
    }

    fn evict_idle(slots: &mut HashMap<ExecutionKey, CacheSlot>, capacity: usize) {
        if slots.len() <= capacity {
            return;
        }
        let excess = slots.len() - capacity;
        let idle: Vec<ExecutionKey> = slots
            .iter()
            .filter(|(_, slot)| slot.pins == 0)
            .map(|(key, _)| key.clone())
            .take(excess)
            .collect();
        for key in idle {
            slots.remove(&key);
        }
    }

    fn unpin(&self, key: &ExecutionKey) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(key) {
            slot.pins = slot.pins.saturating_sub(1);
        }
    }

    #[cfg(test)]
    pub(crate) fn cached_len(&self) -> usize {
        self.slots.lock().len()
    }
}

/// Holder of the per-execution lock.
///
/// `release` must run on every exit path and is a no-op the second time.
/// Dropping an unreleased guard behaves like `release(true)`: the lock is
/// freed and the possibly-dirty cached state is discarded.
pub struct ExecutionGuard {
    cache: Arc<WorkflowCache>,
    key: ExecutionKey,
    permit: Option<OwnedMutexGuard<ExecutionContext>>,
}

impl ExecutionGuard {
    /// The locked context. Errors once the guard has been released.
    pub fn context_mut(&mut self) -> Result<&mut ExecutionContext, EngineError> {
        self.permit
            .as_deref_mut()
            .ok_or_else(|| EngineError::Internal("execution context used after release".into()))
    }

    /// Release the lock. With `failed = true` the cached mutable state is
    /// discarded instead of being kept for the next acquirer.
    pub fn release(&mut self, failed: bool) {
        if let Some(mut permit) = self.permit.take() {
            if failed {
                permit.clear();
            }
            drop(permit);
            self.cache.unpin(&self.key);
        }
    }
}

impl Drop for ExecutionGuard {
    fn drop(&mut self) {
        self.release(true);
    }
}

#[cfg(test)]
#[path = "execution_tests.rs"]
mod tests;
