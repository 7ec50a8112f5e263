// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction so timer-driven code can be tested without real sleeps.
//!
//! Timer tasks carry wall-clock visibility timestamps, so the clock deals in
//! `SystemTime` rather than `Instant`. `FakeClock::advance` wakes every
//! pending `sleep_until`, which lets tests drive virtual time forward
//! deterministically.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tokio::sync::Notify;

/// Time source used by the timer gate and the shard's virtual clocks.
#[async_trait]
pub trait Clock: Clone + Send + Sync + 'static {
    /// Current time.
    fn now(&self) -> SystemTime;

    /// Sleep until `deadline`. Returns immediately if the deadline has
    /// already passed.
    async fn sleep_until(&self, deadline: SystemTime);
}

/// Production clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    async fn sleep_until(&self, deadline: SystemTime) {
        if let Ok(remaining) = deadline.duration_since(SystemTime::now()) {
            tokio::time::sleep(remaining).await;
        }
    }
}

/// Manually-advanced clock for tests.
#[derive(Debug, Clone)]
pub struct FakeClock {
    inner: Arc<FakeClockInner>,
}

#[derive(Debug)]
struct FakeClockInner {
    now: Mutex<SystemTime>,
    changed: Notify,
}

impl FakeClock {
    /// Create a clock pinned at the unix epoch.
    pub fn new() -> Self {
        Self::at(SystemTime::UNIX_EPOCH)
    }

    /// Create a clock pinned at `start`.
    pub fn at(start: SystemTime) -> Self {
        Self {
            inner: Arc::new(FakeClockInner {
                now: Mutex::new(start),
                changed: Notify::new(),
            }),
        }
    }

    /// Move the clock forward, waking any pending sleepers whose deadline
    /// is now reached.
    pub fn advance(&self, by: Duration) {
        {
            let mut now = self.inner.now.lock().unwrap_or_else(|e| e.into_inner());
            *now += by;
        }
        self.inner.changed.notify_waiters();
    }

    /// Set the clock to an absolute time. Never moves backwards.
    pub fn set(&self, to: SystemTime) {
        {
            let mut now = self.inner.now.lock().unwrap_or_else(|e| e.into_inner());
            if to > *now {
                *now = to;
            }
        }
        self.inner.changed.notify_waiters();
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn now(&self) -> SystemTime {
        *self.inner.now.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn sleep_until(&self, deadline: SystemTime) {
        loop {
            // Register interest before the time check; `notify_waiters` only
            // wakes already-registered waiters, so enable() must run before
            // the deadline comparison or an advance could be lost.
            let mut changed = std::pin::pin!(self.inner.changed.notified());
            changed.as_mut().enable();
            if self.now() >= deadline {
                return;
            }
            changed.await;
        }
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
