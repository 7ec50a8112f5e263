// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-slot earliest-fire-time scheduling primitive.
//!
//! The gate holds at most one armed fire time. While a future time is armed,
//! only an earlier time may replace it; arming a time at or before "now"
//! makes the gate immediately ready. Waiting consumes the armed slot, after
//! which any time may be armed again, letting the dispatch loop push the
//! next wake-up later once it has drained the current backlog.

use parking_lot::Mutex;
use std::time::{Duration, SystemTime};
use tempo_core::Clock;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy)]
struct GateState {
    fire_time: Option<SystemTime>,
    closed: bool,
}

/// Single-slot timer gate. Pure in-memory; no failure modes.
pub struct TimerGate<C: Clock> {
    clock: C,
    state: Mutex<GateState>,
    changed: Notify,
}

impl<C: Clock> TimerGate<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            state: Mutex::new(GateState {
                fire_time: None,
                closed: false,
            }),
            changed: Notify::new(),
        }
    }

    /// Arm the gate for `t`. While a fire time is already armed, the earlier
    /// of the two wins; an idle gate accepts any time. Times at or before
    /// the clock's now make the gate ready immediately. No-op once closed.
    pub fn update(&self, t: SystemTime) {
        {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            match state.fire_time {
                Some(armed) if t >= armed => return,
                _ => state.fire_time = Some(t),
            }
        }
        self.changed.notify_waiters();
    }

    /// Make the gate ready immediately.
    pub fn fire_now(&self) {
        self.update(SystemTime::UNIX_EPOCH);
    }

    /// Arm the gate for `interval` from now.
    pub fn fire_in(&self, interval: Duration) {
        self.update(self.clock.now() + interval);
    }

    /// The currently armed fire time, if any.
    pub fn fire_time(&self) -> Option<SystemTime> {
        self.state.lock().fire_time
    }

    /// Permanently close the gate; pending and future waits resolve `false`
    /// and further updates are ignored.
    pub fn close(&self) {
        {
            let mut state = self.state.lock();
            state.closed = true;
        }
        self.changed.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Wait until the armed time is due, consuming it. Resolves `true` on
    /// fire, `false` once the gate is closed. The gate fires at least once
    /// at or after each armed target time.
    pub async fn fired(&self) -> bool {
        loop {
            // Register for change notifications before inspecting state;
            // `notify_waiters` only reaches registered waiters, so enable()
            // must precede the state read or an update could be lost.
            let mut changed = std::pin::pin!(self.changed.notified());
            changed.as_mut().enable();
            let snapshot = *self.state.lock();
            if snapshot.closed {
                return false;
            }
            match snapshot.fire_time {
                Some(t) if t <= self.clock.now() => {
                    let mut state = self.state.lock();
                    if state.closed {
                        return false;
                    }
                    // Re-check under the lock: an update may have raced the
                    // snapshot and moved the fire time.
                    if let Some(armed) = state.fire_time {
                        if armed <= self.clock.now() {
                            state.fire_time = None;
                            return true;
                        }
                    }
                }
                Some(t) => {
                    tokio::select! {
                        _ = &mut changed => {}
                        _ = self.clock.sleep_until(t) => {}
                    }
                }
                None => changed.await,
            }
        }
    }
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
