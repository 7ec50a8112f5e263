// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Metric names emitted by the timer queue, plus their registration hook.
//!
//! Counters carrying a `type` label are scoped per timer-task type; the
//! timeout counter additionally carries the timeout `kind`.

use metrics::{describe_counter, describe_histogram, Unit};

/// Tasks handed to a typed handler, labelled by task type.
pub const TIMER_TASK_REQUESTS: &str = "tempo.timer_queue.task_requests.total";
/// Handler failures that will lead to redelivery, labelled by task type.
pub const TIMER_TASK_FAILURES: &str = "tempo.timer_queue.task_failures.total";
/// Wall-clock handler latency in seconds, labelled by task type.
pub const TIMER_TASK_LATENCY: &str = "tempo.timer_queue.task_latency.seconds";
/// Timeout events recorded, labelled by timeout kind.
pub const TIMER_TIMEOUTS: &str = "tempo.timer_queue.timeouts.total";
/// Cached mutable state found behind the task stream and discarded.
pub const STALE_MUTABLE_STATE: &str = "tempo.timer_queue.stale_mutable_state.total";
/// Calls into `notify_new_timers` that carried at least one task.
pub const NEW_TIMER_NOTIFICATIONS: &str = "tempo.timer_queue.new_timer_notifications.total";
/// Timer tasks fired (handed to the worker pool) by the pump loop.
pub const TIMER_TASKS_FIRED: &str = "tempo.timer_queue.tasks_fired.total";

/// Register metric descriptions with the installed recorder. Call once at
/// process start; safe to call again.
pub fn describe_metrics() {
    describe_counter!(
        TIMER_TASK_REQUESTS,
        Unit::Count,
        "Timer tasks handed to a typed handler"
    );
    describe_counter!(
        TIMER_TASK_FAILURES,
        Unit::Count,
        "Timer-task handler failures (task will be redelivered)"
    );
    describe_histogram!(
        TIMER_TASK_LATENCY,
        Unit::Seconds,
        "Timer-task handler latency"
    );
    describe_counter!(
        TIMER_TIMEOUTS,
        Unit::Count,
        "Timeout events recorded, by timeout kind"
    );
    describe_counter!(
        STALE_MUTABLE_STATE,
        Unit::Count,
        "Stale cached mutable state discarded and reloaded"
    );
    describe_counter!(
        NEW_TIMER_NOTIFICATIONS,
        Unit::Count,
        "Notifications about newly persisted timer tasks"
    );
    describe_counter!(
        TIMER_TASKS_FIRED,
        Unit::Count,
        "Timer tasks fired by the dispatch loop"
    );
}
