// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Derives the ordered list of pending timers from mutable state.
//!
//! The timer stream persists only the *next* task per execution concern; the
//! full picture of what should fire, and when, is recomputed here from the
//! pending user timers and activities. Handlers walk the returned candidates
//! in fire order: expired heads produce events or retries, and the first
//! unexpired head without a persisted task gets one materialised.

use std::cmp::Ordering;
use std::time::{Duration, SystemTime};
use tempo_core::{ActivityInfo, TimeoutKind, TimerId, TimerTask};

use crate::mutable_state::MutableState;

/// What a pending timer belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum TimerTarget {
    UserTimer {
        timer_id: TimerId,
        /// Event id of the `TimerStarted` event.
        started_id: i64,
    },
    Activity {
        /// Activity schedule event id.
        schedule_id: i64,
        timeout_kind: TimeoutKind,
    },
}

/// One pending timer, derived from mutable state.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerCandidate {
    pub target: TimerTarget,
    /// Attempt the timer applies to (0 for user timers).
    pub attempt: i64,
    /// Virtual fire time.
    pub expiry: SystemTime,
    /// Whether a persisted timer task already covers this candidate.
    pub task_created: bool,
}

/// Stateless derivation of timer candidates and their persisted form.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimerBuilder;

impl TimerBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Pending user timers in ascending fire order.
    pub fn user_timers(&self, ms: &dyn MutableState) -> Vec<TimerCandidate> {
        let mut candidates: Vec<TimerCandidate> = ms
            .pending_user_timers()
            .into_iter()
            .map(|ti| TimerCandidate {
                target: TimerTarget::UserTimer {
                    timer_id: ti.timer_id.clone(),
                    started_id: ti.started_id,
                },
                attempt: 0,
                expiry: ti.expiry,
                task_created: ti.task_created,
            })
            .collect();
        candidates.sort_by(cmp_candidates);
        candidates
    }

    /// Pending activity timeouts in ascending fire order. Each pending
    /// activity contributes one candidate per timeout applicable to its
    /// current lifecycle stage.
    pub fn activity_timers(&self, ms: &dyn MutableState) -> Vec<TimerCandidate> {
        let mut candidates = Vec::new();
        for ai in ms.pending_activities() {
            let schedule_to_close = ai.scheduled_time + ai.schedule_to_close_timeout;
            if ai.started_id.is_some() {
                let started = ai.started_time.unwrap_or(ai.scheduled_time);
                candidates.push(activity_candidate(
                    &ai,
                    TimeoutKind::StartToClose,
                    started + ai.start_to_close_timeout,
                ));
                if let Some(heartbeat_timeout) = ai.heartbeat_timeout {
                    let baseline = ai.last_heartbeat.unwrap_or(started);
                    candidates.push(activity_candidate(
                        &ai,
                        TimeoutKind::Heartbeat,
                        baseline + heartbeat_timeout,
                    ));
                }
            } else {
                candidates.push(activity_candidate(
                    &ai,
                    TimeoutKind::ScheduleToStart,
                    ai.scheduled_time + ai.schedule_to_start_timeout,
                ));
            }
            candidates.push(activity_candidate(
                &ai,
                TimeoutKind::ScheduleToClose,
                schedule_to_close,
            ));
        }
        candidates.sort_by(cmp_candidates);
        candidates
    }

    /// Whether a candidate is due at `reference` (the processed task's
    /// visibility timestamp, not wall clock).
    pub fn is_expired(&self, candidate: &TimerCandidate, reference: SystemTime) -> bool {
        candidate.expiry <= reference
    }

    /// Persisted form of a candidate.
    pub fn new_timer_task(&self, candidate: &TimerCandidate) -> TimerTask {
        match &candidate.target {
            TimerTarget::UserTimer { started_id, .. } => TimerTask::UserTimer {
                visibility_timestamp: candidate.expiry,
                event_id: *started_id,
            },
            TimerTarget::Activity {
                schedule_id,
                timeout_kind,
            } => TimerTask::ActivityTimeout {
                visibility_timestamp: candidate.expiry,
                timeout_kind: *timeout_kind,
                event_id: *schedule_id,
                attempt: candidate.attempt,
            },
        }
    }

    /// Timer guarding pickup of a sticky decision. Fires `timeout` after
    /// `now` (the shard's virtual time at scheduling).
    pub fn sticky_decision_timeout_task(
        &self,
        schedule_id: i64,
        attempt: i64,
        timeout: Duration,
        now: SystemTime,
    ) -> TimerTask {
        TimerTask::DecisionTimeout {
            visibility_timestamp: now + timeout,
            timeout_kind: TimeoutKind::ScheduleToStart,
            event_id: schedule_id,
            attempt,
        }
    }
}

fn activity_candidate(
    ai: &ActivityInfo,
    timeout_kind: TimeoutKind,
    expiry: SystemTime,
) -> TimerCandidate {
    TimerCandidate {
        target: TimerTarget::Activity {
            schedule_id: ai.schedule_id,
            timeout_kind,
        },
        attempt: ai.attempt,
        expiry,
        task_created: ai.timer_created(timeout_kind),
    }
}

fn cmp_candidates(a: &TimerCandidate, b: &TimerCandidate) -> Ordering {
    a.expiry.cmp(&b.expiry).then_with(|| match (&a.target, &b.target) {
        (
            TimerTarget::Activity { schedule_id: a, .. },
            TimerTarget::Activity { schedule_id: b, .. },
        ) => a.cmp(b),
        (
            TimerTarget::UserTimer { timer_id: a, .. },
            TimerTarget::UserTimer { timer_id: b, .. },
        ) => a.as_str().cmp(b.as_str()),
        _ => Ordering::Equal,
    })
}

#[cfg(test)]
#[path = "timer_builder_tests.rs"]
mod tests;
