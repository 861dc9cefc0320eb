//! Breaker state machine.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: action assumed down, calls fail fast
//! - HalfOpen: a bounded number of trial calls probe for recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: trip predicate holds (default consecutive_failures >= threshold)
//! Closed → Closed: closed window elapsed, counters swept
//! Open → HalfOpen: open deadline elapsed
//! HalfOpen → Closed: trial call succeeds
//! HalfOpen → Open: trial call fails
//! ```
//!
//! `Machine` is plain data. It is only ever touched under the breaker's
//! mutex and never runs caller code, so every method here is synchronous and
//! side-effect free apart from `self`.
//!
//! Every counter reset (transition or closed-window sweep) starts a new
//! generation. An outcome only counts against the generation that admitted
//! it, so counters always satisfy
//! `requests == total_successes + total_failures` once no calls are in flight.

use std::fmt;
use std::time::Instant;

use serde::Serialize;

use crate::resilience::options::Settings;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    Closed,
    Open,
    HalfOpen,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Closed => "closed",
            State::Open => "open",
            State::HalfOpen => "half_open",
        }
    }

    /// Gauge encoding: 0 closed, 1 half-open, 2 open.
    pub fn as_gauge(&self) -> f64 {
        match self {
            State::Closed => 0.0,
            State::HalfOpen => 1.0,
            State::Open => 2.0,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome tallies since the last reset.
///
/// Exactly one of the consecutive counters is non-zero after any recorded
/// outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub requests: u32,
    pub total_successes: u32,
    pub total_failures: u32,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
}

impl Counts {
    /// Build counts in field order: requests, total successes, total failures,
    /// consecutive successes, consecutive failures.
    pub const fn new(
        requests: u32,
        total_successes: u32,
        total_failures: u32,
        consecutive_successes: u32,
        consecutive_failures: u32,
    ) -> Self {
        Self {
            requests,
            total_successes,
            total_failures,
            consecutive_successes,
            consecutive_failures,
        }
    }

    fn on_request(&mut self) {
        self.requests = self.requests.saturating_add(1);
    }

    fn on_success(&mut self) {
        self.total_successes = self.total_successes.saturating_add(1);
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        self.consecutive_failures = 0;
    }

    fn on_failure(&mut self) {
        self.total_failures = self.total_failures.saturating_add(1);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_successes = 0;
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub state: State,
    pub counts: Counts,
    /// Open: when trials become allowed (`None` means open indefinitely).
    /// Closed: next window sweep, if sweeping is enabled. HalfOpen: always `None`.
    pub expires_at: Option<Instant>,
}

/// Something observable happened while holding the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Event {
    /// Closed counters were zeroed at the end of a window.
    Swept,
    Transition { from: State, to: State },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    /// Admitted under this generation; pass it back to `record`.
    Admitted(u64),
    RejectedOpen,
    RejectedTooManyRequests,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Success,
    Failure,
}

#[derive(Debug)]
pub(crate) struct Machine {
    pub(crate) state: State,
    pub(crate) counts: Counts,
    pub(crate) expires_at: Option<Instant>,
    generation: u64,
}

impl Machine {
    pub(crate) fn new(now: Instant, settings: &Settings) -> Self {
        Self {
            state: State::Closed,
            counts: Counts::default(),
            expires_at: next_window(now, settings),
            generation: 0,
        }
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state,
            counts: self.counts,
            expires_at: self.expires_at,
        }
    }

    /// Apply any time-driven change that is due at `now`.
    pub(crate) fn refresh(&mut self, now: Instant, settings: &Settings) -> Option<Event> {
        let due = matches!(self.expires_at, Some(deadline) if deadline <= now);
        if !due {
            return None;
        }

        match self.state {
            State::Open => Some(self.move_to(State::HalfOpen, now, settings)),
            State::Closed => {
                self.counts.clear();
                self.expires_at = next_window(now, settings);
                self.generation = self.generation.wrapping_add(1);
                Some(Event::Swept)
            }
            State::HalfOpen => None,
        }
    }

    /// Decide whether a call may run, counting it if so.
    pub(crate) fn admit(&mut self, settings: &Settings) -> Admission {
        match self.state {
            State::Open => Admission::RejectedOpen,
            State::HalfOpen if self.counts.requests >= settings.half_open_max_actions => {
                Admission::RejectedTooManyRequests
            }
            State::Closed | State::HalfOpen => {
                self.counts.on_request();
                Admission::Admitted(self.generation)
            }
        }
    }

    /// Fold an admitted call's outcome into the current state.
    ///
    /// Outcomes from an earlier generation are dropped: their request was
    /// cleared by the reset, and a call admitted while closed must not act as
    /// a half-open trial. Counters in `Open` stay at zero.
    pub(crate) fn record<F>(
        &mut self,
        generation: u64,
        outcome: Outcome,
        now: Instant,
        settings: &Settings,
        should_open: F,
    ) -> Option<Event>
    where
        F: Fn(&Counts) -> bool,
    {
        if generation != self.generation {
            return None;
        }
        match (self.state, outcome) {
            (State::Open, _) => None,
            (State::Closed, Outcome::Success) => {
                self.counts.on_success();
                None
            }
            (State::Closed, Outcome::Failure) => {
                self.counts.on_failure();
                if should_open(&self.counts) {
                    Some(self.move_to(State::Open, now, settings))
                } else {
                    None
                }
            }
            (State::HalfOpen, Outcome::Success) => {
                self.counts.on_success();
                Some(self.move_to(State::Closed, now, settings))
            }
            (State::HalfOpen, Outcome::Failure) => {
                self.counts.on_failure();
                Some(self.move_to(State::Open, now, settings))
            }
        }
    }

    fn move_to(&mut self, to: State, now: Instant, settings: &Settings) -> Event {
        let from = self.state;
        self.state = to;
        self.counts.clear();
        self.generation = self.generation.wrapping_add(1);
        self.expires_at = match to {
            State::Closed => next_window(now, settings),
            State::Open => now.checked_add(settings.open_expiry_interval),
            State::HalfOpen => None,
        };
        Event::Transition { from, to }
    }
}

fn next_window(now: Instant, settings: &Settings) -> Option<Instant> {
    if settings.closed_expiry_interval.is_zero() {
        None
    } else {
        now.checked_add(settings.closed_expiry_interval)
    }
}
