//! Circuit breaker around a single protected action.
//!
//! # Call Flow
//! ```text
//! execute(ctx)
//!     → lock: refresh deadline-driven state, admit or reject
//!     → unlock: fire hooks, run action (may take arbitrarily long)
//!     → lock: record outcome, maybe transition
//!     → unlock: fire hooks, return action's result
//! ```
//!
//! # Design Decisions
//! - One breaker per protected action, state owned by the instance
//! - No timer task: deadlines are compared against the clock on each call
//! - Action and hooks never run while the lock is held
//! - Half-open concurrency bounded only by the admission counter

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::BreakerError;
use crate::observability::metrics;
use crate::resilience::clock::{Clock, SystemClock};
use crate::resilience::context::CallContext;
use crate::resilience::options::{
    boxed_action, Action, BreakerBuilder, RejectionHook, Settings, StateChangeHook, TripPredicate,
};
use crate::resilience::state::{Admission, Counts, Event, Machine, Outcome, Snapshot, State};

/// Call-protection state machine.
pub struct Breaker<E> {
    name: String,
    action: Action<E>,
    settings: Settings,
    on_rejection: Option<RejectionHook>,
    on_state_change: Option<StateChangeHook>,
    should_open: Option<TripPredicate>,
    clock: Arc<dyn Clock>,
    machine: Mutex<Machine>,
}

impl<E> Breaker<E>
where
    E: Send + 'static,
{
    /// Create a breaker with default settings.
    pub fn new<F, Fut>(action: F) -> Self
    where
        F: Fn(CallContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), E>> + Send + 'static,
    {
        Self::from_parts(
            "default".to_string(),
            boxed_action(action),
            Settings::default(),
            None,
            None,
            None,
            Arc::new(SystemClock),
        )
    }

    pub fn builder() -> BreakerBuilder<E> {
        BreakerBuilder::new()
    }

    pub(crate) fn from_parts(
        name: String,
        action: Action<E>,
        settings: Settings,
        on_rejection: Option<RejectionHook>,
        on_state_change: Option<StateChangeHook>,
        should_open: Option<TripPredicate>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let machine = Machine::new(clock.now(), &settings);
        metrics::record_state(&name, State::Closed);
        Self {
            name,
            action,
            settings,
            on_rejection,
            on_state_change,
            should_open,
            clock,
            machine: Mutex::new(machine),
        }
    }

    /// Run the action if the breaker allows it.
    pub async fn execute(&self, ctx: &CallContext) -> Result<(), BreakerError<E>> {
        let (refreshed, admission, state) = {
            let mut machine = self.lock();
            let refreshed = machine.refresh(self.clock.now(), &self.settings);
            let admission = machine.admit(&self.settings);
            (refreshed, admission, machine.state)
        };
        self.handle_event(ctx, refreshed);

        let generation = match admission {
            Admission::Admitted(generation) => generation,
            Admission::RejectedOpen => {
                tracing::debug!(
                    breaker = %self.name,
                    call_id = %ctx.id(),
                    %state,
                    "Call rejected: breaker open"
                );
                metrics::record_rejection(&self.name, "open");
                if let Some(hook) = &self.on_rejection {
                    hook(ctx);
                }
                return Err(BreakerError::Open);
            }
            Admission::RejectedTooManyRequests => {
                tracing::debug!(
                    breaker = %self.name,
                    call_id = %ctx.id(),
                    %state,
                    "Call rejected: half-open budget exhausted"
                );
                metrics::record_rejection(&self.name, "too_many_requests");
                return Err(BreakerError::TooManyRequests);
            }
        };

        let result = (self.action)(ctx.clone()).await;
        let outcome = if result.is_ok() { Outcome::Success } else { Outcome::Failure };
        metrics::record_call(&self.name, outcome == Outcome::Success);

        let recorded = {
            let mut machine = self.lock();
            let now = self.clock.now();
            match &self.should_open {
                Some(predicate) => {
                    machine.record(generation, outcome, now, &self.settings, |c| predicate(c))
                }
                None => {
                    let threshold = self.settings.consecutive_failure_threshold;
                    machine.record(generation, outcome, now, &self.settings, |c| {
                        c.consecutive_failures >= threshold
                    })
                }
            }
        };
        self.handle_event(ctx, recorded);

        result.map_err(BreakerError::Operation)
    }

    /// Current state, advancing an expired open deadline first.
    pub fn state(&self, ctx: &CallContext) -> State {
        self.snapshot(ctx).state
    }

    /// Current counters, under the same refresh rule as [`Breaker::state`].
    pub fn counts(&self, ctx: &CallContext) -> Counts {
        self.snapshot(ctx).counts
    }

    pub fn snapshot(&self, ctx: &CallContext) -> Snapshot {
        let (event, snapshot) = {
            let mut machine = self.lock();
            let event = machine.refresh(self.clock.now(), &self.settings);
            (event, machine.snapshot())
        };
        self.handle_event(ctx, event);
        snapshot
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn lock(&self) -> MutexGuard<'_, Machine> {
        // The critical section never runs caller code, so a poisoned lock
        // still guards consistent data.
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle_event(&self, ctx: &CallContext, event: Option<Event>) {
        match event {
            None => {}
            Some(Event::Swept) => {
                tracing::debug!(breaker = %self.name, "Closed window elapsed, counters reset");
            }
            Some(Event::Transition { from, to }) => {
                match to {
                    State::Open => tracing::warn!(
                        breaker = %self.name,
                        %from,
                        open_expiry_ms = duration_ms(self.settings.open_expiry_interval),
                        "Circuit breaker opened"
                    ),
                    State::HalfOpen => tracing::info!(
                        breaker = %self.name,
                        %from,
                        "Circuit breaker half-open, allowing trial calls"
                    ),
                    State::Closed => {
                        tracing::info!(breaker = %self.name, %from, "Circuit breaker closed")
                    }
                }
                metrics::record_transition(&self.name, from, to);
                if let Some(hook) = &self.on_state_change {
                    hook(ctx, from, to);
                }
            }
        }
    }
}

impl<E> fmt::Debug for Breaker<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let machine = self.machine.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Breaker")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .field("state", &machine.state)
            .field("counts", &machine.counts)
            .finish_non_exhaustive()
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
