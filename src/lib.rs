//! Circuit breaker library.
//!
//! Wraps an unreliable async action, stops calling it after repeated
//! failures, lets a few trial calls through after a cooldown, and resumes
//! once a trial succeeds.

pub mod config;
pub mod error;
pub mod observability;
pub mod resilience;
pub mod simulation;

pub use error::{BreakerError, BuildError};
pub use resilience::{Breaker, BreakerBuilder, CallContext, Counts, ManualClock, Settings, State};
