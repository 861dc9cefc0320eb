//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Caller:
//!     → circuit_breaker.rs (admit / reject, run action, record outcome)
//!     → state.rs (Closed / Open / HalfOpen machine, counters, deadline)
//!     → clock.rs (deadline comparisons, injectable for tests)
//!
//! Construction:
//!     options.rs (BreakerBuilder, Settings) → Breaker
//! ```
//!
//! # Design Decisions
//! - Breaker only decides and records; no retries, queuing or rate limiting
//! - All state is in-memory and owned by one breaker instance
//! - Rejections and action errors are distinct so callers can branch on kind

pub mod circuit_breaker;
pub mod clock;
pub mod context;
pub mod options;
pub mod state;

pub use circuit_breaker::Breaker;
pub use clock::{Clock, ManualClock, SystemClock};
pub use context::CallContext;
pub use options::{BreakerBuilder, Settings};
pub use state::{Counts, Snapshot, State};
