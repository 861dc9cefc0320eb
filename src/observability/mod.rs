//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breaker produces:
//!     → logging.rs (structured log events on rejections and transitions)
//!     → metrics.rs (calls, rejections, transitions, current state)
//!
//! Consumers:
//!     → stdout via tracing-subscriber
//!     → Prometheus text rendered by the simulator
//! ```
//!
//! # Design Decisions
//! - Structured fields (breaker name, call id, states) for machine parsing
//! - Metrics are cheap and silently dropped when no recorder is installed
//! - The library never installs a subscriber or recorder on its own

pub mod logging;
pub mod metrics;
