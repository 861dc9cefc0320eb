//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → SimulatorConfig (validated, immutable)
//!     → BreakerConfig → Settings for the breaker
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; a breaker never re-reads it
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::BreakerConfig;
pub use schema::ObservabilityConfig;
pub use schema::SimulatorConfig;
pub use schema::WorkloadConfig;
