//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate workload value ranges
//! - Reject log settings the subscriber cannot honor
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Breaker settings are not range-checked; they are applied as given

use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::config::schema::SimulatorConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("workload.failure_rate must be within [0, 1], got {0}")]
    FailureRate(f64),

    #[error("workload.concurrency must be greater than 0")]
    ZeroConcurrency,

    #[error("workload.tick_ms must be greater than 0")]
    ZeroTick,

    #[error("observability.log_level must be a level name (trace..error) or \"off\", got {0:?}")]
    LogLevel(String),

    #[error("observability.log_format must be \"compact\" or \"pretty\", got {0:?}")]
    LogFormat(String),
}

/// Check a parsed configuration, collecting every error.
pub fn validate_config(config: &SimulatorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let workload = &config.workload;

    if !(0.0..=1.0).contains(&workload.failure_rate) {
        errors.push(ValidationError::FailureRate(workload.failure_rate));
    }
    if workload.concurrency == 0 {
        errors.push(ValidationError::ZeroConcurrency);
    }
    if workload.tick_ms == 0 {
        errors.push(ValidationError::ZeroTick);
    }
    if config.observability.log_level.parse::<LevelFilter>().is_err() {
        errors.push(ValidationError::LogLevel(config.observability.log_level.clone()));
    }
    match config.observability.log_format.as_str() {
        "compact" | "pretty" => {}
        other => errors.push(ValidationError::LogFormat(other.to_string())),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
