//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files.

use serde::{Deserialize, Serialize};

/// Root configuration for the breaker simulator.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Breaker under test.
    pub breaker: BreakerConfig,

    /// Synthetic workload driven through the breaker.
    pub workload: WorkloadConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Breaker settings. Numeric values are passed through as given.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Breaker name used in logs and metric labels.
    pub name: String,

    /// Trial calls admitted while half-open.
    pub half_open_max_actions: u32,

    /// Time spent open before trial calls are allowed, in milliseconds.
    pub open_expiry_ms: u64,

    /// Closed-state statistics window in milliseconds (0 disables sweeping).
    pub closed_expiry_ms: u64,

    /// Consecutive failures that trip a closed breaker.
    pub consecutive_failure_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            half_open_max_actions: 1,
            open_expiry_ms: 60_000,
            closed_expiry_ms: 5_000,
            consecutive_failure_threshold: 6,
        }
    }
}

/// Synthetic workload configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Total calls to attempt.
    pub calls: u64,

    /// Calls in flight at once.
    pub concurrency: usize,

    /// Probability (0.0 - 1.0) that a call fails outside the outage window.
    pub failure_rate: f64,

    /// Call index at which the outage begins.
    pub outage_start: u64,

    /// Number of calls during which every call fails.
    pub outage_calls: u64,

    /// Simulated time that passes per call, in milliseconds.
    pub tick_ms: u64,

    /// RNG seed for reproducible runs.
    pub seed: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            calls: 1_000,
            concurrency: 4,
            failure_rate: 0.05,
            outage_start: 200,
            outage_calls: 150,
            tick_ms: 250,
            seed: 42,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format ("compact" or "pretty").
    pub log_format: String,

    /// Record breaker metrics through a Prometheus recorder.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "compact".to_string(),
            metrics_enabled: false,
        }
    }
}
