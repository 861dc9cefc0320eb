//! Synthetic workload driver.
//!
//! Runs a configurable number of calls through one breaker against an action
//! that fails during an outage window and at random otherwise. Time is a
//! `ManualClock` advanced by `tick_ms` per call, so a 60s cooldown costs no
//! real waiting.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::validation::{validate_config, ValidationError};
use crate::config::SimulatorConfig;
use crate::error::{BreakerError, BuildError};
use crate::resilience::{Breaker, CallContext, Counts, ManualClock, Settings, State};

/// Why a simulated call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SimulatedFailure {
    #[error("simulated outage")]
    Outage,
    #[error("simulated random failure")]
    Random,
    #[error("call cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("invalid configuration: {0:?}")]
    Invalid(Vec<ValidationError>),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Outcome totals of one run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub breaker: String,
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub rejected_open: u64,
    pub rejected_too_many: u64,
    pub transitions: u64,
    pub simulated_ms: u64,
    pub cancelled: bool,
    pub final_state: State,
    pub final_counts: Counts,
}

impl Report {
    pub fn admitted(&self) -> u64 {
        self.succeeded + self.failed
    }

    pub fn rejected(&self) -> u64 {
        self.rejected_open + self.rejected_too_many
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "breaker:            {}", self.breaker)?;
        writeln!(f, "attempted:          {}", self.attempted)?;
        writeln!(
            f,
            "admitted:           {} ({} ok, {} failed)",
            self.admitted(),
            self.succeeded,
            self.failed
        )?;
        writeln!(f, "rejected (open):    {}", self.rejected_open)?;
        writeln!(f, "rejected (budget):  {}", self.rejected_too_many)?;
        writeln!(f, "transitions:        {}", self.transitions)?;
        writeln!(f, "simulated time:     {:.1}s", self.simulated_ms as f64 / 1000.0)?;
        if self.cancelled {
            writeln!(f, "run cancelled early")?;
        }
        write!(f, "final state:        {} {:?}", self.final_state, self.final_counts)
    }
}

#[derive(Default)]
struct Tally {
    attempted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    rejected_open: AtomicU64,
    rejected_too_many: AtomicU64,
    transitions: AtomicU64,
}

/// Drive the configured workload through a fresh breaker.
pub async fn run(
    config: &SimulatorConfig,
    cancellation: CancellationToken,
) -> Result<Report, SimulationError> {
    validate_config(config).map_err(SimulationError::Invalid)?;

    let workload = config.workload.clone();
    let tick = Duration::from_millis(workload.tick_ms);
    let clock = ManualClock::new();
    let tally = Arc::new(Tally::default());
    let rng = Arc::new(Mutex::new(StdRng::seed_from_u64(workload.seed)));

    let action_clock = clock.clone();
    let outage = workload.outage_start..workload.outage_start.saturating_add(workload.outage_calls);
    let failure_rate = workload.failure_rate;
    let tick_ms = workload.tick_ms;

    let transitions = tally.clone();
    let breaker = Breaker::builder()
        .name(config.breaker.name.clone())
        .settings(Settings::from(&config.breaker))
        .clock(clock.clone())
        .on_state_change(move |_ctx, _from, _to| {
            transitions.transitions.fetch_add(1, Ordering::Relaxed);
        })
        .action(move |ctx: CallContext| {
            let call = elapsed_ms(&action_clock) / tick_ms;
            let random = rng
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .gen_bool(failure_rate);
            let in_outage = call > 0 && outage.contains(&(call - 1));
            async move {
                if ctx.is_cancelled() {
                    Err(SimulatedFailure::Cancelled)
                } else if in_outage {
                    Err(SimulatedFailure::Outage)
                } else if random {
                    Err(SimulatedFailure::Random)
                } else {
                    Ok(())
                }
            }
        })
        .build()?;
    let breaker = Arc::new(breaker);

    tracing::info!(
        breaker = %breaker.name(),
        calls = workload.calls,
        concurrency = workload.concurrency,
        failure_rate = workload.failure_rate,
        "Simulation starting"
    );

    let root = CallContext::with_cancellation(cancellation.clone());
    let next = Arc::new(AtomicU64::new(0));
    let mut workers = Vec::with_capacity(workload.concurrency);
    for _ in 0..workload.concurrency {
        let breaker = breaker.clone();
        let clock = clock.clone();
        let tally = tally.clone();
        let next = next.clone();
        let root = root.clone();
        let calls = workload.calls;

        workers.push(tokio::spawn(async move {
            loop {
                if root.is_cancelled() {
                    break;
                }
                if next.fetch_add(1, Ordering::Relaxed) >= calls {
                    break;
                }
                clock.advance(tick);
                tally.attempted.fetch_add(1, Ordering::Relaxed);

                let counter = match breaker.execute(&root.child()).await {
                    Ok(()) => &tally.succeeded,
                    Err(BreakerError::Open) => &tally.rejected_open,
                    Err(BreakerError::TooManyRequests) => &tally.rejected_too_many,
                    Err(BreakerError::Operation(_)) => &tally.failed,
                };
                counter.fetch_add(1, Ordering::Relaxed);
                tokio::task::yield_now().await;
            }
        }));
    }

    for worker in workers {
        worker.await?;
    }

    let snapshot = breaker.snapshot(&root);
    let report = Report {
        breaker: breaker.name().to_string(),
        attempted: tally.attempted.load(Ordering::Relaxed),
        succeeded: tally.succeeded.load(Ordering::Relaxed),
        failed: tally.failed.load(Ordering::Relaxed),
        rejected_open: tally.rejected_open.load(Ordering::Relaxed),
        rejected_too_many: tally.rejected_too_many.load(Ordering::Relaxed),
        transitions: tally.transitions.load(Ordering::Relaxed),
        simulated_ms: elapsed_ms(&clock),
        cancelled: cancellation.is_cancelled(),
        final_state: snapshot.state,
        final_counts: snapshot.counts,
    };

    tracing::info!(
        attempted = report.attempted,
        rejected = report.rejected(),
        transitions = report.transitions,
        final_state = %report.final_state,
        "Simulation finished"
    );
    Ok(report)
}

fn elapsed_ms(clock: &ManualClock) -> u64 {
    u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX)
}
