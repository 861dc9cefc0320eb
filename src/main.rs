//! breaker-sim
//!
//! Drives a circuit breaker against a synthetic flaky action and reports how
//! it behaved.
//!
//! ```text
//!   config (TOML) ──┐
//!   CLI overrides ──┴─▶ SimulatorConfig ─▶ simulation::run ─▶ Report
//!                                              │
//!                                   ManualClock + Breaker + workers
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use breaker::config::{load_config, validation::validate_config, ConfigError, SimulatorConfig};
use breaker::observability::{logging, metrics};
use breaker::simulation;

#[derive(Parser)]
#[command(name = "breaker-sim")]
#[command(about = "Simulate a circuit breaker against a flaky action", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Total calls to attempt.
    #[arg(long)]
    calls: Option<u64>,

    /// Calls in flight at once.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Probability that a call fails outside the outage window.
    #[arg(long)]
    failure_rate: Option<f64>,

    /// RNG seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,

    /// Print Prometheus metrics after the run.
    #[arg(long)]
    metrics: bool,
}

impl Cli {
    fn apply(&self, config: &mut SimulatorConfig) {
        if let Some(calls) = self.calls {
            config.workload.calls = calls;
        }
        if let Some(concurrency) = self.concurrency {
            config.workload.concurrency = concurrency;
        }
        if let Some(rate) = self.failure_rate {
            config.workload.failure_rate = rate;
        }
        if let Some(seed) = self.seed {
            config.workload.seed = seed;
        }
        if self.metrics {
            config.observability.metrics_enabled = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => SimulatorConfig::default(),
    };
    cli.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init(&config.observability);
    tracing::info!("breaker-sim v{} starting", env!("CARGO_PKG_VERSION"));

    let recorder = if config.observability.metrics_enabled {
        Some(metrics::install_recorder()?)
    } else {
        None
    };

    let cancellation = CancellationToken::new();
    let on_signal = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping simulation");
            on_signal.cancel();
        }
    });

    let report = simulation::run(&config, cancellation).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
    }

    if let Some(handle) = recorder {
        println!();
        print!("{}", handle.render());
    }

    Ok(())
}
