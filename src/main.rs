//! CLI entry point for trigger-ring
//!
//! Loads the ring configuration, starts one acquisition worker per camera and
//! seeds the trigger ring. Runs until Ctrl-C (exit 0) or until the ring stalls
//! because the retrigger worker or every worker halted (non-zero exit).
//!
//! # Usage
//!
//! ```bash
//! trigger-ring --simulate
//! trigger-ring --config config/trigger-ring.toml --simulate --log-level debug
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use trigger_ring::config::{RingConfig, DEFAULT_CONFIG_PATH};
use trigger_ring::ring_driver_mock::TimingConfig;
use trigger_ring::{lifecycle, logging, simulation, RunningRing, WorkerExit};

#[derive(Parser)]
#[command(name = "trigger-ring")]
#[command(about = "Software-seeded, hardware-chained multi-camera acquisition", long_about = None)]
struct Cli {
    /// Ring configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Run against simulated cameras instead of hardware
    #[arg(long)]
    simulate: bool,

    /// Override the configured log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

enum Outcome {
    Interrupted,
    Stalled,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = RingConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.validate()?;
    logging::init_from_config(&config).map_err(anyhow::Error::msg)?;

    if !cli.simulate {
        anyhow::bail!("no hardware camera driver is built into this binary; run with --simulate");
    }

    tracing::info!(config = %cli.config.display(), "Starting simulated trigger ring");
    let driver = simulation::bench(&config, TimingConfig::realistic())?;
    let ring = lifecycle::start(&driver, &config, None)?;
    for failure in ring.configuration_failures() {
        tracing::warn!(device = %failure.address, code = failure.error.code(), "Running without device");
    }

    let outcome = tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("listening for Ctrl-C")?;
            Outcome::Interrupted
        }
        _ = stalled(&ring) => Outcome::Stalled,
    };

    log_statistics(&ring);

    match outcome {
        Outcome::Interrupted => {
            tracing::info!("Interrupted, stopping acquisition");
            let timeout = config.shutdown_timeout();
            let report = tokio::task::spawn_blocking(move || ring.shutdown(timeout)).await?;
            for address in &report.stragglers {
                tracing::warn!(device = %address, "Worker still running at exit");
            }
            Ok(())
        }
        Outcome::Stalled => {
            let retrigger = ring.roles().retrigger_device().clone();
            tracing::error!(device = %retrigger, "Retrigger worker halted, stopping the ring");
            let timeout = config.shutdown_timeout();
            let report = tokio::task::spawn_blocking(move || ring.shutdown(timeout)).await?;
            for (address, exit) in &report.exits {
                if let WorkerExit::Halted(err) = exit {
                    tracing::error!(device = %address, code = err.code(), error = %err, "Worker halted");
                }
            }
            anyhow::bail!("trigger ring stalled: retrigger worker on {} halted", retrigger)
        }
    }
}

async fn stalled(ring: &RunningRing) {
    let mut interval = tokio::time::interval(Duration::from_millis(100));
    loop {
        interval.tick().await;
        if ring.retrigger_halted() {
            return;
        }
    }
}

fn log_statistics(ring: &RunningRing) {
    for worker in ring.workers() {
        let stats = worker.stats();
        tracing::info!(
            device = %worker.address(),
            state = %worker.state(),
            frames = stats.frames,
            timeouts = stats.timeouts,
            errors = stats.errors,
            "Acquisition statistics"
        );
    }
}
