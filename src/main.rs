//! Driver for the resilient execution engine.
//!
//! Runs a simulated flaky operation through one [`Resilient`] builder and
//! prints a JSON summary of each run together with the breaker's stats.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use resilient_exec::config::{load_config, ResilienceConfig};
use resilient_exec::observability::{logging, metrics};
use resilient_exec::resilience::BreakerStats;
use resilient_exec::{retry_on_fault, ExecError, Resilient};

#[derive(Parser)]
#[command(name = "resilient-exec")]
#[command(about = "Run a simulated flaky operation with retries and a circuit breaker", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Consecutive failures before the simulated work succeeds.
    #[arg(short, long, default_value_t = 2)]
    failures: u32,

    /// Number of invocations through the same operation.
    #[arg(short, long, default_value_t = 1)]
    runs: u32,

    /// Explicit operation identity.
    #[arg(short, long)]
    operation: Option<String>,
}

#[derive(Debug, Serialize)]
struct RunReport {
    run: u32,
    outcome: &'static str,
    value: Option<u32>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct Summary {
    operation: String,
    calls: u32,
    runs: Vec<RunReport>,
    breaker: BreakerStats,
}

#[derive(Debug, thiserror::Error)]
#[error("simulated failure on call {0}")]
struct SimulatedFault(u32);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ResilienceConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!("resilient-exec v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    tracing::info!(
        max_attempts = config.retry.max_attempts,
        failure_threshold = config.circuit_breaker.failure_threshold,
        open_duration_ms = config.circuit_breaker.open_duration_ms,
        "Configuration loaded"
    );

    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let failures = cli.failures;
    let mut op = Resilient::cancellable(move |cancel: CancellationToken| {
        let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            tokio::select! {
                _ = cancel.cancelled() => Err(SimulatedFault(call)),
                _ = tokio::time::sleep(std::time::Duration::from_millis(10)) => {
                    if call <= failures {
                        Err(SimulatedFault(call))
                    } else {
                        Ok(call)
                    }
                }
            }
        }
    })
    .with_config(&config)
    .handler(retry_on_fault());
    if let Some(name) = cli.operation {
        op = op.operation_id(name);
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, canceling");
            on_signal.cancel();
        }
    });

    let mut runs = Vec::with_capacity(cli.runs as usize);
    for run in 1..=cli.runs {
        let result = op.execute(cancel.clone()).await;
        let (outcome, value, error) = match result {
            Ok(value) => ("ok", Some(value), None),
            Err(e) => {
                let outcome = match &e {
                    ExecError::CircuitOpen { .. } => "circuit_open",
                    ExecError::MaxAttemptsExceeded { .. } => "max_attempts_exceeded",
                    ExecError::Canceled => "canceled",
                    ExecError::Fault(_) => "fault",
                };
                (outcome, None, Some(e.to_string()))
            }
        };
        runs.push(RunReport { run, outcome, value, error });
        if cancel.is_cancelled() {
            break;
        }
    }

    let summary = Summary {
        operation: op.operation().to_string(),
        calls: calls.load(Ordering::SeqCst),
        runs,
        breaker: op.circuit_breaker().stats(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);

    tracing::info!("Shutdown complete");
    Ok(())
}
