//! Runplane daemon entry point.
//!
//! Wires structured tracing and the global metrics registry together, loads
//! configuration from the environment, and idles until asked to shut down.
//! The actual run-orchestration surface is a library (`runplane-core`,
//! `runplane-store`, `runplane-actions`) meant to be embedded behind an API
//! gateway; this binary is the reference host for it.

use anyhow::Result;
use runplane_core::metrics::{self, TracingMetricsSink};
use runplane_core::RunplaneConfig;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> Result<()> {
    let config = RunplaneConfig::from_env();
    let level = if config.debug { Level::DEBUG } else { Level::INFO };
    runplane_core::init_tracing(config.log_format_json, level);

    metrics::set_global(Box::new(TracingMetricsSink));

    info!(
        idempotency_backend = ?config.idempotency_backend,
        metering_backend = ?config.metering_backend,
        retry_max_attempts = config.retry.max_attempts,
        circuit_failure_threshold = config.circuit_breaker.failure_threshold,
        "runplaned started"
    );

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, exiting");
    Ok(())
}
