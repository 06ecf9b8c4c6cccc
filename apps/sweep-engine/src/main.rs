//! Sweep Engine Binary
//!
//! Serves the parameter sweep REST API.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin sweep-engine -- [config.yaml]
//! ```
//!
//! # Environment Variables
//!
//! - `SWEEP_ENGINE_CONFIG`: Config path when no argument is given (default: sweep-engine.yaml)
//! - `RUST_LOG`: Log filter (default: `observability.logging.level`)
//! - `OTEL_ENABLED`: Set to `true` to export traces over OTLP

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sweep_engine::config::{Config, load_config};
use sweep_engine::infrastructure::http::{AppState, create_router};
use sweep_engine::observability::init_metrics;
use sweep_engine::sweep::{ProcessTrialRunner, SweepOrchestrator, TaskRegistry, spawn_reaper};
use sweep_engine::telemetry::init_telemetry;
use tokio::net::TcpListener;
use tokio::signal;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1);
    let config = load_config(config_path.as_deref()).context("Failed to load configuration")?;

    let _telemetry = init_telemetry(&config.observability.logging);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Sweep Engine");
    log_config(&config);

    if config.observability.metrics.enabled {
        init_metrics(&config.observability.metrics)?;
    }

    let data_dir = std::path::absolute(&config.sweep.data_dir)
        .context("Failed to resolve shared data directory")?;
    let runner = Arc::new(ProcessTrialRunner::new(
        config.entry_point.clone(),
        config.logs.clone(),
        data_dir,
        config.sweep.trial_timeout(),
    ));

    let registry = Arc::new(TaskRegistry::new());
    let orchestrator = Arc::new(SweepOrchestrator::new(
        Arc::clone(&registry),
        runner,
        config.sweep_settings(),
    ));

    let reaper = config.reaper.enabled.then(|| {
        tracing::info!(
            interval_secs = config.reaper.interval_secs,
            max_age_secs = config.reaper.max_age_secs,
            "Scratch reaper enabled"
        );
        spawn_reaper(
            config.reaper.clone(),
            config.sweep.scratch_root.clone(),
            Arc::clone(&registry),
            orchestrator.shutdown_token(),
        )
    });

    let app = create_router(AppState {
        orchestrator: Arc::clone(&orchestrator),
        version: env!("CARGO_PKG_VERSION").to_string(),
    });

    let http_addr = config.server.http_addr();
    let listener = TcpListener::bind(&http_addr)
        .await
        .with_context(|| format!("Failed to bind {http_addr}"))?;

    tracing::info!(%http_addr, "HTTP server starting");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health");
    tracing::info!("  POST /api/v1/sweeps");
    tracing::info!("  GET  /api/v1/sweeps/{{id}}/progress");
    tracing::info!("  GET  /api/v1/sweeps/{{id}}/results");
    tracing::info!("  POST /api/v1/sweeps/{{id}}/cancel");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("HTTP server error: {e}");
    }

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, orchestrator.shutdown())
        .await
        .is_err()
    {
        tracing::warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Sweep shutdown timed out"
        );
    }

    if let Some(reaper) = reaper {
        if let Err(e) = reaper.await {
            tracing::warn!("Scratch reaper ended abnormally: {e}");
        }
    }

    tracing::info!("Sweep Engine stopped");
    Ok(())
}

fn log_config(config: &Config) {
    tracing::info!(
        strategies_root = %config.sweep.strategies_root.display(),
        scratch_root = %config.sweep.scratch_root.display(),
        data_dir = %config.sweep.data_dir.display(),
        default_worker_count = config.sweep.default_worker_count,
        trial_timeout_secs = config.sweep.trial_timeout_secs,
        entry_point = %config.entry_point.script,
        interpreter = %config.entry_point.interpreter,
        "Sweep configuration"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. A process that cannot
/// observe termination signals would leak trial processes on exit.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
