//! Prometheus metrics for the sweep engine.
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter, so the
//! orchestrator records unconditionally.
//!
//! # Example
//!
//! ```ignore
//! use sweep_engine::observability::{init_metrics, MetricsConfig};
//!
//! let config = MetricsConfig::default();
//! init_metrics(&config)?;
//!
//! record_trial_outcome("sma_cross", true, 12.5);
//! ```

use std::net::{Ipv4Addr, SocketAddr};

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::{Deserialize, Serialize};

/// Configuration for the metrics exporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether to start the exporter.
    pub enabled: bool,
    /// Address to bind the metrics HTTP listener.
    pub listen_addr: SocketAddr,
    /// Histogram buckets for trial durations (in seconds).
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 9090)),
            // Trial durations from 1s to the default 10 minute timeout
            duration_buckets: vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0],
        }
    }
}

/// Initialize the Prometheus metrics exporter.
///
/// This starts an HTTP server that exposes metrics at `/metrics`.
///
/// # Errors
///
/// Returns an error if the metrics exporter fails to start (e.g., port already in use).
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(config.listen_addr)
        .set_buckets(&config.duration_buckets)
        .map_err(|e| MetricsError::Configuration(e.to_string()))?
        .install()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;

    tracing::info!(
        addr = %config.listen_addr,
        "Prometheus metrics exporter started"
    );

    Ok(())
}

/// Error type for metrics operations.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Failed to configure metrics exporter.
    #[error("metrics configuration error: {0}")]
    Configuration(String),
    /// Failed to install metrics exporter.
    #[error("metrics installation error: {0}")]
    Installation(String),
}

// ============================================================================
// Sweep Metrics
// ============================================================================

/// Record an accepted sweep.
///
/// # Arguments
///
/// * `strategy_id` - Swept strategy
/// * `grid_size` - Number of grid points
pub fn record_sweep_submitted(strategy_id: &str, grid_size: usize) {
    counter!(
        "sweeps_submitted_total",
        "strategy" => strategy_id.to_string()
    )
    .increment(1);

    histogram!("sweep_grid_size").record(grid_size as f64);
}

/// Record a sweep rejected at submission.
///
/// # Arguments
///
/// * `code` - Error code (e.g., `"EMPTY_GRID"`)
pub fn record_sweep_rejected(code: &str) {
    counter!(
        "sweeps_rejected_total",
        "code" => code.to_string()
    )
    .increment(1);
}

/// Record a sweep leaving the running state.
///
/// # Arguments
///
/// * `status` - Final status (e.g., "completed", "cancelled", "error")
pub fn record_sweep_finished(status: &str) {
    counter!(
        "sweeps_finished_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Update the running sweeps gauge.
pub fn update_running_sweeps(count: usize) {
    gauge!("sweeps_running").set(count as f64);
}

// ============================================================================
// Trial Metrics
// ============================================================================

/// Record a finished trial.
///
/// # Arguments
///
/// * `strategy_id` - Swept strategy
/// * `success` - Whether the trial produced metrics
/// * `duration_seconds` - Wall-clock trial time in seconds
pub fn record_trial_outcome(strategy_id: &str, success: bool, duration_seconds: f64) {
    counter!(
        "trials_total",
        "strategy" => strategy_id.to_string(),
        "outcome" => if success { "success" } else { "failure" }
    )
    .increment(1);

    histogram!(
        "trial_duration_seconds",
        "strategy" => strategy_id.to_string()
    )
    .record(duration_seconds);
}
