//! Observability module for metrics.
//!
//! Prometheus counters and histograms for sweeps and trials. Tracing setup
//! lives in [`crate::telemetry`].

mod metrics;

pub use metrics::{
    MetricsConfig, MetricsError, init_metrics, record_sweep_finished, record_sweep_rejected,
    record_sweep_submitted, record_trial_outcome, update_running_sweeps,
};
