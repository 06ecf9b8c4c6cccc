// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Sweep Engine - Parameter Sweep Optimizer
//!
//! Runs every combination of a strategy's parameter ranges as an isolated
//! backtest trial and ranks the results.
//!
//! # Architecture
//!
//! - **Sweep core** (`sweep`)
//!   - `grid`: Cartesian product of declared parameter ranges
//!   - `trial`: per-trial workspace copy, config merge, entry-point process
//!   - `metrics`: return, drawdown, Sharpe and trade stats from trial logs
//!   - `orchestrator`: bounded worker pool per sweep, soft cancel, shutdown
//!   - `registry`: in-memory task state with progress and ranked results
//!   - `reaper`: periodic removal of leaked scratch directories
//!
//! - **Infrastructure**: Adapters
//!   - `http`: REST endpoints over the orchestrator
//!
//! - **Runtime support**: `config` (YAML + env interpolation), `telemetry`
//!   (tracing + optional OTLP), `observability` (Prometheus)

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

/// Configuration loading and validation.
pub mod config;

/// Submission and sweep-level errors.
pub mod error;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

/// Prometheus metrics.
pub mod observability;

/// Parameter sweep core.
pub mod sweep;

/// Tracing subscriber setup.
pub mod telemetry;

pub use config::{Config, ConfigError, load_config};
pub use error::SweepError;
pub use infrastructure::http::{AppState, create_router};
pub use sweep::{
    ProcessTrialRunner, ProgressView, ResultsView, SweepOrchestrator, SweepRequest, SweepStatus,
    TaskRegistry, TrialResult, TrialRunner,
};
