//! Parameter sweep engine.
//!
//! - [`grid`]: expands parameter ranges into the Cartesian product
//! - [`trial`]: runs one grid point in an isolated copy of the workspace
//! - [`metrics`]: turns a trial's logs into a [`MetricSet`]
//! - [`orchestrator`]: bounded worker pool per sweep
//! - [`registry`]: shared task state and the progress/results views
//! - [`reaper`]: removes leaked scratch directories

pub mod grid;
pub mod metrics;
pub mod orchestrator;
pub mod reaper;
pub mod registry;
pub mod trial;
pub mod types;

pub use grid::{
    Grid, ParamCombination, ParamKind, ParamRangeSpec, ParamRanges, ParamValue, generate_grid,
};
pub use metrics::{LogLayout, parse_metrics};
pub use orchestrator::{DEFAULT_WORKER_COUNT, SweepOrchestrator, SweepRequest, SweepSettings};
pub use reaper::{ReapReport, ReaperConfig, reap_scratch_root, spawn_reaper};
pub use registry::{ProgressView, ResultRow, ResultsView, TaskRegistry};
pub use trial::{EntryPointConfig, ProcessTrialRunner, TrialError, TrialRunner};
pub use types::{METRIC_NAMES, MetricSet, SweepStatus, SweepTask, TrialResult, TrialSpec};
