//! Core types for sweep tasks and trial results.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::grid::{ParamCombination, ParamRanges};

/// Metric names reported for every successful trial, in display order.
pub const METRIC_NAMES: [&str; 7] = [
    "totalReturnPct",
    "annualReturnPct",
    "sharpeRatio",
    "maxDrawdownPct",
    "totalTrades",
    "winRatePct",
    "finalValue",
];

/// Performance metrics parsed from one trial's logs.
///
/// Every float is finite; non-finite intermediates are reported as `0.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSet {
    /// Total return over the run (percent).
    pub total_return_pct: f64,
    /// Annualised return (percent, 252 observations per year).
    pub annual_return_pct: f64,
    /// Annualised Sharpe ratio of per-observation returns.
    pub sharpe_ratio: f64,
    /// Largest decline from a running peak (percent).
    pub max_drawdown_pct: f64,
    /// Number of closed trades.
    pub total_trades: u64,
    /// Share of closed trades with positive net P&L (percent).
    pub win_rate_pct: f64,
    /// Last portfolio value.
    pub final_value: f64,
}

/// Everything a trial runner needs to execute one grid point.
#[derive(Debug, Clone)]
pub struct TrialSpec {
    /// Original strategy workspace (never written to).
    pub workspace: PathBuf,
    /// Parameter combination to inject.
    pub params: ParamCombination,
    /// Position of this combination in the grid.
    pub trial_index: usize,
    /// Per-sweep scratch root the trial copy is created under.
    pub scratch_root: PathBuf,
}

impl TrialSpec {
    /// Directory holding this trial's isolated copy of the workspace.
    #[must_use]
    pub fn trial_dir(&self) -> PathBuf {
        self.scratch_root.join(format!("trial_{}", self.trial_index))
    }
}

/// Outcome of one trial. Exactly one of `metrics` / `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialResult {
    /// Parameters used.
    pub params: ParamCombination,
    /// Position in the grid.
    pub trial_index: usize,
    /// Whether the trial produced metrics.
    pub success: bool,
    /// Parsed metrics when successful.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricSet>,
    /// Failure description otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock duration of the trial in milliseconds.
    pub duration_ms: u64,
}

impl TrialResult {
    /// Successful trial.
    #[must_use]
    pub const fn succeeded(
        params: ParamCombination,
        trial_index: usize,
        metrics: MetricSet,
        duration_ms: u64,
    ) -> Self {
        Self {
            params,
            trial_index,
            success: true,
            metrics: Some(metrics),
            error: None,
            duration_ms,
        }
    }

    /// Failed trial.
    #[must_use]
    pub fn failed(
        params: ParamCombination,
        trial_index: usize,
        error: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            params,
            trial_index,
            success: false,
            metrics: None,
            error: Some(error.into()),
            duration_ms,
        }
    }
}

/// Lifecycle of a sweep. Only `Running` may transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SweepStatus {
    /// Trials are being dispatched or are in flight.
    Running,
    /// Every grid point has produced a result.
    Completed,
    /// The sweep driver failed.
    Error,
    /// A caller cancelled the sweep.
    Cancelled,
}

impl SweepStatus {
    /// Whether the status can no longer change.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Lowercase name, as serialized.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for SweepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one submitted sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepTask {
    /// Task identifier.
    pub id: String,
    /// Strategy whose workspace is swept.
    pub strategy_id: String,
    /// Number of grid points.
    pub total: usize,
    /// Trials that produced metrics.
    pub completed: usize,
    /// Trials that failed.
    pub failed: usize,
    /// Successful trial results, in completion order.
    pub results: Vec<TrialResult>,
    /// Swept parameter names, in declaration order.
    pub param_names: Vec<String>,
    /// Submission time.
    pub created_at: DateTime<Utc>,
    /// Size of the worker pool.
    pub worker_count: usize,
    /// Current status.
    pub status: SweepStatus,
    /// Driver failure message when `status == Error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SweepTask {
    /// New running task.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        strategy_id: impl Into<String>,
        ranges: &ParamRanges,
        total: usize,
        worker_count: usize,
    ) -> Self {
        Self {
            id: id.into(),
            strategy_id: strategy_id.into(),
            total,
            completed: 0,
            failed: 0,
            results: Vec::new(),
            param_names: ranges.names(),
            created_at: Utc::now(),
            worker_count,
            status: SweepStatus::Running,
            error: None,
        }
    }

    /// Trials that have finished either way.
    #[must_use]
    pub const fn finished(&self) -> usize {
        self.completed + self.failed
    }

    /// Fold a finished trial into the counters.
    ///
    /// Counts keep moving after cancellation so they reflect every trial that
    /// actually ran; results past `total` are ignored.
    pub fn record_trial(&mut self, result: TrialResult) {
        if self.finished() >= self.total {
            return;
        }
        if result.success {
            self.completed += 1;
            self.results.push(result);
        } else {
            self.failed += 1;
        }
    }

    /// Move out of `Running`. Returns `false` if the task already left it.
    pub fn transition(&mut self, status: SweepStatus, error: Option<String>) -> bool {
        if self.status.is_terminal() || status == SweepStatus::Running {
            return false;
        }
        self.status = status;
        self.error = error;
        true
    }
}
