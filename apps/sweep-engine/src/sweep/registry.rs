//! In-memory task registry.
//!
//! One registry-wide lock guards the whole map. Critical sections are small
//! map operations; trial execution never happens under the lock.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use super::grid::ParamCombination;
use super::metrics::round_to;
use super::types::{METRIC_NAMES, MetricSet, SweepStatus, SweepTask};

/// Sort key used for rows without metrics, so they always rank last.
pub const MISSING_METRIC_SENTINEL: f64 = -1.0e18;

/// Concurrency-safe map from task id to sweep state.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: Mutex<HashMap<String, SweepTask>>,
}

impl TaskRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a task.
    pub fn get(&self, task_id: &str) -> Option<SweepTask> {
        self.tasks.lock().get(task_id).cloned()
    }

    /// Insert or replace a task.
    pub fn set(&self, task: SweepTask) {
        self.tasks.lock().insert(task.id.clone(), task);
    }

    /// Apply `f` to a task under the registry lock.
    ///
    /// Returns `None` when the task is unknown.
    pub fn update<T>(&self, task_id: &str, f: impl FnOnce(&mut SweepTask) -> T) -> Option<T> {
        self.tasks.lock().get_mut(task_id).map(f)
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Whether no task is registered.
    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    /// Ids of tasks still running.
    pub fn running_task_ids(&self) -> Vec<String> {
        self.tasks
            .lock()
            .values()
            .filter(|task| task.status == SweepStatus::Running)
            .map(|task| task.id.clone())
            .collect()
    }

    /// Progress view of a task.
    pub fn progress(&self, task_id: &str) -> Option<ProgressView> {
        self.tasks.lock().get(task_id).map(ProgressView::from_task)
    }

    /// Ranked results view of a task.
    ///
    /// The task is cloned under the lock; ranking happens after release.
    pub fn results(&self, task_id: &str) -> Option<ResultsView> {
        let task = self.get(task_id)?;
        Some(ResultsView::from_task(task))
    }
}

/// Live counters of one sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressView {
    /// Current status.
    pub status: SweepStatus,
    /// Number of grid points.
    pub total: usize,
    /// Successful trials.
    pub completed: usize,
    /// Failed trials.
    pub failed: usize,
    /// Finished share of the grid, in percent, one decimal.
    pub progress_pct: f64,
    /// Worker pool size.
    pub worker_count: usize,
    /// Submission time.
    pub created_at: DateTime<Utc>,
    /// Sweep-level failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressView {
    fn from_task(task: &SweepTask) -> Self {
        let progress_pct = if task.total == 0 {
            0.0
        } else {
            round_to(task.finished() as f64 / task.total as f64 * 100.0, 1)
        };

        Self {
            status: task.status,
            total: task.total,
            completed: task.completed,
            failed: task.failed,
            progress_pct,
            worker_count: task.worker_count,
            created_at: task.created_at,
            error: task.error.clone(),
        }
    }
}

/// One ranked row: the trial's parameters merged with its metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    /// Parameter values, keyed by parameter name.
    #[serde(flatten)]
    pub params: ParamCombination,
    /// Metrics, keyed by metric name.
    #[serde(flatten)]
    pub metrics: Option<MetricSet>,
}

impl ResultRow {
    fn sort_key(&self) -> f64 {
        self.metrics
            .map_or(MISSING_METRIC_SENTINEL, |m| m.annual_return_pct)
    }
}

/// Ranked table of successful trials.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsView {
    /// Current status.
    pub status: SweepStatus,
    /// Swept parameter names, in declaration order.
    pub param_names: Vec<String>,
    /// Metric column names.
    pub metric_names: Vec<String>,
    /// Number of grid points.
    pub total: usize,
    /// Successful trials.
    pub completed: usize,
    /// Failed trials.
    pub failed: usize,
    /// Successful trials, best annual return first.
    pub rows: Vec<ResultRow>,
    /// Top row, if any.
    pub best: Option<ResultRow>,
}

impl ResultsView {
    fn from_task(task: SweepTask) -> Self {
        let mut rows: Vec<ResultRow> = task
            .results
            .into_iter()
            .filter(|result| result.success)
            .map(|result| ResultRow {
                params: result.params,
                metrics: result.metrics,
            })
            .collect();
        rank_rows(&mut rows);

        Self {
            status: task.status,
            param_names: task.param_names,
            metric_names: METRIC_NAMES.iter().map(|name| (*name).to_string()).collect(),
            total: task.total,
            completed: task.completed,
            failed: task.failed,
            best: rows.first().cloned(),
            rows,
        }
    }
}

/// Sort rows by annual return, descending. Ties keep completion order.
pub fn rank_rows(rows: &mut [ResultRow]) {
    rows.sort_by(|a, b| b.sort_key().total_cmp(&a.sort_key()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep::grid::{ParamRangeSpec, ParamRanges, ParamValue};
    use crate::sweep::types::TrialResult;

    fn params(period: i64) -> ParamCombination {
        ParamCombination::from_pairs([("period", ParamValue::Int(period))])
    }

    fn metrics(annual: f64) -> MetricSet {
        MetricSet {
            annual_return_pct: annual,
            ..MetricSet::default()
        }
    }

    fn registry_with_task(total: usize) -> TaskRegistry {
        let ranges = ParamRanges::new().with("period", ParamRangeSpec::int(1, 10, 1));
        let registry = TaskRegistry::new();
        registry.set(SweepTask::new("t1", "sma_cross", &ranges, total, 4));
        registry
    }

    #[test]
    fn test_get_set_update() {
        let registry = registry_with_task(3);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("t1").unwrap().total, 3);
        assert!(registry.get("missing").is_none());

        let changed = registry.update("t1", |task| task.transition(SweepStatus::Cancelled, None));
        assert_eq!(changed, Some(true));
        assert_eq!(registry.get("t1").unwrap().status, SweepStatus::Cancelled);
        assert!(registry.update("missing", |_| ()).is_none());
        assert!(registry.running_task_ids().is_empty());
    }

    #[test]
    fn test_progress_percentage() {
        let registry = registry_with_task(3);
        registry.update("t1", |task| {
            task.record_trial(TrialResult::succeeded(params(1), 0, metrics(1.0), 1));
        });

        let progress = registry.progress("t1").unwrap();
        assert_eq!(progress.completed, 1);
        assert_eq!(progress.failed, 0);
        assert_eq!(progress.progress_pct, 33.3);
        assert_eq!(progress.worker_count, 4);
        assert_eq!(progress.status, SweepStatus::Running);
    }

    #[test]
    fn test_results_ranked_by_annual_return() {
        let registry = registry_with_task(4);
        registry.update("t1", |task| {
            task.record_trial(TrialResult::succeeded(params(1), 0, metrics(2.5), 1));
            task.record_trial(TrialResult::failed(params(2), 1, "boom", 1));
            task.record_trial(TrialResult::succeeded(params(3), 2, metrics(-4.0), 1));
            task.record_trial(TrialResult::succeeded(params(4), 3, metrics(11.0), 1));
        });

        let results = registry.results("t1").unwrap();
        assert_eq!(results.completed, 3);
        assert_eq!(results.failed, 1);
        assert_eq!(results.rows.len(), 3);
        assert_eq!(results.param_names, vec!["period".to_string()]);
        assert_eq!(results.metric_names.len(), METRIC_NAMES.len());

        let order: Vec<_> = results
            .rows
            .iter()
            .map(|row| row.params.get("period"))
            .collect();
        assert_eq!(
            order,
            vec![
                Some(ParamValue::Int(4)),
                Some(ParamValue::Int(1)),
                Some(ParamValue::Int(3)),
            ]
        );
        assert_eq!(results.best, Some(results.rows[0].clone()));
    }

    #[test]
    fn test_missing_metrics_rank_last() {
        let mut rows = vec![
            ResultRow {
                params: params(1),
                metrics: None,
            },
            ResultRow {
                params: params(2),
                metrics: Some(metrics(-99.0)),
            },
        ];
        rank_rows(&mut rows);
        assert_eq!(rows[0].params.get("period"), Some(ParamValue::Int(2)));
        assert!(rows[1].metrics.is_none());
    }

    #[test]
    fn test_empty_results_have_no_best() {
        let registry = registry_with_task(2);
        let results = registry.results("t1").unwrap();
        assert!(results.rows.is_empty());
        assert!(results.best.is_none());
    }

    #[test]
    fn test_result_row_serializes_flat() {
        let row = ResultRow {
            params: params(7),
            metrics: Some(metrics(3.2)),
        };
        let json = serde_json::to_value(&row).unwrap();

        assert_eq!(json["period"], 7);
        assert_eq!(json["annualReturnPct"], 3.2);
        assert_eq!(json["totalTrades"], 0);
        assert!(json.get("params").is_none());
    }
}
