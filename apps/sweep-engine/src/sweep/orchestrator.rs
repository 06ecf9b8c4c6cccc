//! Sweep orchestrator.
//!
//! `submit` validates synchronously, registers the task and hands the sweep
//! to a background supervisor. The supervisor runs a driver that keeps at
//! most `worker_count` trials in flight on a `JoinSet`, folding each result
//! into the registry as it completes.
//!
//! Cancellation is soft: `cancel` only flips the status, which stops the
//! driver from dispatching further grid points. In-flight trials finish or
//! hit their own timeout. `shutdown` is hard: the driver aborts its worker
//! set, which drops every trial future and kills its child process.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::FutureExt;
use serde::Deserialize;
use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, debug_span, error, info, warn};
use uuid::Uuid;

use crate::error::SweepError;
use crate::observability::{
    record_sweep_finished, record_sweep_rejected, record_sweep_submitted, record_trial_outcome,
    update_running_sweeps,
};

use super::grid::{Grid, ParamCombination, ParamRanges, generate_grid};
use super::registry::{ProgressView, ResultsView, TaskRegistry};
use super::trial::TrialRunner;
use super::types::{METRIC_NAMES, SweepStatus, SweepTask, TrialResult, TrialSpec};

/// Default size of a sweep's worker pool.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Prefix of per-sweep scratch directories.
pub const SWEEP_DIR_PREFIX: &str = "sweep_";

/// Filesystem settings for the orchestrator.
#[derive(Debug, Clone)]
pub struct SweepSettings {
    /// Directory holding one workspace per strategy id.
    pub strategies_root: PathBuf,
    /// Directory under which per-sweep scratch roots are created.
    pub scratch_root: PathBuf,
    /// Entry-point script every workspace must contain.
    pub entry_point: String,
    /// Worker count used when a request omits it.
    pub default_worker_count: usize,
}

/// A sweep submission.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepRequest {
    /// Strategy whose workspace is swept.
    pub strategy_id: String,
    /// Swept parameters, in declaration order.
    #[serde(default)]
    pub param_ranges: ParamRanges,
    /// Worker pool size.
    #[serde(default)]
    pub worker_count: Option<usize>,
}

/// Runs sweeps in the background and answers queries about them.
pub struct SweepOrchestrator<R> {
    registry: Arc<TaskRegistry>,
    runner: Arc<R>,
    settings: SweepSettings,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl<R> std::fmt::Debug for SweepOrchestrator<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SweepOrchestrator")
            .field("settings", &self.settings)
            .field("running_sweeps", &self.tracker.len())
            .finish_non_exhaustive()
    }
}

impl<R: TrialRunner + 'static> SweepOrchestrator<R> {
    /// Create an orchestrator.
    pub fn new(registry: Arc<TaskRegistry>, runner: Arc<R>, settings: SweepSettings) -> Self {
        Self {
            registry,
            runner,
            settings,
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Shared task registry.
    pub const fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Token cancelled by [`Self::shutdown`].
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Orchestrator settings.
    pub const fn settings(&self) -> &SweepSettings {
        &self.settings
    }

    /// Validate a request, register it and start the sweep in the background.
    ///
    /// Must be called from within a Tokio runtime. Checking the workspace and
    /// creating the scratch root are short blocking filesystem calls made on
    /// the caller's thread. The grid is sized arithmetically and never
    /// expanded here.
    pub fn submit(&self, request: SweepRequest) -> Result<String, SweepError> {
        let prepared = self.prepare(&request).inspect_err(|e| {
            warn!(strategy_id = %request.strategy_id, error = %e, "Sweep rejected");
            record_sweep_rejected(e.code());
        })?;

        let task_id = Uuid::new_v4().to_string();
        let scratch = self
            .settings
            .scratch_root
            .join(format!("{SWEEP_DIR_PREFIX}{task_id}"));
        let scratch = std::path::absolute(&scratch)
            .and_then(|scratch| std::fs::create_dir_all(&scratch).map(|()| scratch))
            .map_err(|source| {
                record_sweep_rejected("SCRATCH_SETUP_FAILED");
                SweepError::ScratchSetup {
                    path: scratch.display().to_string(),
                    source,
                }
            })?;

        let total = prepared.grid.len();
        self.registry.set(SweepTask::new(
            &task_id,
            &request.strategy_id,
            &request.param_ranges,
            total,
            prepared.worker_count,
        ));

        info!(
            task_id = %task_id,
            strategy_id = %request.strategy_id,
            total,
            worker_count = prepared.worker_count,
            "Sweep submitted"
        );
        record_sweep_submitted(&request.strategy_id, total);
        update_running_sweeps(self.registry.running_task_ids().len());

        let driver = SweepDriver {
            task_id: task_id.clone(),
            strategy_id: request.strategy_id,
            workspace: prepared.workspace,
            scratch,
            worker_count: prepared.worker_count,
            registry: Arc::clone(&self.registry),
            runner: Arc::clone(&self.runner),
            shutdown: self.shutdown.clone(),
        };
        self.tracker.spawn(driver.supervise(prepared.grid));

        Ok(task_id)
    }

    fn prepare(&self, request: &SweepRequest) -> Result<PreparedSweep, SweepError> {
        if self.shutdown.is_cancelled() {
            return Err(SweepError::Shutdown);
        }

        let worker_count = request
            .worker_count
            .unwrap_or(self.settings.default_worker_count);
        if worker_count == 0 {
            return Err(SweepError::InvalidWorkerCount(worker_count));
        }

        let workspace = self.resolve_workspace(&request.strategy_id)?;

        if let Some(name) = request
            .param_ranges
            .names()
            .into_iter()
            .find(|name| METRIC_NAMES.contains(&name.as_str()))
        {
            return Err(SweepError::InvalidRange {
                name,
                message: "parameter name collides with a metric name".to_string(),
            });
        }

        let grid = generate_grid(&request.param_ranges)?;
        if grid.is_empty() {
            return Err(SweepError::EmptyGrid);
        }

        Ok(PreparedSweep {
            workspace,
            grid,
            worker_count,
        })
    }

    /// Map a strategy id to its workspace directory.
    pub fn resolve_workspace(&self, strategy_id: &str) -> Result<PathBuf, SweepError> {
        if !is_valid_strategy_id(strategy_id) {
            return Err(SweepError::InvalidStrategyId(strategy_id.to_string()));
        }

        let workspace = std::path::absolute(self.settings.strategies_root.join(strategy_id))
            .map_err(|_| SweepError::StrategyNotFound(strategy_id.to_string()))?;
        if !workspace.is_dir() {
            return Err(SweepError::StrategyNotFound(strategy_id.to_string()));
        }
        if !workspace.join(&self.settings.entry_point).is_file() {
            return Err(SweepError::EntryPointMissing {
                workspace: workspace.display().to_string(),
                entry_point: self.settings.entry_point.clone(),
            });
        }
        Ok(workspace)
    }

    /// Live counters of a sweep.
    pub fn progress(&self, task_id: &str) -> Result<ProgressView, SweepError> {
        self.registry
            .progress(task_id)
            .ok_or_else(|| SweepError::TaskNotFound(task_id.to_string()))
    }

    /// Ranked results of a sweep.
    pub fn results(&self, task_id: &str) -> Result<ResultsView, SweepError> {
        self.registry
            .results(task_id)
            .ok_or_else(|| SweepError::TaskNotFound(task_id.to_string()))
    }

    /// Soft-cancel a running sweep.
    ///
    /// Returns `false` for unknown ids and sweeps that already finished.
    pub fn cancel(&self, task_id: &str) -> bool {
        let cancelled = self
            .registry
            .update(task_id, |task| task.transition(SweepStatus::Cancelled, None))
            .unwrap_or(false);

        if cancelled {
            info!(task_id = %task_id, "Sweep cancelled");
            record_sweep_finished(SweepStatus::Cancelled.as_str());
            update_running_sweeps(self.registry.running_task_ids().len());
        }
        cancelled
    }

    /// Stop every sweep, killing in-flight trials, and wait for the drivers.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("Sweep orchestrator stopped");
    }
}

struct PreparedSweep {
    workspace: PathBuf,
    grid: Grid,
    worker_count: usize,
}

/// State owned by one sweep's background task.
struct SweepDriver<R> {
    task_id: String,
    strategy_id: String,
    workspace: PathBuf,
    scratch: PathBuf,
    worker_count: usize,
    registry: Arc<TaskRegistry>,
    runner: Arc<R>,
    shutdown: CancellationToken,
}

impl<R: TrialRunner + 'static> SweepDriver<R> {
    /// Run the driver, turn any escape into `error` status, drop the scratch root.
    async fn supervise(self, grid: Grid) {
        let outcome = AssertUnwindSafe(self.drive(grid)).catch_unwind().await;

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(panic) => Some(format!("Sweep driver panicked: {}", panic_message(&*panic))),
        };

        if let Some(message) = failure {
            let transitioned = self
                .registry
                .update(&self.task_id, |task| {
                    task.transition(SweepStatus::Error, Some(message.clone()))
                })
                .unwrap_or(false);
            if transitioned {
                error!(task_id = %self.task_id, error = %message, "Sweep failed");
                record_sweep_finished(SweepStatus::Error.as_str());
            }
        }

        remove_scratch(&self.scratch).await;
        update_running_sweeps(self.registry.running_task_ids().len());
    }

    async fn drive(&self, grid: Grid) -> Result<(), SweepError> {
        let mut pending = grid.iter().enumerate();
        let mut workers: JoinSet<TrialResult> = JoinSet::new();
        let mut in_flight: HashMap<Id, (usize, ParamCombination)> = HashMap::new();

        for _ in 0..self.worker_count {
            if !self.dispatch(&mut workers, &mut in_flight, &mut pending) {
                break;
            }
        }

        loop {
            let joined = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => None,
                joined = workers.join_next_with_id() => Some(joined),
            };

            let Some(joined) = joined else {
                workers.shutdown().await;
                return Err(SweepError::Shutdown);
            };
            let Some(joined) = joined else {
                break;
            };

            let result = match joined {
                Ok((id, result)) => {
                    in_flight.remove(&id);
                    result
                }
                Err(e) => {
                    let (trial_index, params) = in_flight.remove(&e.id()).unwrap_or_default();
                    let message = if e.is_panic() {
                        format!("Trial panicked: {}", panic_message(&*e.into_panic()))
                    } else {
                        "Trial task was cancelled".to_string()
                    };
                    warn!(task_id = %self.task_id, trial_index, error = %message, "Trial aborted");
                    TrialResult::failed(params, trial_index, message, 0)
                }
            };

            record_trial_outcome(
                &self.strategy_id,
                result.success,
                result.duration_ms as f64 / 1000.0,
            );

            let status = self.registry.update(&self.task_id, |task| {
                task.record_trial(result);
                task.status
            });

            if status == Some(SweepStatus::Running) {
                self.dispatch(&mut workers, &mut in_flight, &mut pending);
            }
        }

        let completed = self
            .registry
            .update(&self.task_id, |task| {
                if task.finished() >= task.total {
                    task.transition(SweepStatus::Completed, None)
                } else {
                    false
                }
            })
            .unwrap_or(false);

        if let Some(task) = self.registry.get(&self.task_id) {
            if completed {
                info!(
                    task_id = %self.task_id,
                    completed = task.completed,
                    failed = task.failed,
                    "Sweep completed"
                );
                record_sweep_finished(SweepStatus::Completed.as_str());
            } else {
                info!(
                    task_id = %self.task_id,
                    status = %task.status,
                    completed = task.completed,
                    failed = task.failed,
                    "Sweep drained"
                );
            }
        }

        Ok(())
    }

    /// Start the next pending trial. Returns `false` once the grid is exhausted.
    fn dispatch(
        &self,
        workers: &mut JoinSet<TrialResult>,
        in_flight: &mut HashMap<Id, (usize, ParamCombination)>,
        pending: &mut impl Iterator<Item = (usize, ParamCombination)>,
    ) -> bool {
        let Some((trial_index, params)) = pending.next() else {
            return false;
        };

        let spec = TrialSpec {
            workspace: self.workspace.clone(),
            params: params.clone(),
            trial_index,
            scratch_root: self.scratch.clone(),
        };
        let runner = Arc::clone(&self.runner);
        let span = debug_span!("trial", task_id = %self.task_id, trial_index);

        debug!(task_id = %self.task_id, trial_index, params = %params, "Dispatching trial");
        let handle = workers.spawn(async move { runner.run_trial(spec).await }.instrument(span));
        in_flight.insert(handle.id(), (trial_index, params));
        true
    }
}

fn is_valid_strategy_id(id: &str) -> bool {
    !id.is_empty() && id != "." && id != ".." && !id.contains(['/', '\\', '\0'])
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

async fn remove_scratch(scratch: &Path) {
    match tokio::fs::remove_dir_all(scratch).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %scratch.display(), error = %e, "Failed to remove scratch root"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tempfile::TempDir;
    use tokio::sync::Semaphore;

    use super::*;
    use crate::sweep::grid::{ParamRangeSpec, ParamValue};
    use crate::sweep::trial::MockTrialRunner;
    use crate::sweep::types::MetricSet;

    struct Fixture {
        _strategies: TempDir,
        scratch: TempDir,
        settings: SweepSettings,
    }

    fn fixture() -> Fixture {
        let strategies = tempfile::tempdir().unwrap();
        let workspace = strategies.path().join("sma_cross");
        std::fs::create_dir_all(&workspace).unwrap();
        std::fs::write(workspace.join("main.py"), "print('ok')\n").unwrap();
        std::fs::create_dir_all(strategies.path().join("no_entry")).unwrap();

        let scratch = tempfile::tempdir().unwrap();
        let settings = SweepSettings {
            strategies_root: strategies.path().to_path_buf(),
            scratch_root: scratch.path().to_path_buf(),
            entry_point: "main.py".to_string(),
            default_worker_count: DEFAULT_WORKER_COUNT,
        };
        Fixture {
            _strategies: strategies,
            scratch,
            settings,
        }
    }

    fn build<R: TrialRunner + 'static>(fx: &Fixture, runner: Arc<R>) -> SweepOrchestrator<R> {
        SweepOrchestrator::new(Arc::new(TaskRegistry::new()), runner, fx.settings.clone())
    }

    fn request(strategy_id: &str, ranges: ParamRanges, worker_count: Option<usize>) -> SweepRequest {
        SweepRequest {
            strategy_id: strategy_id.to_string(),
            param_ranges: ranges,
            worker_count,
        }
    }

    fn period_ranges(end: i64) -> ParamRanges {
        ParamRanges::new().with("period", ParamRangeSpec::int(1, end, 1))
    }

    fn metrics_for(spec: &TrialSpec) -> MetricSet {
        let period = spec.params.get("period").map_or(0, |v| v.as_int());
        MetricSet {
            annual_return_pct: period as f64,
            ..MetricSet::default()
        }
    }

    async fn wait_until<F: Fn() -> bool>(condition: F) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    async fn wait_terminal<R: TrialRunner + 'static>(
        orchestrator: &SweepOrchestrator<R>,
        task_id: &str,
    ) -> ProgressView {
        wait_until(|| orchestrator.progress(task_id).unwrap().status.is_terminal()).await;
        orchestrator.progress(task_id).unwrap()
    }

    /// Runner that blocks every trial until a permit is released.
    struct GatedRunner {
        gate: Semaphore,
        started: AtomicUsize,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl GatedRunner {
        fn new() -> Self {
            Self {
                gate: Semaphore::new(0),
                started: AtomicUsize::new(0),
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    /// Runner whose second trial panics.
    struct PanickingRunner;

    #[async_trait]
    impl TrialRunner for PanickingRunner {
        async fn run_trial(&self, spec: TrialSpec) -> TrialResult {
            assert!(spec.trial_index != 1, "entry point exploded");
            let metrics = metrics_for(&spec);
            TrialResult::succeeded(spec.params, spec.trial_index, metrics, 1)
        }
    }

    #[async_trait]
    impl TrialRunner for GatedRunner {
        async fn run_trial(&self, spec: TrialSpec) -> TrialResult {
            self.started.fetch_add(1, Ordering::SeqCst);
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(active, Ordering::SeqCst);

            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }

            self.active.fetch_sub(1, Ordering::SeqCst);
            let metrics = metrics_for(&spec);
            TrialResult::succeeded(spec.params, spec.trial_index, metrics, 1)
        }
    }

    #[tokio::test]
    async fn test_submission_errors() {
        let fx = fixture();
        let orchestrator = build(&fx, Arc::new(MockTrialRunner::new()));

        let cases = [
            (request("../etc", period_ranges(3), None), "INVALID_STRATEGY_ID"),
            (request("", period_ranges(3), None), "INVALID_STRATEGY_ID"),
            (request("missing", period_ranges(3), None), "STRATEGY_NOT_FOUND"),
            (request("no_entry", period_ranges(3), None), "ENTRY_POINT_MISSING"),
            (request("sma_cross", period_ranges(3), Some(0)), "INVALID_WORKER_COUNT"),
            (
                request(
                    "sma_cross",
                    ParamRanges::new().with("period", ParamRangeSpec::int(5, 1, 1)),
                    None,
                ),
                "EMPTY_GRID",
            ),
            (
                request(
                    "sma_cross",
                    ParamRanges::new().with("period", ParamRangeSpec::float(1.0, 2.0, 0.0)),
                    None,
                ),
                "INVALID_RANGE",
            ),
            (
                request(
                    "sma_cross",
                    ParamRanges::new().with("sharpeRatio", ParamRangeSpec::int(1, 3, 1)),
                    None,
                ),
                "INVALID_RANGE",
            ),
            (
                request(
                    "sma_cross",
                    ParamRanges::new()
                        .with("a", ParamRangeSpec::int(0, 1_000_000_000, 1))
                        .with("b", ParamRangeSpec::int(0, 1_000_000_000, 1))
                        .with("c", ParamRangeSpec::int(0, 1_000_000_000, 1)),
                    None,
                ),
                "INVALID_RANGE",
            ),
        ];

        for (req, code) in cases {
            let err = orchestrator.submit(req).unwrap_err();
            assert_eq!(err.code(), code, "{err}");
        }
        assert!(orchestrator.registry().is_empty());
    }

    #[tokio::test]
    async fn test_sweep_completes_with_partial_failures() {
        let fx = fixture();
        let mut runner = MockTrialRunner::new();
        runner.expect_run_trial().times(5).returning(|spec| {
            if spec.trial_index % 2 == 1 {
                TrialResult::failed(spec.params, spec.trial_index, "Trial timed out after 600s", 3)
            } else {
                let metrics = metrics_for(&spec);
                TrialResult::succeeded(spec.params, spec.trial_index, metrics, 3)
            }
        });

        let orchestrator = build(&fx, Arc::new(runner));
        let task_id = orchestrator
            .submit(request("sma_cross", period_ranges(5), Some(2)))
            .unwrap();

        let progress = wait_terminal(&orchestrator, &task_id).await;
        assert_eq!(progress.status, SweepStatus::Completed);
        assert_eq!(progress.total, 5);
        assert_eq!(progress.completed, 3);
        assert_eq!(progress.failed, 2);
        assert_eq!(progress.progress_pct, 100.0);

        let results = orchestrator.results(&task_id).unwrap();
        assert_eq!(results.rows.len(), results.completed);
        assert_eq!(
            results.best.unwrap().params.get("period"),
            Some(ParamValue::Int(5))
        );

        let scratch = fx.scratch.path().join(format!("{SWEEP_DIR_PREFIX}{task_id}"));
        wait_until(|| !scratch.exists()).await;
    }

    #[tokio::test]
    async fn test_worker_pool_is_bounded() {
        let fx = fixture();
        let runner = Arc::new(GatedRunner::new());
        let orchestrator = build(&fx, Arc::clone(&runner));

        let task_id = orchestrator
            .submit(request("sma_cross", period_ranges(8), Some(3)))
            .unwrap();

        wait_until(|| runner.started.load(Ordering::SeqCst) == 3).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(runner.started.load(Ordering::SeqCst), 3);

        runner.gate.add_permits(8);
        let progress = wait_terminal(&orchestrator, &task_id).await;

        assert_eq!(progress.status, SweepStatus::Completed);
        assert_eq!(progress.completed, 8);
        assert!(runner.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_large_grid_is_dispatched_lazily() {
        let fx = fixture();
        let runner = Arc::new(GatedRunner::new());
        let orchestrator = build(&fx, Arc::clone(&runner));

        let task_id = orchestrator
            .submit(request("sma_cross", period_ranges(1_000_000_000_000), Some(2)))
            .unwrap();
        wait_until(|| runner.started.load(Ordering::SeqCst) == 2).await;

        let progress = orchestrator.progress(&task_id).unwrap();
        assert_eq!(progress.status, SweepStatus::Running);
        assert_eq!(progress.total, 1_000_000_000_000);

        orchestrator.shutdown().await;
        assert_eq!(runner.started.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancel_is_soft() {
        let fx = fixture();
        let runner = Arc::new(GatedRunner::new());
        let orchestrator = build(&fx, Arc::clone(&runner));

        let task_id = orchestrator
            .submit(request("sma_cross", period_ranges(6), Some(2)))
            .unwrap();
        wait_until(|| runner.started.load(Ordering::SeqCst) == 2).await;

        assert!(orchestrator.cancel(&task_id));
        assert_eq!(
            orchestrator.progress(&task_id).unwrap().status,
            SweepStatus::Cancelled
        );
        assert!(!orchestrator.cancel(&task_id));
        assert!(!orchestrator.cancel("unknown"));

        runner.gate.add_permits(6);
        let scratch = fx.scratch.path().join(format!("{SWEEP_DIR_PREFIX}{task_id}"));
        wait_until(|| !scratch.exists()).await;

        let progress = orchestrator.progress(&task_id).unwrap();
        assert_eq!(progress.status, SweepStatus::Cancelled);
        assert_eq!(progress.completed, 2);
        assert_eq!(runner.started.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_trial_panic_counts_as_failure() {
        let fx = fixture();
        let orchestrator = build(&fx, Arc::new(PanickingRunner));
        let task_id = orchestrator
            .submit(request("sma_cross", period_ranges(3), Some(1)))
            .unwrap();

        let progress = wait_terminal(&orchestrator, &task_id).await;
        assert_eq!(progress.status, SweepStatus::Completed);
        assert_eq!(progress.completed, 2);
        assert_eq!(progress.failed, 1);
    }

    #[tokio::test]
    async fn test_empty_ranges_run_once() {
        let fx = fixture();
        let mut runner = MockTrialRunner::new();
        runner.expect_run_trial().times(1).returning(|spec| {
            TrialResult::succeeded(spec.params, spec.trial_index, MetricSet::default(), 1)
        });

        let orchestrator = build(&fx, Arc::new(runner));
        let task_id = orchestrator
            .submit(request("sma_cross", ParamRanges::new(), None))
            .unwrap();

        let progress = wait_terminal(&orchestrator, &task_id).await;
        assert_eq!(progress.total, 1);
        assert_eq!(progress.completed, 1);
        assert_eq!(progress.worker_count, DEFAULT_WORKER_COUNT);
    }

    #[tokio::test]
    async fn test_shutdown_aborts_running_sweeps() {
        let fx = fixture();
        let runner = Arc::new(GatedRunner::new());
        let orchestrator = build(&fx, Arc::clone(&runner));

        let task_id = orchestrator
            .submit(request("sma_cross", period_ranges(4), Some(2)))
            .unwrap();
        wait_until(|| runner.started.load(Ordering::SeqCst) == 2).await;

        orchestrator.shutdown().await;

        let progress = orchestrator.progress(&task_id).unwrap();
        assert_eq!(progress.status, SweepStatus::Error);
        assert_eq!(progress.error.as_deref(), Some("Orchestrator shut down"));
        assert_eq!(progress.completed + progress.failed, 0);
        assert!(!fx.scratch.path().join(format!("{SWEEP_DIR_PREFIX}{task_id}")).exists());

        let err = orchestrator
            .submit(request("sma_cross", period_ranges(2), None))
            .unwrap_err();
        assert!(matches!(err, SweepError::Shutdown));
    }

    #[test]
    fn test_strategy_id_validation() {
        assert!(is_valid_strategy_id("sma_cross"));
        assert!(is_valid_strategy_id("v2.momentum"));
        assert!(!is_valid_strategy_id(""));
        assert!(!is_valid_strategy_id(".."));
        assert!(!is_valid_strategy_id("a/b"));
        assert!(!is_valid_strategy_id("a\\b"));
    }

    #[test]
    fn test_request_deserialization_keeps_order() {
        let req: SweepRequest = serde_json::from_str(
            r#"{"strategyId": "sma_cross", "paramRanges": {
                "slow": {"start": 20, "end": 30, "step": 10, "type": "int"},
                "fast": {"start": 5, "end": 10, "step": 5, "type": "int"}
            }}"#,
        )
        .unwrap();

        assert_eq!(req.strategy_id, "sma_cross");
        assert_eq!(req.param_ranges.names(), vec!["slow", "fast"]);
        assert!(req.worker_count.is_none());
    }
}
