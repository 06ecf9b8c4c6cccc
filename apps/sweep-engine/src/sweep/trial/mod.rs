//! Trial executor: one grid point, one isolated process.
//!
//! A trial runs through these steps, and any failure along the way becomes a
//! failed [`TrialResult`] instead of an error:
//!
//! 1. Copy the workspace into `<scratch_root>/trial_<index>`
//! 2. Remove any stale logs directory from the copy
//! 3. Merge the parameter combination into the copy's config file
//! 4. Neutralise assertion statements in the copied entry point
//! 5. Build the child environment (data dir, module search path, skip flag)
//! 6. Run the entry point from the copy under a wall-clock timeout
//! 7. Non-zero exit fails with the last stderr line
//! 8. Zero exit hands the copy to the log metric parser
//! 9. Delete the copy, best-effort

mod config;
mod isolate;
mod params;
mod patch;
mod process;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use super::metrics::{LogLayout, parse_metrics};
use super::types::{MetricSet, TrialResult, TrialSpec};

pub use config::EntryPointConfig;
pub use isolate::{clear_logs, copy_workspace};
pub use params::merge_parameters;
pub use patch::strip_assertions;
pub use process::{LaunchPaths, TRIAL_INDEX_ENV, last_stderr_line, trial_environment};

/// Default per-trial wall-clock limit.
pub const DEFAULT_TRIAL_TIMEOUT: Duration = Duration::from_secs(600);

/// Why a trial failed. Only ever surfaces as the error text of a result.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrialError {
    /// Workspace copy or log cleanup failed.
    #[error("Failed to isolate workspace: {0}")]
    Isolate(String),

    /// Config file could not be read, merged or written.
    #[error("Failed to merge parameters into config: {0}")]
    Config(String),

    /// Entry point could not be read or patched.
    #[error("Failed to patch entry point: {0}")]
    Patch(String),

    /// Child environment could not be built.
    #[error("Invalid trial environment: {0}")]
    Environment(String),

    /// Entry point could not be started or awaited.
    #[error("Failed to run entry point: {0}")]
    Spawn(String),

    /// Entry point exceeded the wall-clock limit.
    #[error("Trial timed out after {seconds}s")]
    Timeout {
        /// Limit in seconds.
        seconds: u64,
    },

    /// Entry point exited unsuccessfully.
    #[error("{message}")]
    NonZeroExit {
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
        /// Last stderr line, or a placeholder.
        message: String,
    },

    /// Entry point exited cleanly but left nothing to parse.
    #[error("Entry point produced no usable logs")]
    NoUsableLogs,

    /// A blocking step panicked or was cancelled.
    #[error("Trial step aborted: {0}")]
    Join(String),
}

/// Runs a single trial. Implementations must never fail: every problem is
/// reported through a failed [`TrialResult`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrialRunner: Send + Sync {
    /// Execute one grid point.
    async fn run_trial(&self, spec: TrialSpec) -> TrialResult;
}

/// Trial runner that executes the workspace entry point as a child process.
#[derive(Debug, Clone)]
pub struct ProcessTrialRunner {
    entry_point: EntryPointConfig,
    logs: LogLayout,
    data_dir: PathBuf,
    timeout: Duration,
}

impl ProcessTrialRunner {
    /// Create a runner.
    #[must_use]
    pub const fn new(
        entry_point: EntryPointConfig,
        logs: LogLayout,
        data_dir: PathBuf,
        timeout: Duration,
    ) -> Self {
        Self {
            entry_point,
            logs,
            data_dir,
            timeout,
        }
    }

    /// Entry-point contract used by this runner.
    #[must_use]
    pub const fn entry_point(&self) -> &EntryPointConfig {
        &self.entry_point
    }

    /// Per-trial timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn execute(&self, spec: &TrialSpec, trial_dir: &Path) -> Result<MetricSet, TrialError> {
        let prepare = {
            let workspace = spec.workspace.clone();
            let trial_dir = trial_dir.to_path_buf();
            let params = spec.params.clone();
            let entry_point = self.entry_point.clone();
            let logs_dir = self.logs.logs_dir.clone();
            tokio::task::spawn_blocking(move || {
                prepare_trial_dir(&workspace, &trial_dir, &params, &entry_point, &logs_dir)
            })
        };
        prepare
            .await
            .map_err(|e| TrialError::Join(e.to_string()))??;

        let paths = LaunchPaths {
            workspace: &spec.workspace,
            trial_dir,
            data_dir: &self.data_dir,
        };
        let env = trial_environment(&self.entry_point, &paths, spec.trial_index)?;
        let output =
            process::run_entry_point(&self.entry_point, &paths, env, self.timeout).await?;

        if !output.status.success() {
            let message = last_stderr_line(&output.stderr).unwrap_or_else(|| {
                format!("Entry point exited with {} and no stderr", output.status)
            });
            return Err(TrialError::NonZeroExit {
                code: output.status.code(),
                message,
            });
        }

        let parse = {
            let trial_dir = trial_dir.to_path_buf();
            let logs = self.logs.clone();
            tokio::task::spawn_blocking(move || parse_metrics(&trial_dir, &logs))
        };
        parse
            .await
            .map_err(|e| TrialError::Join(e.to_string()))?
            .ok_or(TrialError::NoUsableLogs)
    }
}

#[async_trait]
impl TrialRunner for ProcessTrialRunner {
    async fn run_trial(&self, spec: TrialSpec) -> TrialResult {
        let started = Instant::now();
        let trial_dir = spec.trial_dir();

        let outcome = self.execute(&spec, &trial_dir).await;
        remove_trial_dir(&trial_dir).await;

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match outcome {
            Ok(metrics) => {
                debug!(
                    params = %spec.params,
                    duration_ms,
                    annual_return_pct = metrics.annual_return_pct,
                    "Trial succeeded"
                );
                TrialResult::succeeded(spec.params, spec.trial_index, metrics, duration_ms)
            }
            Err(e) => {
                warn!(params = %spec.params, duration_ms, error = %e, "Trial failed");
                TrialResult::failed(spec.params, spec.trial_index, e.to_string(), duration_ms)
            }
        }
    }
}

/// Steps 1-4: copy, clean, configure and patch the trial directory.
fn prepare_trial_dir(
    workspace: &Path,
    trial_dir: &Path,
    params: &super::grid::ParamCombination,
    entry_point: &EntryPointConfig,
    logs_dir: &str,
) -> Result<(), TrialError> {
    copy_workspace(workspace, trial_dir).map_err(|e| TrialError::Isolate(e.to_string()))?;
    clear_logs(trial_dir, logs_dir).map_err(|e| TrialError::Isolate(e.to_string()))?;

    merge_parameters(
        &trial_dir.join(&entry_point.config_file),
        &entry_point.parameters_section,
        params,
    )?;

    if entry_point.patch_assertions {
        let script = trial_dir.join(&entry_point.script);
        let source =
            std::fs::read_to_string(&script).map_err(|e| TrialError::Patch(e.to_string()))?;
        let (patched, replaced) = strip_assertions(
            &source,
            &entry_point.assertion_keyword,
            &entry_point.assertion_replacement,
        );
        if replaced > 0 {
            std::fs::write(&script, patched).map_err(|e| TrialError::Patch(e.to_string()))?;
            debug!(replaced, "Neutralised entry-point assertions");
        }
    }

    Ok(())
}

async fn remove_trial_dir(trial_dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(trial_dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %trial_dir.display(), error = %e, "Failed to remove trial directory");
        }
    }
}
