//! Error types for sweep submission and orchestration.
//!
//! Per-trial failures never surface here: the trial executor folds them into
//! a failed `TrialResult`. `SweepError` covers what is rejected synchronously
//! at submission, plus the few failures that abort a whole sweep.

use thiserror::Error;

/// Errors raised by the sweep orchestrator.
#[derive(Debug, Error)]
pub enum SweepError {
    /// Strategy id is empty or would escape the strategies root.
    #[error("Invalid strategy id '{0}'")]
    InvalidStrategyId(String),

    /// No workspace directory exists for the strategy.
    #[error("Strategy workspace not found: {0}")]
    StrategyNotFound(String),

    /// The workspace has no entry-point script.
    #[error("Entry point '{entry_point}' missing in workspace '{workspace}'")]
    EntryPointMissing {
        /// Workspace directory.
        workspace: String,
        /// Expected entry-point file name.
        entry_point: String,
    },

    /// A parameter range is not usable.
    #[error("Invalid range for parameter '{name}': {message}")]
    InvalidRange {
        /// Parameter name.
        name: String,
        /// What is wrong with it.
        message: String,
    },

    /// The parameter ranges produce no combinations.
    #[error("Parameter ranges produce an empty grid")]
    EmptyGrid,

    /// Worker count must be at least one.
    #[error("Worker count must be at least 1, got {0}")]
    InvalidWorkerCount(usize),

    /// The per-sweep scratch root could not be created.
    #[error("Failed to prepare scratch root '{path}': {source}")]
    ScratchSetup {
        /// Scratch directory.
        path: String,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The orchestrator was shut down while the sweep was running.
    #[error("Orchestrator shut down")]
    Shutdown,

    /// No sweep with this id is registered.
    #[error("Sweep task not found: {0}")]
    TaskNotFound(String),
}

impl SweepError {
    /// Stable machine-readable code for API responses.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidStrategyId(_) => "INVALID_STRATEGY_ID",
            Self::StrategyNotFound(_) => "STRATEGY_NOT_FOUND",
            Self::EntryPointMissing { .. } => "ENTRY_POINT_MISSING",
            Self::InvalidRange { .. } => "INVALID_RANGE",
            Self::EmptyGrid => "EMPTY_GRID",
            Self::InvalidWorkerCount(_) => "INVALID_WORKER_COUNT",
            Self::ScratchSetup { .. } => "SCRATCH_SETUP_FAILED",
            Self::Shutdown => "SHUTDOWN",
            Self::TaskNotFound(_) => "TASK_NOT_FOUND",
        }
    }

    /// Whether this error was caused by the caller's input.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidStrategyId(_)
                | Self::StrategyNotFound(_)
                | Self::EntryPointMissing { .. }
                | Self::InvalidRange { .. }
                | Self::EmptyGrid
                | Self::InvalidWorkerCount(_)
                | Self::TaskNotFound(_)
        )
    }
}
