//! Sweep filesystem layout and limits.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sweep::DEFAULT_WORKER_COUNT;

/// Sweep configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Directory holding one workspace per strategy id.
    #[serde(default = "default_strategies_root")]
    pub strategies_root: PathBuf,
    /// Directory under which per-sweep scratch roots are created.
    #[serde(default = "default_scratch_root")]
    pub scratch_root: PathBuf,
    /// Shared data directory handed to every trial.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Worker pool size when a request omits it.
    #[serde(default = "default_worker_count")]
    pub default_worker_count: usize,
    /// Per-trial wall-clock limit in seconds.
    #[serde(default = "default_trial_timeout_secs")]
    pub trial_timeout_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            strategies_root: default_strategies_root(),
            scratch_root: default_scratch_root(),
            data_dir: default_data_dir(),
            default_worker_count: default_worker_count(),
            trial_timeout_secs: default_trial_timeout_secs(),
        }
    }
}

impl SweepConfig {
    /// Per-trial timeout as a duration.
    #[must_use]
    pub const fn trial_timeout(&self) -> Duration {
        Duration::from_secs(self.trial_timeout_secs)
    }
}

fn default_strategies_root() -> PathBuf {
    PathBuf::from("strategies")
}

fn default_scratch_root() -> PathBuf {
    std::env::temp_dir().join("sweep-engine")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

const fn default_worker_count() -> usize {
    DEFAULT_WORKER_COUNT
}

const fn default_trial_timeout_secs() -> u64 {
    600
}
