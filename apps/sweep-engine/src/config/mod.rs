//! Configuration module for the sweep engine.
//!
//! Provides configuration loading, validation, and environment variable
//! interpolation for all sweep engine components.
//!
//! # Usage
//!
//! ```rust,ignore
//! use sweep_engine::config::{Config, load_config};
//!
//! // Load from default path (sweep-engine.yaml)
//! let config = load_config(None)?;
//!
//! // Load from custom path
//! let config = load_config(Some("custom/sweep-engine.yaml"))?;
//!
//! println!("HTTP port: {}", config.server.http_port);
//! ```

mod observability;
mod server;
mod sweep;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use observability::{LoggingConfig, ObservabilityConfig};
pub use server::ServerConfig;
pub use sweep::SweepConfig;

use crate::sweep::{EntryPointConfig, LogLayout, ReaperConfig, SweepSettings};

/// Default configuration file name.
pub const DEFAULT_CONFIG_PATH: &str = "sweep-engine.yaml";

/// Environment variable overriding the configuration path.
pub const CONFIG_PATH_ENV: &str = "SWEEP_ENGINE_CONFIG";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Sweep layout and limits.
    #[serde(default)]
    pub sweep: SweepConfig,
    /// Entry-point contract for trials.
    #[serde(default)]
    pub entry_point: EntryPointConfig,
    /// Where trials write their logs.
    #[serde(default)]
    pub logs: LogLayout,
    /// Scratch reaper configuration.
    #[serde(default)]
    pub reaper: ReaperConfig,
    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Orchestrator settings derived from this configuration.
    #[must_use]
    pub fn sweep_settings(&self) -> SweepSettings {
        SweepSettings {
            strategies_root: self.sweep.strategies_root.clone(),
            scratch_root: self.sweep.scratch_root.clone(),
            entry_point: self.entry_point.script.clone(),
            default_worker_count: self.sweep.default_worker_count,
        }
    }
}

// ============================================
// Configuration Loading
// ============================================

/// Load configuration from a YAML file with environment variable interpolation.
///
/// # Arguments
///
/// * `path` - Optional path to the config file. Defaults to `SWEEP_ENGINE_CONFIG`,
///   then "sweep-engine.yaml".
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let env_path = std::env::var(CONFIG_PATH_ENV).ok();
    let path = path
        .or(env_path.as_deref())
        .unwrap_or(DEFAULT_CONFIG_PATH);

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_string(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string (useful for testing).
///
/// An empty document yields the defaults.
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = if interpolated.trim().is_empty() {
        Config::default()
    } else {
        serde_yaml_bw::from_str(&interpolated)?
    };
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax.
#[allow(clippy::expect_used)] // Regex is compile-time constant; expect() is safe here
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |cap: &regex::Captures<'_>| {
        let default_value = cap.get(2).map_or("", |m| m.as_str());
        match std::env::var(&cap[1]) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.to_string(),
        }
    })
    .into_owned()
}

/// Validate configuration values.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.sweep.default_worker_count == 0 {
        return Err(ConfigError::ValidationError(
            "sweep.default_worker_count must be at least 1".to_string(),
        ));
    }

    if config.sweep.trial_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "sweep.trial_timeout_secs must be at least 1".to_string(),
        ));
    }

    if config.entry_point.script.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "entry_point.script must not be empty".to_string(),
        ));
    }

    if config.logs.logs_dir.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "logs.logs_dir must not be empty".to_string(),
        ));
    }

    if config.reaper.enabled && config.reaper.interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "reaper.interval_secs must be at least 1".to_string(),
        ));
    }

    let valid_formats = ["json", "pretty"];
    if !valid_formats.contains(&config.observability.logging.format.as_str()) {
        return Err(ConfigError::ValidationError(format!(
            "observability.logging.format must be one of: {valid_formats:?}"
        )));
    }

    Ok(())
}
