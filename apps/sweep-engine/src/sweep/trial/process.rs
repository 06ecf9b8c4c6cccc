//! Launching a trial's entry point as a child process.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;

use super::TrialError;
use super::config::EntryPointConfig;

/// Environment variable carrying the trial's grid index.
pub const TRIAL_INDEX_ENV: &str = "SWEEP_TRIAL_INDEX";

/// Paths a trial process is launched with.
#[derive(Debug, Clone)]
pub struct LaunchPaths<'a> {
    /// Original workspace (module search path only).
    pub workspace: &'a Path,
    /// Trial copy, used as the working directory.
    pub trial_dir: &'a Path,
    /// Shared data directory.
    pub data_dir: &'a Path,
}

/// Environment overrides for a trial process.
///
/// The module search path gets the original workspace and the trial copy
/// prepended to whatever the parent process already has.
pub fn trial_environment(
    config: &EntryPointConfig,
    paths: &LaunchPaths<'_>,
    trial_index: usize,
) -> Result<Vec<(OsString, OsString)>, TrialError> {
    let mut env = Vec::new();

    if !config.data_dir_env.is_empty() {
        env.push((
            OsString::from(&config.data_dir_env),
            paths.data_dir.as_os_str().to_os_string(),
        ));
    }

    if !config.module_path_env.is_empty() {
        let mut search: Vec<PathBuf> = vec![
            paths.workspace.to_path_buf(),
            paths.trial_dir.to_path_buf(),
        ];
        if let Some(existing) = std::env::var_os(&config.module_path_env) {
            search.extend(std::env::split_paths(&existing));
        }
        let joined =
            std::env::join_paths(search).map_err(|e| TrialError::Environment(e.to_string()))?;
        env.push((OsString::from(&config.module_path_env), joined));
    }

    if !config.skip_validation_env.is_empty() {
        env.push((
            OsString::from(&config.skip_validation_env),
            OsString::from("1"),
        ));
    }

    env.push((
        OsString::from(TRIAL_INDEX_ENV),
        OsString::from(trial_index.to_string()),
    ));

    Ok(env)
}

/// Run the entry point from `paths.trial_dir` and wait up to `timeout`.
///
/// The child is killed when the timeout fires or when this future is
/// dropped, so an aborted trial never leaves its process behind.
pub async fn run_entry_point(
    config: &EntryPointConfig,
    paths: &LaunchPaths<'_>,
    env: Vec<(OsString, OsString)>,
    timeout: Duration,
) -> Result<Output, TrialError> {
    let script = paths.trial_dir.join(&config.script);

    let mut command = if config.interpreter.is_empty() {
        Command::new(&script)
    } else {
        let mut command = Command::new(&config.interpreter);
        command.args(&config.interpreter_args).arg(&script);
        command
    };

    command
        .current_dir(paths.trial_dir)
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command
        .spawn()
        .map_err(|e| TrialError::Spawn(e.to_string()))?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(TrialError::Spawn(e.to_string())),
        Err(_) => Err(TrialError::Timeout {
            seconds: timeout.as_secs(),
        }),
    }
}

/// Last non-empty line of a process's stderr.
pub fn last_stderr_line(stderr: &[u8]) -> Option<String> {
    String::from_utf8_lossy(stderr)
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .map(str::to_string)
}
