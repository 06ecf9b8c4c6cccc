//! Periodic cleanup of leaked scratch directories.
//!
//! Trial and sweep cleanup is best-effort, so a crash or a failed delete can
//! leave `sweep_*` directories behind. The reaper removes those older than a
//! retention age that do not belong to a running sweep.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::orchestrator::SWEEP_DIR_PREFIX;
use super::registry::TaskRegistry;

// ============================================
// Configuration
// ============================================

/// Configuration for the scratch reaper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaperConfig {
    /// Whether the reaper runs at all.
    pub enabled: bool,
    /// Seconds between passes.
    pub interval_secs: u64,
    /// Minimum age, in seconds, before a directory is removed.
    pub max_age_secs: u64,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 3600,
            max_age_secs: 86_400,
        }
    }
}

// ============================================
// Types
// ============================================

/// Outcome of one reaper pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReapReport {
    /// Directories removed.
    pub dirs_removed: usize,
    /// Directories that could not be removed.
    pub failed: Vec<PathBuf>,
}

// ============================================
// Reaping
// ============================================

/// Remove stale `sweep_<id>` directories under `scratch_root`.
///
/// Directories whose id is in `active` are kept regardless of age. A missing
/// scratch root is an empty pass. Only an unreadable scratch root fails the
/// pass; an entry that cannot be inspected is logged and skipped.
pub fn reap_scratch_root(
    scratch_root: &Path,
    max_age: Duration,
    active: &HashSet<String>,
) -> io::Result<ReapReport> {
    let mut report = ReapReport::default();
    if !scratch_root.exists() {
        return Ok(report);
    }

    let now = SystemTime::now();
    for entry in fs::read_dir(scratch_root)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(root = ?scratch_root, error = ?e, "Failed to read scratch entry");
                continue;
            }
        };
        let path = entry.path();

        let Some(task_id) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.strip_prefix(SWEEP_DIR_PREFIX))
            .map(str::to_string)
        else {
            continue;
        };
        if active.contains(&task_id) {
            continue;
        }

        let age = match stale_dir_age(&entry, now) {
            Ok(Some(age)) => age,
            Ok(None) => continue,
            Err(e) => {
                warn!(path = ?path, error = ?e, "Failed to inspect scratch entry");
                continue;
            }
        };
        if age < max_age {
            continue;
        }

        match fs::remove_dir_all(&path) {
            Ok(()) => {
                debug!(path = ?path, age_secs = age.as_secs(), "Removed stale scratch directory");
                report.dirs_removed += 1;
            }
            Err(e) => {
                warn!(path = ?path, error = ?e, "Failed to remove stale scratch directory");
                report.failed.push(path);
            }
        }
    }

    Ok(report)
}

/// Age of a directory entry, or `None` when it is not a directory.
fn stale_dir_age(entry: &fs::DirEntry, now: SystemTime) -> io::Result<Option<Duration>> {
    if !entry.file_type()?.is_dir() {
        return Ok(None);
    }
    let modified = entry.metadata()?.modified().unwrap_or(now);
    Ok(Some(now.duration_since(modified).unwrap_or(Duration::ZERO)))
}

/// Run [`reap_scratch_root`] every `interval_secs` until `shutdown` fires.
pub fn spawn_reaper(
    config: ReaperConfig,
    scratch_root: PathBuf,
    registry: Arc<TaskRegistry>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(config.interval_secs.max(1)));
        let max_age = Duration::from_secs(config.max_age_secs);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let active: HashSet<String> = registry.running_task_ids().into_iter().collect();
                    let root = scratch_root.clone();
                    let pass = tokio::task::spawn_blocking(move || {
                        reap_scratch_root(&root, max_age, &active)
                    })
                    .await;

                    match pass {
                        Ok(Ok(report)) if report.dirs_removed > 0 || !report.failed.is_empty() => {
                            info!(
                                dirs_removed = report.dirs_removed,
                                failed = report.failed.len(),
                                "Scratch reaper pass finished"
                            );
                        }
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => warn!(error = %e, "Scratch reaper pass failed"),
                        Err(e) => warn!(error = %e, "Scratch reaper task aborted"),
                    }
                }
                () = shutdown.cancelled() => {
                    info!("Scratch reaper shutting down");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_sweep_dir(root: &Path, name: &str, age_secs: u64) -> PathBuf {
        let path = root.join(name);
        fs::create_dir_all(path.join("trial_0")).unwrap();
        fs::write(path.join("trial_0").join("main.py"), "pass\n").unwrap();

        let mtime = SystemTime::now() - Duration::from_secs(age_secs);
        filetime::set_file_mtime(&path, filetime::FileTime::from_system_time(mtime)).unwrap();
        path
    }

    #[test]
    fn test_reaper_config_default() {
        let config = ReaperConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.interval_secs, 3600);
        assert_eq!(config.max_age_secs, 86_400);
    }

    #[test]
    fn test_missing_root_is_empty_pass() {
        let dir = tempdir().unwrap();
        let report =
            reap_scratch_root(&dir.path().join("absent"), Duration::ZERO, &HashSet::new()).unwrap();
        assert_eq!(report, ReapReport::default());
    }

    #[test]
    fn test_removes_only_stale_inactive_sweeps() {
        let dir = tempdir().unwrap();
        let stale = create_sweep_dir(dir.path(), "sweep_old", 7200);
        let fresh = create_sweep_dir(dir.path(), "sweep_new", 10);
        let running = create_sweep_dir(dir.path(), "sweep_live", 7200);
        let unrelated = create_sweep_dir(dir.path(), "keep_me", 7200);

        let active = HashSet::from(["live".to_string()]);
        let report = reap_scratch_root(dir.path(), Duration::from_secs(3600), &active).unwrap();

        assert_eq!(report.dirs_removed, 1);
        assert!(report.failed.is_empty());
        assert!(!stale.exists());
        assert!(fresh.exists());
        assert!(running.exists());
        assert!(unrelated.exists());
    }

    #[test]
    fn test_plain_files_are_ignored() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("sweep_file"), "x").unwrap();

        let report = reap_scratch_root(dir.path(), Duration::ZERO, &HashSet::new()).unwrap();
        assert_eq!(report.dirs_removed, 0);
        assert!(dir.path().join("sweep_file").exists());
    }

    #[test]
    fn test_vanished_entry_is_an_inspection_error() {
        let dir = tempdir().unwrap();
        let gone = create_sweep_dir(dir.path(), "sweep_gone", 7200);

        let entry = fs::read_dir(dir.path()).unwrap().next().unwrap().unwrap();
        fs::remove_dir_all(&gone).unwrap();

        assert!(stale_dir_age(&entry, SystemTime::now()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_pass_continues_past_odd_entries() {
        let dir = tempdir().unwrap();
        std::os::unix::fs::symlink(dir.path().join("missing"), dir.path().join("sweep_dangling"))
            .unwrap();
        let stale = create_sweep_dir(dir.path(), "sweep_old", 7200);

        let report = reap_scratch_root(dir.path(), Duration::from_secs(3600), &HashSet::new())
            .unwrap();

        assert_eq!(report.dirs_removed, 1);
        assert!(report.failed.is_empty());
        assert!(!stale.exists());
        assert!(dir.path().join("sweep_dangling").symlink_metadata().is_ok());
    }

    #[tokio::test]
    async fn test_spawned_reaper_stops_on_shutdown() {
        let dir = tempdir().unwrap();
        let stale = create_sweep_dir(dir.path(), "sweep_old", 7200);
        let shutdown = CancellationToken::new();

        let handle = spawn_reaper(
            ReaperConfig {
                enabled: true,
                interval_secs: 1,
                max_age_secs: 60,
            },
            dir.path().to_path_buf(),
            Arc::new(TaskRegistry::new()),
            shutdown.clone(),
        );

        for _ in 0..200 {
            if !stale.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!stale.exists());

        shutdown.cancel();
        handle.await.unwrap();
    }
}
