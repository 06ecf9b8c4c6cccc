//! Per-trial copies of a strategy workspace.

use std::fs;
use std::io;
use std::path::Path;

/// Recursively copy `source` into a fresh `dest`.
///
/// Any existing `dest` is removed first. Symlinked files are copied by
/// content; symlinked directories are skipped so link cycles cannot recurse.
pub fn copy_workspace(source: &Path, dest: &Path) -> io::Result<()> {
    if dest.exists() {
        fs::remove_dir_all(dest)?;
    }
    copy_dir(source, dest)
}

fn copy_dir(source: &Path, dest: &Path) -> io::Result<()> {
    fs::create_dir_all(dest)?;

    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            copy_dir(&from, &to)?;
        } else if file_type.is_symlink() {
            if from.is_file() {
                fs::copy(&from, &to)?;
            }
        } else {
            fs::copy(&from, &to)?;
        }
    }
    Ok(())
}

/// Remove a stale logs directory so the trial starts clean.
pub fn clear_logs(trial_dir: &Path, logs_dir: &str) -> io::Result<()> {
    let logs = trial_dir.join(logs_dir);
    match fs::remove_dir_all(&logs) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_copy_workspace_recursively() {
        let source = tempdir().unwrap();
        fs::write(source.path().join("main.py"), "print('hi')\n").unwrap();
        fs::create_dir_all(source.path().join("lib").join("nested")).unwrap();
        fs::write(source.path().join("lib").join("nested").join("util.py"), "x = 1\n").unwrap();

        let scratch = tempdir().unwrap();
        let dest = scratch.path().join("trial_0");
        copy_workspace(source.path(), &dest).unwrap();

        assert_eq!(
            fs::read_to_string(dest.join("main.py")).unwrap(),
            "print('hi')\n"
        );
        assert!(dest.join("lib").join("nested").join("util.py").is_file());
    }

    #[test]
    fn test_copy_workspace_replaces_existing_dest() {
        let source = tempdir().unwrap();
        fs::write(source.path().join("main.py"), "new\n").unwrap();

        let scratch = tempdir().unwrap();
        let dest = scratch.path().join("trial_0");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("stale.txt"), "old").unwrap();

        copy_workspace(source.path(), &dest).unwrap();

        assert!(!dest.join("stale.txt").exists());
        assert!(dest.join("main.py").exists());
    }

    #[test]
    fn test_copy_missing_source_fails() {
        let scratch = tempdir().unwrap();
        let result = copy_workspace(&scratch.path().join("absent"), &scratch.path().join("dest"));
        assert!(result.is_err());
    }

    #[test]
    fn test_clear_logs() {
        let dir = tempdir().unwrap();
        let run = dir.path().join("logs").join("20240101");
        fs::create_dir_all(&run).unwrap();
        fs::write(run.join("value.log"), "x").unwrap();

        clear_logs(dir.path(), "logs").unwrap();
        assert!(!dir.path().join("logs").exists());

        // Absent logs are fine.
        clear_logs(dir.path(), "logs").unwrap();
    }
}
