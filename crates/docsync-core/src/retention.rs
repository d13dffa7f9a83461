//! Age-based cleanup of historical log files.

use std::fs;
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// Delete regular files in `dir` named `*suffix` whose mtime is older than
/// `max_age` relative to `now`. Returns how many were removed.
///
/// A missing `dir` is not an error. Files that cannot be inspected or removed
/// are logged and skipped.
pub fn sweep_old_files(dir: &Path, suffix: &str, max_age: Duration, now: SystemTime) -> io::Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    let cutoff = now.checked_sub(max_age).unwrap_or(SystemTime::UNIX_EPOCH);

    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_name().to_string_lossy().ends_with(suffix) {
            continue;
        }
        let modified = match entry.metadata().and_then(|m| {
            if m.is_file() {
                m.modified().map(Some)
            } else {
                Ok(None)
            }
        }) {
            Ok(Some(t)) => t,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(path = %path.display(), "cannot stat: {}", e);
                continue;
            }
        };
        if modified >= cutoff {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!(path = %path.display(), "failed to remove old file: {}", e),
        }
    }

    if removed > 0 {
        tracing::info!(dir = %dir.display(), removed, "removed old files");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(86_400);

    #[test]
    fn removes_only_old_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("old.log"), b"x").unwrap();
        fs::write(dir.path().join("keep.txt"), b"x").unwrap();
        fs::create_dir(dir.path().join("nested.log")).unwrap();

        // Files were just written, so "now" 91 days ahead makes them 91 days old.
        let later = SystemTime::now() + 91 * DAY;
        let removed = sweep_old_files(dir.path(), ".log", 90 * DAY, later).unwrap();
        assert_eq!(removed, 1);
        assert!(!dir.path().join("old.log").exists());
        assert!(dir.path().join("keep.txt").exists());
        assert!(dir.path().join("nested.log").is_dir());
    }

    #[test]
    fn keeps_recent_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("fresh.log"), b"x").unwrap();
        let removed = sweep_old_files(dir.path(), ".log", 90 * DAY, SystemTime::now()).unwrap();
        assert_eq!(removed, 0);
        assert!(dir.path().join("fresh.log").exists());
    }

    #[test]
    fn missing_dir_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let n = sweep_old_files(&dir.path().join("logs"), ".log", DAY, SystemTime::now()).unwrap();
        assert_eq!(n, 0);
    }
}
