//! Durable "last run failed terminally" marker for external monitoring.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::storage;

#[derive(Debug, Clone)]
pub struct FailureSignal {
    path: PathBuf,
}

impl FailureSignal {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write (or overwrite) the signal file with a human-readable message.
    pub fn raise(
        &self,
        attempts: u32,
        last_error: &str,
        log_dir: &Path,
        now: DateTime<Utc>,
    ) -> io::Result<()> {
        let message = format!(
            "ALERT: docsync failed after {} attempts\nTime: {}\nLast error: {}\nCheck logs in: {}\n",
            attempts,
            now.format("%Y-%m-%d %H:%M:%S UTC"),
            last_error,
            log_dir.display()
        );
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        storage::atomic_write(&self.path, message.as_bytes())?;
        tracing::error!(path = %self.path.display(), "failure signal raised:\n{}", message);
        Ok(())
    }

    /// Remove the signal file. Clearing an absent signal is a no-op.
    pub fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "failure signal cleared");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub fn is_raised(&self) -> bool {
        self.path.is_file()
    }

    /// Message of a raised signal, `None` if absent.
    pub fn read(&self) -> io::Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn raise_then_clear() {
        let dir = tempfile::tempdir().unwrap();
        let signal = FailureSignal::new(&dir.path().join("SCRAPE_FAILURE.txt"));
        assert!(!signal.is_raised());

        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        signal
            .raise(5, "HTTP 503", &dir.path().join("logs"), now)
            .unwrap();
        assert!(signal.is_raised());
        let msg = signal.read().unwrap().unwrap();
        assert!(msg.starts_with("ALERT: docsync failed after 5 attempts"));
        assert!(msg.contains("2024-03-01 12:30:00 UTC"));
        assert!(msg.contains("HTTP 503"));
        assert!(msg.contains("logs"));

        signal.clear().unwrap();
        assert!(!signal.is_raised());
        assert_eq!(signal.read().unwrap(), None);
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let signal = FailureSignal::new(&dir.path().join("SCRAPE_FAILURE.txt"));
        signal.clear().unwrap();
        signal.clear().unwrap();
    }
}
