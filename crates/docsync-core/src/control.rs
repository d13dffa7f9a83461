//! Cooperative cancellation for a running job.
//!
//! A single `CancelToken` is created per process and handed to every layer
//! (scheduler, orchestrator, fetcher, discoverer). Setting it aborts the
//! current backoff sleep or transfer; in-flight temp files are dropped and
//! the store on disk keeps its last fully persisted state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Granularity of cancellable sleeps.
const SLEEP_SLICE: Duration = Duration::from_millis(200);

/// Error returned when work is stopped by a cancel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cancelled by stop request")]
pub struct Cancelled;

/// Shared stop flag. Cheap to clone; all clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Returns `Err(Cancelled)` if a stop was requested.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration`, waking early if cancelled.
    pub fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        let Some(deadline) = Instant::now().checked_add(duration) else {
            // Past the clock's range: only a stop request ends it.
            loop {
                self.check()?;
                std::thread::sleep(SLEEP_SLICE);
            }
        };
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            std::thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}
