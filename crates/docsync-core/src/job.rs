//! Retry-wrapped job: the single entry point a periodic trigger invokes.
//!
//! Each attempt runs a full cycle. Success clears the failure signal,
//! exhausting the retry budget raises it, and an invariant violation raises
//! it and is returned to the caller as fatal. A stop request leaves the
//! signal as it was.

use std::error::Error as StdError;

use chrono::Utc;

use crate::config::SyncConfig;
use crate::control::CancelToken;
use crate::cycle::{run_cycle_once, CycleError, CycleResult};
use crate::discovery::LinkDiscoverer;
use crate::failure_signal::FailureSignal;
use crate::fetch::FileFetcher;
use crate::retry::{run_with_retry, RetryOutcome, RetryPolicy};

/// How one job invocation ended (non-fatal cases).
#[derive(Debug)]
pub enum JobOutcome {
    Succeeded { attempts: u32, result: CycleResult },
    ExhaustedFailed { attempts: u32, last_error: String },
    Cancelled { attempts: u32 },
}

impl JobOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            JobOutcome::Succeeded { attempts, .. }
            | JobOutcome::ExhaustedFailed { attempts, .. }
            | JobOutcome::Cancelled { attempts } => *attempts,
        }
    }
}

/// A non-retryable failure; the process should stop with a diagnostic.
#[derive(Debug, thiserror::Error)]
#[error("fatal error on attempt {attempts}: {error}")]
pub struct FatalError {
    pub attempts: u32,
    pub error: CycleError,
}

/// `err` and all its causes, joined with ": ".
fn error_chain(err: &dyn StdError) -> String {
    let mut msg = err.to_string();
    let mut cur = err.source();
    while let Some(cause) = cur {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        cur = cause.source();
    }
    msg
}

pub fn run_job(
    cfg: &SyncConfig,
    discoverer: &dyn LinkDiscoverer,
    fetcher: &dyn FileFetcher,
    cancel: &CancelToken,
) -> Result<JobOutcome, FatalError> {
    let _span = tracing::info_span!("job").entered();
    let policy = RetryPolicy::from(&cfg.retry);
    let signal = FailureSignal::new(&cfg.failure_signal_path());

    let outcome = run_with_retry(&policy, cancel, |attempt| {
        let _span = tracing::info_span!("cycle", attempt).entered();
        run_cycle_once(cfg, discoverer, fetcher, cancel).inspect_err(|e| {
            tracing::warn!("cycle failed: {}", error_chain(e));
        })
    });

    match outcome {
        RetryOutcome::Succeeded { attempts, value } => {
            if let Err(e) = signal.clear() {
                tracing::warn!(path = %signal.path().display(), "could not clear failure signal: {}", e);
            }
            tracing::info!(attempts, "job succeeded");
            Ok(JobOutcome::Succeeded {
                attempts,
                result: value,
            })
        }
        RetryOutcome::Exhausted {
            attempts,
            last_error,
        } => {
            let last_error = error_chain(&last_error);
            if let Err(e) = signal.raise(attempts, &last_error, &cfg.log_dir(), Utc::now()) {
                tracing::error!(path = %signal.path().display(), "could not write failure signal: {}", e);
            }
            Ok(JobOutcome::ExhaustedFailed {
                attempts,
                last_error,
            })
        }
        RetryOutcome::Fatal { attempts, error } => {
            if let Err(e) = signal.raise(attempts, &error_chain(&error), &cfg.log_dir(), Utc::now()) {
                tracing::error!(path = %signal.path().display(), "could not write failure signal: {}", e);
            }
            Err(FatalError { attempts, error })
        }
        RetryOutcome::Cancelled { attempts } => {
            tracing::warn!(attempts, "job cancelled");
            Ok(JobOutcome::Cancelled { attempts })
        }
    }
}
