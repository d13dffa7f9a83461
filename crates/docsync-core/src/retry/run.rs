//! Retry loop: run an attempt until success, exhaustion, fatal error, or stop.

use std::fmt;
use std::time::Duration;

use super::policy::{FailureKind, RetryDecision, RetryPolicy};
use crate::control::{CancelToken, Cancelled};

/// Errors that can be classified for retry decisions.
pub trait Classify {
    fn failure_kind(&self) -> FailureKind;
}

/// Blocks the worker between attempts. The real implementation is
/// `CancelToken`, which wakes early on a stop request.
pub trait Sleeper {
    fn sleep(&self, duration: Duration) -> Result<(), Cancelled>;
}

impl Sleeper for CancelToken {
    fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        CancelToken::sleep(self, duration)
    }
}

/// States of one job invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Attempting(u32),
    BackingOff(u32),
    Succeeded,
    ExhaustedFailed,
    Cancelled,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Attempting(n) => write!(f, "attempting({})", n),
            JobState::BackingOff(n) => write!(f, "backing-off({})", n),
            JobState::Succeeded => write!(f, "succeeded"),
            JobState::ExhaustedFailed => write!(f, "exhausted-failed"),
            JobState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// How a retried job ended.
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    Succeeded { attempts: u32, value: T },
    /// Every allowed attempt failed with a retryable error.
    Exhausted { attempts: u32, last_error: E },
    /// A non-retryable error ended the job early.
    Fatal { attempts: u32, error: E },
    /// Stopped during an attempt or a backoff sleep.
    Cancelled { attempts: u32 },
}

impl<T, E> RetryOutcome<T, E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Succeeded { attempts, .. }
            | RetryOutcome::Exhausted { attempts, .. }
            | RetryOutcome::Fatal { attempts, .. }
            | RetryOutcome::Cancelled { attempts } => *attempts,
        }
    }

    /// Terminal state reached.
    pub fn final_state(&self) -> JobState {
        match self {
            RetryOutcome::Succeeded { .. } => JobState::Succeeded,
            RetryOutcome::Exhausted { .. } | RetryOutcome::Fatal { .. } => JobState::ExhaustedFailed,
            RetryOutcome::Cancelled { .. } => JobState::Cancelled,
        }
    }
}

/// Runs `attempt_fn` (given the 1-based attempt number) until it succeeds or
/// the policy says stop, sleeping the backoff between failed attempts.
pub fn run_with_retry<T, E, F, S>(policy: &RetryPolicy, sleeper: &S, mut attempt_fn: F) -> RetryOutcome<T, E>
where
    E: Classify + fmt::Display,
    F: FnMut(u32) -> Result<T, E>,
    S: Sleeper + ?Sized,
{
    let mut attempt = 1u32;
    loop {
        tracing::debug!(state = %JobState::Attempting(attempt), max = policy.max_attempts, "retry state");
        let err = match attempt_fn(attempt) {
            Ok(value) => {
                tracing::debug!(state = %JobState::Succeeded, attempts = attempt, "retry state");
                return RetryOutcome::Succeeded {
                    attempts: attempt,
                    value,
                };
            }
            Err(e) => e,
        };

        let kind = err.failure_kind();
        tracing::error!(attempt, max = policy.max_attempts, ?kind, "attempt failed: {}", err);
        match (kind, policy.decide(attempt, kind)) {
            (FailureKind::Cancelled, _) => return RetryOutcome::Cancelled { attempts: attempt },
            (FailureKind::Fatal, _) => {
                return RetryOutcome::Fatal {
                    attempts: attempt,
                    error: err,
                }
            }
            (FailureKind::Retryable, RetryDecision::NoRetry) => {
                tracing::debug!(state = %JobState::ExhaustedFailed, attempts = attempt, "retry state");
                return RetryOutcome::Exhausted {
                    attempts: attempt,
                    last_error: err,
                };
            }
            (FailureKind::Retryable, RetryDecision::RetryAfter(delay)) => {
                tracing::warn!(
                    state = %JobState::BackingOff(attempt),
                    "retrying in {} seconds",
                    delay.as_secs()
                );
                if sleeper.sleep(delay).is_err() {
                    return RetryOutcome::Cancelled { attempts: attempt };
                }
                attempt += 1;
            }
        }
    }
}
