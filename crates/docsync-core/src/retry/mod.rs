//! Retry and backoff for whole sync cycles.
//!
//! One job invocation walks a small state machine:
//! `Attempting(1)` → on failure `BackingOff(1)` → `Attempting(2)` → … until
//! the cycle succeeds (`Succeeded`) or the attempt budget is spent
//! (`ExhaustedFailed`). Failures are classified first: a fatal error (a logic
//! bug) is never retried, and a stop request ends the loop immediately.

mod policy;
mod run;

pub use policy::{FailureKind, RetryDecision, RetryPolicy};
pub use run::{run_with_retry, Classify, JobState, RetryOutcome, Sleeper};
