//! `docsync run` – one retry-wrapped sync job, plus the pieces `watch` shares.

use anyhow::{Context, Result};
use docsync_core::config::SyncConfig;
use docsync_core::control::CancelToken;
use docsync_core::discovery::HtmlLinkDiscoverer;
use docsync_core::fetch::CurlFetcher;
use docsync_core::job::{self, FatalError, JobOutcome};
use std::sync::Arc;

use crate::cli::exit;

/// Cancel `token` on the first Ctrl-C.
pub(super) fn cancel_on_ctrl_c(token: CancelToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("stop requested; finishing current step...");
            tracing::warn!("stop requested");
            token.cancel();
        }
    })
}

/// Run one job on a blocking thread; the whole job (including backoff sleeps)
/// finishes before this returns.
pub(super) async fn run_job_blocking(
    cfg: Arc<SyncConfig>,
    cancel: CancelToken,
) -> Result<Result<JobOutcome, FatalError>> {
    tokio::task::spawn_blocking(move || {
        let discoverer = HtmlLinkDiscoverer::new(&cfg);
        let fetcher = CurlFetcher::new(cfg.user_agent.clone());
        job::run_job(&cfg, &discoverer, &fetcher, &cancel)
    })
    .await
    .context("sync job task failed")
}

/// Print a one-line summary and map the outcome to an exit code.
pub(super) fn report_outcome(outcome: &Result<JobOutcome, FatalError>) -> i32 {
    match outcome {
        Ok(JobOutcome::Succeeded { attempts, result }) => {
            println!(
                "sync ok after {} attempt(s): {} new, {} skipped, {} failed, {} consistency issue(s)",
                attempts,
                result.new_downloads,
                result.skipped_duplicates,
                result.failures.len(),
                result.issues.total()
            );
            exit::OK
        }
        Ok(JobOutcome::ExhaustedFailed {
            attempts,
            last_error,
        }) => {
            eprintln!("sync failed after {} attempt(s): {}", attempts, last_error);
            exit::EXHAUSTED
        }
        Ok(JobOutcome::Cancelled { attempts }) => {
            eprintln!("sync cancelled during attempt {}", attempts);
            exit::CANCELLED
        }
        Err(fatal) => {
            tracing::error!("{}", fatal);
            eprintln!("sync aborted: {}", fatal);
            exit::FATAL
        }
    }
}

pub async fn run_once(cfg: SyncConfig) -> Result<i32> {
    let cancel = CancelToken::new();
    let ctrl_c = cancel_on_ctrl_c(cancel.clone());
    let outcome = run_job_blocking(Arc::new(cfg), cancel).await;
    ctrl_c.abort();
    Ok(report_outcome(&outcome?))
}
