//! `docsync watch` – periodic trigger around the sync job.

use anyhow::Result;
use docsync_core::config::SyncConfig;
use docsync_core::control::CancelToken;
use docsync_core::job::JobOutcome;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

use super::job::{cancel_on_ctrl_c, report_outcome, run_job_blocking};
use crate::cli::exit;

const CANCEL_POLL: Duration = Duration::from_millis(200);

async fn cancelled(token: &CancelToken) {
    while !token.is_cancelled() {
        tokio::time::sleep(CANCEL_POLL).await;
    }
}

/// Run the job now and then every `every_hours`. Each job is awaited before
/// the next tick is taken, so runs never overlap; ticks missed while a job
/// (or its backoff) was running are skipped.
pub async fn run_watch(cfg: SyncConfig, every_hours: u64) -> Result<i32> {
    let cfg = Arc::new(cfg);
    let cancel = CancelToken::new();
    let ctrl_c = cancel_on_ctrl_c(cancel.clone());

    let period = Duration::from_secs(every_hours.saturating_mul(3600));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tracing::info!(every_hours, "watch started");

    let code = loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = cancelled(&cancel) => break exit::CANCELLED,
        }
        let outcome = run_job_blocking(Arc::clone(&cfg), cancel.clone()).await?;
        let code = report_outcome(&outcome);
        match outcome {
            Err(_) => break code,
            Ok(JobOutcome::Cancelled { .. }) => break code,
            Ok(_) => tracing::info!("next run in {} hour(s)", every_hours),
        }
    };

    ctrl_c.abort();
    Ok(code)
}
