//! One full discover → download → reconcile pass.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::time::SystemTime;

use chrono::Utc;
use serde::Serialize;

use crate::config::SyncConfig;
use crate::control::CancelToken;
use crate::discovery::{DiscoveryError, LinkDiscoverer};
use crate::fetch::FileFetcher;
use crate::logging::LOG_SUFFIX;
use crate::orchestrator::{DownloadOrchestrator, FileFailure, OrchestratorError};
use crate::reconcile::{ConsistencyChecker, ReconcileError, ReconcileReport};
use crate::report;
use crate::retention;
use crate::retry::{Classify, FailureKind};
use crate::storage;
use crate::store::{MetadataStore, StoreError};

/// Per-category tallies for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub discovered: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleResult {
    pub new_downloads: usize,
    pub skipped_duplicates: usize,
    pub failures: Vec<FileFailure>,
    pub issues: ReconcileReport,
    pub per_category: BTreeMap<String, CategoryCounts>,
}

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("discovery failed for {category}")]
    Discovery {
        category: String,
        #[source]
        source: DiscoveryError,
    },

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("cannot prepare {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cycle cancelled")]
    Cancelled,
}

impl From<OrchestratorError> for CycleError {
    fn from(e: OrchestratorError) -> Self {
        match e {
            OrchestratorError::Store(e) => CycleError::Store(e),
            OrchestratorError::Cancelled => CycleError::Cancelled,
        }
    }
}

impl Classify for CycleError {
    fn failure_kind(&self) -> FailureKind {
        match self {
            CycleError::Store(e) | CycleError::Reconcile(ReconcileError::Store(e))
                if e.is_invariant_violation() =>
            {
                FailureKind::Fatal
            }
            CycleError::Cancelled => FailureKind::Cancelled,
            _ => FailureKind::Retryable,
        }
    }
}

/// Run one cycle against `cfg.download_root`.
///
/// Records committed before an abort are persisted before the error is
/// returned, so files already moved into place stay tracked.
pub fn run_cycle_once(
    cfg: &SyncConfig,
    discoverer: &dyn LinkDiscoverer,
    fetcher: &dyn FileFetcher,
    cancel: &CancelToken,
) -> Result<CycleResult, CycleError> {
    let root = &cfg.download_root;
    std::fs::create_dir_all(root).map_err(|source| CycleError::Io {
        path: root.clone(),
        source,
    })?;

    let mut store = MetadataStore::load(root)?;
    tracing::info!(records = store.len(), root = %root.display(), "metadata loaded");

    let temp_dirs = std::iter::once(root.clone()).chain(cfg.categories().map(|c| root.join(c)));
    for dir in temp_dirs {
        if let Err(e) = storage::sweep_stale_temp_files(&dir) {
            tracing::warn!(dir = %dir.display(), "temp sweep failed: {}", e);
        }
    }

    let mut result = CycleResult::default();
    let downloaded = download_sources(cfg, discoverer, fetcher, cancel, &mut store, &mut result);
    if let Err(e) = downloaded {
        if store.is_dirty() {
            if let Err(persist_err) = store.persist() {
                tracing::error!("could not persist committed records after abort: {}", persist_err);
            }
        }
        return Err(e);
    }
    store.persist()?;

    let checker = ConsistencyChecker::new(root, cfg.categories());
    result.issues = checker.reconcile(&mut store)?;

    let text = report::render_report(cfg, &store, &result, Utc::now());
    tracing::info!("\n{}", text);
    if let Err(e) = report::write_report(&cfg.report_dir(), &text, Utc::now()) {
        tracing::warn!("failed to write report: {}", e);
    }

    let log_dir = cfg.log_dir();
    if let Err(e) = retention::sweep_old_files(&log_dir, LOG_SUFFIX, cfg.log_retention(), SystemTime::now()) {
        tracing::warn!("log retention sweep failed: {}", e);
    }

    tracing::info!(
        new = result.new_downloads,
        skipped = result.skipped_duplicates,
        failed = result.failures.len(),
        issues = result.issues.total(),
        "cycle complete"
    );
    Ok(result)
}

fn download_sources(
    cfg: &SyncConfig,
    discoverer: &dyn LinkDiscoverer,
    fetcher: &dyn FileFetcher,
    cancel: &CancelToken,
    store: &mut MetadataStore,
    result: &mut CycleResult,
) -> Result<(), CycleError> {
    let orchestrator = DownloadOrchestrator::new(
        fetcher,
        &cfg.download_root,
        cfg.fetch_timeout(),
        cfg.request_delay(),
        cancel,
    );

    for (i, source) in cfg.sources.iter().enumerate() {
        let _span = tracing::info_span!("source", category = %source.category).entered();
        if i > 0 {
            cancel.sleep(cfg.request_delay()).map_err(|_| CycleError::Cancelled)?;
        }

        let links = discoverer.discover(source, cancel).map_err(|e| match e {
            DiscoveryError::Cancelled => CycleError::Cancelled,
            source_err => CycleError::Discovery {
                category: source.category.clone(),
                source: source_err,
            },
        })?;

        let batch = orchestrator.download_all(store, &source.category, &links)?;
        let counts = CategoryCounts {
            discovered: links.len(),
            downloaded: batch.downloaded.len(),
            skipped: batch.skipped_duplicates,
            failed: batch.failures.len(),
        };
        tracing::info!(
            discovered = counts.discovered,
            downloaded = counts.downloaded,
            skipped = counts.skipped,
            failed = counts.failed,
            "source done"
        );
        result.new_downloads += counts.downloaded;
        result.skipped_duplicates += counts.skipped;
        result.failures.extend(batch.failures);
        result.per_category.insert(source.category.clone(), counts);
    }
    Ok(())
}
