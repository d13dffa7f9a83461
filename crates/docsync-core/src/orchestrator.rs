//! Download orchestrator: fetch new links, dedup by content, commit records.
//!
//! Every transfer lands in a private temp file inside the category directory.
//! Only after the bytes are hashed and found to be new is the temp file
//! renamed into place and recorded. An untracked file already sitting at the
//! target name with the same bytes (left by a run that stopped before
//! persisting) is adopted instead of copied again. Per-file failures are collected and never
//! abort the batch; a store invariant violation or a stop request does.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use crate::checksum;
use crate::control::CancelToken;
use crate::discovery::DiscoveredLink;
use crate::fetch::{FetchError, FileFetcher};
use crate::storage;
use crate::store::{DownloadRecord, MetadataStore, StoreError};
use crate::url_model;

/// One link that could not be downloaded this cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub url: String,
    pub message: String,
}

/// Aggregated outcome of one batch of links.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Filenames newly stored, relative to the category directory.
    pub downloaded: Vec<String>,
    pub skipped_duplicates: usize,
    pub failures: Vec<FileFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum LinkOutcome {
    Downloaded(String),
    Duplicate,
}

#[derive(Debug, thiserror::Error)]
enum LinkError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn io_err(context: &'static str) -> impl FnOnce(io::Error) -> LinkError {
    move |source| LinkError::Io { context, source }
}

/// Errors that stop the batch.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("download batch cancelled")]
    Cancelled,
}

pub struct DownloadOrchestrator<'a> {
    fetcher: &'a dyn FileFetcher,
    root: PathBuf,
    fetch_timeout: Duration,
    request_delay: Duration,
    cancel: &'a CancelToken,
}

impl<'a> DownloadOrchestrator<'a> {
    pub fn new(
        fetcher: &'a dyn FileFetcher,
        root: &Path,
        fetch_timeout: Duration,
        request_delay: Duration,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            fetcher,
            root: root.to_path_buf(),
            fetch_timeout,
            request_delay,
            cancel,
        }
    }

    /// Process `links` for `category` one at a time, in order.
    pub fn download_all(
        &self,
        store: &mut MetadataStore,
        category: &str,
        links: &[DiscoveredLink],
    ) -> Result<BatchOutcome, OrchestratorError> {
        let dir = self.root.join(category);
        let mut outcome = BatchOutcome::default();

        for link in links {
            self.cancel.check().map_err(|_| OrchestratorError::Cancelled)?;

            if store.get(&link.url).is_some() {
                tracing::debug!(url = %link.url, "already tracked; skipping");
                outcome.skipped_duplicates += 1;
                continue;
            }

            // The previous request to the source was either the index page or
            // another file.
            self.cancel
                .sleep(self.request_delay)
                .map_err(|_| OrchestratorError::Cancelled)?;

            match self.process_link(store, category, &dir, link) {
                Ok(LinkOutcome::Downloaded(filename)) => {
                    tracing::info!(url = %link.url, %filename, "downloaded");
                    outcome.downloaded.push(filename);
                }
                Ok(LinkOutcome::Duplicate) => {
                    tracing::info!(url = %link.url, "content already tracked; discarded");
                    outcome.skipped_duplicates += 1;
                }
                Err(LinkError::Fetch(FetchError::Cancelled)) => {
                    return Err(OrchestratorError::Cancelled);
                }
                Err(LinkError::Store(e)) => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(url = %link.url, "download failed: {}", e);
                    outcome.failures.push(FileFailure {
                        url: link.url.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }
        Ok(outcome)
    }

    fn process_link(
        &self,
        store: &mut MetadataStore,
        category: &str,
        dir: &Path,
        link: &DiscoveredLink,
    ) -> Result<LinkOutcome, LinkError> {
        let wanted = url_model::destination_filename(&link.url, &link.suggested_filename);
        std::fs::create_dir_all(dir).map_err(io_err("create category directory"))?;

        // Dropping `temp` on any early return deletes it.
        let mut temp = storage::create_temp_in(dir, &wanted).map_err(io_err("create temp file"))?;
        let size_bytes = self
            .fetcher
            .fetch(&link.url, temp.as_file_mut(), self.fetch_timeout, self.cancel)?;
        let checksum = checksum::sha256_file(temp.path()).map_err(io_err("hash downloaded file"))?;

        if store.is_duplicate(&link.url, &checksum) {
            if let Some(owner) = store.url_for_checksum(&checksum) {
                tracing::debug!(url = %link.url, %owner, %checksum, "duplicate content");
            }
            return Ok(LinkOutcome::Duplicate);
        }

        let filename = if is_unrecorded_copy(store, category, dir, &wanted, &checksum) {
            // Promoted by an earlier run that stopped before persisting.
            tracing::info!(url = %link.url, filename = %wanted, "adopting identical untracked file");
            drop(temp);
            wanted
        } else {
            let filename = url_model::unique_filename(dir, &wanted);
            storage::promote(temp, &dir.join(&filename)).map_err(io_err("move file into place"))?;
            filename
        };

        store.record_success(DownloadRecord {
            source_url: link.url.clone(),
            local_filename: filename.clone(),
            checksum,
            size_bytes,
            downloaded_at: Utc::now(),
            category: Some(category.to_string()),
        })?;
        Ok(LinkOutcome::Downloaded(filename))
    }
}

/// True if `dir/name` exists, no record in `category` points at it, and its
/// bytes hash to `checksum`.
fn is_unrecorded_copy(
    store: &MetadataStore,
    category: &str,
    dir: &Path,
    name: &str,
    checksum: &str,
) -> bool {
    let path = dir.join(name);
    if !path.is_file() {
        return false;
    }
    let owned = store.records().any(|r| {
        r.local_filename == name && r.category.as_deref().map_or(true, |c| c == category)
    });
    if owned {
        return false;
    }
    match checksum::sha256_file(&path) {
        Ok(on_disk) => on_disk == checksum,
        Err(e) => {
            tracing::warn!(path = %path.display(), "could not hash existing file: {}", e);
            false
        }
    }
}
