//! Consistency checker: reconcile the metadata store with the filesystem.
//!
//! Three sources of truth can drift apart (URL records, checksum index, files
//! on disk) after a crash, a manual deletion, or an edited file. For each
//! record the file is located and re-hashed:
//! - file gone → record and checksum entry removed (missing file)
//! - bytes changed → stored checksum replaced by the on-disk one (mismatch)
//!
//! Files under the category directories that no record points at are
//! reported as orphans and never deleted.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::checksum;
use crate::storage;
use crate::store::{ChecksumUpdate, MetadataStore, StoreError};

/// Issues found by one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Recorded filenames with no file on disk (records removed).
    pub missing_files: Vec<String>,
    /// Files whose bytes no longer match their record (records repaired).
    pub checksum_mismatches: Vec<String>,
    /// Untracked files under the category directories, relative to the root.
    pub orphaned_files: Vec<String>,
}

impl ReconcileReport {
    pub fn total(&self) -> usize {
        self.missing_files.len() + self.checksum_mismatches.len() + self.orphaned_files.len()
    }

    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }

    /// True if the pass changed the store (orphans alone never do).
    pub fn mutated_store(&self) -> bool {
        !self.missing_files.is_empty() || !self.checksum_mismatches.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to scan {}", .path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Checks a store rooted at `root` whose files live in the given category subdirectories.
#[derive(Debug, Clone)]
pub struct ConsistencyChecker {
    root: PathBuf,
    categories: Vec<String>,
}

impl ConsistencyChecker {
    pub fn new<I, S>(root: &Path, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            root: root.to_path_buf(),
            categories: categories.into_iter().map(Into::into).collect(),
        }
    }

    /// Best-effort lookup of a record's file: its own category first, then
    /// every known category, then the root. First match wins.
    pub fn locate(&self, filename: &str, category: Option<&str>) -> Option<PathBuf> {
        let own = category.map(|c| self.root.join(c).join(filename));
        let others = self
            .categories
            .iter()
            .map(|c| self.root.join(c).join(filename));
        let root = std::iter::once(self.root.join(filename));
        own.into_iter()
            .chain(others)
            .chain(root)
            .find(|p| p.is_file())
    }

    /// Run one pass, repairing `store` in place. Persists the store if any
    /// record was removed or repaired.
    pub fn reconcile(&self, store: &mut MetadataStore) -> Result<ReconcileReport, ReconcileError> {
        let mut report = ReconcileReport::default();
        let mut tracked: HashSet<PathBuf> = HashSet::new();

        let snapshot: Vec<(String, String, Option<String>)> = store
            .records()
            .map(|r| (r.source_url.clone(), r.local_filename.clone(), r.category.clone()))
            .collect();

        for (url, filename, category) in snapshot {
            let Some(path) = self.locate(&filename, category.as_deref()) else {
                tracing::warn!(%url, %filename, "missing file; dropping record");
                store.remove_by_url(&url);
                report.missing_files.push(filename);
                continue;
            };

            let current = match checksum::sha256_file(&path) {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "could not verify checksum: {}", e);
                    tracked.insert(path);
                    continue;
                }
            };

            match store.update_checksum(&url, &current)? {
                ChecksumUpdate::Unchanged => {
                    tracked.insert(path);
                }
                ChecksumUpdate::Updated { old } => {
                    tracing::warn!(path = %path.display(), %old, new = %current, "checksum mismatch; trusting file on disk");
                    report.checksum_mismatches.push(self.relative(&path));
                    tracked.insert(path);
                }
                ChecksumUpdate::Collides { existing_url } => {
                    tracing::warn!(
                        path = %path.display(),
                        %existing_url,
                        "changed file now duplicates another record; dropping its record"
                    );
                    store.remove_by_url(&url);
                    report.checksum_mismatches.push(self.relative(&path));
                }
            }
        }

        for category in &self.categories {
            self.scan_orphans(&self.root.join(category), &tracked, &mut report)?;
        }
        report.orphaned_files.sort();

        if report.mutated_store() {
            store.persist()?;
        }

        tracing::info!(
            missing = report.missing_files.len(),
            mismatched = report.checksum_mismatches.len(),
            orphaned = report.orphaned_files.len(),
            "consistency check complete"
        );
        Ok(report)
    }

    fn scan_orphans(
        &self,
        dir: &Path,
        tracked: &HashSet<PathBuf>,
        report: &mut ReconcileReport,
    ) -> Result<(), ReconcileError> {
        let scan_err = |source: io::Error| ReconcileError::Scan {
            path: dir.to_path_buf(),
            source,
        };
        let entries = match std::fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(scan_err(e)),
        };
        for entry in entries {
            let entry = entry.map_err(scan_err)?;
            if !entry.file_type().map_err(scan_err)?.is_file() {
                continue;
            }
            if storage::is_temp_name(&entry.file_name().to_string_lossy()) {
                continue;
            }
            let path = entry.path();
            if !tracked.contains(&path) {
                tracing::warn!(path = %path.display(), "orphaned file");
                report.orphaned_files.push(self.relative(&path));
            }
        }
        Ok(())
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }
}
