//! Metadata store: which URLs have been downloaded and which contents we hold.
//!
//! Two indices are kept in lockstep:
//! - `by_url`: source URL → `DownloadRecord`
//! - `by_checksum`: content checksum → the first URL that produced it
//!
//! No two records share a checksum, and every `by_checksum` entry points at a
//! record carrying that checksum. The store is mutated only by the download
//! orchestrator (inserts) and the consistency checker (removals and checksum
//! repairs), and hits disk only through `persist`, which replaces each file
//! atomically.

mod error;
mod persist;
mod record;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub use error::StoreError;
pub use record::DownloadRecord;

/// Serialized `by_url` map.
pub const METADATA_FILE: &str = "metadata.json";
/// Serialized `by_checksum` map.
pub const CHECKSUMS_FILE: &str = "checksums.json";

/// Outcome of `MetadataStore::update_checksum`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksumUpdate {
    /// Record and index now carry the new checksum.
    Updated { old: String },
    /// The record already had this checksum.
    Unchanged,
    /// Another record already owns this content; nothing was changed.
    Collides { existing_url: String },
}

#[derive(Debug)]
pub struct MetadataStore {
    dir: PathBuf,
    by_url: BTreeMap<String, DownloadRecord>,
    by_checksum: BTreeMap<String, String>,
    dirty: bool,
}

impl MetadataStore {
    /// An empty store that will persist into `dir`.
    pub fn empty(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            by_url: BTreeMap::new(),
            by_checksum: BTreeMap::new(),
            dirty: false,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    pub fn checksums_path(&self) -> PathBuf {
        self.dir.join(CHECKSUMS_FILE)
    }

    pub fn len(&self) -> usize {
        self.by_url.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_url.is_empty()
    }

    /// True if there are in-memory changes not yet persisted.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn get(&self, url: &str) -> Option<&DownloadRecord> {
        self.by_url.get(url)
    }

    /// URL that first produced `checksum`, if tracked.
    pub fn url_for_checksum(&self, checksum: &str) -> Option<&str> {
        self.by_checksum.get(checksum).map(String::as_str)
    }

    /// All records, ordered by URL.
    pub fn records(&self) -> impl Iterator<Item = &DownloadRecord> {
        self.by_url.values()
    }

    /// True if `url` already has a record or `checksum` is already tracked.
    /// `checksum` must be computed from the fully downloaded bytes.
    pub fn is_duplicate(&self, url: &str, checksum: &str) -> bool {
        self.by_url.contains_key(url) || self.by_checksum.contains_key(checksum)
    }

    /// Insert a new record into both indices.
    pub fn record_success(&mut self, record: DownloadRecord) -> Result<(), StoreError> {
        if self.by_url.contains_key(&record.source_url) {
            return Err(StoreError::InvariantViolation(format!(
                "record_success called for already tracked url {}",
                record.source_url
            )));
        }
        if let Some(owner) = self.by_checksum.get(&record.checksum) {
            return Err(StoreError::InvariantViolation(format!(
                "record_success called for checksum {} already owned by {}",
                record.checksum, owner
            )));
        }
        self.by_checksum
            .insert(record.checksum.clone(), record.source_url.clone());
        self.by_url.insert(record.source_url.clone(), record);
        self.dirty = true;
        Ok(())
    }

    /// Remove the record for `url` and its checksum entry if it owns it.
    pub fn remove_by_url(&mut self, url: &str) -> Option<DownloadRecord> {
        let record = self.by_url.remove(url)?;
        if self.by_checksum.get(&record.checksum).map(String::as_str) == Some(url) {
            self.by_checksum.remove(&record.checksum);
        }
        self.dirty = true;
        Some(record)
    }

    /// Replace the checksum of `url`'s record with `new_checksum` (disk wins
    /// over stale metadata). Refuses if another record already owns that content.
    pub fn update_checksum(
        &mut self,
        url: &str,
        new_checksum: &str,
    ) -> Result<ChecksumUpdate, StoreError> {
        let Some(record) = self.by_url.get_mut(url) else {
            return Err(StoreError::InvariantViolation(format!(
                "update_checksum called for untracked url {}",
                url
            )));
        };
        if record.checksum == new_checksum {
            return Ok(ChecksumUpdate::Unchanged);
        }
        if let Some(owner) = self.by_checksum.get(new_checksum) {
            return Ok(ChecksumUpdate::Collides {
                existing_url: owner.clone(),
            });
        }
        let old = std::mem::replace(&mut record.checksum, new_checksum.to_string());
        if self.by_checksum.get(&old).map(String::as_str) == Some(url) {
            self.by_checksum.remove(&old);
        }
        self.by_checksum
            .insert(new_checksum.to_string(), url.to_string());
        self.dirty = true;
        Ok(ChecksumUpdate::Updated { old })
    }

    /// Verify both indices agree. Cheap enough to run before every persist.
    pub fn check_invariants(&self) -> Result<(), StoreError> {
        if self.by_checksum.len() != self.by_url.len() {
            return Err(StoreError::InvariantViolation(format!(
                "{} records but {} checksum entries",
                self.by_url.len(),
                self.by_checksum.len()
            )));
        }
        for (checksum, url) in &self.by_checksum {
            match self.by_url.get(url) {
                Some(r) if &r.checksum == checksum => {}
                Some(r) => {
                    return Err(StoreError::InvariantViolation(format!(
                        "checksum index maps {} to {} whose record has {}",
                        checksum, url, r.checksum
                    )))
                }
                None => {
                    return Err(StoreError::InvariantViolation(format!(
                        "checksum index maps {} to untracked url {}",
                        checksum, url
                    )))
                }
            }
        }
        Ok(())
    }
}
