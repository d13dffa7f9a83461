//! Load and atomically persist the store as `metadata.json` + `checksums.json`.
//!
//! `metadata.json` is authoritative. It is written first, so a crash between
//! the two renames leaves a stale `checksums.json`, which `load` detects and
//! rebuilds from the records.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use super::record::PersistedRecord;
use super::{MetadataStore, StoreError, METADATA_FILE};
use crate::checksum;
use crate::storage;

impl MetadataStore {
    /// Load the store persisted in `dir`. A missing `metadata.json` means
    /// "never run" and yields an empty store; an unreadable one is an error.
    pub fn load(dir: &Path) -> Result<Self, StoreError> {
        let mut store = MetadataStore::empty(dir);
        let metadata_path = store.metadata_path();
        let checksums_path = store.checksums_path();

        let metadata_bytes = read_optional(&metadata_path)?;
        let checksum_bytes = read_optional(&checksums_path)?;

        let Some(metadata_bytes) = metadata_bytes else {
            if checksum_bytes.is_some() {
                return Err(StoreError::corrupt(
                    &checksums_path,
                    format!("present without {}", METADATA_FILE),
                ));
            }
            tracing::info!(dir = %dir.display(), "no persisted metadata; starting with an empty store");
            return Ok(store);
        };

        let persisted: BTreeMap<String, PersistedRecord> = serde_json::from_slice(&metadata_bytes)
            .map_err(|e| StoreError::corrupt(&metadata_path, e.to_string()))?;

        for (url, p) in persisted {
            if !checksum::is_valid_digest(&p.checksum) {
                return Err(StoreError::corrupt(
                    &metadata_path,
                    format!("record {} has malformed checksum {:?}", url, p.checksum),
                ));
            }
            if p.filename.is_empty() {
                return Err(StoreError::corrupt(
                    &metadata_path,
                    format!("record {} has an empty filename", url),
                ));
            }
            if let Some(owner) = store.by_checksum.get(&p.checksum) {
                return Err(StoreError::corrupt(
                    &metadata_path,
                    format!("records {} and {} share checksum {}", owner, url, p.checksum),
                ));
            }
            store.by_checksum.insert(p.checksum.clone(), url.clone());
            store.by_url.insert(url.clone(), p.into_record(url));
        }

        match checksum_bytes {
            Some(bytes) => {
                let on_disk: BTreeMap<String, String> = serde_json::from_slice(&bytes)
                    .map_err(|e| StoreError::corrupt(&checksums_path, e.to_string()))?;
                if on_disk != store.by_checksum {
                    tracing::warn!(
                        path = %checksums_path.display(),
                        "checksum index disagrees with metadata; rebuilt from records"
                    );
                    store.dirty = true;
                }
            }
            None if !store.by_url.is_empty() => {
                tracing::warn!(
                    path = %checksums_path.display(),
                    "checksum index missing; rebuilt from records"
                );
                store.dirty = true;
            }
            None => {}
        }

        tracing::debug!(records = store.len(), "loaded metadata store");
        Ok(store)
    }

    /// Atomically write both indices. On failure the previously persisted
    /// files stay as they were and in-memory state is kept for a later retry.
    pub fn persist(&mut self) -> Result<(), StoreError> {
        self.check_invariants()?;

        std::fs::create_dir_all(&self.dir).map_err(|source| StoreError::Persist {
            path: self.dir.clone(),
            source,
        })?;

        let records: BTreeMap<&str, PersistedRecord> = self
            .by_url
            .iter()
            .map(|(url, r)| (url.as_str(), PersistedRecord::from_record(r)))
            .collect();
        write_json(&self.metadata_path(), &records)?;
        write_json(&self.checksums_path(), &self.by_checksum)?;

        self.dirty = false;
        tracing::debug!(records = self.len(), dir = %self.dir.display(), "persisted metadata store");
        Ok(())
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    match std::fs::read(path) {
        Ok(b) => Ok(Some(b)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_vec_pretty(value).map_err(|e| StoreError::Persist {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidData, e),
    })?;
    storage::atomic_write(path, &json).map_err(|source| StoreError::Persist {
        path: path.to_path_buf(),
        source,
    })
}
