//! Tests for the metadata store (indices, invariants, persistence).

use super::*;
use chrono::{TimeZone, Utc};

fn digest(c: char) -> String {
    std::iter::repeat(c).take(crate::checksum::HEX_LEN).collect()
}

fn record(url: &str, name: &str, checksum: &str) -> DownloadRecord {
    DownloadRecord {
        source_url: url.to_string(),
        local_filename: name.to_string(),
        checksum: checksum.to_string(),
        size_bytes: 42,
        downloaded_at: Utc.with_ymd_and_hms(2024, 5, 1, 2, 0, 0).unwrap(),
        category: Some("h1b".to_string()),
    }
}

#[test]
fn duplicate_by_url_or_checksum() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = MetadataStore::empty(dir.path());
    store
        .record_success(record("https://x.gov/a.csv", "a.csv", &digest('a')))
        .unwrap();

    assert!(store.is_duplicate("https://x.gov/a.csv", &digest('f')));
    assert!(store.is_duplicate("https://x.gov/mirror/a.csv", &digest('a')));
    assert!(!store.is_duplicate("https://x.gov/b.csv", &digest('b')));
    assert_eq!(store.url_for_checksum(&digest('a')), Some("https://x.gov/a.csv"));
}

#[test]
fn record_success_rejects_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = MetadataStore::empty(dir.path());
    store
        .record_success(record("https://x.gov/a.csv", "a.csv", &digest('a')))
        .unwrap();

    let same_url = store.record_success(record("https://x.gov/a.csv", "a2.csv", &digest('b')));
    assert!(matches!(same_url, Err(StoreError::InvariantViolation(_))));

    let same_content = store.record_success(record("https://x.gov/b.csv", "b.csv", &digest('a')));
    assert!(matches!(same_content, Err(StoreError::InvariantViolation(_))));

    assert_eq!(store.len(), 1);
    store.check_invariants().unwrap();
}

#[test]
fn remove_by_url_clears_both_indices() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = MetadataStore::empty(dir.path());
    store
        .record_success(record("https://x.gov/a.csv", "a.csv", &digest('a')))
        .unwrap();
    let removed = store.remove_by_url("https://x.gov/a.csv").unwrap();
    assert_eq!(removed.local_filename, "a.csv");
    assert!(store.is_empty());
    assert_eq!(store.url_for_checksum(&digest('a')), None);
    assert!(store.remove_by_url("https://x.gov/a.csv").is_none());
}

#[test]
fn update_checksum_moves_index_entry() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = MetadataStore::empty(dir.path());
    store
        .record_success(record("https://x.gov/a.csv", "a.csv", &digest('a')))
        .unwrap();

    let r = store.update_checksum("https://x.gov/a.csv", &digest('c')).unwrap();
    assert_eq!(r, ChecksumUpdate::Updated { old: digest('a') });
    assert_eq!(store.get("https://x.gov/a.csv").unwrap().checksum, digest('c'));
    assert_eq!(store.url_for_checksum(&digest('a')), None);
    assert_eq!(store.url_for_checksum(&digest('c')), Some("https://x.gov/a.csv"));
    store.check_invariants().unwrap();

    assert_eq!(
        store.update_checksum("https://x.gov/a.csv", &digest('c')).unwrap(),
        ChecksumUpdate::Unchanged
    );
}

#[test]
fn update_checksum_reports_collision_without_mutating() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = MetadataStore::empty(dir.path());
    store
        .record_success(record("https://x.gov/a.csv", "a.csv", &digest('a')))
        .unwrap();
    store
        .record_success(record("https://x.gov/b.csv", "b.csv", &digest('b')))
        .unwrap();

    let r = store.update_checksum("https://x.gov/b.csv", &digest('a')).unwrap();
    assert_eq!(
        r,
        ChecksumUpdate::Collides {
            existing_url: "https://x.gov/a.csv".to_string()
        }
    );
    assert_eq!(store.get("https://x.gov/b.csv").unwrap().checksum, digest('b'));
    store.check_invariants().unwrap();
}

#[test]
fn update_checksum_for_untracked_url_is_a_bug() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = MetadataStore::empty(dir.path());
    let err = store.update_checksum("https://x.gov/none", &digest('a')).unwrap_err();
    assert!(err.is_invariant_violation());
}

#[test]
fn load_missing_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::load(dir.path()).unwrap();
    assert!(store.is_empty());
    assert!(!store.is_dirty());
}

#[test]
fn persist_then_load_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = MetadataStore::empty(dir.path());
    store
        .record_success(record("https://x.gov/a.csv", "a.csv", &digest('a')))
        .unwrap();
    store
        .record_success(record("https://x.gov/b.csv", "b.csv", &digest('b')))
        .unwrap();
    assert!(store.is_dirty());
    store.persist().unwrap();
    assert!(!store.is_dirty());

    let loaded = MetadataStore::load(dir.path()).unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded.get("https://x.gov/b.csv"), store.get("https://x.gov/b.csv"));
    assert!(!loaded.is_dirty());
    loaded.check_invariants().unwrap();
}

#[test]
fn persisted_layout_matches_documented_shape() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = MetadataStore::empty(dir.path());
    store
        .record_success(record("https://x.gov/a.csv", "a.csv", &digest('a')))
        .unwrap();
    store.persist().unwrap();

    let meta: serde_json::Value =
        serde_json::from_slice(&std::fs::read(dir.path().join(METADATA_FILE)).unwrap()).unwrap();
    let entry = &meta["https://x.gov/a.csv"];
    assert_eq!(entry["filename"], "a.csv");
    assert_eq!(entry["checksum"], digest('a'));
    assert_eq!(entry["size_bytes"], 42);
    assert_eq!(entry["download_date"], "2024-05-01T02:00:00Z");

    let sums: serde_json::Value =
        serde_json::from_slice(&std::fs::read(dir.path().join(CHECKSUMS_FILE)).unwrap()).unwrap();
    assert_eq!(sums[digest('a')], "https://x.gov/a.csv");
}

#[test]
fn unparseable_metadata_is_corrupt_state() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(METADATA_FILE), b"{ not json").unwrap();
    let err = MetadataStore::load(dir.path()).unwrap_err();
    assert!(matches!(err, StoreError::CorruptState { .. }));
}

#[test]
fn unparseable_checksums_is_corrupt_state() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(METADATA_FILE), b"{}").unwrap();
    std::fs::write(dir.path().join(CHECKSUMS_FILE), b"[1,2").unwrap();
    let err = MetadataStore::load(dir.path()).unwrap_err();
    assert!(matches!(err, StoreError::CorruptState { .. }));
}

#[test]
fn checksums_without_metadata_is_corrupt_state() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(CHECKSUMS_FILE), b"{}").unwrap();
    let err = MetadataStore::load(dir.path()).unwrap_err();
    assert!(matches!(err, StoreError::CorruptState { .. }));
}

#[test]
fn shared_checksum_on_disk_is_corrupt_state() {
    let dir = tempfile::tempdir().unwrap();
    let json = format!(
        r#"{{
            "https://x.gov/a.csv": {{"filename":"a.csv","download_date":"2024-05-01T02:00:00Z","checksum":"{d}","size_bytes":1}},
            "https://x.gov/b.csv": {{"filename":"b.csv","download_date":"2024-05-01T02:00:00Z","checksum":"{d}","size_bytes":1}}
        }}"#,
        d = digest('a')
    );
    std::fs::write(dir.path().join(METADATA_FILE), json).unwrap();
    let err = MetadataStore::load(dir.path()).unwrap_err();
    assert!(matches!(err, StoreError::CorruptState { .. }));
}

#[test]
fn stale_checksum_index_is_rebuilt_from_records() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = MetadataStore::empty(dir.path());
    store
        .record_success(record("https://x.gov/a.csv", "a.csv", &digest('a')))
        .unwrap();
    store.persist().unwrap();
    // Simulate a crash after metadata.json was renamed but before checksums.json.
    std::fs::write(dir.path().join(CHECKSUMS_FILE), b"{}").unwrap();

    let loaded = MetadataStore::load(dir.path()).unwrap();
    assert!(loaded.is_dirty());
    assert_eq!(loaded.url_for_checksum(&digest('a')), Some("https://x.gov/a.csv"));
    loaded.check_invariants().unwrap();
}

#[test]
fn unpersisted_changes_leave_disk_at_previous_state() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = MetadataStore::empty(dir.path());
    store
        .record_success(record("https://x.gov/a.csv", "a.csv", &digest('a')))
        .unwrap();
    store.persist().unwrap();
    let before = std::fs::read(dir.path().join(METADATA_FILE)).unwrap();

    store
        .record_success(record("https://x.gov/b.csv", "b.csv", &digest('b')))
        .unwrap();
    drop(store);

    assert_eq!(std::fs::read(dir.path().join(METADATA_FILE)).unwrap(), before);
    assert_eq!(MetadataStore::load(dir.path()).unwrap().len(), 1);
}

#[test]
fn failed_persist_keeps_previous_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = MetadataStore::empty(dir.path());
    store
        .record_success(record("https://x.gov/a.csv", "a.csv", &digest('a')))
        .unwrap();
    store.persist().unwrap();
    let sums_before = std::fs::read(dir.path().join(CHECKSUMS_FILE)).unwrap();

    // A non-empty directory where metadata.json should go makes the rename fail.
    std::fs::remove_file(dir.path().join(METADATA_FILE)).unwrap();
    std::fs::create_dir(dir.path().join(METADATA_FILE)).unwrap();
    std::fs::write(dir.path().join(METADATA_FILE).join("occupied"), b"x").unwrap();

    store
        .record_success(record("https://x.gov/b.csv", "b.csv", &digest('b')))
        .unwrap();
    let err = store.persist().unwrap_err();
    assert!(matches!(err, StoreError::Persist { .. }));
    assert!(store.is_dirty());
    assert_eq!(std::fs::read(dir.path().join(CHECKSUMS_FILE)).unwrap(), sums_before);
    let leftovers = std::fs::read_dir(dir.path())
        .unwrap()
        .filter(|e| crate::storage::is_temp_name(&e.as_ref().unwrap().file_name().to_string_lossy()))
        .count();
    assert_eq!(leftovers, 0);
}
