//! Plain-text cycle summary, logged and saved under `reports/`.

use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::config::SyncConfig;
use crate::cycle::CycleResult;
use crate::storage;
use crate::store::MetadataStore;

const RULE: &str = "============================================================";

fn mib(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

/// Render the summary: per-category totals from the store plus this cycle's counts.
pub fn render_report(
    cfg: &SyncConfig,
    store: &MetadataStore,
    result: &CycleResult,
    now: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "docsync report");
    let _ = writeln!(out, "Generated: {}", now.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out);

    for category in cfg.categories() {
        let (count, bytes) = store
            .records()
            .filter(|r| r.category.as_deref() == Some(category))
            .fold((0usize, 0u64), |(n, b), r| (n + 1, b + r.size_bytes));
        let _ = writeln!(
            out,
            "{}: {} files ({:.2} MB)",
            category.to_uppercase(),
            count,
            mib(bytes)
        );
    }

    let total_bytes: u64 = store.records().map(|r| r.size_bytes).sum();
    let _ = writeln!(out);
    let _ = writeln!(out, "Total files: {}", store.len());
    let _ = writeln!(out, "Total size: {:.2} MB", mib(total_bytes));
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "This cycle: {} new, {} skipped duplicates, {} failed",
        result.new_downloads,
        result.skipped_duplicates,
        result.failures.len()
    );
    let _ = writeln!(
        out,
        "Consistency: {} missing, {} checksum mismatches, {} orphaned",
        result.issues.missing_files.len(),
        result.issues.checksum_mismatches.len(),
        result.issues.orphaned_files.len()
    );
    if !result.failures.is_empty() {
        let _ = writeln!(out, "Failed downloads:");
        for f in &result.failures {
            let _ = writeln!(out, "  {}: {}", f.url, f.message);
        }
    }
    let _ = write!(out, "{}", RULE);
    out
}

/// Save `text` as `dir/report_YYYYMMDD_HHMMSS.txt` and return the path.
pub fn write_report(dir: &Path, text: &str, now: DateTime<Utc>) -> io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("report_{}.txt", now.format("%Y%m%d_%H%M%S")));
    storage::atomic_write(&path, text.as_bytes())?;
    Ok(path)
}
