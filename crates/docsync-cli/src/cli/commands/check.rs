//! `docsync check` – reconcile the store against the filesystem.

use anyhow::Result;
use docsync_core::config::SyncConfig;
use docsync_core::reconcile::ConsistencyChecker;
use docsync_core::store::MetadataStore;

fn print_section(title: &str, items: &[String]) {
    println!("{} ({})", title, items.len());
    for item in items {
        println!("  {}", item);
    }
}

pub fn run_check(cfg: &SyncConfig) -> Result<()> {
    let mut store = MetadataStore::load(&cfg.download_root)?;
    let checker = ConsistencyChecker::new(&cfg.download_root, cfg.categories());
    let report = checker.reconcile(&mut store)?;

    print_section("Missing files", &report.missing_files);
    print_section("Checksum mismatches", &report.checksum_mismatches);
    print_section("Orphaned files", &report.orphaned_files);
    if report.is_clean() {
        println!("Store and filesystem agree ({} records).", store.len());
    }
    Ok(())
}
