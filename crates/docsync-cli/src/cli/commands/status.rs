//! `docsync status` – tracked files per category and the failure signal.

use anyhow::Result;
use docsync_core::config::SyncConfig;
use docsync_core::failure_signal::FailureSignal;
use docsync_core::store::MetadataStore;

pub fn run_status(cfg: &SyncConfig) -> Result<()> {
    let store = MetadataStore::load(&cfg.download_root)?;
    println!("Download root: {}", cfg.download_root.display());
    println!("{:<12} {:>8} {:>12}", "CATEGORY", "FILES", "MB");
    for category in cfg.categories() {
        let (count, bytes) = store
            .records()
            .filter(|r| r.category.as_deref() == Some(category))
            .fold((0usize, 0u64), |(n, b), r| (n + 1, b + r.size_bytes));
        println!(
            "{:<12} {:>8} {:>12.2}",
            category,
            count,
            bytes as f64 / 1_048_576.0
        );
    }
    let total: u64 = store.records().map(|r| r.size_bytes).sum();
    println!("{:<12} {:>8} {:>12.2}", "total", store.len(), total as f64 / 1_048_576.0);

    let signal = FailureSignal::new(&cfg.failure_signal_path());
    match signal.read()? {
        Some(message) => {
            println!();
            println!("FAILURE SIGNAL PRESENT ({}):", signal.path().display());
            println!("{}", message.trim_end());
        }
        None => println!("\nNo failure signal."),
    }
    Ok(())
}
