//! Disk I/O and file lifecycle.
//!
//! Every write that must survive a crash goes through a private temp file in
//! the destination directory, is fsynced, and is then renamed into place. A
//! failed or abandoned write leaves only a `.part` file behind, which the next
//! cycle sweeps away.

mod atomic;
mod temp;

pub use atomic::{atomic_write, sync_parent_dir};
pub use temp::{create_temp_in, promote, sweep_stale_temp_files};

/// Suffix of every temp file this crate creates.
pub const TEMP_SUFFIX: &str = ".part";

/// True if `name` is one of our temp files (hidden, `.part` suffix).
pub fn is_temp_name(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(TEMP_SUFFIX)
}
