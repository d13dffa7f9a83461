//! Whole-file atomic replacement (write temp, fsync, rename).

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use super::TEMP_SUFFIX;

/// Atomically replace `path` with `bytes`.
///
/// On any error before the rename the previous contents of `path` are left
/// untouched and the temp file is removed.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = parent_dir(path);
    let mut tmp = tempfile::Builder::new()
        .prefix(".docsync-")
        .suffix(TEMP_SUFFIX)
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    sync_parent_dir(path)
}

/// Fsync the directory containing `path` so a completed rename is durable.
#[cfg(unix)]
pub fn sync_parent_dir(path: &Path) -> io::Result<()> {
    File::open(parent_dir(path))?.sync_all()
}

#[cfg(not(unix))]
pub fn sync_parent_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}
