//! Private temp files for in-flight downloads.

use std::fs;
use std::io;
use std::path::Path;

use tempfile::NamedTempFile;

use super::{is_temp_name, sync_parent_dir, TEMP_SUFFIX};

/// Longest final-name fragment embedded in a temp file name.
const MAX_PREFIX_NAME: usize = 96;

/// Create a hidden temp file in `dir` for a download that will become `final_name`.
/// The file is deleted automatically if dropped without being promoted.
pub fn create_temp_in(dir: &Path, final_name: &str) -> io::Result<NamedTempFile> {
    let mut take = final_name.len().min(MAX_PREFIX_NAME);
    while !final_name.is_char_boundary(take) {
        take -= 1;
    }
    tempfile::Builder::new()
        .prefix(&format!(".{}.", &final_name[..take]))
        .suffix(TEMP_SUFFIX)
        .tempfile_in(dir)
}

/// Fsync and rename `temp` to `final_path`. Never replaces an existing file.
pub fn promote(temp: NamedTempFile, final_path: &Path) -> io::Result<()> {
    temp.as_file().sync_all()?;
    temp.persist_noclobber(final_path).map_err(|e| e.error)?;
    sync_parent_dir(final_path)
}

/// Remove temp files left in `dir` by an interrupted process. Missing `dir` is not an error.
pub fn sweep_stale_temp_files(dir: &Path) -> io::Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        if !is_temp_name(&name.to_string_lossy()) {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => {
                tracing::info!(path = %entry.path().display(), "removed stale temp file");
                removed += 1;
            }
            Err(e) => tracing::warn!(path = %entry.path().display(), "could not remove stale temp file: {}", e),
        }
    }
    Ok(removed)
}
