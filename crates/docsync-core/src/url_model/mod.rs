//! Destination filename derivation.
//!
//! A discovered link carries a suggested name; it is used verbatim when safe
//! for the local filesystem. Otherwise a deterministic name is derived from
//! the SHA-256 of the URL so repeated cycles pick the same fallback.

mod path;
mod sanitize;

use std::path::Path;

use crate::checksum;

pub use path::{extension_from_url, filename_from_url_path};
pub use sanitize::is_safe_filename;

/// Extension used when the URL gives no usable one.
pub const DEFAULT_EXTENSION: &str = "bin";

/// Number of hex digits of the URL hash used in fallback names.
const HASHED_NAME_LEN: usize = 16;

/// Pick the on-disk filename for a download. Never returns an empty name.
///
/// # Examples
///
/// - `destination_filename("https://x.gov/files/h1b_2024.csv", "h1b_2024.csv")` → `"h1b_2024.csv"`
/// - `destination_filename("https://x.gov/files/", "")` → `"<16 hex>.bin"`
pub fn destination_filename(url: &str, suggested: &str) -> String {
    let suggested = suggested.trim();
    if is_safe_filename(suggested) {
        return suggested.to_string();
    }
    hashed_filename(url)
}

/// Deterministic fallback name: first 16 hex digits of sha256(url) plus an extension.
pub fn hashed_filename(url: &str) -> String {
    let digest = checksum::sha256_str(url);
    let ext = extension_from_url(url).unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
    format!("{}.{}", &digest[..HASHED_NAME_LEN], ext)
}

/// Returns `name` if `dir/name` is free, else the first free `stem-N.ext`.
pub fn unique_filename(dir: &Path, name: &str) -> String {
    if !dir.join(name).exists() {
        return name.to_string();
    }
    let (stem, ext) = match name.rfind('.') {
        Some(i) if i > 0 => (&name[..i], &name[i..]),
        _ => (name, ""),
    };
    let mut n = 1u32;
    loop {
        let candidate = format!("{}-{}{}", stem, n, ext);
        if !dir.join(&candidate).exists() {
            return candidate;
        }
        n += 1;
    }
}
