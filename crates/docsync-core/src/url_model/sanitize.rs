//! Filesystem-safety checks for candidate filenames.

/// Linux NAME_MAX.
const NAME_MAX: usize = 255;

/// True if `name` can be used as a single path component without surprises:
/// non-empty, at most 255 bytes, no separators, NUL, or control characters,
/// not hidden (leading dot), and not `.`/`..`.
pub fn is_safe_filename(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= NAME_MAX
        && !name.starts_with('.')
        && name.trim() == name
        && !name
            .chars()
            .any(|c| c == '/' || c == '\\' || c == '\0' || c.is_control())
}
