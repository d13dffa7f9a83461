//! Filename hints from URL paths.

/// Extracts the last non-empty path segment from a URL.
///
/// Returns `None` if the URL cannot be parsed or the path is empty/root.
pub fn filename_from_url_path(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    if segment == "." || segment == ".." {
        return None;
    }
    Some(segment.to_string())
}

/// Lowercased extension of the URL's last path segment, if short and alphanumeric.
pub fn extension_from_url(url: &str) -> Option<String> {
    let name = filename_from_url_path(url)?;
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 5 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_segment() {
        assert_eq!(
            filename_from_url_path("https://example.gov/a/b/file.csv").as_deref(),
            Some("file.csv")
        );
        assert_eq!(
            filename_from_url_path("https://example.gov/a/b/").as_deref(),
            Some("b")
        );
    }

    #[test]
    fn root_or_invalid() {
        assert_eq!(filename_from_url_path("https://example.gov/"), None);
        assert_eq!(filename_from_url_path("not a url"), None);
    }

    #[test]
    fn extension_ignores_query_and_case() {
        assert_eq!(
            extension_from_url("https://example.gov/x/Data.XLSX?download=1").as_deref(),
            Some("xlsx")
        );
        assert_eq!(extension_from_url("https://example.gov/x/noext"), None);
        assert_eq!(extension_from_url("https://example.gov/x/a.tar-gz-long"), None);
    }
}
