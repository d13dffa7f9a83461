use scraper::{Html, Selector};
use url::Url;

use super::DiscoveredLink;
use crate::url_model;

/// Anchors in `html` whose target path ends with one of `extensions`.
///
/// Relative hrefs are resolved against `page_url`; fragments are dropped and
/// each absolute URL is returned once, in document order. Extension matching
/// is case-insensitive and ignores the query string.
pub fn extract_links(html: &str, page_url: &Url, extensions: &[String]) -> Vec<DiscoveredLink> {
    let wanted: Vec<String> = extensions
        .iter()
        .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
        .collect();
    let selector = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let document = Html::parse_document(html);
    let mut links: Vec<DiscoveredLink> = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let mut url = match page_url.join(href.trim()) {
            Ok(u) => u,
            Err(_) => continue,
        };
        if !matches!(url.scheme(), "http" | "https") {
            continue;
        }
        url.set_fragment(None);
        let url = url.to_string();

        match url_model::extension_from_url(&url) {
            Some(ext) if wanted.contains(&ext) => {}
            _ => continue,
        }
        if links.iter().any(|l| l.url == url) {
            continue;
        }

        let suggested_filename = url_model::filename_from_url_path(&url).unwrap_or_default();
        let text = element.text().collect::<Vec<_>>().join(" ");
        let display_title = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let display_title = if display_title.is_empty() {
            suggested_filename.clone()
        } else {
            display_title
        };

        links.push(DiscoveredLink {
            url,
            display_title,
            suggested_filename,
        });
    }
    links
}
