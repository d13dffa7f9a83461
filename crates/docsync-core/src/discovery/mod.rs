//! Link discovery: turn a source index page into candidate file links.
//!
//! The discoverer walks the configured page (plus `?page=N` continuations
//! when pagination is enabled), extracts every anchor that points at a file
//! with one of the source's extensions, and yields each absolute URL once.

mod extract;
mod page;

use std::collections::HashSet;
use std::time::Duration;

use url::Url;

use crate::config::{SourceConfig, SyncConfig};
use crate::control::{CancelToken, Cancelled};

pub use extract::extract_links;

/// A candidate file found on an index page. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredLink {
    pub url: String,
    pub display_title: String,
    /// Last path segment of the URL; may be empty.
    pub suggested_filename: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("invalid page URL {url}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to fetch index page {url}")]
    Transfer {
        url: String,
        #[source]
        source: curl::Error,
    },

    #[error("index page {url} returned HTTP {status}")]
    Http { url: String, status: u32 },

    #[error("discovery cancelled")]
    Cancelled,
}

impl From<Cancelled> for DiscoveryError {
    fn from(_: Cancelled) -> Self {
        DiscoveryError::Cancelled
    }
}

/// Yields the downloadable links of one source. Must terminate.
pub trait LinkDiscoverer: Send + Sync {
    fn discover(
        &self,
        source: &SourceConfig,
        cancel: &CancelToken,
    ) -> Result<Vec<DiscoveredLink>, DiscoveryError>;
}

/// Fetches index pages over HTTP and parses them as HTML.
#[derive(Debug, Clone)]
pub struct HtmlLinkDiscoverer {
    user_agent: String,
    page_timeout: Duration,
    request_delay: Duration,
    max_pages: u32,
    max_empty_pages: u32,
}

impl HtmlLinkDiscoverer {
    pub fn new(cfg: &SyncConfig) -> Self {
        Self {
            user_agent: cfg.user_agent.clone(),
            page_timeout: cfg.page_timeout(),
            request_delay: cfg.request_delay(),
            max_pages: cfg.max_pages.max(1),
            max_empty_pages: cfg.max_empty_pages.max(1),
        }
    }
}

/// URL of the `n`th index page: the base itself for 0, else `base?page=n`.
pub fn page_url(base: &str, n: u32) -> Result<Url, DiscoveryError> {
    let mut url = Url::parse(base).map_err(|source| DiscoveryError::InvalidUrl {
        url: base.to_string(),
        source,
    })?;
    if n > 0 {
        url.query_pairs_mut().append_pair("page", &n.to_string());
    }
    Ok(url)
}

impl LinkDiscoverer for HtmlLinkDiscoverer {
    fn discover(
        &self,
        source: &SourceConfig,
        cancel: &CancelToken,
    ) -> Result<Vec<DiscoveredLink>, DiscoveryError> {
        let mut links = Vec::new();
        let mut seen = HashSet::new();
        let mut empty_streak = 0u32;

        for n in 0..self.max_pages {
            cancel.check()?;
            if n > 0 {
                cancel.sleep(self.request_delay)?;
            }
            let url = page_url(&source.page_url, n)?;
            let html = match page::fetch_page(&url, &self.user_agent, self.page_timeout, cancel) {
                Ok(html) => html,
                Err(DiscoveryError::Cancelled) => return Err(DiscoveryError::Cancelled),
                Err(e) if n == 0 => return Err(e),
                Err(e) => {
                    tracing::warn!(category = %source.category, page = n, "stopping pagination: {}", e);
                    break;
                }
            };

            let before = links.len();
            for link in extract_links(&html, &url, &source.extensions) {
                if seen.insert(link.url.clone()) {
                    links.push(link);
                }
            }
            let added = links.len() - before;
            tracing::debug!(category = %source.category, page = n, added, "index page parsed");

            if added == 0 {
                empty_streak += 1;
                if empty_streak >= self.max_empty_pages {
                    break;
                }
            } else {
                empty_streak = 0;
            }
        }

        tracing::info!(category = %source.category, found = links.len(), "discovery complete");
        Ok(links)
    }
}
