//! In-memory discoverer and fetcher shared by unit tests.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::config::SourceConfig;
use crate::control::CancelToken;
use crate::discovery::{DiscoveredLink, DiscoveryError, LinkDiscoverer};
use crate::fetch::{FetchError, FileFetcher};

pub fn link(url: &str) -> DiscoveredLink {
    let name = url.rsplit('/').next().unwrap_or_default().to_string();
    DiscoveredLink {
        url: url.to_string(),
        display_title: name.clone(),
        suggested_filename: name,
    }
}

/// Returns fixed links per category; unknown categories fail with HTTP 503.
/// The first `fail_first` calls fail regardless.
#[derive(Default)]
pub struct FakeDiscoverer {
    pub pages: HashMap<String, Vec<DiscoveredLink>>,
    pub fail_first: u32,
    pub calls: AtomicU32,
}

impl FakeDiscoverer {
    pub fn with(pages: &[(&str, &[&str])]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(cat, urls)| (cat.to_string(), urls.iter().map(|u| link(u)).collect()))
                .collect(),
            ..Self::default()
        }
    }
}

impl LinkDiscoverer for FakeDiscoverer {
    fn discover(
        &self,
        source: &SourceConfig,
        _cancel: &CancelToken,
    ) -> Result<Vec<DiscoveredLink>, DiscoveryError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let unavailable = || DiscoveryError::Http {
            url: source.page_url.clone(),
            status: 503,
        };
        if n < self.fail_first {
            return Err(unavailable());
        }
        self.pages.get(&source.category).cloned().ok_or_else(unavailable)
    }
}

/// Serves canned bodies; unknown URLs fail with HTTP 404.
#[derive(Default)]
pub struct FakeFetcher {
    pub bodies: HashMap<String, Vec<u8>>,
    pub calls: Mutex<Vec<String>>,
    /// Fetching this URL trips the cancel token.
    pub cancel_on: Option<String>,
}

impl FakeFetcher {
    pub fn with(bodies: &[(&str, &[u8])]) -> Self {
        Self {
            bodies: bodies
                .iter()
                .map(|(u, b)| (u.to_string(), b.to_vec()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl FileFetcher for FakeFetcher {
    fn fetch(
        &self,
        url: &str,
        dest: &mut File,
        _timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<u64, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        if self.cancel_on.as_deref() == Some(url) {
            cancel.cancel();
            return Err(FetchError::Cancelled);
        }
        match self.bodies.get(url) {
            Some(body) => {
                dest.write_all(body)?;
                Ok(body.len() as u64)
            }
            None => Err(FetchError::Http {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}
