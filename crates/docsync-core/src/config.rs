use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::url_model;

/// Name of the failure-signal file written under the download root.
pub const FAILURE_SIGNAL_FILE: &str = "SCRAPE_FAILURE.txt";

/// Retry policy parameters (`[retry]` section in config.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of cycle attempts per job (including the first).
    pub max_attempts: u32,
    /// Backoff after the first failed attempt, in seconds.
    pub base_delay_secs: u64,
    /// Maximum backoff in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 60,
            max_delay_secs: 30 * 60,
        }
    }
}

/// One index page to crawl and the subdirectory its files are saved under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub category: String,
    pub page_url: String,
    /// File extensions (without dot) that mark a link as downloadable.
    pub extensions: Vec<String>,
}

impl SourceConfig {
    fn data_hub(category: &str, page_url: &str) -> Self {
        Self {
            category: category.to_string(),
            page_url: page_url.to_string(),
            extensions: ["csv", "xls", "xlsx", "zip"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Global configuration loaded from `~/.config/docsync/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Where downloaded files and all state (metadata, logs, reports) live.
    pub download_root: PathBuf,
    /// Pause between consecutive requests to the source, in milliseconds.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    /// Whole-transfer timeout for one file, in seconds.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Timeout for one index page, in seconds.
    #[serde(default = "default_page_timeout_secs")]
    pub page_timeout_secs: u64,
    /// Index pages to walk per source (`?page=N`); 1 disables pagination.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Stop paginating after this many consecutive pages without new links.
    #[serde(default = "default_max_empty_pages")]
    pub max_empty_pages: u32,
    /// Log files older than this are deleted at the end of each cycle.
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub retry: RetryConfig,
    pub sources: Vec<SourceConfig>,
}

fn default_request_delay_ms() -> u64 {
    1000
}

fn default_fetch_timeout_secs() -> u64 {
    60
}

fn default_page_timeout_secs() -> u64 {
    30
}

fn default_max_pages() -> u32 {
    1
}

fn default_max_empty_pages() -> u32 {
    5
}

fn default_log_retention_days() -> u64 {
    90
}

fn default_user_agent() -> String {
    format!("docsync/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            download_root: PathBuf::from("./docsync_data"),
            request_delay_ms: default_request_delay_ms(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            page_timeout_secs: default_page_timeout_secs(),
            max_pages: default_max_pages(),
            max_empty_pages: default_max_empty_pages(),
            log_retention_days: default_log_retention_days(),
            user_agent: default_user_agent(),
            retry: RetryConfig::default(),
            sources: vec![
                SourceConfig::data_hub(
                    "h1b",
                    "https://www.uscis.gov/archive/h-1b-employer-data-hub-files",
                ),
                SourceConfig::data_hub(
                    "h2a",
                    "https://www.uscis.gov/archive/h-2a-employer-data-hub-files",
                ),
                SourceConfig::data_hub(
                    "h2b",
                    "https://www.uscis.gov/archive/h-2b-employer-data-hub-files",
                ),
            ],
        }
    }
}

impl SyncConfig {
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.category.as_str())
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn log_retention(&self) -> Duration {
        Duration::from_secs(self.log_retention_days.saturating_mul(24 * 60 * 60))
    }

    pub fn log_dir(&self) -> PathBuf {
        self.download_root.join("logs")
    }

    pub fn report_dir(&self) -> PathBuf {
        self.download_root.join("reports")
    }

    pub fn failure_signal_path(&self) -> PathBuf {
        self.download_root.join(FAILURE_SIGNAL_FILE)
    }

    /// Reject configurations the engine cannot run safely.
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        if self.retry.max_delay_secs < self.retry.base_delay_secs {
            bail!("retry.max_delay_secs must be >= retry.base_delay_secs");
        }
        let mut seen = HashSet::new();
        for s in &self.sources {
            if !url_model::is_safe_filename(&s.category) {
                bail!("source category {:?} is not a safe directory name", s.category);
            }
            if matches!(s.category.as_str(), "logs" | "reports") {
                bail!("source category {:?} is reserved", s.category);
            }
            if !seen.insert(s.category.as_str()) {
                bail!("duplicate source category {:?}", s.category);
            }
            url::Url::parse(&s.page_url)
                .with_context(|| format!("invalid page_url for {}: {}", s.category, s.page_url))?;
            if s.extensions.is_empty() {
                bail!("source {} lists no file extensions", s.category);
            }
        }
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("docsync")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from the default location, creating a default file if none exists.
pub fn load_or_init() -> Result<SyncConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = SyncConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load and validate configuration from an explicit file.
pub fn load_from_path(path: &Path) -> Result<SyncConfig> {
    let data = fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let cfg: SyncConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
