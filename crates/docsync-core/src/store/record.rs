//! Download records and their on-disk form.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One successfully retrieved file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRecord {
    pub source_url: String,
    pub local_filename: String,
    /// Lowercase hex SHA-256 of the file contents.
    pub checksum: String,
    pub size_bytes: u64,
    pub downloaded_at: DateTime<Utc>,
    /// Subdirectory of the download root the file was saved under.
    pub category: Option<String>,
}

/// Value side of `metadata.json` (`{ url: PersistedRecord }`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PersistedRecord {
    pub filename: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub download_date: DateTime<Utc>,
    pub checksum: String,
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl PersistedRecord {
    pub(crate) fn from_record(r: &DownloadRecord) -> Self {
        Self {
            filename: r.local_filename.clone(),
            download_date: r.downloaded_at,
            checksum: r.checksum.clone(),
            size_bytes: r.size_bytes,
            category: r.category.clone(),
        }
    }

    pub(crate) fn into_record(self, source_url: String) -> DownloadRecord {
        DownloadRecord {
            source_url,
            local_filename: self.filename,
            checksum: self.checksum,
            size_bytes: self.size_bytes,
            downloaded_at: self.download_date,
            category: self.category,
        }
    }
}

/// Accepts RFC 3339 and also zone-less ISO-8601 (`2024-05-01T02:00:00.123456`),
/// which older manifests contain; the latter are read as UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|n| n.and_utc())
        .map_err(|e| serde::de::Error::custom(format!("invalid download_date {:?}: {}", s, e)))
}
