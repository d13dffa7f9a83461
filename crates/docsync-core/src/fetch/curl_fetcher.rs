use std::cell::Cell;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::time::Duration;

use super::{FetchError, FileFetcher};
use crate::control::CancelToken;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const LOW_SPEED_LIMIT: u32 = 1024;
const LOW_SPEED_TIME: Duration = Duration::from_secs(60);
const MAX_REDIRECTS: u32 = 10;

/// Blocking GET with libcurl, one easy handle per transfer.
#[derive(Debug, Clone)]
pub struct CurlFetcher {
    user_agent: String,
}

impl CurlFetcher {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }
}

impl FileFetcher for CurlFetcher {
    fn fetch(
        &self,
        url: &str,
        dest: &mut File,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<u64, FetchError> {
        cancel.check().map_err(|_| FetchError::Cancelled)?;
        dest.set_len(0)?;
        dest.seek(SeekFrom::Start(0))?;

        let mut easy = curl::easy::Easy::new();
        easy.url(url)?;
        easy.follow_location(true)?;
        easy.max_redirections(MAX_REDIRECTS)?;
        easy.useragent(&self.user_agent)?;
        easy.connect_timeout(CONNECT_TIMEOUT)?;
        easy.low_speed_limit(LOW_SPEED_LIMIT)?;
        easy.low_speed_time(LOW_SPEED_TIME)?;
        easy.timeout(timeout)?;
        easy.progress(true)?;

        let written = Cell::new(0u64);
        let mut write_error = None;
        let result = {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| match dest.write_all(data) {
                Ok(()) => {
                    written.set(written.get() + data.len() as u64);
                    Ok(data.len())
                }
                Err(e) => {
                    tracing::warn!("fetch write failed: {}", e);
                    write_error = Some(e);
                    Ok(0) // abort transfer
                }
            })?;
            transfer.progress_function(|_, _, _, _| !cancel.is_cancelled())?;
            transfer.perform()
        };

        if let Some(e) = write_error {
            return Err(FetchError::Io(e));
        }
        if let Err(e) = result {
            if e.is_aborted_by_callback() || cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            return Err(FetchError::Transfer(e));
        }

        let status = easy.response_code()?;
        if !(200..300).contains(&status) {
            return Err(FetchError::Http {
                url: url.to_string(),
                status,
            });
        }

        dest.sync_all()?;
        let bytes = written.get();
        tracing::debug!(%url, bytes, "fetched");
        Ok(bytes)
    }
}
