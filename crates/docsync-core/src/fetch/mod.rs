//! Single-file HTTP transfer into an already opened destination file.

mod curl_fetcher;

use std::fs::File;
use std::io;
use std::time::Duration;

use crate::control::CancelToken;

pub use curl_fetcher::CurlFetcher;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("transfer failed: {0}")]
    Transfer(#[from] curl::Error),

    #[error("HTTP {status} from {url}")]
    Http { url: String, status: u32 },

    #[error("write to local file failed: {0}")]
    Io(#[from] io::Error),

    #[error("transfer cancelled")]
    Cancelled,
}

/// Streams the body at `url` into `dest` and returns the number of bytes written.
///
/// `dest` is truncated first and fsynced before a successful return. On error
/// its contents are unspecified; callers discard it.
pub trait FileFetcher: Send + Sync {
    fn fetch(
        &self,
        url: &str,
        dest: &mut File,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<u64, FetchError>;
}
