//! Index page download into memory.

use std::time::Duration;

use url::Url;

use super::DiscoveryError;
use crate::control::CancelToken;

/// Upper bound on an index page body; larger responses abort the transfer.
const MAX_PAGE_BYTES: usize = 16 * 1024 * 1024;

pub(super) fn fetch_page(
    url: &Url,
    user_agent: &str,
    timeout: Duration,
    cancel: &CancelToken,
) -> Result<String, DiscoveryError> {
    let transfer_err = |source: curl::Error| DiscoveryError::Transfer {
        url: url.to_string(),
        source,
    };

    let mut body = Vec::new();
    let mut easy = curl::easy::Easy::new();
    easy.url(url.as_str()).map_err(transfer_err)?;
    easy.follow_location(true).map_err(transfer_err)?;
    easy.max_redirections(10).map_err(transfer_err)?;
    easy.useragent(user_agent).map_err(transfer_err)?;
    easy.connect_timeout(Duration::from_secs(30)).map_err(transfer_err)?;
    easy.timeout(timeout).map_err(transfer_err)?;
    easy.progress(true).map_err(transfer_err)?;

    let result = {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| {
                if body.len() + data.len() > MAX_PAGE_BYTES {
                    return Ok(0);
                }
                body.extend_from_slice(data);
                Ok(data.len())
            })
            .map_err(transfer_err)?;
        transfer
            .progress_function(|_, _, _, _| !cancel.is_cancelled())
            .map_err(transfer_err)?;
        transfer.perform()
    };

    if let Err(e) = result {
        if cancel.is_cancelled() {
            return Err(DiscoveryError::Cancelled);
        }
        return Err(transfer_err(e));
    }

    let status = easy.response_code().map_err(transfer_err)?;
    if !(200..300).contains(&status) {
        return Err(DiscoveryError::Http {
            url: url.to_string(),
            status,
        });
    }

    Ok(String::from_utf8_lossy(&body).into_owned())
}
