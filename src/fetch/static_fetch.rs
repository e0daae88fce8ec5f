//! Plain HTTP fetching with a browser-like header set.

use std::time::Duration;

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, HeaderMap, HeaderValue};
use reqwest::{Client, redirect::Policy};

use super::{FetchError, FetchedPage};

/// Maximum redirect hops for a page fetch.
const MAX_REDIRECTS: usize = 10;

/// Headers sent with every request so retailers serve the desktop page.
pub(crate) fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers
}

/// `reqwest`-backed fetcher for pages that need no script execution.
#[derive(Debug, Clone)]
pub struct StaticFetcher {
    client: Client,
    timeout: Duration,
}

impl StaticFetcher {
    /// Creates a fetcher with a request timeout and a per-host idle
    /// connection cap.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the HTTP client cannot be built.
    pub fn new(
        user_agent: &str,
        timeout: Duration,
        max_idle_per_host: usize,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .default_headers(browser_headers())
            .redirect(Policy::limited(MAX_REDIRECTS))
            .timeout(timeout)
            .pool_max_idle_per_host(max_idle_per_host)
            .build()?;
        Ok(Self { client, timeout })
    }

    /// GETs `url` and returns its body.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Timeout`] when the request times out,
    /// [`FetchError::Status`] for non-2xx responses, and
    /// [`FetchError::Http`] for other transport failures.
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(url, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = resp.url().to_string();
        let html = resp.text().await.map_err(|e| self.classify(url, e))?;
        tracing::debug!(url, %final_url, bytes = html.len(), "static fetch complete");
        Ok(FetchedPage { html, final_url })
    }

    fn classify(&self, url: &str, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            }
        } else {
            FetchError::Http(err)
        }
    }
}
