//! Short-link and redirect resolution.
//!
//! Users paste links inside free text, often as short links. The
//! canonicalizer pulls the first `http(s)://` token out of the text and
//! follows its redirects to the final product URL. Resolution never fails:
//! on any error the input comes back unchanged and a warning is logged.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::{Client, StatusCode, redirect::Policy};

use super::FetchError;
use super::static_fetch::browser_headers;

static URL_TOKEN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"']+"#).ok());

/// Maximum redirect hops followed while resolving a link.
const MAX_REDIRECTS: usize = 10;

/// Returns the first `http(s)://` URL contained in `text`.
///
/// Trailing sentence punctuation is not part of the URL.
#[must_use]
pub fn extract_first_url(text: &str) -> Option<&str> {
    let re = URL_TOKEN.as_ref()?;
    let token = re.find(text)?.as_str();
    let token = token.trim_end_matches(['.', ',', ';', ':', '!', '?', ')', ']']);
    (!token.is_empty()).then_some(token)
}

/// Follows redirects of user-supplied links with a hard timeout.
#[derive(Debug, Clone)]
pub struct UrlCanonicalizer {
    client: Client,
    timeout: Duration,
}

impl UrlCanonicalizer {
    /// Creates a canonicalizer whose requests are bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the HTTP client cannot be built.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .default_headers(browser_headers())
            .redirect(Policy::limited(MAX_REDIRECTS))
            .timeout(timeout)
            .build()?;
        Ok(Self { client, timeout })
    }

    /// Resolves the first URL in `raw` to its final destination.
    ///
    /// Issues a redirect-following `HEAD`, falling back to `GET` when the
    /// `HEAD` fails or is refused (403, 405, 501). Returns `raw` unchanged
    /// when no URL is present or resolution fails.
    pub async fn resolve(&self, raw: &str) -> String {
        let Some(url) = extract_first_url(raw) else {
            tracing::warn!(input = raw, "resolution failure: no url in input");
            return raw.to_string();
        };

        match self.follow(url).await {
            Ok(resolved) => {
                if resolved != url {
                    tracing::debug!(from = url, to = %resolved, "resolved redirect");
                }
                resolved
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "resolution failure: passing input through");
                raw.to_string()
            }
        }
    }

    async fn follow(&self, url: &str) -> Result<String, FetchError> {
        let head = self.client.head(url).send().await;
        match head {
            Ok(resp) if !is_refused(resp.status()) => return Ok(resp.url().to_string()),
            Ok(resp) => {
                tracing::debug!(url, status = resp.status().as_u16(), "HEAD refused, retrying with GET");
            }
            Err(e) if e.is_timeout() => return Err(self.timeout_error(url)),
            Err(e) => tracing::debug!(url, error = %e, "HEAD failed, retrying with GET"),
        }

        let resp = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                self.timeout_error(url)
            } else {
                FetchError::Http(e)
            }
        })?;
        Ok(resp.url().to_string())
    }

    fn timeout_error(&self, url: &str) -> FetchError {
        FetchError::Timeout {
            url: url.to_string(),
            timeout: self.timeout,
        }
    }
}

fn is_refused(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::FORBIDDEN | StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED
    )
}
