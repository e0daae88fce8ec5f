//! Content fetching: short-link resolution, static HTTP, and headless rendering.
//!
//! [`Fetcher`] is the seam the tracking service and the polling scheduler
//! depend on. [`ContentFetcher`] is the production implementation: it
//! combines the [`UrlCanonicalizer`], the [`StaticFetcher`] and the
//! [`RenderedFetcher`] (gated by a [`RenderGate`]).

pub mod canonicalize;
pub mod gate;
pub mod rendered;
pub mod static_fetch;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::TrackerConfig;

pub use canonicalize::UrlCanonicalizer;
pub use gate::{RenderGate, RenderPermit};
pub use rendered::RenderedFetcher;
pub use static_fetch::StaticFetcher;

/// Errors produced while fetching page content.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request or navigation exceeded its timeout.
    #[error("timed out after {timeout:?} fetching {url}")]
    Timeout {
        /// URL being fetched.
        url: String,
        /// Timeout that elapsed.
        timeout: Duration,
    },

    /// Transport-level HTTP failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("unexpected status {status} from {url}")]
    Status {
        /// URL being fetched.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The headless browser failed to launch, navigate, or render.
    #[error("browser error: {0}")]
    Browser(String),

    /// The URL could not be parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Whether this error is a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// How a page must be retrieved to expose its price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Plain HTTP GET; the markup is used as served.
    Static,
    /// Headless browser; scripts run before the markup is captured.
    Rendered,
}

/// Markup returned by a fetch.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Raw HTML.
    pub html: String,
    /// URL after redirects (or browser navigation).
    pub final_url: String,
}

/// Retrieves page content and resolves links.
#[async_trait]
pub trait Fetcher: std::fmt::Debug + Send + Sync {
    /// Extracts the first URL from `raw` and follows its redirects.
    ///
    /// Never fails: on any problem the input is returned unchanged.
    async fn resolve_redirects(&self, raw: &str) -> String;

    /// Opens `url` in a headless browser and returns the URL it settles on.
    ///
    /// Used for short links whose redirect is performed by script.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the browser fails or times out.
    async fn resolve_rendered(&self, url: &str) -> Result<String, FetchError>;

    /// Fetches `url` using the given mode.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Timeout`] when the timeout elapses and another
    /// [`FetchError`] variant for any other failure.
    async fn fetch(&self, url: &str, mode: RenderMode) -> Result<FetchedPage, FetchError>;
}

/// Production [`Fetcher`] backed by `reqwest` and headless Chromium.
#[derive(Debug)]
pub struct ContentFetcher {
    canonicalizer: UrlCanonicalizer,
    static_fetcher: StaticFetcher,
    rendered_fetcher: RenderedFetcher,
}

impl ContentFetcher {
    /// Builds all fetch components from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if an HTTP client cannot be built.
    pub fn from_config(config: &TrackerConfig) -> Result<Self, FetchError> {
        let gate = RenderGate::new(config.render_concurrency);
        Ok(Self {
            canonicalizer: UrlCanonicalizer::new(
                &config.user_agent,
                Duration::from_secs(config.resolve_timeout_secs),
            )?,
            static_fetcher: StaticFetcher::new(
                &config.user_agent,
                Duration::from_secs(config.fetch_timeout_secs),
                config.static_max_idle_per_host,
            )?,
            rendered_fetcher: RenderedFetcher::new(
                gate,
                config.user_agent.clone(),
                Duration::from_secs(config.fetch_timeout_secs),
                Duration::from_millis(config.render_settle_ms),
                config.chrome_executable.clone(),
            ),
        })
    }

    /// The gate limiting concurrent browser sessions.
    #[must_use]
    pub const fn gate(&self) -> &RenderGate {
        self.rendered_fetcher.gate()
    }
}

#[async_trait]
impl Fetcher for ContentFetcher {
    async fn resolve_redirects(&self, raw: &str) -> String {
        self.canonicalizer.resolve(raw).await
    }

    async fn resolve_rendered(&self, url: &str) -> Result<String, FetchError> {
        self.rendered_fetcher.fetch(url).await.map(|page| page.final_url)
    }

    async fn fetch(&self, url: &str, mode: RenderMode) -> Result<FetchedPage, FetchError> {
        match mode {
            RenderMode::Static => self.static_fetcher.fetch(url).await,
            RenderMode::Rendered => self.rendered_fetcher.fetch(url).await,
        }
    }
}


#[cfg(test)]
pub(crate) mod testing {
    //! Scripted [`Fetcher`] for service and scheduler tests.

    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::{FetchError, FetchedPage, Fetcher, RenderMode};

    /// Scripted response for one URL.
    #[derive(Debug, Clone)]
    pub(crate) enum StubPage {
        Html(String),
        Timeout,
        Fail,
    }

    /// Fetcher answering from in-memory tables.
    #[derive(Debug, Default)]
    pub(crate) struct StubFetcher {
        pub(crate) redirects: HashMap<String, String>,
        pub(crate) rendered_redirects: HashMap<String, String>,
        pub(crate) pages: HashMap<String, StubPage>,
        /// When set, every fetch waits for a notification first.
        pub(crate) hold: Option<Arc<Notify>>,
        calls: AtomicUsize,
    }

    impl StubFetcher {
        pub(crate) fn with_page(mut self, url: &str, page: StubPage) -> Self {
            self.pages.insert(url.to_string(), page);
            self
        }

        pub(crate) fn with_redirect(mut self, from: &str, to: &str) -> Self {
            self.redirects.insert(from.to_string(), to.to_string());
            self
        }

        pub(crate) fn with_rendered_redirect(mut self, from: &str, to: &str) -> Self {
            self.rendered_redirects
                .insert(from.to_string(), to.to_string());
            self
        }

        pub(crate) fn with_hold(mut self, hold: Arc<Notify>) -> Self {
            self.hold = Some(hold);
            self
        }

        pub(crate) fn fetch_calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn resolve_redirects(&self, raw: &str) -> String {
            let url = super::canonicalize::extract_first_url(raw).unwrap_or(raw);
            self.redirects
                .get(url)
                .cloned()
                .unwrap_or_else(|| raw.to_string())
        }

        async fn resolve_rendered(&self, url: &str) -> Result<String, FetchError> {
            self.rendered_redirects
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::Browser(format!("no script redirect for {url}")))
        }

        async fn fetch(&self, url: &str, _mode: RenderMode) -> Result<FetchedPage, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(hold) = &self.hold {
                hold.notified().await;
            }
            match self.pages.get(url) {
                Some(StubPage::Html(html)) => Ok(FetchedPage {
                    html: html.clone(),
                    final_url: url.to_string(),
                }),
                Some(StubPage::Timeout) => Err(FetchError::Timeout {
                    url: url.to_string(),
                    timeout: Duration::from_secs(15),
                }),
                Some(StubPage::Fail) | None => Err(FetchError::Status {
                    url: url.to_string(),
                    status: 503,
                }),
            }
        }
    }
}
