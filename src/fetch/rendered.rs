//! Headless Chromium rendering for script-heavy retailer pages.
//!
//! Every fetch launches its own browser process under a [`RenderGate`]
//! permit, captures the DOM after a short settle delay, and tears the page,
//! the browser, and its CDP handler task down before the permit is released.

use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::Page;
use futures_util::StreamExt;
use tokio::task::JoinHandle;

use super::gate::RenderGate;
use super::{FetchError, FetchedPage};

/// Viewport used for every rendered page.
const VIEWPORT: (u32, u32) = (1366, 768);

/// Masks the usual headless-automation fingerprints before page scripts run.
const STEALTH_SCRIPT: &str = r"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
";

/// Launch flags applied to every browser process.
const LAUNCH_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-blink-features=AutomationControlled",
    "--disable-dev-shm-usage",
    "--disable-features=VizDisplayCompositor",
    "--no-first-run",
];

/// A launched browser with its handler task and scratch profile.
struct Session {
    browser: Browser,
    handler: JoinHandle<()>,
    profile_dir: PathBuf,
}

/// Fetcher driving headless Chromium through `chromiumoxide`.
#[derive(Debug, Clone)]
pub struct RenderedFetcher {
    gate: RenderGate,
    user_agent: String,
    timeout: Duration,
    settle: Duration,
    chrome_executable: Option<PathBuf>,
}

impl RenderedFetcher {
    /// Creates a rendered fetcher sharing `gate` with every other caller.
    #[must_use]
    pub const fn new(
        gate: RenderGate,
        user_agent: String,
        timeout: Duration,
        settle: Duration,
        chrome_executable: Option<PathBuf>,
    ) -> Self {
        Self {
            gate,
            user_agent,
            timeout,
            settle,
            chrome_executable,
        }
    }

    /// The gate bounding concurrent browser sessions.
    #[must_use]
    pub const fn gate(&self) -> &RenderGate {
        &self.gate
    }

    /// Renders `url` and returns the resulting DOM and final URL.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Timeout`] if launch or navigation exceeds the
    /// timeout, and [`FetchError::Browser`] for any other browser failure.
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let Some(_permit) = self.gate.acquire().await else {
            return Err(FetchError::Browser("render gate closed".to_string()));
        };

        let session = self.launch(url).await?;
        let result = self.render(&session.browser, url).await;
        shutdown(session).await;
        result
    }

    async fn launch(&self, url: &str) -> Result<Session, FetchError> {
        let profile_dir =
            std::env::temp_dir().join(format!("price-tracker-{}", uuid::Uuid::new_v4()));

        let mut builder = BrowserConfig::builder()
            .window_size(VIEWPORT.0, VIEWPORT.1)
            .user_data_dir(&profile_dir)
            .arg(format!("--user-agent={}", self.user_agent));
        for arg in LAUNCH_ARGS {
            builder = builder.arg(*arg);
        }
        if let Some(path) = &self.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|e| FetchError::Browser(format!("browser config error: {e}")))?;

        let (browser, mut handler) = tokio::time::timeout(self.timeout, Browser::launch(config))
            .await
            .map_err(|_| self.timeout_error(url))?
            .map_err(|e| FetchError::Browser(format!("browser launch failed: {e}")))?;

        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

        Ok(Session {
            browser,
            handler,
            profile_dir,
        })
    }

    async fn render(&self, browser: &Browser, url: &str) -> Result<FetchedPage, FetchError> {
        let page = tokio::time::timeout(self.timeout, browser.new_page("about:blank"))
            .await
            .map_err(|_| self.timeout_error(url))?
            .map_err(|e| FetchError::Browser(format!("failed to open page: {e}")))?;

        let result = self.capture(&page, url).await;

        if let Err(e) = page.close().await {
            tracing::debug!(url, error = %e, "page close error");
        }
        result
    }

    async fn capture(&self, page: &Page, url: &str) -> Result<FetchedPage, FetchError> {
        page.evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_SCRIPT))
            .await
            .map_err(|e| FetchError::Browser(format!("failed to install init script: {e}")))?;

        tokio::time::timeout(self.timeout, page.goto(url))
            .await
            .map_err(|_| self.timeout_error(url))?
            .map_err(|e| FetchError::Browser(format!("navigation failed: {e}")))?;

        tokio::time::sleep(self.settle).await;

        let html = tokio::time::timeout(self.timeout, page.content())
            .await
            .map_err(|_| self.timeout_error(url))?
            .map_err(|e| FetchError::Browser(format!("failed to read content: {e}")))?;

        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_string());

        tracing::debug!(url, %final_url, bytes = html.len(), "rendered fetch complete");
        Ok(FetchedPage { html, final_url })
    }

    fn timeout_error(&self, url: &str) -> FetchError {
        FetchError::Timeout {
            url: url.to_string(),
            timeout: self.timeout,
        }
    }
}

/// Closes the browser, stops its handler task, and removes the profile.
async fn shutdown(mut session: Session) {
    if let Err(e) = session.browser.close().await {
        tracing::debug!(error = %e, "browser close error");
    }
    if let Err(e) = session.browser.wait().await {
        tracing::debug!(error = %e, "browser wait error");
    }
    session.handler.abort();
    if let Err(e) = tokio::fs::remove_dir_all(&session.profile_dir).await {
        tracing::debug!(dir = %session.profile_dir.display(), error = %e, "profile cleanup failed");
    }
}
