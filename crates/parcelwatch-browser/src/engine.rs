use crate::context::{BrowserContext, ContextFactory};
use crate::error::{BrowserError, Result};
use crate::fingerprint::FingerprintConfig;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Launch options for the Chromium engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub headless: bool,
    pub request_timeout: Duration,
    pub fingerprint: FingerprintConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            headless: true,
            request_timeout: Duration::from_secs(30),
            fingerprint: FingerprintConfig::randomized(),
        }
    }
}

/// Browser automation engine.
///
/// Chromium is launched on the first context request, not at construction,
/// so registries with no browser carriers never spawn a browser. If the
/// browser dies, the next request relaunches it.
pub struct BrowserEngine {
    config: EngineConfig,
    browser: Mutex<Option<Arc<Browser>>>,
}

impl BrowserEngine {
    /// Create an engine that launches Chromium on demand.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            browser: Mutex::new(None),
        }
    }

    async fn launch(&self) -> Result<Arc<Browser>> {
        let fingerprint = &self.config.fingerprint;
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(fingerprint.viewport_width, fingerprint.viewport_height)
            .request_timeout(self.config.request_timeout)
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");
        for arg in fingerprint.launch_args() {
            builder = builder.arg(arg);
        }
        if !self.config.headless {
            builder = builder.with_head();
        }

        let config = builder.build().map_err(BrowserError::ChromiumError)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        // Spawn browser handler
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser handler event error");
                }
            }
            debug!("browser handler finished");
        });

        info!(headless = self.config.headless, "launched chromium");
        Ok(Arc::new(browser))
    }
}

#[async_trait]
impl ContextFactory for BrowserEngine {
    async fn create(&self) -> Result<Box<dyn BrowserContext>> {
        let mut guard = self.browser.lock().await;

        let browser = match guard.as_ref() {
            Some(browser) => Arc::clone(browser),
            None => {
                let browser = self.launch().await?;
                *guard = Some(Arc::clone(&browser));
                browser
            }
        };

        match browser.new_page("about:blank").await {
            Ok(page) => Ok(Box::new(ChromiumContext { page })),
            Err(e) => {
                warn!(error = %e, "failed to open page, relaunching browser on next request");
                *guard = None;
                Err(BrowserError::ChromiumError(e.to_string()))
            }
        }
    }
}

/// A single Chromium page.
pub struct ChromiumContext {
    page: Page,
}

#[async_trait]
impl BrowserContext for ChromiumContext {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(BrowserError::NavigationError(e.to_string())),
            Err(_) => Err(BrowserError::Timeout(format!(
                "navigation to {url} exceeded {timeout:?}"
            ))),
        }
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout(format!(
                    "'{selector}' did not appear within {timeout:?}"
                )));
            }
            tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    async fn has_selector(&self, selector: &str) -> Result<bool> {
        Ok(self.page.find_element(selector).await.is_ok())
    }

    async fn content(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))
    }

    async fn close(self: Box<Self>) {
        if let Err(e) = self.page.close().await {
            debug!(error = %e, "error closing page");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires Chrome/Chromium installed
    async fn test_render_and_wait() {
        let engine = BrowserEngine::new(EngineConfig::default());
        let context = engine.create().await.expect("create context");

        context
            .navigate(
                "data:text/html,<h3>Delivered</h3>",
                Duration::from_secs(10),
            )
            .await
            .expect("navigate");
        context
            .wait_for_selector("h3", Duration::from_secs(5))
            .await
            .expect("selector appears");
        assert!(!context.has_selector(".missing").await.expect("query"));

        let html = context.content().await.expect("content");
        assert!(html.contains("Delivered"));
        context.close().await;
    }

    #[test]
    fn test_default_config_is_headless() {
        let config = EngineConfig::default();
        assert!(config.headless);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }
}
