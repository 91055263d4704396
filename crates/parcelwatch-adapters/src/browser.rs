//! Browser-automation adapter for client-rendered tracking pages.

use crate::extract::HtmlExtractor;
use async_trait::async_trait;
use parcelwatch_browser::{BrowserError, ContextPool, PoolError};
use parcelwatch_carrier::{BrowserFetch, CarrierAdapter, CarrierDefinition, CarrierError};
use parcelwatch_core::{BrowserSettings, ErrorKind, TrackingNumber, TrackingResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Waits applied to each browser fetch.
#[derive(Debug, Clone, Copy)]
pub struct BrowserTimings {
    /// Bound on page navigation
    pub navigation: Duration,
    /// Bound on waiting for tracking data to render
    pub render_wait: Duration,
}

impl From<&BrowserSettings> for BrowserTimings {
    fn from(settings: &BrowserSettings) -> Self {
        Self {
            navigation: Duration::from_secs(settings.navigation_timeout_secs),
            render_wait: Duration::from_millis(settings.render_wait_ms),
        }
    }
}

/// Adapter rendering the tracking page in a pooled browser context.
#[derive(Debug)]
pub struct BrowserAdapter {
    definition: Arc<CarrierDefinition>,
    pool: ContextPool,
    timings: BrowserTimings,
    ready_selector: String,
    not_found_selector: Option<String>,
    extractor: HtmlExtractor,
}

impl BrowserAdapter {
    /// Create an adapter, compiling the page selectors.
    ///
    /// # Errors
    /// Returns `Invalid` if a selector doesn't parse.
    pub fn new(
        definition: Arc<CarrierDefinition>,
        config: &BrowserFetch,
        pool: ContextPool,
        timings: BrowserTimings,
    ) -> Result<Self, CarrierError> {
        let extractor = HtmlExtractor::compile(
            definition.id(),
            &config.extraction,
            &definition.status_mapping,
        )?;
        Ok(Self {
            ready_selector: config.ready_selector.clone(),
            not_found_selector: config.extraction.not_found_selector.clone(),
            definition,
            pool,
            timings,
            extractor,
        })
    }
}

fn pool_failure(err: &PoolError) -> TrackingResult {
    let kind = match err {
        PoolError::Create(_) => ErrorKind::UpstreamUnavailable,
        PoolError::TimedOut(_) | PoolError::Closed => ErrorKind::ResourceExhausted,
    };
    TrackingResult::failure(kind, err.to_string())
}

fn browser_failure(err: &BrowserError) -> TrackingResult {
    let kind = match err {
        BrowserError::Timeout(_) => ErrorKind::NetworkTimeout,
        _ => ErrorKind::UpstreamUnavailable,
    };
    TrackingResult::failure(kind, err.to_string())
}

#[async_trait]
impl CarrierAdapter for BrowserAdapter {
    async fn fetch_status(&self, tracking_number: &TrackingNumber) -> TrackingResult {
        let mut context = match self.pool.acquire().await {
            Ok(context) => context,
            Err(e) => return pool_failure(&e),
        };

        let url = self.definition.tracking_url(tracking_number);
        if let Err(e) = context.navigate(&url, self.timings.navigation).await {
            if !e.is_recoverable() {
                context.mark_broken();
            }
            return browser_failure(&e);
        }

        match context
            .wait_for_selector(&self.ready_selector, self.timings.render_wait)
            .await
        {
            Ok(()) => {}
            Err(BrowserError::Timeout(_)) => {
                if let Some(selector) = &self.not_found_selector {
                    if context.has_selector(selector).await.unwrap_or(false) {
                        return TrackingResult::failure(
                            ErrorKind::NotFound,
                            "tracking number not found",
                        );
                    }
                }
                return TrackingResult::failure(
                    ErrorKind::RenderTimeout,
                    format!(
                        "tracking data did not render within {:?}",
                        self.timings.render_wait
                    ),
                );
            }
            Err(e) => {
                context.mark_broken();
                return browser_failure(&e);
            }
        }

        let html = match context.content().await {
            Ok(html) => html,
            Err(e) => {
                context.mark_broken();
                return browser_failure(&e);
            }
        };
        drop(context);

        debug!(carrier_id = %self.definition.id(), bytes = html.len(), "rendered tracking page");
        self.extractor.extract(&html)
    }
}
