//! HTTP-scrape adapter for server-rendered tracking pages.

use crate::extract::HtmlExtractor;
use crate::http::{status_failure, transport_failure};
use async_trait::async_trait;
use parcelwatch_carrier::{CarrierAdapter, CarrierDefinition, CarrierError, HtmlExtraction};
use parcelwatch_core::{ErrorKind, TrackingNumber, TrackingResult};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use std::sync::Arc;

/// Adapter issuing one GET per fetch and extracting from the returned HTML.
#[derive(Debug)]
pub struct ScrapeAdapter {
    definition: Arc<CarrierDefinition>,
    client: Client,
    extractor: HtmlExtractor,
}

impl ScrapeAdapter {
    /// Create an adapter, compiling the page selectors.
    ///
    /// # Errors
    /// Returns `Invalid` if a selector doesn't parse.
    pub fn new(
        definition: Arc<CarrierDefinition>,
        config: &HtmlExtraction,
        client: Client,
    ) -> Result<Self, CarrierError> {
        let extractor =
            HtmlExtractor::compile(definition.id(), config, &definition.status_mapping)?;
        Ok(Self {
            definition,
            client,
            extractor,
        })
    }
}

#[async_trait]
impl CarrierAdapter for ScrapeAdapter {
    async fn fetch_status(&self, tracking_number: &TrackingNumber) -> TrackingResult {
        let url = self.definition.tracking_url(tracking_number);

        let response = match self
            .client
            .get(&url)
            .header(
                ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header(ACCEPT_LANGUAGE, "en-GB,en;q=0.9")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return transport_failure(&e, "tracking page"),
        };

        let status = response.status();
        if !status.is_success() {
            return status_failure(status, "tracking page");
        }

        match response.text().await {
            Ok(html) => self.extractor.extract(&html),
            Err(e) if e.is_timeout() => transport_failure(&e, "tracking page"),
            Err(e) => TrackingResult::failure(
                ErrorKind::ParseError,
                format!("tracking page body unreadable: {e}"),
            ),
        }
    }
}
