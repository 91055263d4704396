//! Authenticated JSON API adapter.

use crate::credentials::{AccessToken, CredentialManager};
use crate::http::{status_failure, transport_failure};
use crate::json::JsonExtractor;
use async_trait::async_trait;
use parcelwatch_carrier::definition::fill_template;
use parcelwatch_carrier::{ApiFetch, CarrierAdapter, CarrierDefinition};
use parcelwatch_core::{CarrierId, ErrorKind, TrackingNumber, TrackingResult};
use reqwest::header::ACCEPT;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Adapter for carriers exposing a client-credentials protected API.
///
/// A 401/403 from the API triggers one token refresh and one retry; a second
/// rejection is terminal. Rate limiting is reported, not retried.
#[derive(Debug)]
pub struct ApiAdapter {
    carrier_id: CarrierId,
    client: Client,
    url_template: String,
    client_id_header: Option<String>,
    headers: BTreeMap<String, String>,
    credentials: CredentialManager,
    extractor: JsonExtractor,
}

impl ApiAdapter {
    /// Create an adapter for a carrier's API configuration.
    #[must_use]
    pub fn new(
        definition: &CarrierDefinition,
        config: &ApiFetch,
        client: Client,
        credentials: CredentialManager,
    ) -> Self {
        Self {
            carrier_id: definition.id().clone(),
            url_template: config.api_url_template.clone(),
            client_id_header: config.client_id_header.clone(),
            headers: config.headers.clone(),
            extractor: JsonExtractor::new(definition.id(), config, &definition.status_mapping),
            client,
            credentials,
        }
    }

    async fn send(&self, url: &str, token: &AccessToken) -> reqwest::Result<Response> {
        let mut request = self
            .client
            .get(url)
            .bearer_auth(token.secret())
            .header(ACCEPT, "application/json");

        if let (Some(header), Some(credentials)) =
            (&self.client_id_header, self.credentials.credentials())
        {
            request = request.header(header.as_str(), credentials.client_id());
        }
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        request.send().await
    }
}

fn is_auth_rejection(status: StatusCode) -> bool {
    matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
}

#[async_trait]
impl CarrierAdapter for ApiAdapter {
    async fn fetch_status(&self, tracking_number: &TrackingNumber) -> TrackingResult {
        let url = fill_template(&self.url_template, tracking_number);

        let token = match self.credentials.token().await {
            Ok(token) => token,
            Err(e) => return TrackingResult::failure(e.kind(), e.to_string()),
        };

        let mut response = match self.send(&url, &token).await {
            Ok(response) => response,
            Err(e) => return transport_failure(&e, "carrier API"),
        };

        if is_auth_rejection(response.status()) {
            debug!(carrier_id = %self.carrier_id, status = %response.status(), "token rejected, refreshing");
            let fresh = match self.credentials.refresh_rejected(&token).await {
                Ok(token) => token,
                Err(e) => return TrackingResult::failure(e.kind(), e.to_string()),
            };
            response = match self.send(&url, &fresh).await {
                Ok(response) => response,
                Err(e) => return transport_failure(&e, "carrier API"),
            };
            if is_auth_rejection(response.status()) {
                warn!(carrier_id = %self.carrier_id, "API rejected a freshly issued token");
                return TrackingResult::failure(
                    ErrorKind::AuthError,
                    format!("carrier API rejected the credentials ({})", response.status()),
                );
            }
        }

        let status = response.status();
        if !status.is_success() {
            return status_failure(status, "carrier API");
        }

        match response.json::<Value>().await {
            Ok(body) => self.extractor.extract(&body),
            Err(e) => TrackingResult::failure(
                ErrorKind::ParseError,
                format!("{}: API response is not valid JSON: {e}", self.carrier_id),
            ),
        }
    }
}
