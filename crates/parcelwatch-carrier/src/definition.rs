//! Carrier definition types and structures.
//!
//! This module defines the data structures for carrier definitions loaded from
//! TOML files. A definition is declarative: detection patterns, the status
//! mapping, and how the carrier's tracking data is fetched and extracted.

use crate::error::{CarrierError, Result};
use crate::normalizer::StatusMapping;
use parcelwatch_core::{CarrierId, TrackingNumber};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholder substituted with the URL-encoded tracking number.
pub const TRACKING_NUMBER_PLACEHOLDER: &str = "{tracking_number}";

/// Complete carrier definition loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarrierDefinition {
    /// Core carrier metadata
    pub carrier: CarrierMetadata,

    /// Detection patterns, in declaration order
    #[serde(default)]
    pub tracking_patterns: Vec<TrackingPatternDef>,

    /// Substring-to-status rules, in precedence order
    #[serde(default)]
    pub status_mapping: StatusMapping,

    /// How to spot this carrier's tracking numbers in emails
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_patterns: Option<EmailPatterns>,

    /// Transport and extraction configuration
    pub fetch: FetchMethod,
}

impl CarrierDefinition {
    /// Get the carrier ID.
    #[must_use]
    pub fn id(&self) -> &CarrierId {
        &self.carrier.id
    }

    /// Get the carrier name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.carrier.name
    }

    /// Whether the carrier should be loaded.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.carrier.enabled
    }

    /// Which adapter variant serves this carrier.
    #[must_use]
    pub fn adapter_kind(&self) -> AdapterKind {
        self.fetch.kind()
    }

    /// Public tracking page URL for a tracking number.
    #[must_use]
    pub fn tracking_url(&self, tracking_number: &TrackingNumber) -> String {
        fill_template(&self.carrier.tracking_url_template, tracking_number)
    }

    /// Validate the definition for completeness and correctness.
    ///
    /// Regex and selector compilation happen later, when the registry
    /// compiles the carrier; this checks everything that doesn't need a
    /// compiler.
    pub fn validate(&self) -> Result<()> {
        let id = self.id();

        if self.carrier.name.trim().is_empty() {
            return Err(CarrierError::invalid(id, "carrier name cannot be empty"));
        }

        if self.carrier.website.trim().is_empty() {
            return Err(CarrierError::invalid(id, "carrier website cannot be empty"));
        }

        validate_template(id, "tracking_url_template", &self.carrier.tracking_url_template)?;

        if self.tracking_patterns.is_empty() {
            return Err(CarrierError::invalid(
                id,
                "at least one tracking pattern is required",
            ));
        }

        if let Some(pattern) = self.tracking_patterns.iter().find(|p| p.regex.is_empty()) {
            return Err(CarrierError::invalid(
                id,
                format!("tracking pattern '{}' has an empty regex", pattern.description),
            ));
        }

        if self.status_mapping.rules().iter().any(|r| r.contains().is_empty()) {
            return Err(CarrierError::invalid(
                id,
                "status_mapping substrings cannot be empty",
            ));
        }

        if let Some(email) = &self.email_patterns {
            if email.tracking_regex.is_empty() {
                return Err(CarrierError::invalid(
                    id,
                    "email_patterns.tracking_regex cannot be empty",
                ));
            }
        }

        self.fetch.validate(id)
    }
}

/// Core carrier metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarrierMetadata {
    /// Unique carrier identifier (e.g., "royal-mail", "dpd")
    pub id: CarrierId,

    /// Human-readable carrier name
    pub name: String,

    /// Carrier website URL
    pub website: String,

    /// Public tracking page with a single `{tracking_number}` placeholder
    pub tracking_url_template: String,

    /// Disabled carriers are skipped at load time
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// A detection pattern as written in the definition file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingPatternDef {
    /// Regular expression matched against the normalized tracking number
    pub regex: String,

    /// Human description (e.g., "International format")
    #[serde(default)]
    pub description: String,
}

/// Email extraction hints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailPatterns {
    /// The email is only considered if one of these appears in subject or body
    #[serde(default)]
    pub subject_contains: Vec<String>,

    /// Regex locating the tracking number in the email body
    pub tracking_regex: String,
}

/// Adapter variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdapterKind {
    /// Authenticated JSON API
    Api,
    /// Server-rendered HTML page
    Scrape,
    /// Client-rendered page needing a browser
    Browser,
}

impl AdapterKind {
    /// Get a human-readable display name.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Api => "API",
            Self::Scrape => "HTTP scrape",
            Self::Browser => "Browser automation",
        }
    }
}

/// Order in which the carrier lists its events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventsOrder {
    /// Most recent first (typical for carrier pages)
    #[default]
    NewestFirst,
    /// Chronological
    OldestFirst,
}

/// How a carrier's tracking data is fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "kebab-case")]
pub enum FetchMethod {
    /// Client-credentials authenticated JSON API
    Api(ApiFetch),
    /// Single HTTP GET of a server-rendered page
    Scrape(HtmlExtraction),
    /// Render the tracking page in a pooled browser context
    Browser(BrowserFetch),
}

impl FetchMethod {
    /// The adapter variant for this method.
    #[must_use]
    pub fn kind(&self) -> AdapterKind {
        match self {
            Self::Api(_) => AdapterKind::Api,
            Self::Scrape(_) => AdapterKind::Scrape,
            Self::Browser(_) => AdapterKind::Browser,
        }
    }

    fn validate(&self, carrier_id: &CarrierId) -> Result<()> {
        match self {
            Self::Api(api) => api.validate(carrier_id),
            Self::Scrape(html) => html.validate(carrier_id),
            Self::Browser(browser) => {
                if browser.ready_selector.trim().is_empty() {
                    return Err(CarrierError::invalid(
                        carrier_id,
                        "fetch.ready_selector cannot be empty for browser method",
                    ));
                }
                browser.extraction.validate(carrier_id)
            }
        }
    }
}

/// JSON API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiFetch {
    /// Endpoint with a `{tracking_number}` placeholder
    pub api_url_template: String,

    /// OAuth2 client-credentials token endpoint
    pub token_url: String,

    /// Requested scope, if the token endpoint needs one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Environment prefix: credentials come from `<PREFIX>_CLIENT_ID` and `<PREFIX>_CLIENT_SECRET`
    pub credentials_env: String,

    /// Header that also carries the client ID on API calls, if the carrier wants one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id_header: Option<String>,

    /// Static headers sent with every API call
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// JSON pointer to the current status text
    pub status_pointer: String,

    /// JSON pointer to the event array
    pub events_pointer: String,

    /// Field holding each event's status text
    pub event_status_field: String,

    /// Field holding each event's location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_location_field: Option<String>,

    /// Field holding each event's timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_time_field: Option<String>,

    /// JSON pointer to the delivery estimate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_delivery_pointer: Option<String>,

    /// Order of the event array
    #[serde(default)]
    pub events_order: EventsOrder,
}

impl ApiFetch {
    fn validate(&self, carrier_id: &CarrierId) -> Result<()> {
        validate_template(carrier_id, "fetch.api_url_template", &self.api_url_template)?;

        if self.token_url.trim().is_empty() {
            return Err(CarrierError::invalid(
                carrier_id,
                "fetch.token_url cannot be empty for api method",
            ));
        }

        if self.credentials_env.trim().is_empty() {
            return Err(CarrierError::invalid(
                carrier_id,
                "fetch.credentials_env cannot be empty for api method",
            ));
        }

        for (field, pointer) in [
            ("fetch.status_pointer", Some(&self.status_pointer)),
            ("fetch.events_pointer", Some(&self.events_pointer)),
            (
                "fetch.expected_delivery_pointer",
                self.expected_delivery_pointer.as_ref(),
            ),
        ] {
            // An empty pointer selects the whole document.
            if let Some(pointer) = pointer {
                if !pointer.starts_with('/') {
                    return Err(CarrierError::invalid(
                        carrier_id,
                        format!("{field} must be a JSON pointer starting with '/', got '{pointer}'"),
                    ));
                }
            }
        }

        if self.event_status_field.trim().is_empty() {
            return Err(CarrierError::invalid(
                carrier_id,
                "fetch.event_status_field cannot be empty",
            ));
        }

        Ok(())
    }
}

/// CSS selector based extraction from an HTML document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtmlExtraction {
    /// Element holding the current status text
    pub status_selector: String,

    /// One element per tracking event
    pub event_selector: String,

    /// Status text within an event element (defaults to the whole element)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_text_selector: Option<String>,

    /// Location within an event element
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_location_selector: Option<String>,

    /// Timestamp within an event element
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_time_selector: Option<String>,

    /// chrono format for event timestamps, interpreted as UTC (RFC 3339 is always tried)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_format: Option<String>,

    /// Present only when the carrier doesn't know the tracking number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_found_selector: Option<String>,

    /// Order of the event elements on the page
    #[serde(default)]
    pub events_order: EventsOrder,
}

impl HtmlExtraction {
    fn validate(&self, carrier_id: &CarrierId) -> Result<()> {
        if self.status_selector.trim().is_empty() {
            return Err(CarrierError::invalid(
                carrier_id,
                "fetch.status_selector cannot be empty",
            ));
        }
        if self.event_selector.trim().is_empty() {
            return Err(CarrierError::invalid(
                carrier_id,
                "fetch.event_selector cannot be empty",
            ));
        }
        Ok(())
    }
}

/// Browser-rendered extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserFetch {
    /// Selector whose presence means tracking data has rendered
    pub ready_selector: String,

    /// Extraction applied to the rendered document
    #[serde(flatten)]
    pub extraction: HtmlExtraction,
}

/// Substitute the URL-encoded tracking number into a template.
#[must_use]
pub fn fill_template(template: &str, tracking_number: &TrackingNumber) -> String {
    template.replace(
        TRACKING_NUMBER_PLACEHOLDER,
        &urlencoding::encode(tracking_number.as_str()),
    )
}

fn validate_template(carrier_id: &CarrierId, field: &str, template: &str) -> Result<()> {
    let count = template.matches(TRACKING_NUMBER_PLACEHOLDER).count();
    if count == 1 {
        Ok(())
    } else {
        Err(CarrierError::invalid(
            carrier_id,
            format!("{field} must contain exactly one {TRACKING_NUMBER_PLACEHOLDER} placeholder, found {count}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parcelwatch_core::CanonicalStatus;

    fn scrape_definition() -> CarrierDefinition {
        CarrierDefinition {
            carrier: CarrierMetadata {
                id: CarrierId::new("test-carrier").expect("valid carrier ID"),
                name: "Test Carrier".to_string(),
                website: "https://test.example".to_string(),
                tracking_url_template: "https://test.example/track/{tracking_number}".to_string(),
                enabled: true,
            },
            tracking_patterns: vec![TrackingPatternDef {
                regex: "^TEST[0-9]+$".to_string(),
                description: "Test format".to_string(),
            }],
            status_mapping: [("delivered", CanonicalStatus::Delivered)]
                .into_iter()
                .collect(),
            email_patterns: None,
            fetch: FetchMethod::Scrape(HtmlExtraction {
                status_selector: ".status".to_string(),
                event_selector: ".event".to_string(),
                event_text_selector: None,
                event_location_selector: None,
                event_time_selector: None,
                time_format: None,
                not_found_selector: None,
                events_order: EventsOrder::NewestFirst,
            }),
        }
    }

    #[test]
    fn test_adapter_kind_display() {
        assert_eq!(AdapterKind::Api.display_name(), "API");
        assert_eq!(AdapterKind::Browser.display_name(), "Browser automation");
    }

    #[test]
    fn test_definition_validation() {
        let definition = scrape_definition();
        assert!(definition.validate().is_ok());
        assert_eq!(definition.adapter_kind(), AdapterKind::Scrape);

        let mut invalid = definition.clone();
        invalid.carrier.name = String::new();
        assert!(invalid.validate().is_err());

        let mut invalid = definition.clone();
        invalid.tracking_patterns.clear();
        assert!(invalid.validate().is_err());

        let mut invalid = definition.clone();
        invalid.carrier.tracking_url_template = "https://test.example/track".to_string();
        assert!(invalid.validate().is_err());

        let mut invalid = definition;
        invalid.carrier.tracking_url_template =
            "https://test.example/{tracking_number}/{tracking_number}".to_string();
        let err = invalid.validate().unwrap_err();
        assert!(err.to_string().contains("found 2"));
    }

    #[test]
    fn test_empty_mapping_substring_rejected() {
        let mut definition = scrape_definition();
        definition.status_mapping = [("", CanonicalStatus::Delivered)].into_iter().collect();
        assert!(definition.validate().is_err());
    }

    #[test]
    fn test_tracking_url_is_url_encoded() {
        let definition = scrape_definition();
        let number = TrackingNumber::new("ab-12").expect("valid number");
        assert_eq!(
            definition.tracking_url(&number),
            "https://test.example/track/AB-12"
        );
    }

    #[test]
    fn test_parse_browser_method() {
        let fetch: FetchMethod = toml::from_str(
            r##"
method = "browser"
ready_selector = "h3"
status_selector = "h3"
event_selector = "button[aria-label*='ticked']"
events_order = "oldest-first"
"##,
        )
        .expect("parse browser fetch");

        assert_eq!(fetch.kind(), AdapterKind::Browser);
        let FetchMethod::Browser(browser) = fetch else {
            panic!("expected browser method");
        };
        assert_eq!(browser.ready_selector, "h3");
        assert_eq!(browser.extraction.events_order, EventsOrder::OldestFirst);
    }

    #[test]
    fn test_api_pointer_validation() {
        let carrier_id = CarrierId::new("api-carrier").expect("valid carrier ID");
        let mut api = ApiFetch {
            api_url_template: "https://api.example/{tracking_number}".to_string(),
            token_url: "https://auth.example/token".to_string(),
            scope: None,
            credentials_env: "API_CARRIER".to_string(),
            client_id_header: None,
            headers: BTreeMap::new(),
            status_pointer: "/summary/status".to_string(),
            events_pointer: "/events".to_string(),
            event_status_field: "name".to_string(),
            event_location_field: None,
            event_time_field: None,
            expected_delivery_pointer: None,
            events_order: EventsOrder::NewestFirst,
        };
        assert!(api.validate(&carrier_id).is_ok());

        api.status_pointer = "summary.status".to_string();
        assert!(api.validate(&carrier_id).is_err());
    }

    #[test]
    fn test_api_empty_events_pointer_rejected() {
        let carrier_id = CarrierId::new("api-carrier").expect("valid carrier ID");
        let api = ApiFetch {
            api_url_template: "https://api.example/{tracking_number}".to_string(),
            token_url: "https://auth.example/token".to_string(),
            scope: None,
            credentials_env: "API_CARRIER".to_string(),
            client_id_header: None,
            headers: BTreeMap::new(),
            status_pointer: "/summary/status".to_string(),
            events_pointer: String::new(),
            event_status_field: "name".to_string(),
            event_location_field: None,
            event_time_field: None,
            expected_delivery_pointer: None,
            events_order: EventsOrder::NewestFirst,
        };

        let err = api.validate(&carrier_id).unwrap_err();
        assert!(err.to_string().contains("fetch.events_pointer"));
    }
}
