//! JSON-pointer extraction for API carriers.

use crate::timestamp::parse_timestamp;
use parcelwatch_carrier::{normalize, ApiFetch, EventsOrder, StatusMapping};
use parcelwatch_core::{CarrierId, ErrorKind, TrackingEvent, TrackingResult, TrackingStatus};
use serde_json::Value;

/// Pulls status, events and delivery estimate out of an API response.
#[derive(Debug)]
pub struct JsonExtractor {
    carrier_id: CarrierId,
    status_pointer: String,
    events_pointer: String,
    event_status_field: String,
    event_location_field: Option<String>,
    event_time_field: Option<String>,
    expected_delivery_pointer: Option<String>,
    events_order: EventsOrder,
    mapping: StatusMapping,
}

impl JsonExtractor {
    /// Build an extractor from an API fetch config.
    #[must_use]
    pub fn new(carrier_id: &CarrierId, config: &ApiFetch, mapping: &StatusMapping) -> Self {
        Self {
            carrier_id: carrier_id.clone(),
            status_pointer: config.status_pointer.clone(),
            events_pointer: config.events_pointer.clone(),
            event_status_field: config.event_status_field.clone(),
            event_location_field: config.event_location_field.clone(),
            event_time_field: config.event_time_field.clone(),
            expected_delivery_pointer: config.expected_delivery_pointer.clone(),
            events_order: config.events_order,
            mapping: mapping.clone(),
        }
    }

    /// Extract a tracking result from a response body.
    #[must_use]
    pub fn extract(&self, body: &Value) -> TrackingResult {
        let Some(status_text) = body
            .pointer(&self.status_pointer)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
        else {
            return TrackingResult::failure(
                ErrorKind::ParseError,
                format!(
                    "{}: response has no status at {}",
                    self.carrier_id, self.status_pointer
                ),
            );
        };

        let mut events = match body.pointer(&self.events_pointer) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.iter().filter_map(|e| self.parse_event(e)).collect(),
            Some(_) => {
                return TrackingResult::failure(
                    ErrorKind::ParseError,
                    format!(
                        "{}: {} is not an event list",
                        self.carrier_id, self.events_pointer
                    ),
                )
            }
        };

        if self.events_order == EventsOrder::NewestFirst {
            events.reverse();
        }

        let expected_delivery = self
            .expected_delivery_pointer
            .as_deref()
            .and_then(|p| body.pointer(p))
            .and_then(Value::as_str)
            .and_then(|raw| parse_timestamp(raw, None));

        TrackingStatus::new(normalize(status_text, &self.mapping), status_text, events)
            .with_expected_delivery(expected_delivery)
            .into()
    }

    fn parse_event(&self, event: &Value) -> Option<TrackingEvent> {
        let status_text = string_field(event, &self.event_status_field)?;
        Some(TrackingEvent {
            timestamp: self
                .event_time_field
                .as_deref()
                .and_then(|f| string_field(event, f))
                .and_then(|raw| parse_timestamp(&raw, None)),
            location: self
                .event_location_field
                .as_deref()
                .and_then(|f| string_field(event, f)),
            status: normalize(&status_text, &self.mapping),
            status_text,
        })
    }
}

fn string_field(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parcelwatch_core::CanonicalStatus;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn extractor() -> JsonExtractor {
        let config = ApiFetch {
            api_url_template: "https://api.example/{tracking_number}/events".to_string(),
            token_url: "https://auth.example/token".to_string(),
            scope: None,
            credentials_env: "ROYAL_MAIL".to_string(),
            client_id_header: None,
            headers: BTreeMap::new(),
            status_pointer: "/mailPieces/0/summary/statusDescription".to_string(),
            events_pointer: "/mailPieces/0/events".to_string(),
            event_status_field: "eventName".to_string(),
            event_location_field: Some("locationName".to_string()),
            event_time_field: Some("eventDateTime".to_string()),
            expected_delivery_pointer: Some(
                "/mailPieces/0/summary/estimatedDelivery/date".to_string(),
            ),
            events_order: EventsOrder::NewestFirst,
        };
        let mapping: StatusMapping = [
            ("delivered", CanonicalStatus::Delivered),
            ("with delivery", CanonicalStatus::OutForDelivery),
            ("accepted", CanonicalStatus::Received),
        ]
        .into_iter()
        .collect();
        let carrier_id = CarrierId::new("royal-mail").expect("valid carrier ID");
        JsonExtractor::new(&carrier_id, &config, &mapping)
    }

    #[test]
    fn test_extract_royal_mail_shape() {
        let body = json!({
            "mailPieces": [{
                "summary": {
                    "statusDescription": "Item with delivery office",
                    "estimatedDelivery": { "date": "2025-03-04" }
                },
                "events": [
                    { "eventName": "Item with delivery office", "locationName": "Leeds DO",
                      "eventDateTime": "2025-03-03T06:10:00Z" },
                    { "eventName": "Accepted at depot", "locationName": "Bristol MC",
                      "eventDateTime": "2025-03-01T18:00:00Z" }
                ]
            }]
        });

        let TrackingResult::Success(status) = extractor().extract(&body) else {
            panic!("expected success");
        };
        assert_eq!(status.status, CanonicalStatus::OutForDelivery);
        assert_eq!(status.events.len(), 2);
        assert_eq!(status.events[0].status, CanonicalStatus::Received);
        assert_eq!(status.location.as_deref(), Some("Leeds DO"));
        assert_eq!(
            status.expected_delivery.map(|d| d.to_rfc3339()).as_deref(),
            Some("2025-03-04T00:00:00+00:00")
        );
    }

    #[test]
    fn test_missing_status_is_parse_error() {
        let body = json!({ "mailPieces": [] });
        assert_eq!(
            extractor().extract(&body).error_kind(),
            Some(ErrorKind::ParseError)
        );
    }

    #[test]
    fn test_events_not_a_list_is_parse_error() {
        let body = json!({
            "mailPieces": [{ "summary": { "statusDescription": "Delivered" }, "events": "none" }]
        });
        assert_eq!(
            extractor().extract(&body).error_kind(),
            Some(ErrorKind::ParseError)
        );
    }
}
