//! Declarative HTML extraction for server- and client-rendered tracking pages.

use crate::timestamp::parse_timestamp;
use parcelwatch_carrier::{
    normalize, CarrierError, EventsOrder, HtmlExtraction, StatusMapping,
};
use parcelwatch_core::{CarrierId, ErrorKind, TrackingEvent, TrackingResult, TrackingStatus};
use scraper::{ElementRef, Html, Selector};

/// Compiled form of a carrier's [`HtmlExtraction`].
///
/// Selectors are parsed once when the adapter is built, so a typo in a
/// definition fails the registry load instead of every fetch.
#[derive(Debug)]
pub struct HtmlExtractor {
    carrier_id: CarrierId,
    status: Selector,
    event: Selector,
    event_text: Option<Selector>,
    event_location: Option<Selector>,
    event_time: Option<Selector>,
    not_found: Option<Selector>,
    time_format: Option<String>,
    events_order: EventsOrder,
    mapping: StatusMapping,
}

impl HtmlExtractor {
    /// Compile the extraction config for a carrier.
    ///
    /// # Errors
    /// Returns `Invalid` naming the first selector that fails to parse.
    pub fn compile(
        carrier_id: &CarrierId,
        config: &HtmlExtraction,
        mapping: &StatusMapping,
    ) -> Result<Self, CarrierError> {
        let parse = |field: &str, css: &str| {
            Selector::parse(css).map_err(|e| {
                CarrierError::invalid(carrier_id, format!("invalid {field} '{css}': {e}"))
            })
        };
        let parse_opt = |field: &str, css: Option<&String>| {
            css.map(|c| parse(field, c.as_str())).transpose()
        };

        Ok(Self {
            carrier_id: carrier_id.clone(),
            status: parse("status_selector", &config.status_selector)?,
            event: parse("event_selector", &config.event_selector)?,
            event_text: parse_opt("event_text_selector", config.event_text_selector.as_ref())?,
            event_location: parse_opt(
                "event_location_selector",
                config.event_location_selector.as_ref(),
            )?,
            event_time: parse_opt("event_time_selector", config.event_time_selector.as_ref())?,
            not_found: parse_opt("not_found_selector", config.not_found_selector.as_ref())?,
            time_format: config.time_format.clone(),
            events_order: config.events_order,
            mapping: mapping.clone(),
        })
    }

    /// Extract a tracking result from an HTML document.
    ///
    /// A present not-found marker yields `NotFound`; a missing status element
    /// yields `ParseError`, which means the carrier changed its page layout.
    #[must_use]
    pub fn extract(&self, html: &str) -> TrackingResult {
        let document = Html::parse_document(html);

        if self.is_not_found(&document) {
            return TrackingResult::failure(ErrorKind::NotFound, "tracking number not found");
        }

        let Some(status_text) = document
            .select(&self.status)
            .map(element_text)
            .find(|text| !text.is_empty())
        else {
            return TrackingResult::failure(
                ErrorKind::ParseError,
                format!(
                    "{}: status element missing from tracking page",
                    self.carrier_id
                ),
            );
        };

        let mut events: Vec<TrackingEvent> = document
            .select(&self.event)
            .filter_map(|el| self.parse_event(el))
            .collect();

        if self.events_order == EventsOrder::NewestFirst {
            events.reverse();
        }

        let status = normalize(&status_text, &self.mapping);
        TrackingStatus::new(status, status_text, events).into()
    }

    fn is_not_found(&self, document: &Html) -> bool {
        self.not_found
            .as_ref()
            .is_some_and(|sel| document.select(sel).next().is_some())
    }

    fn parse_event(&self, element: ElementRef<'_>) -> Option<TrackingEvent> {
        let status_text = match &self.event_text {
            Some(sel) => element.select(sel).next().map(element_text)?,
            None => element_text(element),
        };
        if status_text.is_empty() {
            return None;
        }

        let location = self
            .event_location
            .as_ref()
            .and_then(|sel| element.select(sel).next())
            .map(element_text)
            .filter(|text| !text.is_empty());

        let timestamp = self
            .event_time
            .as_ref()
            .and_then(|sel| element.select(sel).next())
            .and_then(|el| {
                let raw = el
                    .value()
                    .attr("datetime")
                    .map_or_else(|| element_text(el), ToString::to_string);
                parse_timestamp(&raw, self.time_format.as_deref())
            });

        Some(TrackingEvent {
            timestamp,
            location,
            status: normalize(&status_text, &self.mapping),
            status_text,
        })
    }
}

/// Element text with runs of whitespace collapsed.
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use parcelwatch_core::CanonicalStatus;

    fn config() -> HtmlExtraction {
        HtmlExtraction {
            status_selector: ".current-status".to_string(),
            event_selector: "li.event".to_string(),
            event_text_selector: Some(".text".to_string()),
            event_location_selector: Some(".where".to_string()),
            event_time_selector: Some("time".to_string()),
            time_format: Some("%d/%m/%Y %H:%M".to_string()),
            not_found_selector: Some(".no-results".to_string()),
            events_order: EventsOrder::NewestFirst,
        }
    }

    fn mapping() -> StatusMapping {
        [
            ("out for delivery", CanonicalStatus::OutForDelivery),
            ("delivered", CanonicalStatus::Delivered),
            ("collected", CanonicalStatus::Received),
            ("hub", CanonicalStatus::InTransit),
        ]
        .into_iter()
        .collect()
    }

    fn extractor() -> HtmlExtractor {
        let carrier_id = CarrierId::new("dpd").expect("valid carrier ID");
        HtmlExtractor::compile(&carrier_id, &config(), &mapping()).expect("compile extractor")
    }

    const PAGE: &str = r#"
        <html><body>
          <h2 class="current-status">  Out for
             delivery </h2>
          <ul>
            <li class="event">
              <span class="text">Out for delivery</span>
              <span class="where">Leeds Depot</span>
              <time>02/03/2025 07:15</time>
            </li>
            <li class="event">
              <span class="text">At hub</span>
              <span class="where">Hinckley Hub</span>
              <time datetime="2025-03-01T22:00:00Z">Yesterday</time>
            </li>
            <li class="event">
              <span class="text">Collected</span>
              <time>not a time</time>
            </li>
          </ul>
        </body></html>
    "#;

    #[test]
    fn test_extracts_status_and_chronological_events() {
        let TrackingResult::Success(status) = extractor().extract(PAGE) else {
            panic!("expected success");
        };

        assert_eq!(status.status, CanonicalStatus::OutForDelivery);
        assert_eq!(status.status_text, "Out for delivery");

        let texts: Vec<&str> = status.events.iter().map(|e| e.status_text.as_str()).collect();
        assert_eq!(texts, vec!["Collected", "At hub", "Out for delivery"]);

        assert_eq!(status.events[0].status, CanonicalStatus::Received);
        assert!(status.events[0].timestamp.is_none());
        assert_eq!(
            status.events[1].timestamp.map(|t| t.to_rfc3339()).as_deref(),
            Some("2025-03-01T22:00:00+00:00")
        );
        assert_eq!(status.location.as_deref(), Some("Leeds Depot"));
    }

    #[test]
    fn test_missing_status_is_parse_error() {
        let result = extractor().extract("<html><body><p>Redesigned!</p></body></html>");
        assert_eq!(result.error_kind(), Some(ErrorKind::ParseError));
    }

    #[test]
    fn test_not_found_marker() {
        let result = extractor()
            .extract(r#"<div class="no-results">We couldn't find that parcel</div>"#);
        assert_eq!(result.error_kind(), Some(ErrorKind::NotFound));
    }

    #[test]
    fn test_invalid_selector_fails_compile() {
        let carrier_id = CarrierId::new("dpd").expect("valid carrier ID");
        let mut bad = config();
        bad.event_selector = "li[".to_string();

        let err = HtmlExtractor::compile(&carrier_id, &bad, &mapping()).unwrap_err();
        assert!(err.to_string().contains("event_selector"));
    }
}
