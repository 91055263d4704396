//! Tracking results returned by carrier adapters.
//!
//! A [`TrackingResult`] is either a success carrying the normalized status and
//! event history, or a failure carrying an [`ErrorKind`] and a message. Never
//! both. On the wire it is a flat object with a `success` flag:
//!
//! ```json
//! { "success": true, "status": "in_transit", "statusText": "On its way", "events": [] }
//! { "success": false, "errorKind": "parse_error", "message": "status element missing" }
//! ```

use crate::types::CanonicalStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One entry in a parcel's tracking history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEvent {
    /// When the event happened, if the carrier reported a parseable time
    pub timestamp: Option<DateTime<Utc>>,
    /// Where the event happened
    pub location: Option<String>,
    /// Raw carrier text
    pub status_text: String,
    /// Canonical status derived from `status_text`
    pub status: CanonicalStatus,
}

/// Failure taxonomy for a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Tracking number unknown to the carrier
    NotFound,
    /// Upstream asked us to slow down
    RateLimited,
    /// Network timeout or the attempt exceeded its wall-clock bound
    NetworkTimeout,
    /// Upstream page or payload no longer has the expected structure
    ParseError,
    /// Credentials rejected or missing
    AuthError,
    /// Rendered page did not show tracking data in time
    RenderTimeout,
    /// No browser context became free in time
    ResourceExhausted,
    /// Upstream returned a server error or refused the connection
    UpstreamUnavailable,
}

impl ErrorKind {
    /// Whether the orchestrator should retry a failure of this kind.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited
                | Self::NetworkTimeout
                | Self::RenderTimeout
                | Self::ResourceExhausted
                | Self::UpstreamUnavailable
        )
    }

    /// The wire name of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::RateLimited => "rate_limited",
            Self::NetworkTimeout => "network_timeout",
            Self::ParseError => "parse_error",
            Self::AuthError => "auth_error",
            Self::RenderTimeout => "render_timeout",
            Self::ResourceExhausted => "resource_exhausted",
            Self::UpstreamUnavailable => "upstream_unavailable",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingStatus {
    /// Current canonical status
    pub status: CanonicalStatus,
    /// Raw current status text
    pub status_text: String,
    /// Events, oldest first; the last one is the most recent
    pub events: Vec<TrackingEvent>,
    /// Location of the most recent event
    pub location: Option<String>,
    /// Carrier's delivery estimate
    pub expected_delivery: Option<DateTime<Utc>>,
}

impl TrackingStatus {
    /// Build a status from its current text and an oldest-first event list.
    ///
    /// `location` is taken from the last event.
    #[must_use]
    pub fn new(
        status: CanonicalStatus,
        status_text: impl Into<String>,
        events: Vec<TrackingEvent>,
    ) -> Self {
        let location = events.last().and_then(|e| e.location.clone());
        Self {
            status,
            status_text: status_text.into(),
            events,
            location,
            expected_delivery: None,
        }
    }

    /// Attach a delivery estimate.
    #[must_use]
    pub fn with_expected_delivery(mut self, expected: Option<DateTime<Utc>>) -> Self {
        self.expected_delivery = expected;
        self
    }
}

/// Payload of a failed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingFailure {
    /// What went wrong
    pub kind: ErrorKind,
    /// Human-readable message, surfaced to the caller unchanged
    pub message: String,
}

/// Outcome of fetching one tracking number from one carrier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "TrackingResultWire", try_from = "TrackingResultWire")]
pub enum TrackingResult {
    /// The carrier reported a status
    Success(TrackingStatus),
    /// The fetch failed
    Failure(TrackingFailure),
}

impl TrackingResult {
    /// Shorthand for a failure result.
    #[must_use]
    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Failure(TrackingFailure {
            kind,
            message: message.into(),
        })
    }

    /// Whether this is a success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The error kind, if this is a failure.
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure.kind),
        }
    }

    /// The canonical status, if this is a success.
    #[must_use]
    pub fn status(&self) -> Option<CanonicalStatus> {
        match self {
            Self::Success(status) => Some(status.status),
            Self::Failure(_) => None,
        }
    }
}

impl From<TrackingStatus> for TrackingResult {
    fn from(status: TrackingStatus) -> Self {
        Self::Success(status)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackingResultWire {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    status: Option<CanonicalStatus>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    status_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    events: Option<Vec<TrackingEvent>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    expected_delivery: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    message: Option<String>,
}

impl From<TrackingResult> for TrackingResultWire {
    fn from(result: TrackingResult) -> Self {
        match result {
            TrackingResult::Success(s) => Self {
                success: true,
                status: Some(s.status),
                status_text: Some(s.status_text),
                events: Some(s.events),
                location: s.location,
                expected_delivery: s.expected_delivery,
                error_kind: None,
                message: None,
            },
            TrackingResult::Failure(f) => Self {
                success: false,
                status: None,
                status_text: None,
                events: None,
                location: None,
                expected_delivery: None,
                error_kind: Some(f.kind),
                message: Some(f.message),
            },
        }
    }
}

impl TryFrom<TrackingResultWire> for TrackingResult {
    type Error = String;

    fn try_from(wire: TrackingResultWire) -> Result<Self, Self::Error> {
        if wire.success {
            if wire.error_kind.is_some() {
                return Err("successful result must not carry errorKind".to_string());
            }
            let status = wire.status.ok_or("successful result requires status")?;
            Ok(Self::Success(TrackingStatus {
                status,
                status_text: wire.status_text.unwrap_or_default(),
                events: wire.events.unwrap_or_default(),
                location: wire.location,
                expected_delivery: wire.expected_delivery,
            }))
        } else {
            if wire.status.is_some() {
                return Err("failed result must not carry status".to_string());
            }
            let kind = wire.error_kind.ok_or("failed result requires errorKind")?;
            Ok(Self::Failure(TrackingFailure {
                kind,
                message: wire.message.unwrap_or_default(),
            }))
        }
    }
}
