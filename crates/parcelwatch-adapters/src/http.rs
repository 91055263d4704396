//! Shared HTTP plumbing for the API and scrape adapters.

use parcelwatch_core::{ErrorKind, HttpSettings, TrackingResult};
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Build the HTTP client shared by every HTTP-based adapter.
///
/// # Errors
/// Returns error if the HTTP client cannot be created.
pub fn build_http_client(settings: &HttpSettings) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(settings.user_agent.clone())
        .timeout(Duration::from_secs(settings.timeout_secs))
        .build()
}

/// Failure kind for a non-success HTTP status.
///
/// 401/403 are reported as `AuthError`; the API adapter intercepts them first
/// to refresh its token.
pub(crate) fn classify_status(status: StatusCode) -> ErrorKind {
    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => ErrorKind::NotFound,
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimited,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorKind::AuthError,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ErrorKind::NetworkTimeout,
        s if s.is_server_error() => ErrorKind::UpstreamUnavailable,
        _ => ErrorKind::ParseError,
    }
}

/// Failure result for a non-success HTTP status.
pub(crate) fn status_failure(status: StatusCode, what: &str) -> TrackingResult {
    let kind = classify_status(status);
    let message = match kind {
        ErrorKind::NotFound => "tracking number not found".to_string(),
        ErrorKind::RateLimited => format!("{what} rate limited the request"),
        ErrorKind::AuthError => format!("{what} rejected the credentials ({status})"),
        _ => format!("{what} returned {status}"),
    };
    TrackingResult::failure(kind, message)
}

/// Failure result for a transport-level error.
pub(crate) fn transport_failure(err: &reqwest::Error, what: &str) -> TrackingResult {
    let kind = if err.is_timeout() {
        ErrorKind::NetworkTimeout
    } else if err.is_connect() {
        ErrorKind::UpstreamUnavailable
    } else if err.is_decode() {
        ErrorKind::ParseError
    } else {
        ErrorKind::NetworkTimeout
    };
    TrackingResult::failure(kind, format!("{what} request failed: {err}"))
}
