//! Refresh policy: which tracked parcels are due for another fetch.
//!
//! Triggering is left to the caller; this module only answers "is it due"
//! and "when will it be".

use chrono::{DateTime, TimeDelta, Utc};
use parcelwatch_core::{
    CanonicalStatus, CarrierId, RefreshSettings, TrackingNumber, TrackingResult,
};
use std::time::Duration;

/// A parcel the caller keeps refreshed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedParcel {
    /// Carrier the parcel was assigned to
    pub carrier_id: CarrierId,
    /// Normalized tracking number
    pub tracking_number: TrackingNumber,
    /// When the parcel was last fetched, successfully or not
    pub last_fetched: Option<DateTime<Utc>>,
    /// Desired time between fetches
    pub refresh_interval: Duration,
    /// Status from the last successful fetch
    pub last_status: Option<CanonicalStatus>,
}

/// When a parcel should next be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextRefresh {
    /// Never fetched; due immediately
    Now,
    /// Due at this instant
    At(DateTime<Utc>),
    /// Terminal status reached; no further refreshes
    Never,
}

impl TrackedParcel {
    /// A parcel that has never been fetched.
    #[must_use]
    pub fn new(
        carrier_id: CarrierId,
        tracking_number: TrackingNumber,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            carrier_id,
            tracking_number,
            last_fetched: None,
            refresh_interval,
            last_status: None,
        }
    }

    /// A never-fetched parcel on the configured default interval.
    #[must_use]
    pub fn with_settings(
        carrier_id: CarrierId,
        tracking_number: TrackingNumber,
        settings: &RefreshSettings,
    ) -> Self {
        Self::new(carrier_id, tracking_number, settings.default_interval())
    }

    /// Record a fetch outcome at `at`.
    ///
    /// Failures advance `last_fetched` but keep the previous status.
    pub fn record(&mut self, result: &TrackingResult, at: DateTime<Utc>) {
        self.last_fetched = Some(at);
        if let Some(status) = result.status() {
            self.last_status = Some(status);
        }
    }
}

/// When `parcel` is next due.
#[must_use]
pub fn next_refresh_at(parcel: &TrackedParcel) -> NextRefresh {
    if parcel.last_status.is_some_and(|s| s.is_terminal()) {
        return NextRefresh::Never;
    }
    let Some(last) = parcel.last_fetched else {
        return NextRefresh::Now;
    };
    TimeDelta::from_std(parcel.refresh_interval)
        .ok()
        .and_then(|interval| last.checked_add_signed(interval))
        .map_or(NextRefresh::Never, NextRefresh::At)
}

/// Whether `parcel` should be fetched at `now`.
#[must_use]
pub fn is_due(parcel: &TrackedParcel, now: DateTime<Utc>) -> bool {
    match next_refresh_at(parcel) {
        NextRefresh::Now => true,
        NextRefresh::At(due) => now >= due,
        NextRefresh::Never => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parcelwatch_core::{ErrorKind, TrackingStatus};

    fn parcel() -> TrackedParcel {
        TrackedParcel::new(
            CarrierId::new("royal-mail").unwrap(),
            TrackingNumber::new("XQ779509088GB").unwrap(),
            Duration::from_secs(30 * 60),
        )
    }

    fn at(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_never_fetched_is_due() {
        let parcel = parcel();
        assert_eq!(next_refresh_at(&parcel), NextRefresh::Now);
        assert!(is_due(&parcel, at("2026-02-17T12:00:00Z")));
    }

    #[test]
    fn test_due_after_interval() {
        let mut parcel = parcel();
        parcel.last_fetched = Some(at("2026-02-17T12:00:00Z"));
        parcel.last_status = Some(CanonicalStatus::InTransit);

        assert_eq!(
            next_refresh_at(&parcel),
            NextRefresh::At(at("2026-02-17T12:30:00Z"))
        );
        assert!(!is_due(&parcel, at("2026-02-17T12:29:59Z")));
        assert!(is_due(&parcel, at("2026-02-17T12:30:00Z")));
    }

    #[test]
    fn test_terminal_status_is_never_due() {
        let mut parcel = parcel();
        parcel.last_fetched = Some(at("2026-02-17T12:00:00Z"));
        parcel.last_status = Some(CanonicalStatus::Delivered);

        assert_eq!(next_refresh_at(&parcel), NextRefresh::Never);
        assert!(!is_due(&parcel, at("2027-01-01T00:00:00Z")));
    }

    #[test]
    fn test_configured_interval_drives_next_refresh() {
        let settings = RefreshSettings {
            default_interval_minutes: 90,
        };
        let mut parcel = TrackedParcel::with_settings(
            CarrierId::new("dpd").unwrap(),
            TrackingNumber::new("15501234567890").unwrap(),
            &settings,
        );
        assert_eq!(parcel.refresh_interval, Duration::from_secs(90 * 60));

        let fetched = TrackingStatus::new(CanonicalStatus::InTransit, "In transit", Vec::new());
        parcel.record(&fetched.into(), at("2026-02-17T12:00:00Z"));

        assert_eq!(
            next_refresh_at(&parcel),
            NextRefresh::At(at("2026-02-17T13:30:00Z"))
        );
    }

    #[test]
    fn test_failed_fetch_keeps_previous_status() {
        let mut parcel = parcel();
        parcel.record(
            &TrackingResult::failure(ErrorKind::NetworkTimeout, "timed out"),
            at("2026-02-17T12:00:00Z"),
        );

        assert_eq!(parcel.last_fetched, Some(at("2026-02-17T12:00:00Z")));
        assert_eq!(parcel.last_status, None);
        assert!(!is_due(&parcel, at("2026-02-17T12:10:00Z")));
    }
}
