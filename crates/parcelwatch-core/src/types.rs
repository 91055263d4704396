//! Shared types used across the workspace.
//!
//! This module defines the validated newtypes for carrier identifiers and
//! tracking numbers, plus the closed canonical status enum.

use crate::error::ParcelError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Newtype for carrier identifiers with validation.
///
/// Carrier IDs must be lowercase alphanumeric with hyphens, 2-50 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CarrierId(String);

impl CarrierId {
    /// Create a new `CarrierId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID doesn't match the required format.
    pub fn new(id: impl Into<String>) -> Result<Self, ParcelError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(id: &str) -> Result<(), ParcelError> {
        static CARRIER_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = CARRIER_REGEX
            .get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9-]{0,48}[a-z0-9]$").expect("valid regex"));

        if id.len() < 2 || id.len() > 50 {
            return Err(ParcelError::Validation(format!(
                "invalid carrier ID: must be 2-50 characters, got {} characters",
                id.len()
            )));
        }

        if regex.is_match(id) {
            Ok(())
        } else {
            Err(ParcelError::Validation(format!(
                "invalid carrier ID: must be lowercase alphanumeric with hyphens, got '{id}'"
            )))
        }
    }
}

impl fmt::Display for CarrierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for CarrierId {
    type Error = ParcelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CarrierId> for String {
    fn from(id: CarrierId) -> Self {
        id.0
    }
}

/// A tracking number in normalized form.
///
/// Normalization strips all whitespace and uppercases ASCII letters, so
/// `" xq 7795 0908 8gb "` and `"XQ779509088GB"` are the same number. Only
/// ASCII alphanumerics and hyphens survive validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TrackingNumber(String);

impl TrackingNumber {
    /// Maximum accepted length after normalization.
    pub const MAX_LEN: usize = 64;

    /// Normalize and validate a raw tracking number.
    ///
    /// # Errors
    /// Returns error if the normalized number is empty, too long, or contains
    /// characters other than ASCII alphanumerics and hyphens.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ParcelError> {
        let normalized: String = raw
            .as_ref()
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if normalized.is_empty() {
            return Err(ParcelError::Validation(
                "tracking number cannot be empty".to_string(),
            ));
        }

        if normalized.len() > Self::MAX_LEN {
            return Err(ParcelError::Validation(format!(
                "tracking number too long: {} characters (max {})",
                normalized.len(),
                Self::MAX_LEN
            )));
        }

        if !normalized
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(ParcelError::Validation(format!(
                "tracking number contains invalid characters: '{normalized}'"
            )));
        }

        Ok(Self(normalized))
    }

    /// Get the normalized string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackingNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for TrackingNumber {
    type Error = ParcelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TrackingNumber> for String {
    fn from(number: TrackingNumber) -> Self {
        number.0
    }
}

/// Carrier-independent delivery state.
///
/// The set is closed: carrier status mappings may only target these values.
/// No ordering is implied between variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalStatus {
    /// Label created, not yet with the carrier
    Pending,
    /// Carrier has the parcel
    Received,
    /// On the way
    InTransit,
    /// With the local driver
    OutForDelivery,
    /// Successfully delivered
    Delivered,
    /// Delivery attempted but failed
    FailedAttempt,
    /// Held at a depot or customs
    Held,
    /// Returned to sender
    Returned,
    /// Problem with delivery
    Exception,
    /// Status text did not match any mapping
    Unknown,
}

impl CanonicalStatus {
    /// All variants, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::Pending,
        Self::Received,
        Self::InTransit,
        Self::OutForDelivery,
        Self::Delivered,
        Self::FailedAttempt,
        Self::Held,
        Self::Returned,
        Self::Exception,
        Self::Unknown,
    ];

    /// The wire name of the status (`"out_for_delivery"` etc).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Received => "received",
            Self::InTransit => "in_transit",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::FailedAttempt => "failed_attempt",
            Self::Held => "held",
            Self::Returned => "returned",
            Self::Exception => "exception",
            Self::Unknown => "unknown",
        }
    }

    /// Whether the parcel's journey is over and it no longer needs refreshing.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Returned)
    }
}

impl fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CanonicalStatus {
    type Err = ParcelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParcelError::Validation(format!("unknown canonical status: '{s}'")))
    }
}
