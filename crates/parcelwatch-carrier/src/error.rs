//! Error types for the carrier subsystem.

use thiserror::Error;

/// Errors that can occur while loading or querying carriers.
///
/// Every load-time variant is fatal: a registry with a corrupt definition is
/// never constructed.
#[derive(Error, Debug)]
pub enum CarrierError {
    /// No loaded carrier has this ID
    #[error("carrier not found: {carrier_id}")]
    NotFound {
        /// The requested carrier ID
        carrier_id: String,
    },

    /// A definition file could not be read
    #[error("failed to read carrier definition {path}: {source}")]
    Read {
        /// Path to the definition file
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A definition file is not valid TOML for a carrier
    #[error("failed to parse carrier definition {path}: {source}")]
    Parse {
        /// Path to the definition file
        path: String,
        /// Underlying error
        #[source]
        source: toml::de::Error,
    },

    /// Definition parsed but failed validation or compilation
    #[error("invalid carrier definition for {carrier_id}: {reason}")]
    Invalid {
        /// Carrier ID being validated
        carrier_id: String,
        /// Reason for validation failure
        reason: String,
    },

    /// Two definitions declare the same carrier ID
    #[error("duplicate carrier id: {carrier_id}")]
    Duplicate {
        /// The repeated carrier ID
        carrier_id: String,
    },

    /// The definitions directory does not exist
    #[error("carrier definitions directory not found at {path}")]
    DirectoryNotFound {
        /// Expected directory path
        path: String,
    },

    /// Walking the definitions directory failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CarrierError {
    /// Shorthand for an `Invalid` error.
    pub fn invalid(carrier_id: impl ToString, reason: impl Into<String>) -> Self {
        Self::Invalid {
            carrier_id: carrier_id.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for carrier operations.
pub type Result<T> = std::result::Result<T, CarrierError>;
