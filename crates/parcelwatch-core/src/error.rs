//! Core error types for the parcel tracking workspace.
//!
//! Failures of an individual fetch are *not* errors in this sense: they are
//! reported as [`crate::TrackingResult::Failure`]. The types here cover
//! programming-level problems such as invalid identifiers or broken config.

use thiserror::Error;

/// Central error type for core operations.
#[derive(Error, Debug)]
pub enum ParcelError {
    /// Configuration errors (file loading, parsing, validation)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors (invalid input, constraints)
    #[error("validation error: {0}")]
    Validation(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory path
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// I/O error reading config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Result type alias using `ParcelError`.
pub type Result<T> = std::result::Result<T, ParcelError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ParcelError::Validation("empty tracking number".to_string());
        assert_eq!(err.to_string(), "validation error: empty tracking number");

        let err = ConfigError::InvalidValue {
            field: "fetch.max_attempts".to_string(),
            reason: "must be at least 1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid config value for fetch.max_attempts: must be at least 1"
        );
    }

    #[test]
    fn test_error_from_config() {
        let parcel_err: ParcelError = ConfigError::NoConfigDir.into();
        assert!(matches!(parcel_err, ParcelError::Config(_)));
    }
}
