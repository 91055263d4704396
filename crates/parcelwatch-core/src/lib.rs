//! Parcelwatch Core - Foundation crate for the parcel tracking workspace.
//!
//! This crate provides the shared vocabulary that every other crate speaks:
//! identifiers, the canonical status enum, tracking results, error types and
//! the application configuration.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Validated newtypes (`CarrierId`, `TrackingNumber`) and `CanonicalStatus`
//! - [`result`] - `TrackingResult`, `TrackingEvent` and the `ErrorKind` taxonomy
//!
//! # Example
//!
//! ```rust
//! use parcelwatch_core::{CanonicalStatus, TrackingNumber};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let number = TrackingNumber::new(" xq779509088gb ")?;
//! assert_eq!(number.as_str(), "XQ779509088GB");
//! assert_eq!(CanonicalStatus::Delivered.as_str(), "delivered");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod result;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, BrowserSettings, FetchSettings, GeneralConfig, HttpSettings, RefreshSettings,
};
pub use error::{ConfigError, ConfigResult, ParcelError, Result};
pub use result::{ErrorKind, TrackingEvent, TrackingFailure, TrackingResult, TrackingStatus};
pub use types::{CanonicalStatus, CarrierId, TrackingNumber};
