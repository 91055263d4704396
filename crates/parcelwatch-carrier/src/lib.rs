//! Parcelwatch Carrier - carrier definitions, detection and the adapter registry.
//!
//! This crate describes carriers declaratively: each TOML file under
//! `carrier-definitions/` names a carrier, the regexes its tracking numbers
//! match, how its status text maps to canonical statuses, and how its data is
//! fetched. The registry loads them all at startup, compiles every pattern,
//! and builds one [`CarrierAdapter`] per carrier through an [`AdapterFactory`].
//!
//! # Architecture
//!
//! - **Definition Types** ([`definition`]): Strongly-typed carrier metadata and fetch configuration
//! - **Loader** ([`loader`]): TOML file loading, fatal on any malformed file
//! - **Normalizer** ([`normalizer`]): Ordered substring rules to canonical status
//! - **Email** ([`email`]): Tracking numbers in shipping notification emails
//! - **Adapter** ([`adapter`]): The fetch capability every carrier implements
//! - **Registry** ([`registry`]): Lookup by carrier ID and detection by pattern
//!
//! # Example
//!
//! ```rust,no_run
//! use parcelwatch_carrier::{AdapterFactory, CarrierRegistry};
//!
//! # fn example(factory: &dyn AdapterFactory) -> Result<(), Box<dyn std::error::Error>> {
//! let registry = CarrierRegistry::load("carrier-definitions", factory)?;
//!
//! for carrier_id in registry.detect("XQ 7795 0908 8GB") {
//!     println!("candidate: {carrier_id}");
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod adapter;
pub mod definition;
pub mod email;
pub mod error;
pub mod loader;
pub mod normalizer;
pub mod registry;

// Re-export commonly used types
pub use adapter::{AdapterFactory, CarrierAdapter};
pub use definition::{
    AdapterKind, ApiFetch, BrowserFetch, CarrierDefinition, CarrierMetadata, EmailPatterns,
    EventsOrder, FetchMethod, HtmlExtraction, TrackingPatternDef,
};
pub use email::EmailMatcher;
pub use error::{CarrierError, Result};
pub use loader::CarrierLoader;
pub use normalizer::{normalize, StatusMapping, StatusRule};
pub use registry::{CarrierEntry, CarrierRegistry};
