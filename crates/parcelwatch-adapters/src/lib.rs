//! Parcelwatch Adapters - the three ways a carrier's tracking data is fetched.
//!
//! - **API** ([`api`]): JSON endpoints behind OAuth client credentials, with
//!   token caching and single-flight refresh in [`credentials`]
//! - **Scrape** ([`scrape`]): a plain GET of a server-rendered tracking page
//! - **Browser** ([`browser`]): pages that only render tracking data after
//!   scripts run, fetched through a pooled browser context
//!
//! Every adapter returns a [`TrackingResult`](parcelwatch_core::TrackingResult)
//! rather than an error: transport, HTTP and extraction problems are all
//! classified into an [`ErrorKind`](parcelwatch_core::ErrorKind) so the
//! orchestrator can decide what to retry.
//!
//! [`DefaultAdapterFactory`] plugs into
//! [`CarrierRegistry::load`](parcelwatch_carrier::CarrierRegistry::load).

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod api;
pub mod browser;
pub mod credentials;
pub mod extract;
pub mod factory;
pub mod http;
pub mod json;
pub mod scrape;
pub mod timestamp;

pub use api::ApiAdapter;
pub use browser::{BrowserAdapter, BrowserTimings};
pub use credentials::{AccessToken, ClientCredentials, CredentialError, CredentialManager};
pub use extract::HtmlExtractor;
pub use factory::{DefaultAdapterFactory, SecretLookup};
pub use http::build_http_client;
pub use json::JsonExtractor;
pub use scrape::ScrapeAdapter;
pub use timestamp::parse_timestamp;
