//! Parcelwatch Tracker - the fetch orchestration core.
//!
//! This crate sits between callers and the carrier adapters:
//! - Deduplication of identical in-flight fetches
//! - Per-carrier concurrency limits, with a separate bound for browser carriers
//! - Retry of transient failures with exponential backoff and jitter
//! - A wall-clock timeout on every attempt
//! - Refresh policy for tracked parcels and batch refresh of the due ones
//!
//! # Example
//!
//! ```rust,no_run
//! use parcelwatch_carrier::CarrierRegistry;
//! use parcelwatch_tracker::{FetchOrchestrator, OrchestratorConfig};
//!
//! # async fn example(registry: CarrierRegistry) {
//! let orchestrator = FetchOrchestrator::new(registry, OrchestratorConfig::default());
//! let result = orchestrator.track("XQ779509088GB", None).await;
//! println!("{:?}", result.status());
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod orchestrator;
pub mod refresh;
pub mod retry;

pub use orchestrator::{FetchOrchestrator, OrchestratorConfig};
pub use refresh::{is_due, next_refresh_at, NextRefresh, TrackedParcel};
pub use retry::RetryPolicy;
