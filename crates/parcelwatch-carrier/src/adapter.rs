//! The carrier adapter capability and the factory that builds adapters.

use crate::definition::CarrierDefinition;
use crate::error::Result;
use async_trait::async_trait;
use parcelwatch_core::{TrackingNumber, TrackingResult};
use std::sync::Arc;

/// Fetches a tracking number's status from one carrier.
///
/// Implementations never fail with an error: every failure path resolves to
/// [`TrackingResult::Failure`] with an appropriate kind. Events in a
/// successful result are ordered oldest first. Implementations don't retry
/// transient failures; that is the orchestrator's job.
#[async_trait]
pub trait CarrierAdapter: Send + Sync {
    /// Fetch the current status of a normalized tracking number.
    async fn fetch_status(&self, tracking_number: &TrackingNumber) -> TrackingResult;
}

/// Builds the adapter instance for a carrier definition.
///
/// The registry calls this once per carrier at load time.
pub trait AdapterFactory: Send + Sync {
    /// Create the adapter serving `definition`.
    ///
    /// # Errors
    /// Returns an `Invalid` error if the definition's fetch configuration
    /// can't be compiled (e.g. a bad CSS selector).
    fn build(&self, definition: Arc<CarrierDefinition>) -> Result<Arc<dyn CarrierAdapter>>;
}

impl<F> AdapterFactory for F
where
    F: Fn(Arc<CarrierDefinition>) -> Result<Arc<dyn CarrierAdapter>> + Send + Sync,
{
    fn build(&self, definition: Arc<CarrierDefinition>) -> Result<Arc<dyn CarrierAdapter>> {
        self(definition)
    }
}
