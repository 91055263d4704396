//! Track command - fetch and print a tracking result.

use anyhow::Result;
use chrono::Utc;
use parcelwatch_core::{CarrierId, TrackingNumber, TrackingResult};
use parcelwatch_tracker::{
    next_refresh_at, FetchOrchestrator, NextRefresh, OrchestratorConfig, TrackedParcel,
};
use std::process::ExitCode;
use tracing::info;

use crate::Cli;

/// Runs the track command, printing the result as JSON.
pub async fn run(cli: &Cli, number: &str, carrier: Option<&str>) -> Result<ExitCode> {
    let session = super::open(cli)?;
    let hint = carrier.map(CarrierId::new).transpose()?;

    // Resolved here as well so the refresh schedule can be reported.
    let carrier_id = hint
        .clone()
        .or_else(|| session.registry.detect(number).into_iter().next());

    let orchestrator = FetchOrchestrator::new(
        session.registry,
        OrchestratorConfig::from(&session.config.fetch),
    );
    let result = orchestrator.track(number, hint.as_ref()).await;

    if let (Some(carrier_id), Ok(tracking_number)) = (carrier_id, TrackingNumber::new(number)) {
        log_next_refresh(
            TrackedParcel::with_settings(carrier_id, tracking_number, &session.config.refresh),
            &result,
        );
    }

    if let Some(pool) = session.factory.pool() {
        let stats = pool.stats();
        if stats.created > 0 {
            info!(created = stats.created, discarded = stats.discarded, "closing browser contexts");
        }
        pool.shutdown().await;
    }

    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn log_next_refresh(mut parcel: TrackedParcel, result: &TrackingResult) {
    parcel.record(result, Utc::now());
    match next_refresh_at(&parcel) {
        NextRefresh::At(due) => info!(carrier_id = %parcel.carrier_id, next_refresh = %due, "refresh scheduled"),
        NextRefresh::Never => info!(carrier_id = %parcel.carrier_id, "terminal status, no further refreshes"),
        NextRefresh::Now => {}
    }
}
