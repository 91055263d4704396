// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Parcelwatch CLI - parcel tracking across carriers from the command line.
//!
//! # Examples
//!
//! ```bash
//! # List loaded carriers
//! parcelwatch carriers
//!
//! # Which carriers could own this number?
//! parcelwatch detect XQ779509088GB
//!
//! # Fetch the current status as JSON
//! parcelwatch track XQ779509088GB
//! parcelwatch track 15501234567890 --carrier dpd
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Parcelwatch - parcel tracking across carriers.
#[derive(Parser)]
#[command(name = "parcelwatch")]
#[command(about = "Track parcels across carriers")]
#[command(version)]
pub struct Cli {
    /// Command to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Carrier definitions directory (overrides config).
    #[arg(long, global = true)]
    pub definitions: Option<PathBuf>,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// List loaded carriers.
    Carriers,

    /// Show which carriers a tracking number could belong to.
    Detect {
        /// Tracking number, as printed on the label.
        number: String,
    },

    /// Fetch the current status of a parcel.
    Track {
        /// Tracking number, as printed on the label.
        number: String,

        /// Carrier ID; detected from the number when omitted.
        #[arg(long, short)]
        carrier: Option<String>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,parcelwatch=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();

    let cli = Cli::parse();
    tracing::debug!("Starting parcelwatch v{}", env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Commands::Carriers => commands::carriers::run(&cli).map(|()| ExitCode::SUCCESS),
        Commands::Detect { number } => commands::detect::run(&cli, number),
        Commands::Track { number, carrier } => {
            commands::track::run(&cli, number, carrier.as_deref()).await
        }
    }
}
