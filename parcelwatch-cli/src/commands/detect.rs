//! Detect command - candidate carriers for a tracking number.

use anyhow::Result;
use std::process::ExitCode;

use crate::Cli;

/// Runs the detect command. Exits non-zero when nothing matches.
pub fn run(cli: &Cli, number: &str) -> Result<ExitCode> {
    let session = super::open(cli)?;

    let candidates = session.registry.detect(number);
    if candidates.is_empty() {
        eprintln!("No carrier recognizes {number}");
        return Ok(ExitCode::FAILURE);
    }

    for carrier_id in candidates {
        println!("{carrier_id}");
    }
    Ok(ExitCode::SUCCESS)
}
