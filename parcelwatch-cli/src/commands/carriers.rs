//! Carriers command - list loaded carriers.

use anyhow::Result;

use crate::Cli;

/// Runs the carriers command.
pub fn run(cli: &Cli) -> Result<()> {
    let session = super::open(cli)?;

    println!("{:<14} {:<16} {:<8} PATTERNS", "ID", "NAME", "METHOD");
    println!("{}", "─".repeat(70));

    for entry in session.registry.entries() {
        let definition = entry.definition();
        let patterns: Vec<&str> = definition
            .tracking_patterns
            .iter()
            .map(|p| p.regex.as_str())
            .collect();
        println!(
            "{:<14} {:<16} {:<8} {}",
            definition.id(),
            definition.name(),
            definition.adapter_kind().display_name(),
            patterns.join("  ")
        );
    }

    println!();
    println!("Total: {} carriers", session.registry.count());
    Ok(())
}
