//! CLI command implementations.

pub mod carriers;
pub mod detect;
pub mod track;

use crate::Cli;
use anyhow::{Context, Result};
use parcelwatch_adapters::DefaultAdapterFactory;
use parcelwatch_carrier::{CarrierLoader, CarrierRegistry};
use parcelwatch_core::AppConfig;

/// Config, registry and the factory that built its adapters.
pub struct Session {
    pub config: AppConfig,
    pub registry: CarrierRegistry,
    pub factory: DefaultAdapterFactory,
}

/// Load config and carrier definitions.
///
/// The definitions directory comes from `--definitions`, then config, then
/// the nearest `carrier-definitions/` above the working directory.
pub fn open(cli: &Cli) -> Result<Session> {
    let config = AppConfig::load_with_env().context("failed to load configuration")?;

    let dir = cli
        .definitions
        .clone()
        .or_else(|| config.general.definitions_dir.clone());
    let loader = match dir {
        Some(dir) => CarrierLoader::new(dir),
        None => CarrierLoader::with_default_dir(),
    }
    .context("failed to locate carrier definitions")?;

    let factory =
        DefaultAdapterFactory::from_config(&config).context("failed to build HTTP client")?;
    let registry = CarrierRegistry::load_from(&loader, &factory).with_context(|| {
        format!(
            "failed to load carriers from {}",
            loader.definitions_dir().display()
        )
    })?;

    Ok(Session {
        config,
        registry,
        factory,
    })
}
