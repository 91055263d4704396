//! Carrier definition loading from TOML files.
//!
//! This module handles loading carrier definitions from the `carrier-definitions/` directory.

use crate::{
    definition::CarrierDefinition,
    error::{CarrierError, Result},
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the definitions directory looked up by [`CarrierLoader::with_default_dir`].
pub const DEFAULT_DEFINITIONS_DIR: &str = "carrier-definitions";

/// Loader for carrier definitions from TOML files.
pub struct CarrierLoader {
    /// Base directory containing carrier definitions
    definitions_dir: PathBuf,
}

impl CarrierLoader {
    /// Create a new loader with the given definitions directory.
    ///
    /// # Errors
    /// Returns error if the directory doesn't exist.
    pub fn new(definitions_dir: impl Into<PathBuf>) -> Result<Self> {
        let definitions_dir = definitions_dir.into();

        if !definitions_dir.is_dir() {
            return Err(CarrierError::DirectoryNotFound {
                path: definitions_dir.display().to_string(),
            });
        }

        Ok(Self { definitions_dir })
    }

    /// Create a loader using the default definitions directory.
    ///
    /// Looks for `carrier-definitions/` in the current directory and each of
    /// its ancestors, so the binary works from anywhere inside the workspace.
    ///
    /// # Errors
    /// Returns error if no such directory exists.
    pub fn with_default_dir() -> Result<Self> {
        let cwd = std::env::current_dir()?;

        for dir in cwd.ancestors() {
            let candidate = dir.join(DEFAULT_DEFINITIONS_DIR);
            if candidate.is_dir() {
                return Self::new(candidate);
            }
        }

        Self::new(DEFAULT_DEFINITIONS_DIR)
    }

    /// The directory this loader reads from.
    #[must_use]
    pub fn definitions_dir(&self) -> &Path {
        &self.definitions_dir
    }

    /// Load every enabled carrier definition, in declaration order.
    ///
    /// Declaration order is the lexicographic order of the definition file
    /// paths. Disabled carriers are skipped. Any unreadable, unparseable, or
    /// invalid file aborts the whole load.
    ///
    /// # Errors
    /// Returns the first load, parse, or validation error encountered.
    pub fn load_all(&self) -> Result<Vec<CarrierDefinition>> {
        let mut paths = Vec::new();
        Self::collect_paths(&self.definitions_dir, &mut paths)?;
        paths.sort();

        let mut definitions = Vec::with_capacity(paths.len());
        for path in paths {
            let definition = Self::load_from_path(&path)?;

            if !definition.is_enabled() {
                info!(
                    carrier_id = %definition.id(),
                    path = %path.display(),
                    "skipping disabled carrier"
                );
                continue;
            }

            definition.validate()?;

            debug!(
                carrier_id = %definition.id(),
                name = %definition.name(),
                method = definition.adapter_kind().display_name(),
                "loaded carrier definition"
            );
            definitions.push(definition);
        }

        info!(
            count = definitions.len(),
            dir = %self.definitions_dir.display(),
            "loaded carrier definitions"
        );

        Ok(definitions)
    }

    /// Recursively collect all TOML files.
    fn collect_paths(dir: &Path, paths: &mut Vec<PathBuf>) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();

            if path.is_dir() {
                Self::collect_paths(&path, paths)?;
            } else if path.extension().and_then(|s| s.to_str()) == Some("toml")
                && path.file_name().and_then(|s| s.to_str()) != Some("README.toml")
            {
                paths.push(path);
            }
        }

        Ok(())
    }

    /// Load a carrier definition from a specific file path.
    pub fn load_from_path(path: &Path) -> Result<CarrierDefinition> {
        let contents = std::fs::read_to_string(path).map_err(|e| CarrierError::Read {
            path: path.display().to_string(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| CarrierError::Parse {
            path: path.display().to_string(),
            source: e,
        })
    }
}
