//! Configuration management for parcelwatch.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides. Carrier credentials are deliberately not
//! part of this file; they are read from the environment by the adapters.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration.
///
/// This is loaded from `~/.config/parcelwatch/config.toml` (or platform
/// equivalent). If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// General settings
    pub general: GeneralConfig,
    /// Fetch orchestration settings
    pub fetch: FetchSettings,
    /// Shared HTTP client settings
    pub http: HttpSettings,
    /// Browser pool settings
    pub browser: BrowserSettings,
    /// Refresh policy defaults
    pub refresh: RefreshSettings,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, falling back to defaults if
    /// the file does not exist.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let config: Self = if path.exists() {
            tracing::debug!("Loading config from {}", path.display());
            let contents = fs::read_to_string(path)?;
            toml::from_str(&contents)?
        } else {
            tracing::debug!("Config file not found, using defaults");
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `PARCELWATCH_DEFINITIONS_DIR`: Override the carrier definitions directory
    /// - `PARCELWATCH_MAX_ATTEMPTS`: Override fetch attempts per request
    /// - `PARCELWATCH_BROWSER_POOL_SIZE`: Override the browser pool size
    /// - `PARCELWATCH_HEADLESS`: Override browser headless mode (true/false)
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup.
    ///
    /// Unparseable values are ignored and the file value kept.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("PARCELWATCH_DEFINITIONS_DIR") {
            tracing::debug!("Override general.definitions_dir from env: {}", dir);
            self.general.definitions_dir = Some(PathBuf::from(dir));
        }

        if let Some(attempts) = lookup("PARCELWATCH_MAX_ATTEMPTS").and_then(|v| v.parse().ok()) {
            self.fetch.max_attempts = attempts;
            tracing::debug!("Override fetch.max_attempts from env: {}", attempts);
        }

        if let Some(size) = lookup("PARCELWATCH_BROWSER_POOL_SIZE").and_then(|v| v.parse().ok()) {
            self.browser.pool_size = size;
            tracing::debug!("Override browser.pool_size from env: {}", size);
        }

        if let Some(headless) = lookup("PARCELWATCH_HEADLESS").and_then(|v| v.parse().ok()) {
            self.browser.headless = headless;
            tracing::debug!("Override browser.headless from env: {}", headless);
        }
    }

    /// Check values that would make the orchestrator or pool unusable.
    pub fn validate(&self) -> ConfigResult<()> {
        let checks = [
            ("fetch.max_attempts", self.fetch.max_attempts == 0),
            (
                "fetch.max_concurrent_per_carrier",
                self.fetch.max_concurrent_per_carrier == 0,
            ),
            (
                "fetch.max_concurrent_browser",
                self.fetch.max_concurrent_browser == 0,
            ),
            ("fetch.attempt_timeout_secs", self.fetch.attempt_timeout_secs == 0),
            ("browser.pool_size", self.browser.pool_size == 0),
        ];

        for (field, is_zero) in checks {
            if is_zero {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
        }

        if self.fetch.base_delay_ms > self.fetch.max_delay_ms {
            return Err(ConfigError::InvalidValue {
                field: "fetch.base_delay_ms".to_string(),
                reason: format!(
                    "must not exceed fetch.max_delay_ms ({})",
                    self.fetch.max_delay_ms
                ),
            });
        }

        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/parcelwatch/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "parcelwatch", "parcelwatch")
            .ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

/// General settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding carrier definition TOML files.
    ///
    /// When unset, `carrier-definitions/` at the workspace root is used.
    pub definitions_dir: Option<PathBuf>,
}

/// Fetch orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Attempts per fetch, including the first
    pub max_attempts: u32,
    /// Base backoff delay in milliseconds
    pub base_delay_ms: u64,
    /// Backoff ceiling in milliseconds
    pub max_delay_ms: u64,
    /// Wall-clock bound for a single attempt, in seconds
    pub attempt_timeout_secs: u64,
    /// Simultaneous fetches per HTTP/API carrier
    pub max_concurrent_per_carrier: usize,
    /// Simultaneous fetches per browser carrier
    pub max_concurrent_browser: usize,
    /// How long a finished result stays attached to its dedup key, in milliseconds
    pub result_ttl_ms: u64,
}

impl FetchSettings {
    /// Attempt timeout as a `Duration`.
    #[must_use]
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            attempt_timeout_secs: 45,
            max_concurrent_per_carrier: 4,
            max_concurrent_browser: 1,
            result_ttl_ms: 2_000,
        }
    }
}

/// Shared HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// User agent string
    pub user_agent: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Browser pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Maximum number of live browser contexts
    pub pool_size: usize,
    /// How long a fetch waits for a free context, in seconds
    pub acquire_timeout_secs: u64,
    /// Run browser in headless mode
    pub headless: bool,
    /// Navigation timeout in seconds
    pub navigation_timeout_secs: u64,
    /// Upper bound on waiting for tracking data to render, in milliseconds
    pub render_wait_ms: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            pool_size: 2,
            acquire_timeout_secs: 20,
            headless: true,
            navigation_timeout_secs: 30,
            render_wait_ms: 15_000,
        }
    }
}

/// Refresh policy defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshSettings {
    /// Interval used for parcels that don't specify their own
    pub default_interval_minutes: u64,
}

impl RefreshSettings {
    /// Default interval as a `Duration`.
    #[must_use]
    pub fn default_interval(&self) -> Duration {
        Duration::from_secs(self.default_interval_minutes * 60)
    }
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            default_interval_minutes: 30,
        }
    }
}
