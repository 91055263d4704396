//! The default adapter factory: one adapter variant per fetch method.

use crate::api::ApiAdapter;
use crate::browser::{BrowserAdapter, BrowserTimings};
use crate::credentials::{ClientCredentials, CredentialManager};
use crate::http::build_http_client;
use crate::scrape::ScrapeAdapter;
use parcelwatch_browser::{BrowserEngine, ContextPool, EngineConfig, FingerprintConfig};
use parcelwatch_carrier::{
    AdapterFactory, CarrierAdapter, CarrierDefinition, CarrierError, FetchMethod, Result,
};
use parcelwatch_core::AppConfig;
use reqwest::Client;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Reads a named secret, typically from the process environment.
pub type SecretLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Builds API, scrape and browser adapters from carrier definitions.
///
/// All HTTP adapters share one client. Browser adapters share one context
/// pool; without a pool, loading a browser carrier fails.
#[derive(Clone)]
pub struct DefaultAdapterFactory {
    client: Client,
    pool: Option<(ContextPool, BrowserTimings)>,
    secrets: SecretLookup,
}

impl DefaultAdapterFactory {
    /// Create a factory with no browser pool, reading credentials from the environment.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            pool: None,
            secrets: Arc::new(|key| std::env::var(key).ok()),
        }
    }

    /// Create a factory from application config.
    ///
    /// The browser pool is backed by Chromium, which is only launched when a
    /// browser carrier first fetches.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn from_config(config: &AppConfig) -> reqwest::Result<Self> {
        let client = build_http_client(&config.http)?;

        let engine = BrowserEngine::new(EngineConfig {
            headless: config.browser.headless,
            request_timeout: Duration::from_secs(config.browser.navigation_timeout_secs),
            fingerprint: FingerprintConfig::randomized(),
        });
        let pool = ContextPool::new(
            Arc::new(engine),
            config.browser.pool_size,
            Duration::from_secs(config.browser.acquire_timeout_secs),
        );

        info!(
            pool_size = config.browser.pool_size,
            headless = config.browser.headless,
            "adapter factory ready"
        );

        Ok(Self::new(client).with_pool(pool, BrowserTimings::from(&config.browser)))
    }

    /// Use `pool` for browser carriers.
    #[must_use]
    pub fn with_pool(mut self, pool: ContextPool, timings: BrowserTimings) -> Self {
        self.pool = Some((pool, timings));
        self
    }

    /// Read API credentials through `lookup` instead of the environment.
    #[must_use]
    pub fn with_secrets<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.secrets = Arc::new(lookup);
        self
    }

    /// The browser pool, if one is configured.
    #[must_use]
    pub fn pool(&self) -> Option<&ContextPool> {
        self.pool.as_ref().map(|(pool, _)| pool)
    }
}

impl AdapterFactory for DefaultAdapterFactory {
    fn build(&self, definition: Arc<CarrierDefinition>) -> Result<Arc<dyn CarrierAdapter>> {
        let adapter: Arc<dyn CarrierAdapter> = match &definition.fetch {
            FetchMethod::Api(config) => {
                let credentials = ClientCredentials::from_lookup(&config.credentials_env, |key| {
                    (self.secrets)(key)
                });
                if credentials.is_none() {
                    info!(
                        carrier_id = %definition.id(),
                        prefix = %config.credentials_env,
                        "API credentials not configured; fetches will fail with auth_error"
                    );
                }
                let manager = CredentialManager::new(
                    self.client.clone(),
                    config.token_url.clone(),
                    config.scope.clone(),
                    config.credentials_env.clone(),
                    credentials,
                );
                Arc::new(ApiAdapter::new(
                    &definition,
                    config,
                    self.client.clone(),
                    manager,
                ))
            }
            FetchMethod::Scrape(config) => Arc::new(ScrapeAdapter::new(
                Arc::clone(&definition),
                config,
                self.client.clone(),
            )?),
            FetchMethod::Browser(config) => {
                let (pool, timings) = self.pool.as_ref().ok_or_else(|| {
                    CarrierError::invalid(
                        definition.id(),
                        "browser method requires a browser context pool",
                    )
                })?;
                Arc::new(BrowserAdapter::new(
                    Arc::clone(&definition),
                    config,
                    pool.clone(),
                    *timings,
                )?)
            }
        };
        Ok(adapter)
    }
}

impl fmt::Debug for DefaultAdapterFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultAdapterFactory")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}
