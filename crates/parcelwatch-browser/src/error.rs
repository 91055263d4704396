use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

/// Failures inside a browser context.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("chromium error: {0}")]
    ChromiumError(String),

    #[error("navigation failed: {0}")]
    NavigationError(String),

    #[error("selector not found: {0}")]
    SelectorNotFound(String),

    #[error("timeout: {0}")]
    Timeout(String),
}

impl BrowserError {
    /// Whether the context that produced this error can still be reused.
    ///
    /// Timeouts and missing selectors are page-level outcomes; anything else
    /// means the context or the browser behind it is in an unknown state.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::SelectorNotFound(_))
    }
}

/// Failures acquiring a context from the pool.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("no browser context became free within {0:?}")]
    TimedOut(Duration),

    #[error("browser context pool is shut down")]
    Closed,

    #[error("failed to create browser context: {0}")]
    Create(#[source] BrowserError),
}
