//! Browser context abstraction.
//!
//! A context is one reusable page (tab). The pool hands contexts out and the
//! browser adapter drives them; neither cares which engine sits behind the
//! trait, which keeps the pool testable without a Chromium binary.

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// A single browser page.
#[async_trait]
pub trait BrowserContext: Send + Sync {
    /// Navigate to a URL, failing with `Timeout` if it takes longer than `timeout`.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Wait until an element matching `selector` is present in the rendered document.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Whether an element matching `selector` is present right now.
    async fn has_selector(&self, selector: &str) -> Result<bool>;

    /// The current rendered document as HTML.
    async fn content(&self) -> Result<String>;

    /// Release the page. Errors are swallowed; the context is gone either way.
    async fn close(self: Box<Self>);
}

/// Creates fresh browser contexts for the pool.
#[async_trait]
pub trait ContextFactory: Send + Sync {
    /// Create a new context.
    async fn create(&self) -> Result<Box<dyn BrowserContext>>;
}
