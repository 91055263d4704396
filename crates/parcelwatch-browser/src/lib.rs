//! Headless browser contexts for client-rendered carrier tracking pages.
//!
//! Provides a Chromium engine behind the [`ContextFactory`] trait and a
//! bounded [`ContextPool`] of reusable page contexts with scoped release.

pub mod context;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod pool;

pub use context::{BrowserContext, ContextFactory};
pub use engine::{BrowserEngine, EngineConfig};
pub use error::{BrowserError, PoolError, Result};
pub use fingerprint::FingerprintConfig;
pub use pool::{ContextPool, PoolStats, PooledContext};
