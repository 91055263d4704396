//! Bounded pool of reusable browser contexts.
//!
//! At most `size` contexts exist at once. Each slot moves through
//! `Idle -> Acquired -> Idle`, or `Acquired -> Broken` when the holder marks
//! it broken, in which case the context is closed and the slot frees up for a
//! freshly created one. Release happens when the [`PooledContext`] guard
//! drops, on every exit path.

use crate::context::{BrowserContext, ContextFactory};
use crate::error::PoolError;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub size: usize,
    pub in_use: usize,
    pub idle: usize,
    pub created: usize,
    pub discarded: usize,
}

struct PoolInner {
    factory: Arc<dyn ContextFactory>,
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<Box<dyn BrowserContext>>>,
    size: usize,
    acquire_timeout: Duration,
    created: AtomicUsize,
    discarded: AtomicUsize,
}

impl PoolInner {
    fn idle(&self) -> std::sync::MutexGuard<'_, Vec<Box<dyn BrowserContext>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shared pool of browser contexts. Cloning shares the pool.
#[derive(Clone)]
pub struct ContextPool {
    inner: Arc<PoolInner>,
}

impl ContextPool {
    /// Create a pool of at most `size` contexts.
    ///
    /// Contexts are created lazily on first demand.
    #[must_use]
    pub fn new(factory: Arc<dyn ContextFactory>, size: usize, acquire_timeout: Duration) -> Self {
        let size = size.max(1);
        Self {
            inner: Arc::new(PoolInner {
                factory,
                permits: Arc::new(Semaphore::new(size)),
                idle: Mutex::new(Vec::with_capacity(size)),
                size,
                acquire_timeout,
                created: AtomicUsize::new(0),
                discarded: AtomicUsize::new(0),
            }),
        }
    }

    /// Acquire a context, waiting up to the pool's acquire timeout for a free slot.
    pub async fn acquire(&self) -> Result<PooledContext, PoolError> {
        let timeout = self.inner.acquire_timeout;
        let permit = tokio::time::timeout(timeout, Arc::clone(&self.inner.permits).acquire_owned())
            .await
            .map_err(|_| PoolError::TimedOut(timeout))?
            .map_err(|_| PoolError::Closed)?;

        let reused = self.inner.idle().pop();
        let context = if let Some(context) = reused {
            context
        } else {
            let context = self
                .inner
                .factory
                .create()
                .await
                .map_err(PoolError::Create)?;
            let created = self.inner.created.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(created, "created browser context");
            context
        };

        Ok(PooledContext {
            context: Some(context),
            broken: false,
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let inner = &self.inner;
        PoolStats {
            size: inner.size,
            in_use: inner.size - inner.permits.available_permits(),
            idle: inner.idle().len(),
            created: inner.created.load(Ordering::Relaxed),
            discarded: inner.discarded.load(Ordering::Relaxed),
        }
    }

    /// Refuse new acquisitions and close every idle context.
    ///
    /// Contexts still held are closed when their guards drop.
    pub async fn shutdown(&self) {
        self.inner.permits.close();
        let idle: Vec<_> = self.inner.idle().drain(..).collect();
        for context in idle {
            context.close().await;
        }
    }
}

impl std::fmt::Debug for ContextPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextPool")
            .field("stats", &self.stats())
            .finish()
    }
}

/// A context checked out of the pool.
///
/// Dereferences to the context. Dropping the guard returns the context to
/// the idle list, or discards it if it was marked broken.
pub struct PooledContext {
    context: Option<Box<dyn BrowserContext>>,
    broken: bool,
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl PooledContext {
    /// Mark the context unusable; it is closed instead of reused.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    /// Whether the context has been marked broken.
    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.broken
    }
}

impl Deref for PooledContext {
    type Target = dyn BrowserContext;

    fn deref(&self) -> &Self::Target {
        self.context
            .as_deref()
            .expect("context is present until the guard drops")
    }
}

impl Drop for PooledContext {
    fn drop(&mut self) {
        let Some(context) = self.context.take() else {
            return;
        };

        if self.broken || self.pool.permits.is_closed() {
            self.pool.discarded.fetch_add(1, Ordering::Relaxed);
            debug!(broken = self.broken, "discarding browser context");
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(context.close());
                }
                Err(_) => warn!("no runtime to close discarded browser context"),
            }
        } else {
            self.pool.idle().push(context);
        }
        // The permit field drops after this, so a waiter sees the idle context.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BrowserError, Result};
    use async_trait::async_trait;

    #[derive(Default)]
    struct CountingFactory {
        created: AtomicUsize,
        closed: Arc<AtomicUsize>,
    }

    struct FakeContext {
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BrowserContext for FakeContext {
        async fn navigate(&self, _url: &str, _timeout: Duration) -> Result<()> {
            Ok(())
        }

        async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> Result<()> {
            Err(BrowserError::Timeout(selector.to_string()))
        }

        async fn has_selector(&self, _selector: &str) -> Result<bool> {
            Ok(false)
        }

        async fn content(&self) -> Result<String> {
            Ok(String::new())
        }

        async fn close(self: Box<Self>) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ContextFactory for CountingFactory {
        async fn create(&self) -> Result<Box<dyn BrowserContext>> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeContext {
                closed: Arc::clone(&self.closed),
            }))
        }
    }

    fn pool(size: usize, timeout_ms: u64) -> (ContextPool, Arc<CountingFactory>) {
        let factory = Arc::new(CountingFactory::default());
        let pool = ContextPool::new(
            Arc::clone(&factory) as Arc<dyn ContextFactory>,
            size,
            Duration::from_millis(timeout_ms),
        );
        (pool, factory)
    }

    #[tokio::test]
    async fn test_contexts_are_reused() {
        let (pool, factory) = pool(1, 100);

        drop(pool.acquire().await.expect("first acquire"));
        drop(pool.acquire().await.expect("second acquire"));

        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        let stats = pool.stats();
        assert_eq!(stats.idle, 1);
        assert_eq!(stats.in_use, 0);
    }

    #[tokio::test]
    async fn test_acquire_times_out_when_saturated() {
        let (pool, _factory) = pool(1, 50);

        let held = pool.acquire().await.expect("acquire");
        let result = pool.acquire().await;
        assert!(matches!(result, Err(PoolError::TimedOut(_))));

        drop(held);
        assert!(pool.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_acquire_blocks_until_release() {
        let (pool, _factory) = pool(1, 2_000);

        let held = pool.acquire().await.expect("acquire");
        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(held);
        waiter
            .await
            .expect("join waiter")
            .expect("acquire after release");
    }

    #[tokio::test]
    async fn test_broken_context_is_replaced() {
        let (pool, factory) = pool(1, 100);

        {
            let mut context = pool.acquire().await.expect("acquire");
            assert!(context.wait_for_selector("h3", Duration::ZERO).await.is_err());
            context.mark_broken();
        }

        let stats = pool.stats();
        assert_eq!(stats.in_use, 0);
        assert_eq!(stats.idle, 0);
        assert_eq!(stats.discarded, 1);

        let _context = pool.acquire().await.expect("acquire replacement");
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(factory.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shutdown_closes_idle_contexts() {
        let (pool, factory) = pool(2, 100);
        drop(pool.acquire().await.expect("acquire"));

        pool.shutdown().await;
        assert_eq!(factory.closed.load(Ordering::SeqCst), 1);
        assert!(matches!(pool.acquire().await, Err(PoolError::Closed)));
    }
}
