//! Fetch orchestrator for coordinating carrier fetches.
//!
//! The `FetchOrchestrator` is the only place that decides whether a failed
//! fetch is tried again. Adapters report a classified failure and return;
//! the orchestrator bounds each attempt in time, limits how many attempts
//! hit a carrier at once, and collapses identical concurrent requests into
//! one upstream fetch.

use crate::refresh::{is_due, TrackedParcel};
use crate::retry::RetryPolicy;
use chrono::{DateTime, Utc};
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use parcelwatch_carrier::{AdapterKind, CarrierRegistry};
use parcelwatch_core::{CarrierId, ErrorKind, FetchSettings, TrackingNumber, TrackingResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, info_span, warn, Instrument};
use uuid::Uuid;

type FetchKey = (CarrierId, TrackingNumber);
type SharedFetch = Shared<BoxFuture<'static, TrackingResult>>;

/// Orchestrator tuning.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Retry policy for transient failures
    pub retry: RetryPolicy,
    /// Wall-clock bound on a single attempt
    pub attempt_timeout: Duration,
    /// Concurrent fetches per API or scrape carrier
    pub max_concurrent_per_carrier: usize,
    /// Concurrent fetches per browser carrier
    pub max_concurrent_browser: usize,
    /// How long a finished result keeps answering identical requests
    pub result_ttl: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from(&FetchSettings::default())
    }
}

impl From<&FetchSettings> for OrchestratorConfig {
    fn from(settings: &FetchSettings) -> Self {
        Self {
            retry: RetryPolicy::from(settings),
            attempt_timeout: settings.attempt_timeout(),
            max_concurrent_per_carrier: settings.max_concurrent_per_carrier,
            max_concurrent_browser: settings.max_concurrent_browser,
            result_ttl: Duration::from_millis(settings.result_ttl_ms),
        }
    }
}

struct InFlight {
    generation: u64,
    fetch: SharedFetch,
}

struct Inner {
    registry: CarrierRegistry,
    config: OrchestratorConfig,
    limits: Mutex<HashMap<CarrierId, Arc<Semaphore>>>,
    in_flight: Mutex<HashMap<FetchKey, InFlight>>,
    generation: AtomicU64,
}

/// Schedules fetches against the registry's adapters.
///
/// Cheap to clone; clones share limits and in-flight state.
#[derive(Clone)]
pub struct FetchOrchestrator {
    inner: Arc<Inner>,
}

impl FetchOrchestrator {
    /// Create an orchestrator over a loaded registry.
    #[must_use]
    pub fn new(registry: CarrierRegistry, config: OrchestratorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                config,
                limits: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// The registry fetches are dispatched through.
    #[must_use]
    pub fn registry(&self) -> &CarrierRegistry {
        &self.inner.registry
    }

    /// Fetch the status of `tracking_number` from `carrier_id`.
    ///
    /// Concurrent calls for the same pair share one underlying fetch. The
    /// fetch runs on its own task, so a caller that stops waiting doesn't
    /// cancel it for the others.
    pub async fn fetch(
        &self,
        tracking_number: &TrackingNumber,
        carrier_id: &CarrierId,
    ) -> TrackingResult {
        let key = (carrier_id.clone(), tracking_number.clone());

        let fetch = {
            let mut in_flight = self.inner.in_flight();
            if let Some(existing) = in_flight.get(&key) {
                debug!(carrier_id = %carrier_id, tracking_number = %tracking_number, "joining in-flight fetch");
                existing.fetch.clone()
            } else {
                let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
                let fetch = self.spawn_fetch(key.clone(), generation);
                in_flight.insert(
                    key,
                    InFlight {
                        generation,
                        fetch: fetch.clone(),
                    },
                );
                fetch
            }
        };

        fetch.await
    }

    /// Normalize `raw`, pick a carrier and fetch.
    ///
    /// Uses `carrier_hint` when given, otherwise the first detected
    /// candidate. Yields `NotFound` when the number is malformed or no
    /// carrier recognizes it.
    pub async fn track(&self, raw: &str, carrier_hint: Option<&CarrierId>) -> TrackingResult {
        let tracking_number = match TrackingNumber::new(raw) {
            Ok(number) => number,
            Err(e) => return TrackingResult::failure(ErrorKind::NotFound, e.to_string()),
        };

        let carrier_id = match carrier_hint {
            Some(id) => id.clone(),
            None => {
                let candidates = self.inner.registry.detect_number(&tracking_number);
                if candidates.len() > 1 {
                    debug!(
                        tracking_number = %tracking_number,
                        candidates = ?candidates,
                        "several carriers match, using the first"
                    );
                }
                match candidates.into_iter().next() {
                    Some(id) => id,
                    None => {
                        return TrackingResult::failure(
                            ErrorKind::NotFound,
                            format!("no carrier recognizes tracking number {tracking_number}"),
                        )
                    }
                }
            }
        };

        self.fetch(&tracking_number, &carrier_id).await
    }

    /// Fetch every parcel that is due at `now`, concurrently.
    ///
    /// Per-carrier limits still apply. Results come back in input order and
    /// parcels that aren't due are left out.
    pub async fn refresh_due(
        &self,
        parcels: &[TrackedParcel],
        now: DateTime<Utc>,
    ) -> Vec<(TrackedParcel, TrackingResult)> {
        let due: Vec<&TrackedParcel> = parcels.iter().filter(|p| is_due(p, now)).collect();
        debug!(total = parcels.len(), due = due.len(), "refreshing due parcels");

        join_all(due.into_iter().map(|parcel| async move {
            let result = self.fetch(&parcel.tracking_number, &parcel.carrier_id).await;
            (parcel.clone(), result)
        }))
        .await
    }

    fn spawn_fetch(&self, key: FetchKey, generation: u64) -> SharedFetch {
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let guard = ExpireOnDrop {
                inner,
                key,
                generation,
            };
            guard
                .inner
                .fetch_with_retry(&guard.key.0, &guard.key.1)
                .await
        });

        async move {
            handle.await.unwrap_or_else(|e| {
                TrackingResult::failure(
                    ErrorKind::UpstreamUnavailable,
                    format!("fetch task ended abnormally: {e}"),
                )
            })
        }
        .boxed()
        .shared()
    }
}

/// Schedules expiry of a dedup entry however its fetch task ends, panics included.
struct ExpireOnDrop {
    inner: Arc<Inner>,
    key: FetchKey,
    generation: u64,
}

impl Drop for ExpireOnDrop {
    fn drop(&mut self) {
        Inner::expire(&self.inner, self.key.clone(), self.generation);
    }
}

impl Inner {
    fn in_flight(&self) -> MutexGuard<'_, HashMap<FetchKey, InFlight>> {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop a finished fetch from the dedup map once its TTL passes.
    fn expire(inner: &Arc<Self>, key: FetchKey, generation: u64) {
        let ttl = inner.config.result_ttl;
        if ttl.is_zero() {
            inner.remove(&key, generation);
            return;
        }
        let inner = Arc::clone(inner);
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            inner.remove(&key, generation);
        });
    }

    fn remove(&self, key: &FetchKey, generation: u64) {
        let mut in_flight = self.in_flight();
        if in_flight.get(key).is_some_and(|f| f.generation == generation) {
            in_flight.remove(key);
        }
    }

    fn limiter(&self, carrier_id: &CarrierId, kind: AdapterKind) -> Arc<Semaphore> {
        let mut limits = self.limits.lock().unwrap_or_else(PoisonError::into_inner);
        let permits = match kind {
            AdapterKind::Browser => self.config.max_concurrent_browser,
            AdapterKind::Api | AdapterKind::Scrape => self.config.max_concurrent_per_carrier,
        };
        Arc::clone(
            limits
                .entry(carrier_id.clone())
                .or_insert_with(|| Arc::new(Semaphore::new(permits.max(1)))),
        )
    }

    async fn fetch_with_retry(
        &self,
        carrier_id: &CarrierId,
        tracking_number: &TrackingNumber,
    ) -> TrackingResult {
        let fetch_id = Uuid::new_v4();
        let span = info_span!(
            "fetch",
            %fetch_id,
            carrier_id = %carrier_id,
            tracking_number = %tracking_number
        );

        async {
            let entry = match self.registry.entry(carrier_id) {
                Ok(entry) => entry,
                Err(e) => return TrackingResult::failure(ErrorKind::NotFound, e.to_string()),
            };
            let adapter = entry.adapter();
            let limiter = self.limiter(carrier_id, entry.definition().adapter_kind());
            let timeout = self.config.attempt_timeout;

            let mut attempt = 0;
            loop {
                attempt += 1;

                // The attempt clock starts before the permit wait.
                let attempt_fetch = async {
                    match limiter.acquire().await {
                        Ok(_permit) => adapter.fetch_status(tracking_number).await,
                        Err(_) => TrackingResult::failure(
                            ErrorKind::ResourceExhausted,
                            "carrier limiter closed",
                        ),
                    }
                };
                let result = tokio::time::timeout(timeout, attempt_fetch)
                    .await
                    .unwrap_or_else(|_| {
                        TrackingResult::failure(
                            ErrorKind::NetworkTimeout,
                            format!("attempt exceeded {timeout:?}"),
                        )
                    });

                let Some(kind) = result.error_kind() else {
                    debug!(attempt, "fetch succeeded");
                    return result;
                };

                if self.config.retry.should_retry(kind, attempt) {
                    let delay = self.config.retry.delay_for(kind, attempt);
                    warn!(
                        attempt,
                        max_attempts = self.config.retry.max_attempts(),
                        error_kind = %kind,
                        ?delay,
                        "transient fetch failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }

                match kind {
                    ErrorKind::ParseError => {
                        error!(attempt, error = %failure_message(&result), "carrier response no longer matches its extraction config");
                    }
                    kind if kind.is_transient() => {
                        warn!(attempt, error_kind = %kind, "retries exhausted");
                    }
                    kind => {
                        debug!(attempt, error_kind = %kind, "terminal fetch failure");
                    }
                }
                return result;
            }
        }
        .instrument(span)
        .await
    }
}

fn failure_message(result: &TrackingResult) -> &str {
    match result {
        TrackingResult::Failure(failure) => &failure.message,
        TrackingResult::Success(_) => "",
    }
}

impl std::fmt::Debug for FetchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchOrchestrator")
            .field("carriers", &self.inner.registry.count())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parcelwatch_carrier::{CarrierAdapter, CarrierDefinition, Result as CarrierResult};
    use parcelwatch_core::{CanonicalStatus, TrackingStatus};
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    /// Replays scripted results, then succeeds.
    struct ScriptedAdapter {
        calls: AtomicUsize,
        script: Mutex<VecDeque<ErrorKind>>,
        delay: Duration,
    }

    impl ScriptedAdapter {
        fn new(script: &[ErrorKind], delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                script: Mutex::new(script.iter().copied().collect()),
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CarrierAdapter for ScriptedAdapter {
        async fn fetch_status(&self, _tracking_number: &TrackingNumber) -> TrackingResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(kind) => TrackingResult::failure(kind, "scripted failure"),
                None => TrackingStatus::new(CanonicalStatus::InTransit, "In transit", Vec::new())
                    .into(),
            }
        }
    }

    /// Panics on its first call, then succeeds.
    struct PanicsOnceAdapter {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CarrierAdapter for PanicsOnceAdapter {
        async fn fetch_status(&self, _tracking_number: &TrackingNumber) -> TrackingResult {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("adapter blew up");
            }
            TrackingStatus::new(CanonicalStatus::InTransit, "In transit", Vec::new()).into()
        }
    }

    fn definition(method: &str) -> CarrierDefinition {
        let extra = if method == "browser" {
            "ready_selector = \".status\"\n"
        } else {
            ""
        };
        toml::from_str(&format!(
            r#"
[carrier]
id = "test-carrier"
name = "Test Carrier"
website = "https://test.example"
tracking_url_template = "https://test.example/t/{{tracking_number}}"

[[tracking_patterns]]
regex = '^TC[0-9]{{8}}$'

[fetch]
method = "{method}"
{extra}status_selector = ".status"
event_selector = ".event"
"#
        ))
        .unwrap()
    }

    fn orchestrator_with<A: CarrierAdapter + 'static>(
        adapter: &Arc<A>,
        method: &str,
        config: OrchestratorConfig,
    ) -> FetchOrchestrator {
        let shared = Arc::clone(adapter);
        let factory = move |_: Arc<CarrierDefinition>| -> CarrierResult<Arc<dyn CarrierAdapter>> {
            Ok(Arc::clone(&shared) as Arc<dyn CarrierAdapter>)
        };
        let registry = CarrierRegistry::from_definitions(vec![definition(method)], &factory).unwrap();
        FetchOrchestrator::new(registry, config)
    }

    fn fast_config() -> OrchestratorConfig {
        OrchestratorConfig {
            retry: RetryPolicy::new(3, Duration::ZERO, Duration::ZERO),
            attempt_timeout: Duration::from_secs(5),
            max_concurrent_per_carrier: 4,
            max_concurrent_browser: 1,
            result_ttl: Duration::ZERO,
        }
    }

    fn number() -> TrackingNumber {
        TrackingNumber::new("TC12345678").unwrap()
    }

    fn carrier() -> CarrierId {
        CarrierId::new("test-carrier").unwrap()
    }

    #[tokio::test]
    async fn test_concurrent_identical_fetches_share_one_call() {
        let adapter = ScriptedAdapter::new(&[], Duration::from_millis(50));
        let orchestrator = orchestrator_with(&adapter, "scrape", fast_config());

        let number = number();
        let carrier = carrier();
        let results = join_all((0..10).map(|_| orchestrator.fetch(&number, &carrier))).await;

        assert_eq!(adapter.calls(), 1);
        assert!(results
            .iter()
            .all(|r| r.status() == Some(CanonicalStatus::InTransit)));
    }

    #[tokio::test]
    async fn test_sequential_fetches_are_not_deduplicated() {
        let adapter = ScriptedAdapter::new(&[], Duration::ZERO);
        let orchestrator = orchestrator_with(&adapter, "scrape", fast_config());

        orchestrator.fetch(&number(), &carrier()).await;
        // Give the worker a moment to drop its finished entry
        tokio::time::sleep(Duration::from_millis(10)).await;
        orchestrator.fetch(&number(), &carrier()).await;

        assert_eq!(adapter.calls(), 2);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let adapter = ScriptedAdapter::new(
            &[ErrorKind::NetworkTimeout, ErrorKind::NetworkTimeout],
            Duration::ZERO,
        );
        let orchestrator = orchestrator_with(&adapter, "scrape", fast_config());

        let result = orchestrator.fetch(&number(), &carrier()).await;

        assert!(result.is_success());
        assert_eq!(adapter.calls(), 3);
    }

    #[tokio::test]
    async fn test_retries_exhaust_with_last_error() {
        let adapter = ScriptedAdapter::new(
            &[
                ErrorKind::NetworkTimeout,
                ErrorKind::UpstreamUnavailable,
                ErrorKind::RateLimited,
            ],
            Duration::ZERO,
        );
        let orchestrator = orchestrator_with(&adapter, "scrape", fast_config());

        let result = orchestrator.fetch(&number(), &carrier()).await;

        assert_eq!(result.error_kind(), Some(ErrorKind::RateLimited));
        assert_eq!(adapter.calls(), 3);
    }

    #[tokio::test]
    async fn test_terminal_failures_are_not_retried() {
        for kind in [ErrorKind::ParseError, ErrorKind::NotFound, ErrorKind::AuthError] {
            let adapter = ScriptedAdapter::new(&[kind], Duration::ZERO);
            let orchestrator = orchestrator_with(&adapter, "scrape", fast_config());

            let result = orchestrator.fetch(&number(), &carrier()).await;

            assert_eq!(result.error_kind(), Some(kind));
            assert_eq!(adapter.calls(), 1, "{kind} should not be retried");
        }
    }

    #[tokio::test]
    async fn test_slow_attempt_times_out() {
        let adapter = ScriptedAdapter::new(&[], Duration::from_secs(10));
        let config = OrchestratorConfig {
            retry: RetryPolicy::new(1, Duration::ZERO, Duration::ZERO),
            attempt_timeout: Duration::from_millis(20),
            ..fast_config()
        };
        let orchestrator = orchestrator_with(&adapter, "scrape", config);

        let result = orchestrator.fetch(&number(), &carrier()).await;

        assert_eq!(result.error_kind(), Some(ErrorKind::NetworkTimeout));
    }

    #[tokio::test]
    async fn test_browser_carrier_fetches_one_at_a_time() {
        let adapter = ScriptedAdapter::new(&[], Duration::from_millis(30));
        let orchestrator = orchestrator_with(&adapter, "browser", fast_config());

        let first = TrackingNumber::new("TC00000001").unwrap();
        let second = TrackingNumber::new("TC00000002").unwrap();
        let carrier = carrier();

        let started = tokio::time::Instant::now();
        let (a, b) = tokio::join!(
            orchestrator.fetch(&first, &carrier),
            orchestrator.fetch(&second, &carrier)
        );

        assert!(a.is_success() && b.is_success());
        assert_eq!(adapter.calls(), 2);
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_track_uses_detection() {
        let adapter = ScriptedAdapter::new(&[], Duration::ZERO);
        let orchestrator = orchestrator_with(&adapter, "scrape", fast_config());

        let result = orchestrator.track(" tc 1234 5678 ", None).await;
        assert!(result.is_success());

        let unknown = orchestrator.track("ZZ999", None).await;
        assert_eq!(unknown.error_kind(), Some(ErrorKind::NotFound));
        assert_eq!(adapter.calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_carrier_hint_is_not_found() {
        let adapter = ScriptedAdapter::new(&[], Duration::ZERO);
        let orchestrator = orchestrator_with(&adapter, "scrape", fast_config());

        let hint = CarrierId::new("nobody").unwrap();
        let result = orchestrator.track("TC12345678", Some(&hint)).await;

        assert_eq!(result.error_kind(), Some(ErrorKind::NotFound));
        assert_eq!(adapter.calls(), 0);
    }

    #[tokio::test]
    async fn test_refresh_due_skips_parcels_not_due() {
        let adapter = ScriptedAdapter::new(&[], Duration::ZERO);
        let orchestrator = orchestrator_with(&adapter, "scrape", fast_config());
        let now = Utc::now();

        let fresh = TrackedParcel::new(carrier(), number(), Duration::from_secs(1800));
        let mut delivered = TrackedParcel::new(
            carrier(),
            TrackingNumber::new("TC87654321").unwrap(),
            Duration::from_secs(1800),
        );
        delivered.last_fetched = Some(now);
        delivered.last_status = Some(CanonicalStatus::Delivered);

        let refreshed = orchestrator.refresh_due(&[fresh, delivered], now).await;

        assert_eq!(refreshed.len(), 1);
        assert_eq!(refreshed[0].0.tracking_number, number());
        assert!(refreshed[0].1.is_success());
        assert_eq!(adapter.calls(), 1);
    }

    #[tokio::test]
    async fn test_panicking_fetch_releases_its_key() {
        let adapter = Arc::new(PanicsOnceAdapter {
            calls: AtomicUsize::new(0),
        });
        let orchestrator = orchestrator_with(&adapter, "scrape", fast_config());

        let first = orchestrator.fetch(&number(), &carrier()).await;
        assert_eq!(first.error_kind(), Some(ErrorKind::UpstreamUnavailable));

        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = orchestrator.fetch(&number(), &carrier()).await;

        assert!(second.is_success());
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permit_wait_counts_against_attempt_timeout() {
        let adapter = ScriptedAdapter::new(&[], Duration::from_millis(80));
        let config = OrchestratorConfig {
            retry: RetryPolicy::new(1, Duration::ZERO, Duration::ZERO),
            attempt_timeout: Duration::from_millis(120),
            ..fast_config()
        };
        let orchestrator = orchestrator_with(&adapter, "browser", config);

        let first = TrackingNumber::new("TC00000001").unwrap();
        let second = TrackingNumber::new("TC00000002").unwrap();
        let carrier = carrier();

        let (a, b) = tokio::join!(
            orchestrator.fetch(&first, &carrier),
            orchestrator.fetch(&second, &carrier)
        );

        let mut kinds = [a.error_kind(), b.error_kind()];
        kinds.sort_by_key(Option::is_some);
        assert_eq!(kinds, [None, Some(ErrorKind::NetworkTimeout)]);
    }
}
