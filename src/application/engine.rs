//! Engine facade.
//!
//! [`Engine`] owns every piece of shared state (cache, pending queue,
//! quality window, counters, batch records) behind one `Arc`. Cloning an
//! engine is cheap and every clone drives the same instance.
//!
//! # Request path
//!
//! ```text
//! submit ─► cache lookup ─► scheduler ─► transport attempt ─► classify
//!              │ fresh         ▲                                 │
//!              ▼               └──── backoff (slot released) ◄───┤ retryable
//!           Response                                             ▼
//!                                                      success / terminal error
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::batch::BatchCoordinator;
use super::cache::CacheStore;
use super::quality::{QualityEstimator, QualityTransition};
use super::retry::{RetryController, RetryPolicy};
use super::scheduler::AdmissionScheduler;
use super::stats::StatsAggregator;
use crate::domain::{
    Batch, BatchId, BatchReport, CacheKey, CancellationToken, ConnectionQuality, Method,
    RequestBuilder, RequestDefaults, RequestDescriptor, RequestId, Response, Stats,
};
use crate::error::RequestError;
use crate::port::{EngineEvent, Telemetry, Transport};

mod execute;
mod handle;
mod monitor;

pub use handle::RequestHandle;

/// Connection quality monitoring parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualitySettings {
    /// Samples kept in the rolling window.
    pub window_size: usize,
    pub evaluation_interval: Duration,
    /// Probe when no traffic was observed for this long.
    pub idle_threshold: Duration,
    /// Address probed with `HEAD` while idle. No probing when `None`.
    pub probe_address: Option<String>,
    pub probe_timeout: Duration,
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self {
            window_size: 20,
            evaluation_interval: Duration::from_secs(5),
            idle_threshold: Duration::from_secs(30),
            probe_address: None,
            probe_timeout: Duration::from_secs(5),
        }
    }
}

/// Runtime parameters of an [`Engine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Maximum number of requests in flight.
    pub max_concurrent: usize,
    /// Defaults applied by [`Engine::request`].
    pub request: RequestDefaults,
    pub retry: RetryPolicy,
    pub cache_max_entries: usize,
    pub quality: QualitySettings,
    /// Finished batch records kept for [`Engine::batch`].
    pub max_retained_batches: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 6,
            request: RequestDefaults::default(),
            retry: RetryPolicy::default(),
            cache_max_entries: 1000,
            quality: QualitySettings::default(),
            max_retained_batches: 100,
        }
    }
}

#[derive(Default)]
struct Lifecycle {
    shutdown: Option<watch::Sender<bool>>,
    monitor: Option<JoinHandle<()>>,
}

struct EngineInner {
    settings: EngineSettings,
    transport: Arc<dyn Transport>,
    telemetry: Arc<dyn Telemetry>,
    scheduler: AdmissionScheduler,
    cache: CacheStore,
    stats: Arc<StatsAggregator>,
    quality: QualityEstimator,
    retry: RetryController,
    batches: BatchCoordinator,
    /// Requests between submission and terminal state.
    active: DashMap<RequestId, CancellationToken>,
    stopped: AtomicBool,
    lifecycle: Mutex<Lifecycle>,
}

/// Network request optimization engine.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use courier::adapter::outbound::http::HttpTransport;
/// use courier::application::engine::{Engine, EngineSettings};
/// use courier::domain::{Method, Priority};
/// use courier::port::NullTelemetry;
///
/// # async fn run() -> courier::error::Result<()> {
/// let engine = Engine::new(
///     EngineSettings::default(),
///     Arc::new(HttpTransport::new()?),
///     Arc::new(NullTelemetry),
/// );
/// engine.start()?;
///
/// let request = engine
///     .request(Method::Get, "https://api.example.com/habits")
///     .priority(Priority::High)
///     .cached()
///     .build()?;
/// let response = engine.submit(request).await?;
/// println!("{}", response.data());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    #[must_use]
    pub fn new(
        settings: EngineSettings,
        transport: Arc<dyn Transport>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        let stats = Arc::new(StatsAggregator::new());
        let inner = EngineInner {
            scheduler: AdmissionScheduler::new(settings.max_concurrent),
            cache: CacheStore::new(settings.cache_max_entries, Arc::clone(&stats)),
            quality: QualityEstimator::new(settings.quality.window_size),
            retry: RetryController::new(settings.retry),
            batches: BatchCoordinator::new(settings.max_retained_batches),
            stats,
            transport,
            telemetry,
            active: DashMap::new(),
            stopped: AtomicBool::new(false),
            lifecycle: Mutex::new(Lifecycle::default()),
            settings,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.inner.settings
    }

    /// Start the connection quality monitor.
    ///
    /// Must be called from within a tokio runtime. Calling it again while
    /// the monitor runs is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Stopped`] after [`dispose`](Self::dispose).
    pub fn start(&self) -> Result<(), RequestError> {
        if self.is_stopped() {
            return Err(RequestError::Stopped);
        }
        let mut lifecycle = self.inner.lifecycle.lock();
        if lifecycle.monitor.is_some() {
            return Ok(());
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let monitor = monitor::spawn(Arc::downgrade(&self.inner), shutdown_rx);
        lifecycle.shutdown = Some(shutdown_tx);
        lifecycle.monitor = Some(monitor);
        self.inner.stats.mark_connected();

        info!(
            max_concurrent = self.inner.scheduler.limit(),
            interval_ms = self.inner.settings.quality.evaluation_interval.as_millis() as u64,
            "engine started"
        );
        Ok(())
    }

    /// Cancel everything and clear cache, counters, quality window and
    /// batch history. The engine keeps accepting requests.
    pub fn reset(&self) {
        let cancelled = self.cancel_all();
        self.inner.scheduler.clear();
        self.inner.cache.clear(None);
        self.inner.stats.reset();
        self.inner.batches.clear();
        if let Some(transition) = self.inner.quality.clear() {
            self.inner.publish(transition);
        }
        info!(cancelled, "engine reset");
    }

    /// Stop the monitor, cancel everything and reject further work with
    /// [`RequestError::Stopped`].
    pub async fn dispose(&self) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let cancelled = self.cancel_all();
        self.inner.scheduler.clear();

        let (shutdown, monitor) = {
            let mut lifecycle = self.inner.lifecycle.lock();
            (lifecycle.shutdown.take(), lifecycle.monitor.take())
        };
        if let Some(shutdown) = shutdown {
            let _ = shutdown.send(true);
        }
        if let Some(monitor) = monitor {
            if let Err(e) = monitor.await {
                debug!(error = %e, "quality monitor ended abnormally");
            }
        }
        info!(cancelled, "engine disposed");
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Start a request with this engine's defaults.
    pub fn request(&self, method: Method, address: impl Into<String>) -> RequestBuilder {
        RequestDescriptor::builder(method, address).defaults(self.inner.settings.request)
    }

    /// Run a request to its terminal state.
    ///
    /// # Errors
    ///
    /// Returns the terminal [`RequestError`]: non-retryable failures as is,
    /// retryable failures wrapped in [`RequestError::MaxRetriesExceeded`]
    /// once the retry budget is spent, [`RequestError::Cancelled`] when the
    /// request's token fires, [`RequestError::Stopped`] after disposal.
    pub async fn submit(&self, request: RequestDescriptor) -> Result<Response, RequestError> {
        self.inner.execute(request).await
    }

    /// Like [`submit`](Self::submit), decoding the body into `T`.
    ///
    /// # Errors
    ///
    /// As [`submit`](Self::submit), plus [`RequestError::Decode`] when the
    /// body does not match `T`.
    pub async fn submit_json<T: DeserializeOwned>(
        &self,
        request: RequestDescriptor,
    ) -> Result<T, RequestError> {
        self.submit(request).await?.json()
    }

    /// Run a request on a background task and return a handle to it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(&self, request: RequestDescriptor) -> RequestHandle {
        let id = request.id();
        let token = request.cancellation_token().clone();
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move { inner.execute(request).await });
        RequestHandle::new(id, token, task)
    }

    /// Run every request concurrently through the normal request path.
    ///
    /// Item failures never fail the batch. Results align with `requests`.
    pub async fn submit_batch(&self, requests: Vec<RequestDescriptor>) -> BatchReport {
        let inner = &self.inner;
        inner
            .batches
            .run(requests, !self.is_stopped(), |request| inner.execute(request))
            .await
    }

    /// Recorded state of a recent batch.
    #[must_use]
    pub fn batch(&self, id: BatchId) -> Option<Batch> {
        self.inner.batches.get(id)
    }

    /// Cancel one request, queued or in flight.
    ///
    /// Returns `false` if the request is unknown or already finished.
    pub fn cancel_request(&self, id: RequestId) -> bool {
        let token = self.inner.active.get(&id).map(|entry| entry.value().clone());
        match token {
            Some(token) => {
                token.cancel();
                self.inner.scheduler.withdraw(id);
                debug!(request_id = %id, "cancel requested");
                true
            }
            None => false,
        }
    }

    /// Cancel every active request. Returns how many were signalled.
    pub fn cancel_all(&self) -> usize {
        let tokens: Vec<CancellationToken> = self
            .inner
            .active
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        tokens.iter().filter(|token| token.cancel()).count()
    }

    /// Number of requests between submission and terminal state.
    #[must_use]
    pub fn active_requests(&self) -> usize {
        self.inner.active.len()
    }

    /// Queued requests waiting for a slot.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.inner.scheduler.pending_len()
    }

    #[must_use]
    pub fn get_cached(&self, key: &CacheKey) -> Option<serde_json::Value> {
        self.inner.cache.get(key)
    }

    pub fn set_cached(&self, key: CacheKey, data: serde_json::Value, ttl: Duration) {
        self.inner.cache.set(key, data, ttl);
    }

    /// Remove one entry, or the whole cache when `key` is `None`.
    pub fn clear_cache(&self, key: Option<&CacheKey>) -> usize {
        self.inner.cache.clear(key)
    }

    /// Drop expired cache entries, e.g. under memory pressure.
    pub fn evict_expired(&self) -> usize {
        self.inner.cache.evict_expired()
    }

    #[must_use]
    pub fn stats(&self) -> Stats {
        self.inner.stats.snapshot()
    }

    #[must_use]
    pub fn connection_quality(&self) -> ConnectionQuality {
        self.inner.quality.current()
    }

    /// Receiver that observes every connection quality transition.
    #[must_use]
    pub fn subscribe_connection_quality(&self) -> watch::Receiver<ConnectionQuality> {
        self.inner.quality.subscribe()
    }

    /// Host-platform connectivity signal. `false` forces `Offline`.
    pub fn set_platform_online(&self, online: bool) {
        if let Some(transition) = self.inner.quality.set_platform_online(online) {
            self.inner.publish(transition);
        }
    }

    /// Re-classify the sample window now instead of waiting for the monitor.
    pub fn refresh_connection_quality(&self) -> ConnectionQuality {
        self.inner.refresh_quality()
    }
}

impl EngineInner {
    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn refresh_quality(&self) -> ConnectionQuality {
        if let Some(transition) = self.quality.evaluate() {
            self.publish(transition);
        }
        self.quality.current()
    }

    fn publish(&self, transition: QualityTransition) {
        info!(
            from = %transition.from,
            to = %transition.to,
            "connection quality changed"
        );
        self.telemetry.emit(EngineEvent::QualityChanged {
            from: transition.from,
            to: transition.to,
        });
    }
}

#[cfg(test)]
mod tests;
