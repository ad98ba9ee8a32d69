//! The request path: cache, admission, attempts and retries.

use std::sync::Arc;
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, trace, warn};

use super::EngineInner;
use crate::application::cache::CacheLookup;
use crate::application::retry::{RetryController, RetryDecision};
use crate::application::scheduler::SlotPermit;
use crate::application::stats::Generation;
use crate::domain::{
    AbortOnDrop, CacheEntry, CancellationToken, Method, RequestDescriptor, RequestId, Response,
    Validator,
};
use crate::error::RequestError;
use crate::port::{EngineEvent, TransportRequest};

/// Removes a request from the active set on every exit path.
pub(super) struct Registration<'a> {
    active: &'a DashMap<RequestId, CancellationToken>,
    id: RequestId,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.active.remove(&self.id);
    }
}

impl EngineInner {
    pub(super) async fn execute(
        self: &Arc<Self>,
        mut request: RequestDescriptor,
    ) -> Result<Response, RequestError> {
        if self.is_stopped() {
            return Err(RequestError::Stopped);
        }

        let id = request.id();
        let _registration = self.register(&request)?;

        let cache_key = request.cache_ttl().map(|_| request.cache_key());
        let mut stale = None;
        if let Some(key) = &cache_key {
            match self.cache.lookup(key) {
                CacheLookup::Fresh(data) => {
                    trace!(request_id = %id, key = %key, "served from cache");
                    return Ok(Response::cached(data));
                }
                CacheLookup::Stale(entry) => stale = Some(entry),
                CacheLookup::Miss => {}
            }
        }

        let generation = self.stats.record_submitted();
        let started = Instant::now();
        let outcome = self
            .run_attempts(&mut request, stale.as_ref(), generation)
            .await;

        match &outcome {
            Ok(response) => {
                self.stats.record_success(generation, started.elapsed());
                if let (Some(key), Some(ttl)) = (cache_key, request.cache_ttl()) {
                    self.cache.set_with_validator(
                        key,
                        response.data().clone(),
                        ttl,
                        response.validator().cloned(),
                    );
                }
            }
            Err(RequestError::Cancelled) => {
                self.stats.record_cancelled(generation);
                debug!(request_id = %id, "request cancelled");
                self.telemetry.emit(EngineEvent::RequestCancelled { id });
            }
            Err(error) => {
                self.stats.record_failure(generation);
                warn!(
                    request_id = %id,
                    priority = %request.priority(),
                    attempts = request.retry_count() + 1,
                    error = %error,
                    "request failed"
                );
                self.telemetry.emit(EngineEvent::RequestFailed {
                    id,
                    priority: request.priority(),
                    attempts: request.retry_count() + 1,
                    error: error.clone(),
                });
            }
        }
        outcome
    }

    pub(super) fn register(
        &self,
        request: &RequestDescriptor,
    ) -> Result<Registration<'_>, RequestError> {
        match self.active.entry(request.id()) {
            Entry::Occupied(_) => Err(RequestError::InvalidRequest(format!(
                "request {} is already active",
                request.id()
            ))),
            Entry::Vacant(slot) => {
                slot.insert(request.cancellation_token().clone());
                let registration = Registration {
                    active: &self.active,
                    id: request.id(),
                };
                // dispose() may have swept the active set between the
                // caller's stop check and this insert.
                if self.is_stopped() {
                    return Err(RequestError::Stopped);
                }
                Ok(registration)
            }
        }
    }

    async fn run_attempts(
        &self,
        request: &mut RequestDescriptor,
        stale: Option<&CacheEntry>,
        generation: Generation,
    ) -> Result<Response, RequestError> {
        let token = request.cancellation_token().clone();
        loop {
            let ticket = self
                .scheduler
                .enqueue(request.id(), request.priority(), token.clone());
            let permit = ticket.admitted().await?;

            let error = match self.attempt(request, stale, permit).await {
                Ok(response) => return Ok(response),
                Err(error) if error.is_cancelled() => return Err(error),
                Err(error) => error,
            };

            let decision = self.retry.decide(request, &error);
            let RetryDecision::Retry { delay } = decision else {
                return Err(RetryController::terminal_error(decision, request, error));
            };

            request.record_retry();
            self.stats.record_retry(generation);
            warn!(
                request_id = %request.id(),
                retry = request.retry_count(),
                max_retries = request.max_retries(),
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying request"
            );
            self.telemetry.emit(EngineEvent::RetryScheduled {
                id: request.id(),
                retry: request.retry_count(),
                delay,
                error,
            });

            tokio::select! {
                biased;
                () = token.cancelled() => return Err(RequestError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One transport round trip. The slot is released when this returns.
    async fn attempt(
        &self,
        request: &RequestDescriptor,
        stale: Option<&CacheEntry>,
        permit: SlotPermit,
    ) -> Result<Response, RequestError> {
        let mut outbound = TransportRequest {
            method: request.method(),
            url: request.url().clone(),
            headers: request.headers().to_vec(),
            body: request.payload().cloned(),
            timeout: request.timeout(),
        };
        if let Some(validator) = stale.and_then(|entry| entry.validator.as_ref()) {
            outbound.add_conditional_headers(validator);
        }

        trace!(
            request_id = %request.id(),
            queued_ms = permit.queue_wait().as_millis() as u64,
            attempt = request.retry_count() + 1,
            "dispatching"
        );

        let abort = AbortOnDrop::new(CancellationToken::new());
        let started = Instant::now();
        let timeout = request.timeout();
        let sent = tokio::select! {
            biased;
            () = request.cancellation_token().cancelled() => Err(RequestError::Cancelled),
            result = tokio::time::timeout(timeout, self.transport.send(outbound, abort.token().clone())) => {
                result.unwrap_or_else(|_| Err(RequestError::Timeout { after: timeout }))
            }
        };
        drop(abort);
        let latency = started.elapsed();
        drop(permit);

        match sent {
            Ok(response) if response.is_success() => {
                self.quality.record(latency, true);
                let validator = Validator::from_parts(
                    response.header("etag").map(str::to_string),
                    response.header("last-modified").map(str::to_string),
                );
                Ok(Response::new(response.status, response.body_value()).with_validator(validator))
            }
            Ok(response) if response.is_not_modified() => match stale {
                Some(entry) => {
                    self.quality.record(latency, true);
                    trace!(request_id = %request.id(), "revalidated cached entry");
                    Ok(Response::new(200, entry.data.clone())
                        .mark_cached()
                        .with_validator(entry.validator.clone()))
                }
                None => {
                    self.quality.record(latency, false);
                    Err(response.to_error())
                }
            },
            Ok(response) => {
                self.quality.record(latency, false);
                Err(response.to_error())
            }
            Err(RequestError::Cancelled) => Err(RequestError::Cancelled),
            Err(error) => {
                self.quality.record(latency, false);
                Err(error)
            }
        }
    }

    /// `HEAD` the probe address and record the outcome as a sample.
    pub(super) async fn probe(&self, address: &str) {
        let probe = match RequestDescriptor::builder(Method::Head, address)
            .timeout(self.settings.quality.probe_timeout)
            .max_retries(0)
            .build()
        {
            Ok(probe) => probe,
            Err(e) => {
                warn!(address, error = %e, "invalid probe address");
                return;
            }
        };

        let outbound = TransportRequest {
            method: probe.method(),
            url: probe.url().clone(),
            headers: Vec::new(),
            body: None,
            timeout: probe.timeout(),
        };
        let abort = AbortOnDrop::new(CancellationToken::new());
        let started = Instant::now();
        let result = tokio::time::timeout(
            probe.timeout(),
            self.transport.send(outbound, abort.token().clone()),
        )
        .await;
        drop(abort);

        // Any response means the network path works.
        let reachable = matches!(result, Ok(Ok(_)));
        self.quality.record(started.elapsed(), reachable);
        debug!(address, reachable, "connectivity probe");
    }
}
