//! Scripted [`Transport`] for tests.
//!
//! Replies are looked up by URL path. A path can carry a fixed reply, a
//! sequence consumed one call at a time (falling back to the fixed reply
//! once exhausted), and its own latency. Unscripted paths answer
//! `200 {"ok": true}`.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use url::Url;

use crate::domain::{CancellationToken, Method};
use crate::error::RequestError;
use crate::port::{Transport, TransportRequest, TransportResponse};

/// What the transport does for one call.
#[derive(Debug, Clone)]
pub enum Reply {
    Respond(TransportResponse),
    Fail(RequestError),
    /// Never completes on its own; resolves only when aborted.
    Hang,
}

impl Reply {
    /// JSON response with the given status.
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self::Respond(TransportResponse::json(status, &body))
    }

    /// Empty response with the given status.
    pub fn status(status: u16) -> Self {
        Self::Respond(TransportResponse::new(status))
    }
}

/// One observed call.
#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub at: Instant,
}

impl Call {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Default)]
struct Script {
    fixed: HashMap<String, Reply>,
    sequences: HashMap<String, VecDeque<Reply>>,
    latencies: HashMap<String, Duration>,
}

/// Transport that replays scripted replies and records every call.
pub struct ScriptedTransport {
    script: Mutex<Script>,
    latency: Duration,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    abandoned: AtomicUsize,
}

/// Tracks one running call; counts it as abandoned unless it completed.
struct CallGuard<'a> {
    transport: &'a ScriptedTransport,
    completed: bool,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.transport.in_flight.fetch_sub(1, Ordering::SeqCst);
        if !self.completed {
            self.transport.abandoned.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script::default()),
            latency: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            abandoned: AtomicUsize::new(0),
        }
    }

    /// Default latency for every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Reply used for every call to `path` once its sequence is exhausted.
    pub fn with_route(self, path: &str, reply: Reply) -> Self {
        self.script.lock().fixed.insert(path.to_string(), reply);
        self
    }

    /// Replies consumed in order by successive calls to `path`.
    pub fn with_sequence(self, path: &str, replies: Vec<Reply>) -> Self {
        self.script
            .lock()
            .sequences
            .insert(path.to_string(), replies.into());
        self
    }

    /// Latency for calls to `path`, overriding the default.
    pub fn with_path_latency(self, path: &str, latency: Duration) -> Self {
        self.script
            .lock()
            .latencies
            .insert(path.to_string(), latency);
        self
    }

    /// Replace the fixed reply of `path` while the transport is in use.
    pub fn set_route(&self, path: &str, reply: Reply) {
        self.script.lock().fixed.insert(path.to_string(), reply);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Calls whose URL path equals `path`.
    pub fn calls_to(&self, path: &str) -> Vec<Call> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.url.path() == path)
            .cloned()
            .collect()
    }

    /// Highest number of simultaneously running calls.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Calls dropped or aborted before they produced a reply.
    pub fn abandoned(&self) -> usize {
        self.abandoned.load(Ordering::SeqCst)
    }

    fn next_reply(&self, path: &str) -> (Reply, Duration) {
        let mut script = self.script.lock();
        let latency = script.latencies.get(path).copied().unwrap_or(self.latency);
        let sequenced = script
            .sequences
            .get_mut(path)
            .and_then(VecDeque::pop_front);
        let reply = sequenced
            .or_else(|| script.fixed.get(path).cloned())
            .unwrap_or_else(|| Reply::json(200, serde_json::json!({ "ok": true })));
        (reply, latency)
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        request: TransportRequest,
        abort: CancellationToken,
    ) -> Result<TransportResponse, RequestError> {
        self.calls.lock().push(Call {
            method: request.method,
            url: request.url.clone(),
            headers: request.headers.clone(),
            at: Instant::now(),
        });
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        let mut guard = CallGuard {
            transport: self,
            completed: false,
        };

        let (reply, latency) = self.next_reply(request.url.path());
        if !latency.is_zero() {
            tokio::select! {
                () = abort.cancelled() => return Err(RequestError::Cancelled),
                () = tokio::time::sleep(latency) => {}
            }
        }

        match reply {
            Reply::Respond(response) => {
                guard.completed = true;
                Ok(response)
            }
            Reply::Fail(error) => {
                guard.completed = true;
                Err(error)
            }
            Reply::Hang => {
                abort.cancelled().await;
                Err(RequestError::Cancelled)
            }
        }
    }
}
