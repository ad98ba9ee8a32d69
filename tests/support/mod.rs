#![allow(dead_code)]

pub mod config;

use std::sync::Arc;

use courier::application::engine::{Engine, EngineSettings};
use courier::domain::{Method, RequestBuilder};
use courier::testkit::telemetry::RecordingTelemetry;
use courier::testkit::transport::ScriptedTransport;

pub const BASE: &str = "https://api.example.com";

/// Engine wired to a scripted transport and a recording telemetry sink.
pub struct TestEngine {
    pub engine: Engine,
    pub transport: Arc<ScriptedTransport>,
    pub telemetry: Arc<RecordingTelemetry>,
}

impl TestEngine {
    pub fn new(transport: ScriptedTransport, settings: EngineSettings) -> Self {
        let transport = Arc::new(transport);
        let telemetry = Arc::new(RecordingTelemetry::new());
        let engine = Engine::new(settings, transport.clone(), telemetry.clone());
        Self {
            engine,
            transport,
            telemetry,
        }
    }

    /// GET against the scripted base address.
    pub fn get(&self, path: &str) -> RequestBuilder {
        self.engine.request(Method::Get, format!("{BASE}{path}"))
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.engine.request(Method::Post, format!("{BASE}{path}"))
    }

    /// Paths of recorded calls, in dispatch order.
    pub fn dispatched_paths(&self) -> Vec<String> {
        self.transport
            .calls()
            .iter()
            .map(|call| call.url.path().to_string())
            .collect()
    }
}
