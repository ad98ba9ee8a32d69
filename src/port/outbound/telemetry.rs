//! Telemetry port for engine observability events.
//!
//! The engine emits an [`EngineEvent`] for every retry attempt, every
//! terminal failure, every cancellation and every connection quality
//! transition. An external telemetry collaborator consumes them.

use std::time::Duration;

use crate::domain::{ConnectionQuality, Priority, RequestId};
use crate::error::RequestError;

/// Events emitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A failed attempt will be re-submitted after `delay`.
    RetryScheduled {
        id: RequestId,
        /// The attempt that is about to be made (1-based retry number).
        retry: u32,
        delay: Duration,
        error: RequestError,
    },
    /// A request reached terminal failure.
    RequestFailed {
        id: RequestId,
        priority: Priority,
        attempts: u32,
        error: RequestError,
    },
    /// A request was cancelled before completing.
    RequestCancelled { id: RequestId },
    /// The connection quality class changed.
    QualityChanged {
        from: ConnectionQuality,
        to: ConnectionQuality,
    },
}

impl EngineEvent {
    /// Short stable name for logs and metrics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::RetryScheduled { .. } => "retry_scheduled",
            Self::RequestFailed { .. } => "request_failed",
            Self::RequestCancelled { .. } => "request_cancelled",
            Self::QualityChanged { .. } => "quality_changed",
        }
    }
}

/// Consumer of engine events.
///
/// # Implementation Notes
///
/// - Implementations must be thread-safe (`Send + Sync`)
/// - `emit` is called from inside the engine's request path and must return
///   quickly; spawn a task for slow exports
pub trait Telemetry: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Broadcasts events to every registered sink (composite pattern).
#[derive(Default)]
pub struct TelemetryRegistry {
    sinks: Vec<Box<dyn Telemetry>>,
}

impl TelemetryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn register(&mut self, sink: Box<dyn Telemetry>) {
        self.sinks.push(sink);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl Telemetry for TelemetryRegistry {
    fn emit(&self, event: EngineEvent) {
        for sink in &self.sinks {
            sink.emit(event.clone());
        }
    }
}

/// Discards every event.
pub struct NullTelemetry;

impl Telemetry for NullTelemetry {
    fn emit(&self, _event: EngineEvent) {}
}
