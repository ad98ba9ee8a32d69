//! Telemetry sink that writes engine events to `tracing`.

use tracing::{info, warn};

use crate::port::{EngineEvent, Telemetry};

/// Logs every [`EngineEvent`] with structured fields.
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn emit(&self, event: EngineEvent) {
        match event {
            EngineEvent::RetryScheduled {
                id,
                retry,
                delay,
                error,
            } => {
                warn!(
                    request_id = %id,
                    retry,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Retry scheduled"
                );
            }
            EngineEvent::RequestFailed {
                id,
                priority,
                attempts,
                error,
            } => {
                warn!(
                    request_id = %id,
                    priority = %priority,
                    attempts,
                    status = ?error.status(),
                    error = %error,
                    "Request failed"
                );
            }
            EngineEvent::RequestCancelled { id } => {
                info!(request_id = %id, "Request cancelled");
            }
            EngineEvent::QualityChanged { from, to } => {
                info!(from = %from, to = %to, "Connection quality changed");
            }
        }
    }
}
