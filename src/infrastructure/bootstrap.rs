//! Infrastructure bootstrap helpers for runtime wiring.

use std::sync::Arc;

use tracing::info;

use crate::adapter::outbound::http::HttpTransport;
use crate::adapter::outbound::telemetry::TracingTelemetry;
use crate::application::engine::Engine;
use crate::error::Result;
use crate::infrastructure::config::settings::Config;
use crate::port::outbound::telemetry::{Telemetry, TelemetryRegistry};
use crate::port::outbound::transport::Transport;

/// Build the telemetry registry: the tracing sink plus any extra sinks.
pub fn build_telemetry(extra: Vec<Box<dyn Telemetry>>) -> TelemetryRegistry {
    let mut registry = TelemetryRegistry::new();
    registry.register(Box::new(TracingTelemetry));
    for sink in extra {
        registry.register(sink);
    }
    registry
}

/// Build an engine on the bundled HTTP transport.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be created.
pub fn build_engine(config: &Config) -> Result<Engine> {
    let transport = Arc::new(HttpTransport::new()?);
    Ok(build_engine_with(config, transport, Vec::new()))
}

/// Build an engine on a caller-supplied transport.
pub fn build_engine_with(
    config: &Config,
    transport: Arc<dyn Transport>,
    telemetry: Vec<Box<dyn Telemetry>>,
) -> Engine {
    let settings = config.engine_settings();
    info!(
        max_concurrent = settings.max_concurrent,
        window_size = settings.quality.window_size,
        probe = settings.quality.probe_address.is_some(),
        "building engine"
    );
    Engine::new(settings, transport, Arc::new(build_telemetry(telemetry)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::EngineEvent;
    use crate::testkit::telemetry::RecordingTelemetry;
    use crate::testkit::transport::ScriptedTransport;

    struct Forward(Arc<RecordingTelemetry>);

    impl Telemetry for Forward {
        fn emit(&self, event: EngineEvent) {
            self.0.emit(event);
        }
    }

    #[test]
    fn registry_includes_tracing_sink() {
        assert_eq!(build_telemetry(Vec::new()).len(), 1);
    }

    #[tokio::test]
    async fn engine_uses_configured_limit_and_sinks() {
        let config = Config::parse_toml("[scheduler]\nmax_concurrent = 3").unwrap();
        let recording = Arc::new(RecordingTelemetry::new());
        let engine = build_engine_with(
            &config,
            Arc::new(ScriptedTransport::new()),
            vec![Box::new(Forward(recording.clone()))],
        );

        assert_eq!(engine.settings().max_concurrent, 3);
        engine.set_platform_online(false);
        assert_eq!(recording.count("quality_changed"), 1);
    }
}
