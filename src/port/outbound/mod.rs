//! Outbound ports (driven side): interfaces implemented by outbound adapters.
//!
//! These contracts describe the engine's infrastructure dependencies: the
//! HTTP transport that performs the calls and the telemetry sink that
//! receives observability events.

pub mod telemetry;
pub mod transport;
