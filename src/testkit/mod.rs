//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`transport`] - [`ScriptedTransport`](transport::ScriptedTransport), a
//!   [`Transport`](crate::port::Transport) with scripted per-path replies.
//! - [`telemetry`] - [`RecordingTelemetry`](telemetry::RecordingTelemetry),
//!   which keeps every emitted event.
//! - [`config`] - Canonical fast engine settings.

pub mod config;
pub mod telemetry;
pub mod transport;
