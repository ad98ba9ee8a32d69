//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! Ports define the extension points of the engine. They are traits that
//! adapters implement to integrate with the host environment.
//!
//! # Architecture
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │      Application        │
//!                    │   (engine, scheduler,   │
//!     ┌──────────────┤    cache, retry, ...)   ├──────────────┐
//!     │              └─────────────────────────┘              │
//!     ▼                                                       ▼
//! ┌───────────┐                                         ┌───────────┐
//! │ Transport │                                         │ Telemetry │
//! │  Adapter  │                                         │  Adapter  │
//! └───────────┘                                         └───────────┘
//! ```
//!
//! # Available Ports
//!
//! - [`Transport`] - Performs one HTTP attempt
//! - [`Telemetry`] - Receives retry, failure, cancellation and quality events

pub mod outbound;

pub use outbound::telemetry::{EngineEvent, NullTelemetry, Telemetry, TelemetryRegistry};
pub use outbound::transport::{Transport, TransportRequest, TransportResponse};
