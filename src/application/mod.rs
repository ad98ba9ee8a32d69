//! Application services (use cases).
//!
//! These services own the engine's shared state and coordinate the
//! transport and telemetry ports to run requests.

pub mod batch;
pub mod cache;
pub mod engine;
pub mod quality;
pub mod retry;
pub mod scheduler;
pub mod stats;
