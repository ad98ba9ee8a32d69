//! Infrastructure: configuration, logging and engine wiring.

pub mod bootstrap;
pub mod config;
