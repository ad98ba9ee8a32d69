//! Courier - priority scheduling, caching, retry and connection-quality
//! inference for outbound network requests.
//!
//! Application features hand requests to one [`Engine`](application::engine::Engine)
//! instead of talking to the network directly. The engine bounds how many
//! requests are in flight, admits them by priority, serves cacheable ones
//! from a TTL cache, retries transient failures with exponential backoff and
//! classifies connection health from the outcomes it observes.
//!
//! # Architecture
//!
//! The crate follows a hexagonal layout:
//!
//! - **`domain`** - Transport-agnostic types: request descriptors, cache
//!   entries, batches, quality classes, statistics
//! - **`port`** - Traits the engine depends on: `Transport`, `Telemetry`
//! - **`application`** - The engine and its services: admission scheduler,
//!   cache store, retry controller, quality estimator, batch coordinator
//! - **`adapter`** - Port implementations: `reqwest` transport, `tracing` telemetry
//! - **`infrastructure`** - TOML configuration, logging and engine wiring
//!
//! # Features
//!
//! - `testkit` - Scripted transport and recording telemetry for tests
//!
//! # Example
//!
//! ```no_run
//! use courier::domain::Priority;
//! use courier::infrastructure::bootstrap::build_engine;
//! use courier::infrastructure::config::settings::Config;
//!
//! # async fn run() -> courier::error::Result<()> {
//! let config = Config::load("courier.toml")?;
//! config.init_logging();
//!
//! let engine = build_engine(&config)?;
//! engine.start()?;
//!
//! let sync = engine
//!     .request(courier::domain::Method::Get, "https://api.example.com/habits")
//!     .priority(Priority::High)
//!     .build()?;
//! let habits = engine.submit(sync).await?;
//! println!("{}", habits.data());
//!
//! engine.dispose().await;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
