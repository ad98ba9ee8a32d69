//! Transport-agnostic domain types.

pub mod batch;
pub mod cache;
pub mod cancel;
pub mod id;
pub mod priority;
pub mod quality;
pub mod request;
pub mod response;
pub mod stats;

pub use batch::{Batch, BatchItemResult, BatchReport, BatchStatus};
pub use cache::{CacheEntry, CacheKey, Validator};
pub use cancel::{AbortOnDrop, CancellationToken};
pub use id::{BatchId, RequestId};
pub use priority::Priority;
pub use quality::{ConnectionQuality, QualitySample, WindowSummary};
pub use request::{Method, RequestBuilder, RequestDefaults, RequestDescriptor, Target};
pub use response::Response;
pub use stats::Stats;
