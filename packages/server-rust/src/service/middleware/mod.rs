//! Tower middleware layers for the call pipeline.
//!
//! - [`timeout`]: Per-call deadline and cancellation
//! - [`metrics`]: Call timing, counting, and tracing spans
//! - [`load_shed`]: Semaphore-based concurrency limiting
//! - [`pipeline`]: Composes all layers into a single service stack

pub mod load_shed;
pub mod metrics;
pub mod pipeline;
pub mod timeout;

pub use load_shed::LoadShedLayer;
pub use metrics::MetricsLayer;
pub use pipeline::{build_call_pipeline, CallPipeline};
pub use timeout::DeadlineLayer;
