//! # Observability
//!
//! - **Logging**: structured events via `tracing`, with a subscriber set up
//!   from [`LogConfig`]
//! - **Metrics**: atomic fill counters shared by a store and its callers
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │        KernelCacheStore::fill / load         │
//! │  tracing::debug!(), metrics.filled.inc()     │
//! └──────────────┬──────────────────┬────────────┘
//!                ▼                  ▼
//!          ┌─────────┐        ┌──────────┐
//!          │ Logging │        │ Metrics  │
//!          └─────────┘        └──────────┘
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};
pub use metrics::{CacheMetrics, CacheMetricsSnapshot, Counter, Histogram};
