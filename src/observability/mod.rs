//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (`tag`, `job`, `error`) on every lifecycle event
//! - Metrics are cheap facade calls; without an installed recorder they are no-ops

pub mod logging;
pub mod metrics;
