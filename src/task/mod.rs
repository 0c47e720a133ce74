//! Recurring background task primitive.
//!
//! # Design Decisions
//! - One tokio task per recurring job
//! - Intervals are clamped to `[1s, MAX_INTERVAL]`
//! - A failed tick is logged and counted; the schedule continues
//! - Cancellation is cooperative: no new tick starts after `close()`,
//!   a tick already running is allowed to finish

pub mod periodic;

pub use periodic::{PeriodicTask, MAX_INTERVAL};
