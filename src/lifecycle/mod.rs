//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Build one controller per node → ServiceGroup::start_all
//!
//! Services (service.rs):
//!     start() in order, abort on first failure
//!     close() in reverse, never fails
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → close all and exit
//!     SIGHUP → close all, rebuild from config, start again
//! ```
//!
//! # Design Decisions
//! - Ordered startup: nodes start one after another, not concurrently
//! - A failed start closes what was already started
//! - Reload is a full close + rebuild, no in-place patching

pub mod service;
pub mod signals;
pub mod startup;

pub use service::{Service, ServiceGroup};
pub use signals::{wait_for_signal, Signal};
pub use startup::{build_controllers, StartupError};
