//! Node lifecycle subsystem.
//!
//! # Data Flow
//! ```text
//! Controller::start (controller.rs), strictly in order:
//!     get_node_info → get_user_list (non-empty) → build tag (tag.rs)
//!     → registry.add limiter → update_rule → request_cert (TLS only)
//!     → core.add_node → core.add_users → start jobs (jobs.rs)
//!
//! Background jobs (context.rs), one PeriodicTask each:
//!     node_info_refresh   pull descriptor, apply drift
//!     user_report         push traffic, diff cohort (diff.rs)
//!     cert_renewal        renew certificate      (TLS only)
//!     dynamic_speed_limit throttle heavy users   (if enabled)
//!     online_ip_report    report online IPs      (if enabled)
//!
//! Controller::close:
//!     registry.remove(tag) → close every started job
//!     → core.del_node(tag) (only if this start registered it)
//! ```
//!
//! # Design Decisions
//! - The tag is derived once per start and keys every shared table
//! - Jobs only exist between a successful start and close
//! - Job failures stay inside the job

pub mod controller;
pub mod diff;
pub mod error;
pub mod jobs;
pub mod tag;

mod context;

pub use controller::Controller;
pub use error::{ControllerError, JobError};
pub use jobs::{JobKind, JobSet};
pub use tag::{build_node_tag, node_tag};
