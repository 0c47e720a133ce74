//! Proxy node agent library.
//!
//! Brings proxy nodes up from a remote panel, keeps them in sync through
//! background jobs, and tears them down cleanly.

pub mod cert;
pub mod config;
pub mod engine;
pub mod iprecorder;
pub mod lifecycle;
pub mod limiter;
pub mod node;
pub mod observability;
pub mod panel;
pub mod task;

pub use config::AgentConfig;
pub use lifecycle::{Service, ServiceGroup};
pub use limiter::LimiterRegistry;
pub use node::Controller;
