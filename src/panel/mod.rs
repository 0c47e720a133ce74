//! Control-plane (panel) integration.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     get_node_info() → NodeInfo   (descriptor, rules, intervals)
//!     get_user_list() → Vec<UserInfo>
//!
//! Background jobs:
//!     node-info refresh  → get_node_info()
//!     user report        → report_user_traffic() + get_user_list()
//!     online-IP report   → report_online_users()
//! ```
//!
//! # Design Decisions
//! - The controller only sees the `ControlPlane` trait; `PanelClient` is the
//!   HTTP implementation
//! - Responses are ETag-cached so an unchanged panel costs a 304

pub mod client;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;

pub use client::PanelClient;
pub use types::{NodeInfo, NodeType, OnlineUser, Rules, UserInfo, UserTraffic};

/// Errors returned by the control plane.
#[derive(Debug, Error)]
pub enum PanelError {
    /// The configured host is not a valid URL.
    #[error("invalid panel url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Transport failure (connect, timeout, TLS).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The panel answered with a non-success status.
    #[error("panel returned status {code}: {body}")]
    Status { code: u16, body: String },

    /// The response body could not be decoded.
    #[error("decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Result type for control-plane operations.
pub type PanelResult<T> = Result<T, PanelError>;

/// Remote control plane a node is synchronised with.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Host identity used in node tags.
    fn host(&self) -> &str;

    async fn get_node_info(&self) -> PanelResult<NodeInfo>;

    async fn get_user_list(&self) -> PanelResult<Vec<UserInfo>>;

    async fn report_user_traffic(&self, traffic: &[UserTraffic]) -> PanelResult<()>;

    async fn report_online_users(&self, users: &[OnlineUser]) -> PanelResult<()>;
}
