//! Proxy engine boundary.
//!
//! # Data Flow
//! ```text
//! Controller startup:
//!     add_node(tag, NodeInfo, ControllerConfig)
//!     add_users(AddUsersParams) → newly added count
//!
//! Background jobs:
//!     node drift   → del_node + add_node + add_users (same tag)
//!     user report  → user_traffic(reset) + del_users/add_users
//! ```
//!
//! # Design Decisions
//! - The engine owns connection handling; the agent only drives its tables
//! - Nodes are namespaced by tag
//! - Implementations must be safe for concurrent use by tag

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::ControllerConfig;
use crate::panel::{NodeInfo, UserInfo};

pub use memory::MemoryCore;

/// Errors returned by the engine.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("node {0} already exists")]
    NodeExists(String),

    #[error("node {0} not found")]
    NodeNotFound(String),

    #[error("engine rejected request: {0}")]
    Rejected(String),
}

/// Result type for engine operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Arguments for bulk user registration.
#[derive(Debug, Clone, Copy)]
pub struct AddUsersParams<'a> {
    pub tag: &'a str,
    pub config: &'a ControllerConfig,
    pub users: &'a [UserInfo],
    pub node: &'a NodeInfo,
}

/// Proxy engine that terminates connections for registered nodes.
#[async_trait]
pub trait Core: Send + Sync {
    async fn add_node(&self, tag: &str, node: &NodeInfo, config: &ControllerConfig) -> CoreResult<()>;

    async fn del_node(&self, tag: &str) -> CoreResult<()>;

    /// Register users, returning how many were not already present.
    async fn add_users(&self, params: AddUsersParams<'_>) -> CoreResult<usize>;

    async fn del_users(&self, tag: &str, users: &[UserInfo]) -> CoreResult<()>;

    /// Upload/download bytes for a user, optionally resetting the counters.
    async fn user_traffic(&self, tag: &str, uuid: &str, reset: bool) -> (u64, u64);
}
