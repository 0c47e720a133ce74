//! Bookkeeping engine.
//!
//! Tracks registered nodes, users and per-user traffic counters without
//! serving any traffic. Used when no data plane is attached.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::config::ControllerConfig;
use crate::engine::{AddUsersParams, Core, CoreError, CoreResult};
use crate::panel::{NodeInfo, UserInfo};

#[derive(Debug, Default)]
struct Counters {
    upload: AtomicU64,
    download: AtomicU64,
}

#[derive(Debug)]
struct NodeEntry {
    node: NodeInfo,
    users: DashMap<String, Arc<Counters>>,
}

/// In-memory [`Core`] implementation.
#[derive(Debug, Default)]
pub struct MemoryCore {
    nodes: DashMap<String, NodeEntry>,
}

impl MemoryCore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_node(&self, tag: &str) -> bool {
        self.nodes.contains_key(tag)
    }

    pub fn node(&self, tag: &str) -> Option<NodeInfo> {
        self.nodes.get(tag).map(|e| e.node.clone())
    }

    pub fn user_count(&self, tag: &str) -> usize {
        self.nodes.get(tag).map(|e| e.users.len()).unwrap_or(0)
    }

    pub fn has_user(&self, tag: &str, uuid: &str) -> bool {
        self.nodes
            .get(tag)
            .map(|e| e.users.contains_key(uuid))
            .unwrap_or(false)
    }

    /// Add traffic to a user's counters. Unknown users are ignored.
    pub fn record_traffic(&self, tag: &str, uuid: &str, upload: u64, download: u64) {
        let counters = self
            .nodes
            .get(tag)
            .and_then(|e| e.users.get(uuid).map(|c| c.value().clone()));
        if let Some(counters) = counters {
            counters.upload.fetch_add(upload, Ordering::Relaxed);
            counters.download.fetch_add(download, Ordering::Relaxed);
        }
    }
}

#[async_trait]
impl Core for MemoryCore {
    async fn add_node(&self, tag: &str, node: &NodeInfo, _config: &ControllerConfig) -> CoreResult<()> {
        if self.nodes.contains_key(tag) {
            return Err(CoreError::NodeExists(tag.to_string()));
        }
        self.nodes.insert(
            tag.to_string(),
            NodeEntry {
                node: node.clone(),
                users: DashMap::new(),
            },
        );
        tracing::debug!(tag = %tag, port = node.port, "Node registered");
        Ok(())
    }

    async fn del_node(&self, tag: &str) -> CoreResult<()> {
        self.nodes
            .remove(tag)
            .map(|_| ())
            .ok_or_else(|| CoreError::NodeNotFound(tag.to_string()))
    }

    async fn add_users(&self, params: AddUsersParams<'_>) -> CoreResult<usize> {
        let entry = self
            .nodes
            .get(params.tag)
            .ok_or_else(|| CoreError::NodeNotFound(params.tag.to_string()))?;

        let mut added = 0;
        for user in params.users {
            if !entry.users.contains_key(&user.uuid) {
                entry.users.insert(user.uuid.clone(), Arc::default());
                added += 1;
            }
        }
        Ok(added)
    }

    async fn del_users(&self, tag: &str, users: &[UserInfo]) -> CoreResult<()> {
        let entry = self
            .nodes
            .get(tag)
            .ok_or_else(|| CoreError::NodeNotFound(tag.to_string()))?;
        for user in users {
            entry.users.remove(&user.uuid);
        }
        Ok(())
    }

    async fn user_traffic(&self, tag: &str, uuid: &str, reset: bool) -> (u64, u64) {
        let counters = self
            .nodes
            .get(tag)
            .and_then(|e| e.users.get(uuid).map(|c| c.value().clone()));
        let Some(counters) = counters else {
            return (0, 0);
        };
        if reset {
            (
                counters.upload.swap(0, Ordering::Relaxed),
                counters.download.swap(0, Ordering::Relaxed),
            )
        } else {
            (
                counters.upload.load(Ordering::Relaxed),
                counters.download.load(Ordering::Relaxed),
            )
        }
    }
}
