//! Per-node limiter subsystem.
//!
//! # Data Flow
//! ```text
//! Controller startup:
//!     registry.add(tag, LimitConfig, users) → Arc<Limiter>
//!     limiter.update_rule(node.rules)
//!
//! Engine (looks the limiter up by tag in the registry):
//!     check_login(uuid, ip) → accept / reject
//!     speed_limit(uuid)     → effective Mbps
//!     is_destination_blocked / is_protocol_blocked
//!
//! Background jobs:
//!     user report        → update_users(deleted, added)
//!     dynamic limit      → add_dynamic_speed_limit(...)
//!     online-IP report   → take_online_users()
//! ```
//!
//! # Design Decisions
//! - Rules are swapped wholesale; a failed compile keeps the old set
//! - Dynamic limits expire lazily on read and on purge
//! - Usage accounting lives in the engine, not here

pub mod registry;
pub mod rules;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use thiserror::Error;

use crate::config::LimitConfig;
use crate::panel::{OnlineUser, Rules, UserInfo};

pub use registry::LimiterRegistry;
pub use rules::CompiledRules;

/// Errors raised while configuring a limiter.
#[derive(Debug, Error)]
pub enum LimiterError {
    #[error("invalid rule '{pattern}': {source}")]
    InvalidRule {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Why a connection attempt was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LimitReject {
    #[error("unknown user")]
    UnknownUser,

    #[error("device limit {limit} reached")]
    DeviceLimit { limit: u32 },
}

#[derive(Debug, Clone, Copy)]
struct UserLimit {
    uid: i64,
    speed_limit: u64,
    device_limit: u32,
}

#[derive(Debug, Clone, Copy)]
struct DynamicLimit {
    speed_limit: u64,
    expires_at: Instant,
}

/// Rate and access enforcement state for one node.
#[derive(Debug)]
pub struct Limiter {
    tag: String,
    config: LimitConfig,
    users: DashMap<String, UserLimit>,
    rules: ArcSwap<CompiledRules>,
    dynamic: DashMap<String, DynamicLimit>,
    online: DashMap<String, HashSet<String>>,
}

impl Limiter {
    pub fn new(tag: &str, config: LimitConfig, users: &[UserInfo]) -> Self {
        let limiter = Self {
            tag: tag.to_string(),
            config,
            users: DashMap::new(),
            rules: ArcSwap::from_pointee(CompiledRules::default()),
            dynamic: DashMap::new(),
            online: DashMap::new(),
        };
        limiter.update_users(&[], users);
        limiter
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Replace the active rule set.
    pub fn update_rule(&self, rules: &Rules) -> Result<(), LimiterError> {
        let compiled = CompiledRules::compile(rules)?;
        tracing::debug!(tag = %self.tag, rules = compiled.len(), "Limiter rules updated");
        self.rules.store(Arc::new(compiled));
        Ok(())
    }

    pub fn is_destination_blocked(&self, destination: &str) -> bool {
        self.rules.load().is_destination_blocked(destination)
    }

    pub fn is_protocol_blocked(&self, protocol: &str) -> bool {
        self.rules.load().is_protocol_blocked(protocol)
    }

    /// Apply a cohort diff.
    pub fn update_users(&self, deleted: &[UserInfo], added: &[UserInfo]) {
        for user in deleted {
            self.users.remove(&user.uuid);
            self.dynamic.remove(&user.uuid);
            self.online.remove(&user.uuid);
        }
        for user in added {
            self.users.insert(
                user.uuid.clone(),
                UserLimit {
                    uid: user.id,
                    speed_limit: user.speed_limit,
                    device_limit: user.device_limit,
                },
            );
        }
    }

    /// Effective speed limit in Mbps, `None` when unlimited.
    ///
    /// The lowest non-zero of the node limit, the user limit and an
    /// unexpired dynamic limit wins.
    pub fn speed_limit(&self, uuid: &str) -> Option<u64> {
        let user = self.users.get(uuid).map(|u| u.speed_limit).unwrap_or(0);
        let dynamic = self.dynamic_limit(uuid, Instant::now()).unwrap_or(0);

        [self.config.speed_limit, user, dynamic]
            .into_iter()
            .filter(|limit| *limit > 0)
            .min()
    }

    fn dynamic_limit(&self, uuid: &str, now: Instant) -> Option<u64> {
        let limit = *self.dynamic.get(uuid)?;
        if limit.expires_at <= now {
            self.dynamic.remove(uuid);
            return None;
        }
        Some(limit.speed_limit)
    }

    pub fn add_dynamic_speed_limit(&self, uuid: &str, speed_limit: u64, expires_at: Instant) {
        self.dynamic.insert(
            uuid.to_string(),
            DynamicLimit {
                speed_limit,
                expires_at,
            },
        );
    }

    /// Drop dynamic limits that expired before `now`.
    pub fn purge_expired(&self, now: Instant) {
        self.dynamic.retain(|_, limit| limit.expires_at > now);
    }

    /// Admit a connection from `ip` for the user, tracking it as online.
    pub fn check_login(&self, uuid: &str, ip: &str) -> Result<(), LimitReject> {
        let device_limit = match self.users.get(uuid) {
            Some(user) if user.device_limit > 0 => user.device_limit,
            Some(_) => self.config.ip_limit,
            None => return Err(LimitReject::UnknownUser),
        };

        let mut ips = self.online.entry(uuid.to_string()).or_default();
        if ips.contains(ip) {
            return Ok(());
        }
        if device_limit > 0 && ips.len() >= device_limit as usize {
            return Err(LimitReject::DeviceLimit {
                limit: device_limit,
            });
        }
        ips.insert(ip.to_string());
        Ok(())
    }

    /// Drain the online set collected since the last call.
    pub fn take_online_users(&self) -> Vec<OnlineUser> {
        let keys: Vec<String> = self.online.iter().map(|e| e.key().clone()).collect();
        let mut online = Vec::new();
        for key in keys {
            let Some((uuid, ips)) = self.online.remove(&key) else {
                continue;
            };
            let Some(uid) = self.users.get(&uuid).map(|u| u.uid) else {
                continue;
            };
            online.extend(ips.into_iter().map(|ip| OnlineUser { uid, ip }));
        }
        online
    }
}
