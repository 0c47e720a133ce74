//! Control-plane data model and wire decoding.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::task::MAX_INTERVAL;

/// Pull/push interval used when the panel does not send one.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Proxy protocol served by a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Vmess,
    Vless,
    Trojan,
    Shadowsocks,
    Hysteria,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Vmess => "vmess",
            NodeType::Vless => "vless",
            NodeType::Trojan => "trojan",
            NodeType::Shadowsocks => "shadowsocks",
            NodeType::Hysteria => "hysteria",
        }
    }

    /// Protocols that cannot run without certificate material.
    pub fn requires_tls(&self) -> bool {
        matches!(self, NodeType::Hysteria)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access rules currently in force for a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rules {
    /// Blocked destination patterns (regular expressions).
    pub regexp: Vec<String>,
    /// Blocked sniffed protocols.
    pub protocol: Vec<String>,
}

/// Node descriptor as published by the control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub id: u32,
    pub node_type: NodeType,
    pub host: String,
    pub port: u16,
    pub network: String,
    pub server_name: String,
    pub tls: bool,
    pub cipher: Option<String>,
    pub server_key: Option<String>,
    pub up_mbps: u64,
    pub down_mbps: u64,
    pub rules: Rules,
    pub push_interval: Duration,
    pub pull_interval: Duration,
}

impl NodeInfo {
    /// Whether certificate provisioning must run before the node is registered.
    ///
    /// True for an explicit TLS flag or a protocol that always needs TLS.
    pub fn requires_cert(&self) -> bool {
        self.tls || self.node_type.requires_tls()
    }

    /// Compare everything the engine was configured with, ignoring rules and
    /// intervals which are applied without re-registering the node.
    pub fn same_setup(&self, other: &NodeInfo) -> bool {
        self.id == other.id
            && self.node_type == other.node_type
            && self.host == other.host
            && self.port == other.port
            && self.network == other.network
            && self.server_name == other.server_name
            && self.tls == other.tls
            && self.cipher == other.cipher
            && self.server_key == other.server_key
            && self.up_mbps == other.up_mbps
            && self.down_mbps == other.down_mbps
    }
}

/// A user authorised on a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: i64,
    pub uuid: String,
    /// Mbps, 0 = unlimited.
    #[serde(default)]
    pub speed_limit: u64,
    /// Concurrent IPs, 0 = unlimited.
    #[serde(default)]
    pub device_limit: u32,
}

/// Traffic accumulated by one user since the last report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserTraffic {
    pub uid: i64,
    pub upload: u64,
    pub download: u64,
}

/// A client address seen for a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OnlineUser {
    pub uid: i64,
    pub ip: String,
}

/// `tls` is sent as either 0/1 or a boolean depending on panel version.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TlsFlag {
    Bool(bool),
    Int(i64),
}

impl Default for TlsFlag {
    fn default() -> Self {
        TlsFlag::Bool(false)
    }
}

impl TlsFlag {
    fn enabled(&self) -> bool {
        match self {
            TlsFlag::Bool(b) => *b,
            TlsFlag::Int(i) => *i != 0,
        }
    }
}

/// Route matches are sent as either a list or a comma separated string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RouteMatch {
    List(Vec<String>),
    Joined(String),
}

impl RouteMatch {
    fn into_patterns(self) -> Vec<String> {
        match self {
            RouteMatch::List(list) => list,
            RouteMatch::Joined(s) => s
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    #[serde(rename = "match")]
    matches: Option<RouteMatch>,
    action: String,
}

#[derive(Debug, Default, Deserialize)]
struct BaseConfig {
    #[serde(default)]
    push_interval: u64,
    #[serde(default)]
    pull_interval: u64,
}

/// Raw node config body.
#[derive(Debug, Deserialize)]
pub(crate) struct NodeInfoResponse {
    #[serde(default)]
    host: String,
    server_port: u16,
    #[serde(default)]
    network: String,
    #[serde(default)]
    server_name: String,
    #[serde(default)]
    tls: TlsFlag,
    cipher: Option<String>,
    server_key: Option<String>,
    #[serde(default)]
    up_mbps: u64,
    #[serde(default)]
    down_mbps: u64,
    #[serde(default)]
    routes: Vec<RouteResponse>,
    #[serde(default)]
    base_config: BaseConfig,
}

impl NodeInfoResponse {
    pub(crate) fn into_node_info(self, id: u32, node_type: NodeType) -> NodeInfo {
        let mut rules = Rules::default();
        for route in self.routes {
            let Some(matches) = route.matches else {
                continue;
            };
            match route.action.as_str() {
                "block" => rules.regexp.extend(matches.into_patterns()),
                "protocol" | "block_protocol" => rules.protocol.extend(matches.into_patterns()),
                _ => {}
            }
        }

        NodeInfo {
            id,
            node_type,
            host: self.host,
            port: self.server_port,
            network: self.network,
            server_name: self.server_name,
            tls: self.tls.enabled(),
            cipher: self.cipher,
            server_key: self.server_key,
            up_mbps: self.up_mbps,
            down_mbps: self.down_mbps,
            rules,
            push_interval: interval_or_default(self.base_config.push_interval),
            pull_interval: interval_or_default(self.base_config.pull_interval),
        }
    }
}

fn interval_or_default(secs: u64) -> Duration {
    if secs == 0 {
        DEFAULT_INTERVAL
    } else {
        Duration::from_secs(secs).min(MAX_INTERVAL)
    }
}

/// Raw user list body.
#[derive(Debug, Deserialize)]
pub(crate) struct UserListResponse {
    pub(crate) users: Vec<UserInfo>,
}
