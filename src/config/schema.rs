//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the agent.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::panel::NodeType;

/// Root configuration for the node agent.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AgentConfig {
    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// One entry per managed node.
    pub nodes: Vec<NodeConfig>,
}

/// A single managed node: where to fetch it from and how to run it.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct NodeConfig {
    /// Control-plane connection settings.
    pub api: ApiConfig,

    /// Controller behaviour for this node.
    pub controller: ControllerConfig,
}

/// Control-plane API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the panel (e.g., "https://panel.example").
    pub api_host: String,

    /// Shared node token.
    pub api_key: String,

    /// Node id as registered on the panel.
    pub node_id: u32,

    /// Protocol served by this node.
    pub node_type: NodeType,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_host: "http://127.0.0.1:8080".to_string(),
            api_key: String::new(),
            node_id: 0,
            node_type: NodeType::Vmess,
            timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Controller configuration handed to the engine on node registration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ControllerConfig {
    /// Address the node listens on.
    pub listen_ip: String,

    /// Source address for outbound traffic.
    pub send_ip: String,

    /// Limiter settings.
    pub limit: LimitConfig,

    /// Certificate settings.
    pub cert: CertConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            listen_ip: "0.0.0.0".to_string(),
            send_ip: "0.0.0.0".to_string(),
            limit: LimitConfig::default(),
            cert: CertConfig::default(),
        }
    }
}

/// Static limiter configuration for a node.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(default)]
pub struct LimitConfig {
    /// Node-wide per-user speed limit in Mbps (0 = unlimited).
    pub speed_limit: u64,

    /// Node-wide per-user concurrent IP limit (0 = unlimited).
    pub ip_limit: u32,

    /// Node-wide per-user connection limit (0 = unlimited).
    pub conn_limit: u32,

    /// Enable the dynamic speed-limit job.
    pub enable_dynamic_speed_limit: bool,

    pub dynamic_speed_limit: DynamicSpeedLimitConfig,

    /// Enable the online-IP reporting job.
    pub enable_ip_recorder: bool,

    pub ip_recorder: IpRecorderConfig,
}

/// Dynamic speed-limit job settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DynamicSpeedLimitConfig {
    /// Check interval in seconds.
    pub periodic_secs: u64,

    /// Bytes transferred within one period that trigger the limit.
    pub traffic: u64,

    /// Speed limit applied in Mbps.
    pub speed_limit: u64,

    /// How long the limit stays in force, in seconds.
    pub expire_secs: u64,
}

impl Default for DynamicSpeedLimitConfig {
    fn default() -> Self {
        Self {
            periodic_secs: 60,
            traffic: 1024 * 1024 * 1024,
            speed_limit: 10,
            expire_secs: 600,
        }
    }
}

impl DynamicSpeedLimitConfig {
    pub fn periodic(&self) -> Duration {
        Duration::from_secs(self.periodic_secs)
    }

    pub fn expire(&self) -> Duration {
        Duration::from_secs(self.expire_secs)
    }
}

/// Where online IPs are reported to.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecorderType {
    /// The panel's alive endpoint.
    #[default]
    Panel,
    /// An external HTTP recorder.
    Http,
}

/// Online-IP recorder settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct IpRecorderConfig {
    pub recorder_type: RecorderType,

    /// Recorder endpoint (http type only).
    pub url: String,

    /// Bearer token sent to the recorder (http type only).
    pub token: String,

    /// Recorder request timeout in seconds.
    pub timeout_secs: u64,

    /// Report interval in seconds.
    pub periodic_secs: u64,
}

impl Default for IpRecorderConfig {
    fn default() -> Self {
        Self {
            recorder_type: RecorderType::Panel,
            url: String::new(),
            token: String::new(),
            timeout_secs: 10,
            periodic_secs: 60,
        }
    }
}

impl IpRecorderConfig {
    pub fn periodic(&self) -> Duration {
        Duration::from_secs(self.periodic_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// How certificate material is obtained.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CertMode {
    /// No certificate handling; the engine brings its own.
    #[default]
    None,
    /// Certificate and key are provided as PEM files.
    File,
    /// ACME HTTP-01 issuance (not supported by this agent).
    Http,
    /// ACME DNS-01 issuance (not supported by this agent).
    Dns,
}

/// Certificate configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CertConfig {
    pub mode: CertMode,

    /// Domain the certificate is expected to cover.
    pub domain: String,

    /// Path to certificate chain (PEM).
    pub cert_file: String,

    /// Path to private key (PEM).
    pub key_file: String,

    /// Renewal check interval in seconds.
    pub renew_interval_secs: u64,
}

impl Default for CertConfig {
    fn default() -> Self {
        Self {
            mode: CertMode::None,
            domain: String::new(),
            cert_file: String::new(),
            key_file: String::new(),
            renew_interval_secs: 24 * 60 * 60,
        }
    }
}

impl CertConfig {
    pub fn renew_interval(&self) -> Duration {
        Duration::from_secs(self.renew_interval_secs)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
