//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, node ids set)
//! - Check mode-specific requirements (cert files, recorder URL)
//! - Detect duplicate nodes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AgentConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::{AgentConfig, CertMode, NodeConfig, RecorderType};
use crate::node::node_tag;
use crate::task::MAX_INTERVAL;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no nodes configured")]
    NoNodes,

    #[error("node #{index}: invalid api_host '{host}'")]
    InvalidApiHost { index: usize, host: String },

    #[error("node #{index}: node_id must be greater than 0")]
    MissingNodeId { index: usize },

    #[error("node #{index}: duplicate node {node}")]
    DuplicateNode { index: usize, node: String },

    #[error("node #{index}: {field} must be greater than 0")]
    ZeroInterval { index: usize, field: &'static str },

    #[error("node #{index}: {field} exceeds {max} seconds")]
    IntervalTooLong {
        index: usize,
        field: &'static str,
        max: u64,
    },

    #[error("node #{index}: cert mode 'file' requires cert_file and key_file")]
    MissingCertFiles { index: usize },

    #[error("node #{index}: cert mode '{mode}' is not supported")]
    UnsupportedCertMode { index: usize, mode: &'static str },

    #[error("node #{index}: http ip recorder requires a url")]
    MissingRecorderUrl { index: usize },
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &AgentConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.nodes.is_empty() {
        errors.push(ValidationError::NoNodes);
    }

    let mut seen = HashSet::new();
    for (index, node) in config.nodes.iter().enumerate() {
        validate_node(index, node, &mut errors);

        let key = node_tag(&node.api.api_host, node.api.node_type, node.api.node_id);
        if !seen.insert(key.clone()) {
            errors.push(ValidationError::DuplicateNode { index, node: key });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_node(index: usize, node: &NodeConfig, errors: &mut Vec<ValidationError>) {
    if url::Url::parse(&node.api.api_host).is_err() {
        errors.push(ValidationError::InvalidApiHost {
            index,
            host: node.api.api_host.clone(),
        });
    }
    if node.api.node_id == 0 {
        errors.push(ValidationError::MissingNodeId { index });
    }
    if node.api.timeout_secs == 0 {
        errors.push(ValidationError::ZeroInterval { index, field: "api.timeout_secs" });
    }

    let limit = &node.controller.limit;
    if limit.enable_dynamic_speed_limit && limit.dynamic_speed_limit.periodic_secs == 0 {
        errors.push(ValidationError::ZeroInterval {
            index,
            field: "limit.dynamic_speed_limit.periodic_secs",
        });
    }
    if limit.enable_ip_recorder {
        if limit.ip_recorder.periodic_secs == 0 {
            errors.push(ValidationError::ZeroInterval {
                index,
                field: "limit.ip_recorder.periodic_secs",
            });
        }
        if limit.ip_recorder.recorder_type == RecorderType::Http
            && url::Url::parse(&limit.ip_recorder.url).is_err()
        {
            errors.push(ValidationError::MissingRecorderUrl { index });
        }
    }

    let cert = &node.controller.cert;
    let bounded = [
        ("limit.dynamic_speed_limit.periodic_secs", limit.dynamic_speed_limit.periodic_secs),
        ("limit.dynamic_speed_limit.expire_secs", limit.dynamic_speed_limit.expire_secs),
        ("limit.ip_recorder.periodic_secs", limit.ip_recorder.periodic_secs),
        ("cert.renew_interval_secs", cert.renew_interval_secs),
    ];
    let max = MAX_INTERVAL.as_secs();
    for (field, secs) in bounded {
        if secs > max {
            errors.push(ValidationError::IntervalTooLong { index, field, max });
        }
    }

    match cert.mode {
        CertMode::None => {}
        CertMode::File => {
            if cert.cert_file.is_empty() || cert.key_file.is_empty() {
                errors.push(ValidationError::MissingCertFiles { index });
            }
            if cert.renew_interval_secs == 0 {
                errors.push(ValidationError::ZeroInterval { index, field: "cert.renew_interval_secs" });
            }
        }
        CertMode::Http => errors.push(ValidationError::UnsupportedCertMode { index, mode: "http" }),
        CertMode::Dns => errors.push(ValidationError::UnsupportedCertMode { index, mode: "dns" }),
    }
}
