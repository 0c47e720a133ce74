//! Node tag derivation.

use crate::panel::{NodeInfo, NodeType};

/// Build the tag `{host}-{type}-{id}` that keys a node across the limiter
/// registry and the engine.
pub fn build_node_tag(host: &str, node: &NodeInfo) -> String {
    node_tag(host, node.node_type, node.id)
}

/// Tag for a node known only by its configured identity.
pub fn node_tag(host: &str, node_type: NodeType, id: u32) -> String {
    format!("{}-{}-{}", host, node_type, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::{NodeType, Rules};
    use std::time::Duration;

    fn node(id: u32, node_type: NodeType) -> NodeInfo {
        NodeInfo {
            id,
            node_type,
            host: String::new(),
            port: 443,
            network: "tcp".into(),
            server_name: String::new(),
            tls: false,
            cipher: None,
            server_key: None,
            up_mbps: 0,
            down_mbps: 0,
            rules: Rules::default(),
            push_interval: Duration::from_secs(60),
            pull_interval: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_tag_format() {
        assert_eq!(
            build_node_tag("panel.example", &node(42, NodeType::Vmess)),
            "panel.example-vmess-42"
        );
        assert_eq!(
            build_node_tag("https://panel.example", &node(7, NodeType::Hysteria)),
            "https://panel.example-hysteria-7"
        );
    }

    #[test]
    fn test_tag_is_deterministic() {
        let n = node(42, NodeType::Trojan);
        assert_eq!(build_node_tag("h", &n), build_node_tag("h", &n.clone()));
    }

    #[test]
    fn test_tag_ignores_other_fields() {
        let a = node(1, NodeType::Vless);
        let mut b = a.clone();
        b.port = 8443;
        b.tls = true;
        b.rules.protocol.push("bittorrent".into());
        assert_eq!(build_node_tag("h", &a), build_node_tag("h", &b));
        assert_ne!(build_node_tag("h", &a), build_node_tag("h", &node(2, NodeType::Vless)));
    }
}
