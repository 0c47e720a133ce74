//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::AgentConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Validation(_) => None,
        }
    }
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AgentConfig, ConfigError> {
    let config: AgentConfig = toml::from_str(content).map_err(ConfigError::Parse)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AgentConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{CertMode, RecorderType};
    use crate::panel::NodeType;
    use std::io::Write;

    const SAMPLE: &str = r#"
[observability]
log_level = "debug"

[[nodes]]
[nodes.api]
api_host = "https://panel.example"
api_key = "secret"
node_id = 42
node_type = "hysteria"

[nodes.controller.limit]
speed_limit = 100
enable_ip_recorder = true

[nodes.controller.limit.ip_recorder]
recorder_type = "http"
url = "http://recorder.local/report"
periodic_secs = 30

[nodes.controller.cert]
mode = "file"
cert_file = "/etc/agent/cert.pem"
key_file = "/etc/agent/key.pem"
"#;

    #[test]
    fn test_parse_sample() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.nodes.len(), 1);

        let node = &config.nodes[0];
        assert_eq!(node.api.node_id, 42);
        assert_eq!(node.api.node_type, NodeType::Hysteria);
        assert_eq!(node.api.timeout_secs, 30);
        assert_eq!(node.controller.listen_ip, "0.0.0.0");
        assert_eq!(node.controller.limit.speed_limit, 100);
        assert!(!node.controller.limit.enable_dynamic_speed_limit);
        assert_eq!(node.controller.limit.ip_recorder.recorder_type, RecorderType::Http);
        assert_eq!(node.controller.limit.ip_recorder.periodic_secs, 30);
        assert_eq!(node.controller.cert.mode, CertMode::File);
        assert_eq!(node.controller.cert.renew_interval_secs, 86400);
    }

    #[test]
    fn test_parse_error() {
        let err = parse_config("[[nodes]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_error_display() {
        let err = parse_config("").unwrap_err();
        assert_eq!(err.to_string(), "Validation failed: no nodes configured");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.nodes[0].api.api_key, "secret");
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/agent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
