//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AgentConfig (validated, immutable)
//!     → one NodeConfig per controller
//!
//! On reload (SIGHUP or --watch):
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → controllers closed and rebuilt from the new config
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AgentConfig, ApiConfig, CertConfig, CertMode, ControllerConfig, DynamicSpeedLimitConfig,
    IpRecorderConfig, LimitConfig, NodeConfig, ObservabilityConfig, RecorderType,
};
