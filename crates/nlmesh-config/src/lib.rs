//! NL-Mesh configuration
//!
//! Loads [`AppConfig`] from built-in defaults, an optional TOML file and
//! `NLMESH_*` environment variables, and sets up `tracing` output.

pub mod error;
pub mod logging;
pub mod manager;
pub mod types;

pub use error::{ConfigError, Result};
pub use manager::{ConfigManager, DEFAULT_ENV_PREFIX};
pub use types::{
    AppConfig, ConfigManager as ConfigManagerTrait, LlmConfig, LoggingConfig, OrchestratorConfig,
    LOG_LEVELS,
};
