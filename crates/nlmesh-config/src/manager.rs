//! Configuration manager implementation

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use tracing::debug;

use crate::{
    error::{ConfigError, Result},
    types::{AppConfig, ConfigManager as ConfigManagerTrait, LOG_LEVELS},
};

/// Default prefix for environment overrides, e.g. `NLMESH_LLM__ENABLED=true`.
pub const DEFAULT_ENV_PREFIX: &str = "NLMESH";

/// Configuration manager
///
/// Sources are layered as built-in defaults, then the TOML file (optional),
/// then environment variables.
pub struct ConfigManager {
    /// Configuration file path
    config_path: PathBuf,
    /// Environment prefix
    env_prefix: String,
}

impl ConfigManager {
    /// Create a new configuration manager
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
        }
    }

    /// Create with custom config path
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            config_path: path,
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
        }
    }

    /// Override the environment variable prefix
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get default config path
    fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nlmesh")
            .join("config.toml")
    }
}

impl ConfigManagerTrait for ConfigManager {
    fn load_config(&mut self) -> Result<AppConfig> {
        debug!(path = %self.config_path.display(), prefix = %self.env_prefix, "Loading configuration");

        let builder = Config::builder()
            .add_source(File::from(self.config_path.clone()).required(false))
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        let app_config: AppConfig = config.try_deserialize()?;
        Ok(app_config)
    }

    fn save_config(&self, config: &AppConfig) -> Result<()> {
        let toml = toml::to_string(config)?;
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.config_path, toml)?;
        debug!(path = %self.config_path.display(), "Configuration saved");
        Ok(())
    }

    fn validate_config(&self, config: &AppConfig) -> Result<()> {
        if config.orchestrator.tool_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "Tool timeout must be greater than 0".to_string(),
            ));
        }
        let tolerance = config.orchestrator.target_tolerance_mm;
        if tolerance.is_nan() || tolerance < 0.0 {
            return Err(ConfigError::Validation(
                "Target tolerance must be a non-negative number".to_string(),
            ));
        }
        if config.llm.model.trim().is_empty() {
            return Err(ConfigError::Validation(
                "LLM model name must not be empty".to_string(),
            ));
        }
        let level = config.logging.level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Unknown log level '{}', expected one of {}",
                config.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }
        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let manager = ConfigManager::new();
        assert!(manager.validate_config(&AppConfig::default()).is_ok());
        assert!(manager.config_path().ends_with("nlmesh/config.toml"));
    }

    #[test]
    fn rejects_zero_timeout() {
        let manager = ConfigManager::new();
        let mut config = AppConfig::default();
        config.orchestrator.tool_timeout_ms = 0;
        assert!(matches!(
            manager.validate_config(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn rejects_negative_or_nan_tolerance() {
        let manager = ConfigManager::new();
        let mut config = AppConfig::default();
        config.orchestrator.target_tolerance_mm = -1.0;
        assert!(manager.validate_config(&config).is_err());
        config.orchestrator.target_tolerance_mm = f64::NAN;
        assert!(manager.validate_config(&config).is_err());
    }

    #[test]
    fn rejects_empty_model_and_unknown_level() {
        let manager = ConfigManager::new();
        let mut config = AppConfig::default();
        config.llm.model = "  ".to_string();
        assert!(manager.validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(manager.validate_config(&config).is_err());

        config.logging.level = "DEBUG".to_string();
        assert!(manager.validate_config(&config).is_ok());
    }
}
