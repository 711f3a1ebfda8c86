//! Error types for remote tool selectors

use nlmesh_agent::ToolSelectionError;
use thiserror::Error;

/// Result alias for provider calls
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors that can occur when talking to a remote model
#[derive(Debug, Error, PartialEq, Clone)]
pub enum ProviderError {
    /// Authentication failed (never includes key details)
    #[error("Authentication failed")]
    AuthError,

    /// Rate limited by provider
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Network error occurred
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Non-success response or unusable payload
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Missing or invalid settings
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Tool arguments that are not valid JSON
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::ProviderError("Request timeout".to_string())
        } else if err.is_connect() {
            ProviderError::NetworkError(err.to_string())
        } else {
            ProviderError::ProviderError(err.to_string())
        }
    }
}

impl From<ProviderError> for ToolSelectionError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::AuthError
            | ProviderError::ConfigError(_)
            | ProviderError::NetworkError(_)
            | ProviderError::RateLimited(_) => ToolSelectionError::Unavailable(err.to_string()),
            _ => ToolSelectionError::Failed(err.to_string()),
        }
    }
}
