//! Remote tool selectors for exploratory mesh analysis
//!
//! [`OpenAiToolSelector`] asks an OpenAI-compatible chat model which mesh tools
//! to run. [`selector_from_config`] picks it or the deterministic
//! [`KeywordToolSelector`](nlmesh_agent::KeywordToolSelector) from the `llm`
//! configuration section.

pub mod error;
pub mod openai;

use std::sync::Arc;

use nlmesh_agent::{KeywordToolSelector, ToolSelector};
use nlmesh_config::LlmConfig;
use tracing::{info, warn};

pub use error::{ProviderError, Result};
pub use openai::{OpenAiToolSelector, DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Build the selector described by `config`
///
/// Falls back to the keyword selector when the remote one is disabled or
/// cannot be configured.
pub fn selector_from_config(config: &LlmConfig) -> Arc<dyn ToolSelector> {
    if !config.enabled {
        return Arc::new(KeywordToolSelector::new());
    }

    match OpenAiToolSelector::from_config(config) {
        Ok(selector) => {
            info!(model = %config.model, base_url = %config.base_url, "Using remote tool selector");
            Arc::new(selector)
        }
        Err(err) => {
            warn!(error = %err, "Remote tool selector unavailable, using keyword selector");
            Arc::new(KeywordToolSelector::new())
        }
    }
}
