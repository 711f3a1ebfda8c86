//! Error types for the analysis core

use nlmesh_mesh::EngineError;
use thiserror::Error;

use crate::models::{ErrorKind, ModelId};

/// Result alias for orchestrator internals
pub type Result<T> = std::result::Result<T, AnalysisFailure>;

/// Why an analysis request did not produce a successful result
///
/// These never cross the orchestrator boundary as `Err`; they are folded into
/// a failed [`AnalysisResult`](crate::models::AnalysisResult).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AnalysisFailure {
    /// The claimed state token is not the registry's current token
    #[error("State token {claimed} does not match the current state {current}")]
    StateConflict {
        /// Token sent by the caller
        claimed: String,
        /// Registry token at validation time
        current: String,
    },

    /// No record under the requested id
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// The parser rejected the query text
    #[error("Could not understand the query: {0}")]
    InvalidQuery(String),

    /// A collaborator (mesh engine or tool selector) failed or timed out
    #[error("Analysis failed: {0}")]
    AnalysisError(String),

    /// Malformed request, detected before touching the registry
    #[error("Invalid request: {0}")]
    ValidationError(String),
}

impl AnalysisFailure {
    /// Wire-level kind reported in `result_kind`
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisFailure::StateConflict { .. } => ErrorKind::StateConflict,
            AnalysisFailure::ModelNotFound(_) => ErrorKind::ModelNotFound,
            AnalysisFailure::InvalidQuery(_) => ErrorKind::InvalidQuery,
            AnalysisFailure::AnalysisError(_) => ErrorKind::AnalysisError,
            AnalysisFailure::ValidationError(_) => ErrorKind::ValidationError,
        }
    }

    /// Hint shown to the caller alongside the error message
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            AnalysisFailure::StateConflict { .. } => {
                Some("Fetch the current state token and retry the request.")
            }
            AnalysisFailure::ModelNotFound(_) => Some("Upload the model again or check its id."),
            AnalysisFailure::InvalidQuery(_) => {
                Some("Rephrase the query and name the geometric element to inspect.")
            }
            AnalysisFailure::AnalysisError(_) => None,
            AnalysisFailure::ValidationError(_) => {
                Some("Provide both a model id and a query text.")
            }
        }
    }
}

impl From<EngineError> for AnalysisFailure {
    fn from(err: EngineError) -> Self {
        AnalysisFailure::AnalysisError(err.to_string())
    }
}

impl From<RegistryError> for AnalysisFailure {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(id) => AnalysisFailure::ModelNotFound(id.to_string()),
        }
    }
}

impl From<ToolSelectionError> for AnalysisFailure {
    fn from(err: ToolSelectionError) -> Self {
        AnalysisFailure::AnalysisError(err.to_string())
    }
}

/// Registry lookups and updates
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// No record under this id
    #[error("Model not found: {0}")]
    NotFound(ModelId),
}

/// Failures reported by a [`ToolSelector`](crate::tools::ToolSelector)
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ToolSelectionError {
    /// Selector did not answer within the configured bound
    #[error("Tool selection timed out after {0}ms")]
    Timeout(u64),

    /// Selector backend is unreachable or misconfigured
    #[error("Tool selector unavailable: {0}")]
    Unavailable(String),

    /// Selector answered with something that is not a tool list
    #[error("Tool selection failed: {0}")]
    Failed(String),
}
