//! Mesh engine errors

use thiserror::Error;

use crate::models::MeshHandle;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("Unknown mesh handle: {0}")]
    UnknownHandle(MeshHandle),

    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),

    #[error("Computation failed: {0}")]
    Computation(String),

    #[error("Operation not supported: {0}")]
    Unsupported(String),
}
