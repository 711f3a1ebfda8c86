//! Mesh engine collaborator.
//!
//! The analysis core never touches vertex data directly; it talks to a
//! [`MeshEngine`] through opaque [`MeshHandle`]s. [`TriangleMeshEngine`] is an
//! in-memory implementation over indexed triangle meshes.

pub mod engine;
pub mod error;
pub mod geometry;
pub mod models;
pub mod triangle;

pub use engine::MeshEngine;
pub use error::{EngineError, Result};
pub use models::{
    BoundingBox, ConnectivityReport, DetectedFeature, MeshHandle, MeshSummary, TopologyReport,
};
pub use triangle::{TriangleMesh, TriangleMeshEngine};
