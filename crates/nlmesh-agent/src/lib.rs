//! Model registry and analysis orchestrator for natural-language mesh inspection
//!
//! # Architecture
//!
//! - **ModelRegistry**: registered models plus one state token, behind a single lock
//! - **AnalysisOrchestrator**: validates a request against the state token, resolves
//!   the model, parses the query and dispatches to the mesh engine
//! - **ToolSelector**: pluggable tool choice for exploratory analysis
//! - **templates**: markdown responses and prompt catalogue
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use nlmesh_agent::{AnalysisOrchestrator, AnalysisRequest, ModelFormat, ModelRegistry};
//! use nlmesh_mesh::{TriangleMesh, TriangleMeshEngine};
//!
//! let engine = Arc::new(TriangleMeshEngine::new());
//! let handle = engine.insert(TriangleMesh::cuboid([10.0, 10.0, 10.0]));
//! let orchestrator = AnalysisOrchestrator::new(Arc::new(ModelRegistry::new()), engine);
//!
//! let (id, token) = orchestrator.register_mesh(handle, "cube.stl", ModelFormat::Stl, 684)?;
//! let result = orchestrator.analyze(&AnalysisRequest::new(id, "这个模型的体积是多少？", token));
//! assert!(result.success);
//! ```

pub mod error;
pub mod models;
pub mod orchestrator;
pub mod registry;
pub mod templates;
pub mod tools;

pub use error::{AnalysisFailure, RegistryError, Result, ToolSelectionError};
pub use models::{
    AnalysisRequest, AnalysisResult, ErrorKind, ModelFormat, ModelId, ModelInfo, ModelMetadata,
    ModelRecord, ResultKind, StateToken, ToolCall,
};
pub use orchestrator::{filter_features, AnalysisOrchestrator, OrchestratorSettings, Stage};
pub use registry::ModelRegistry;
pub use tools::{
    execute_tool, fallback_tools, tool_definitions, KeywordToolSelector, MeshTool,
    ToolDefinition, ToolSelector,
};
