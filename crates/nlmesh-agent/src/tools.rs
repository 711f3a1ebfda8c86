//! Mesh analysis tools and tool selection
//!
//! A [`ToolSelector`] turns a query into an ordered list of [`ToolCall`]s;
//! [`execute_tool`] runs one call against the mesh engine. Tool names follow
//! the catalogue in [`MeshTool`].

use async_trait::async_trait;
use nlmesh_mesh::MeshEngine;
use nlmesh_nlq::GeometricEntity;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{
    error::ToolSelectionError,
    models::{ModelMetadata, ModelRecord, ToolCall},
};

/// Analysis tools that can be invoked by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshTool {
    /// Enclosed volume in mm³
    MeasureVolume,
    /// Total surface area in mm²
    MeasureSurfaceArea,
    /// Boundary loops reported as holes
    DetectHoles,
    /// Planar face groups
    DetectFaces,
    /// Manifold, watertight and self-intersection checks
    CheckTopology,
    /// Connected components, edge and vertex counts
    AnalyzeConnectivity,
}

impl MeshTool {
    /// Every tool, in catalogue order
    pub const ALL: [MeshTool; 6] = [
        MeshTool::MeasureVolume,
        MeshTool::MeasureSurfaceArea,
        MeshTool::DetectHoles,
        MeshTool::DetectFaces,
        MeshTool::CheckTopology,
        MeshTool::AnalyzeConnectivity,
    ];

    /// Catalogue name
    pub fn name(&self) -> &'static str {
        match self {
            MeshTool::MeasureVolume => "measure_volume",
            MeshTool::MeasureSurfaceArea => "measure_surface_area",
            MeshTool::DetectHoles => "detect_holes",
            MeshTool::DetectFaces => "detect_faces",
            MeshTool::CheckTopology => "check_topology",
            MeshTool::AnalyzeConnectivity => "analyze_connectivity",
        }
    }

    /// One-line description offered to tool selectors
    pub fn description(&self) -> &'static str {
        match self {
            MeshTool::MeasureVolume => "Measure the enclosed volume of the model",
            MeshTool::MeasureSurfaceArea => "Measure the total surface area of the model",
            MeshTool::DetectHoles => "Detect holes (open boundary loops) and their diameters",
            MeshTool::DetectFaces => "Detect planar faces with their normals and areas",
            MeshTool::CheckTopology => {
                "Check whether the model is manifold, watertight and free of self-intersections"
            }
            MeshTool::AnalyzeConnectivity => {
                "Count connected components, edges and vertices of the model"
            }
        }
    }

    /// Resolve a catalogue name
    ///
    /// Also accepts CamelCase class-style names such as `MeasureVolumeTool`.
    pub fn from_name(name: &str) -> Option<Self> {
        let trimmed = name.trim();
        MeshTool::ALL.into_iter().find(|tool| {
            tool.name() == trimmed || tool.class_name().eq_ignore_ascii_case(trimmed)
        })
    }

    fn class_name(&self) -> &'static str {
        match self {
            MeshTool::MeasureVolume => "MeasureVolumeTool",
            MeshTool::MeasureSurfaceArea => "MeasureSurfaceAreaTool",
            MeshTool::DetectHoles => "DetectHolesTool",
            MeshTool::DetectFaces => "DetectFacesTool",
            MeshTool::CheckTopology => "CheckTopologyTool",
            MeshTool::AnalyzeConnectivity => "AnalyzeConnectivityTool",
        }
    }
}

/// Name, description and JSON Schema of a tool, as offered to a selector
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Definitions for the whole catalogue
pub fn tool_definitions() -> Vec<ToolDefinition> {
    MeshTool::ALL
        .iter()
        .map(|tool| ToolDefinition {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: json!({ "type": "object", "properties": {} }),
        })
        .collect()
}

/// Tools run when a selector proposes none
pub fn fallback_tools() -> Vec<ToolCall> {
    vec![
        ToolCall::named(MeshTool::MeasureVolume.name()),
        ToolCall::named(MeshTool::CheckTopology.name()),
    ]
}

/// Run one tool call against the engine
///
/// Never fails: an unknown tool or an engine error becomes an entry with an
/// `error` field so that the remaining calls still run.
pub fn execute_tool(engine: &dyn MeshEngine, record: &ModelRecord, call: &ToolCall) -> Value {
    let Some(tool) = MeshTool::from_name(&call.tool_name) else {
        warn!(tool = %call.tool_name, "Unknown tool requested");
        return json!({
            "tool": call.tool_name,
            "error": format!("Unknown tool: {}", call.tool_name),
        });
    };

    let handle = &record.mesh_handle;
    let outcome = match tool {
        MeshTool::MeasureVolume => engine
            .volume(handle)
            .map(|volume| json!({ "volume": volume, "unit": "mm³" })),
        MeshTool::MeasureSurfaceArea => engine
            .surface_area(handle)
            .map(|area| json!({ "surface_area": area, "unit": "mm²" })),
        MeshTool::DetectHoles => engine.detect_features(handle).map(|features| {
            let holes: Vec<Value> = features
                .iter()
                .filter(|f| f.entity_type == GeometricEntity::Hole)
                .enumerate()
                .map(|(id, hole)| {
                    json!({
                        "id": id + 1,
                        "diameter": hole.size,
                        "vertex_indices": hole.indices,
                    })
                })
                .collect();
            json!({ "holes_count": holes.len(), "holes": holes })
        }),
        MeshTool::DetectFaces => engine.detect_features(handle).map(|features| {
            let faces: Vec<Value> = features
                .iter()
                .filter(|f| f.entity_type == GeometricEntity::Plane)
                .enumerate()
                .map(|(id, face)| {
                    json!({
                        "id": id + 1,
                        "area": face.properties.get("area"),
                        "normal": face.properties.get("normal"),
                        "face_indices": face.indices,
                    })
                })
                .collect();
            json!({ "faces_count": faces.len(), "faces": faces })
        }),
        MeshTool::CheckTopology => engine.topology(handle).map(|report| {
            json!({
                "is_watertight": report.is_watertight,
                "manifold": report.is_manifold,
                "self_intersections": report.has_self_intersections,
                "issues": report.issues,
            })
        }),
        MeshTool::AnalyzeConnectivity => engine.connectivity(handle).map(|report| {
            json!({
                "connected_components": report.connected_components,
                "edges_count": report.edge_count,
                "vertices_count": report.vertex_count,
            })
        }),
    };

    match outcome {
        Ok(result) => {
            debug!(tool = tool.name(), "Tool executed");
            json!({ "tool": tool.name(), "result": result })
        }
        Err(err) => {
            warn!(tool = tool.name(), error = %err, "Tool failed");
            json!({ "tool": tool.name(), "error": err.to_string() })
        }
    }
}

/// Chooses tools for an exploratory query
///
/// Implementations may be remote; callers bound every call with a timeout.
#[async_trait]
pub trait ToolSelector: Send + Sync {
    /// Propose tool calls for `query` against the described model
    async fn select_tools(
        &self,
        query: &str,
        model: &ModelMetadata,
    ) -> Result<Vec<ToolCall>, ToolSelectionError>;

    /// Name used in logs
    fn name(&self) -> &str;
}

/// Deterministic selector driven by keywords
///
/// Volume, surface area, hole and topology requests map to one tool each;
/// anything else gets the fallback pair.
#[derive(Debug, Clone, Default)]
pub struct KeywordToolSelector;

impl KeywordToolSelector {
    pub fn new() -> Self {
        Self
    }

    /// The selection, without the async wrapper
    pub fn choose(&self, query: &str) -> Vec<ToolCall> {
        let lowered = query.to_lowercase();
        let tool = if query.contains("测量体积") || lowered.contains("volume") {
            MeshTool::MeasureVolume
        } else if query.contains("测量表面积") || lowered.contains("surface area") {
            MeshTool::MeasureSurfaceArea
        } else if query.contains("检测孔洞") || lowered.contains("holes") {
            MeshTool::DetectHoles
        } else if query.contains("检查拓扑") || lowered.contains("topology") {
            MeshTool::CheckTopology
        } else {
            return fallback_tools();
        };
        vec![ToolCall::named(tool.name())]
    }
}

#[async_trait]
impl ToolSelector for KeywordToolSelector {
    async fn select_tools(
        &self,
        query: &str,
        _model: &ModelMetadata,
    ) -> Result<Vec<ToolCall>, ToolSelectionError> {
        Ok(self.choose(query))
    }

    fn name(&self) -> &str {
        "keyword"
    }
}
