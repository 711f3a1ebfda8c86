//! Data models for registered meshes, analysis requests and results

use std::{collections::BTreeMap, fmt, path::Path, str::FromStr};

use chrono::{DateTime, Utc};
use nlmesh_mesh::{BoundingBox, DetectedFeature, EngineError, MeshEngine, MeshHandle, TopologyReport};
use nlmesh_nlq::QueryType;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Identifier of a registered model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelId(uuid::Uuid);

impl ModelId {
    /// Generate a new random model ID
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Create from string representation
    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(uuid::Uuid::parse_str(s)?))
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for ModelId {
    fn default() -> Self {
        Self::new()
    }
}

/// Version marker of the registry contents
///
/// Exactly one token is current at any time; every mutation installs a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateToken(uuid::Uuid);

impl StateToken {
    /// Generate a new random, unguessable token
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Create from string representation
    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(uuid::Uuid::parse_str(s)?))
    }

    /// Whether a token sent over the wire names this token
    pub fn matches(&self, claimed: &str) -> bool {
        StateToken::from_string(claimed.trim()).is_ok_and(|token| token == *self)
    }
}

impl fmt::Display for StateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for StateToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Mesh file formats accepted at upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    /// Stereolithography
    Stl,
    /// Wavefront OBJ
    Obj,
    /// Polygon file format
    Ply,
    /// ISO 10303 STEP
    Step,
}

impl ModelFormat {
    /// Format name as used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFormat::Stl => "stl",
            ModelFormat::Obj => "obj",
            ModelFormat::Ply => "ply",
            ModelFormat::Step => "step",
        }
    }

    /// Infer the format from a file name's extension
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let extension = path.as_ref().extension()?.to_str()?;
        extension.parse().ok()
    }
}

impl FromStr for ModelFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stl" => Ok(ModelFormat::Stl),
            "obj" => Ok(ModelFormat::Obj),
            "ply" => Ok(ModelFormat::Ply),
            "step" | "stp" => Ok(ModelFormat::Step),
            other => Err(format!("Unsupported model format: {}", other)),
        }
    }
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptive data captured when a model is registered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Original upload file name
    pub file_name: String,
    /// Upload format
    pub format: ModelFormat,
    /// Upload size in bytes
    pub file_size: u64,
    /// Number of mesh vertices
    pub vertex_count: usize,
    /// Number of mesh faces
    pub face_count: usize,
    /// Axis-aligned bounds in millimeters
    pub bounding_box: BoundingBox,
    /// Registration time
    pub registered_at: DateTime<Utc>,
}

/// A registered mesh and what is known about it
///
/// Owned by the [`ModelRegistry`](crate::registry::ModelRegistry); the id is
/// assigned by the registry on registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    /// Registry-assigned identifier
    pub id: ModelId,
    /// Engine-side mesh reference
    pub mesh_handle: MeshHandle,
    /// File and size information
    pub metadata: ModelMetadata,
    /// Features found at registration time
    #[serde(default)]
    pub detected_features: Vec<DetectedFeature>,
    /// Topology at registration time
    pub topology: Option<TopologyReport>,
}

impl ModelRecord {
    /// Create a record with no feature or topology snapshot
    pub fn new(mesh_handle: MeshHandle, metadata: ModelMetadata) -> Self {
        Self {
            id: ModelId::new(),
            mesh_handle,
            metadata,
            detected_features: Vec::new(),
            topology: None,
        }
    }

    /// Build a record by asking the engine for summary, features and topology
    ///
    /// # Errors
    ///
    /// Any engine failure is returned unchanged.
    pub fn from_engine(
        engine: &dyn MeshEngine,
        mesh_handle: MeshHandle,
        file_name: impl Into<String>,
        format: ModelFormat,
        file_size: u64,
    ) -> Result<Self, EngineError> {
        let summary = engine.load_summary(&mesh_handle)?;
        let detected_features = engine.detect_features(&mesh_handle)?;
        let topology = engine.topology(&mesh_handle)?;

        let metadata = ModelMetadata {
            file_name: file_name.into(),
            format,
            file_size,
            vertex_count: summary.vertex_count,
            face_count: summary.face_count,
            bounding_box: summary.bounding_box,
            registered_at: Utc::now(),
        };

        Ok(Self {
            id: ModelId::new(),
            mesh_handle,
            metadata,
            detected_features,
            topology: Some(topology),
        })
    }

    /// Public view of this record
    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            model_id: self.id,
            metadata: self.metadata.clone(),
            feature_count: self.detected_features.len(),
            topology: self.topology.clone(),
        }
    }
}

/// Summary of a registered model, as listed by the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Registry identifier
    pub model_id: ModelId,
    /// File and size information
    pub metadata: ModelMetadata,
    /// Number of features detected at registration
    pub feature_count: usize,
    /// Topology at registration time, when known
    pub topology: Option<TopologyReport>,
}

/// Input to [`AnalysisOrchestrator::analyze`](crate::orchestrator::AnalysisOrchestrator::analyze)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Target model id as sent by the client
    pub model_id: String,
    /// Free-form query
    pub query_text: String,
    /// Registry token the client last observed
    pub claimed_state_token: String,
    /// Numeric overrides for `min_value`, `max_value` or `target_value`
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
}

impl AnalysisRequest {
    /// Create a request without extra parameters
    pub fn new(
        model_id: impl fmt::Display,
        query_text: impl Into<String>,
        claimed_state_token: impl fmt::Display,
    ) -> Self {
        Self {
            model_id: model_id.to_string(),
            query_text: query_text.into(),
            claimed_state_token: claimed_state_token.to_string(),
            parameters: BTreeMap::new(),
        }
    }

    /// Add a request parameter
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// Failure kinds surfaced in `result_kind`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Stale state token
    StateConflict,
    /// Unknown model id
    ModelNotFound,
    /// Query rejected by the parser
    InvalidQuery,
    /// Collaborator failure or timeout
    AnalysisError,
    /// Missing model id or query text
    ValidationError,
}

impl ErrorKind {
    /// All kinds
    pub const ALL: [ErrorKind; 5] = [
        ErrorKind::StateConflict,
        ErrorKind::ModelNotFound,
        ErrorKind::InvalidQuery,
        ErrorKind::AnalysisError,
        ErrorKind::ValidationError,
    ];

    /// Kind name as used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::StateConflict => "StateConflict",
            ErrorKind::ModelNotFound => "ModelNotFound",
            ErrorKind::InvalidQuery => "InvalidQuery",
            ErrorKind::AnalysisError => "AnalysisError",
            ErrorKind::ValidationError => "ValidationError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an [`AnalysisResult`] carries
///
/// Serialized as a plain string: the query type name (`"measurement"`),
/// `"llm_analysis"` for tool-selection flows, or the error kind
/// (`"StateConflict"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultKind {
    /// Deterministic analysis of the given type
    Analysis(QueryType),
    /// Tool-selection (exploratory) analysis
    LlmAnalysis,
    /// Failed request
    Failure(ErrorKind),
}

impl ResultKind {
    /// Wire name of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultKind::Analysis(query_type) => query_type.as_str(),
            ResultKind::LlmAnalysis => "llm_analysis",
            ResultKind::Failure(kind) => kind.as_str(),
        }
    }

    /// Whether this kind denotes a failure
    pub fn is_failure(&self) -> bool {
        matches!(self, ResultKind::Failure(_))
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResultKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "llm_analysis" {
            return Ok(ResultKind::LlmAnalysis);
        }
        if let Some(query_type) = QueryType::CLASSIFIABLE
            .iter()
            .chain(std::iter::once(&QueryType::Modification))
            .find(|query_type| query_type.as_str() == s)
        {
            return Ok(ResultKind::Analysis(*query_type));
        }
        ErrorKind::ALL
            .iter()
            .find(|kind| kind.as_str() == s)
            .map(|kind| ResultKind::Failure(*kind))
            .ok_or_else(|| format!("Unknown result kind: {}", s))
    }
}

impl Serialize for ResultKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ResultKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Uniform output envelope, populated on success and on failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Whether the request completed
    pub success: bool,
    /// Query type, exploratory marker or error kind
    pub result_kind: ResultKind,
    /// Kind-specific payload
    pub data: serde_json::Value,
    /// Human-readable summary
    pub message: String,
    /// Features relevant to this result
    #[serde(default)]
    pub features: Vec<DetectedFeature>,
    /// Wall-clock time in seconds
    pub execution_time: f64,
    /// Registry token when the result was produced
    pub state_token: StateToken,
}

/// A tool invocation chosen by a [`ToolSelector`](crate::tools::ToolSelector)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool name from the catalogue
    pub tool_name: String,
    /// Tool arguments
    #[serde(default)]
    pub args: serde_json::Value,
}

impl ToolCall {
    /// A call without arguments
    pub fn named(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            args: serde_json::Value::Object(Default::default()),
        }
    }
}
