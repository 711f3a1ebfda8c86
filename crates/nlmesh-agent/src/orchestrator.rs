//! Analysis orchestrator
//!
//! Drives a request through `ValidateInput -> ResolveModel -> ParseQuery ->
//! Dispatch -> AssembleResult`. Any stage may fail; a failure is folded into
//! a well-formed [`AnalysisResult`] with `success == false`, so callers always
//! receive exactly one envelope and never an `Err`.

use std::{
    any::Any,
    collections::{BTreeMap, BTreeSet},
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::{Duration, Instant},
};

use nlmesh_config::OrchestratorConfig;
use nlmesh_mesh::{DetectedFeature, MeshEngine, MeshHandle};
use nlmesh_nlq::{
    render_command, GeometricEntity, ParsedQuery, QueryParser, QueryType, PARAM_MAX_VALUE,
    PARAM_MIN_VALUE, PARAM_TARGET_VALUE,
};
use futures::FutureExt;
use serde_json::{json, Value};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::{
    error::{AnalysisFailure, Result, ToolSelectionError},
    models::{
        AnalysisRequest, AnalysisResult, ModelFormat, ModelId, ModelInfo, ModelRecord,
        ResultKind, StateToken,
    },
    registry::ModelRegistry,
    templates,
    tools::{self, KeywordToolSelector, ToolSelector},
};

/// Tunables for the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorSettings {
    /// Upper bound on one tool-selection call
    pub tool_timeout: Duration,
    /// Accepted deviation when a feature is matched against `target_value`
    pub target_tolerance_mm: f64,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from(&OrchestratorConfig::default())
    }
}

impl From<&OrchestratorConfig> for OrchestratorSettings {
    fn from(config: &OrchestratorConfig) -> Self {
        Self {
            tool_timeout: config.tool_timeout(),
            target_tolerance_mm: config.target_tolerance_mm,
        }
    }
}

/// Stages of one analysis run, used to report where a request failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Request shape and state token
    ValidateInput,
    /// Registry lookup
    ResolveModel,
    /// Natural-language parsing
    ParseQuery,
    /// Engine or tool-selector work
    Dispatch,
    /// Envelope construction
    AssembleResult,
}

impl Stage {
    /// Snake-case stage name
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::ValidateInput => "validate_input",
            Stage::ResolveModel => "resolve_model",
            Stage::ParseQuery => "parse_query",
            Stage::Dispatch => "dispatch",
            Stage::AssembleResult => "assemble_result",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type StageResult<T> = std::result::Result<T, (Stage, AnalysisFailure)>;

/// Turns a caught panic from a collaborator into an `AnalysisError`.
fn panicked(collaborator: &str, payload: Box<dyn Any + Send>) -> AnalysisFailure {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    error!(collaborator, %detail, "Collaborator panicked");
    AnalysisFailure::AnalysisError(format!("{} panicked: {}", collaborator, detail))
}

/// Payload produced by a successful dispatch
#[derive(Debug)]
struct Outcome {
    kind: ResultKind,
    data: Value,
    message: String,
    features: Vec<DetectedFeature>,
}

/// Keeps a feature iff its size satisfies the bounds in `parameters`.
///
/// `min_value` and `max_value` are inclusive. `target_value` only applies
/// when neither of them is present, and then matches within `tolerance`.
/// Without any bound every feature is kept; with a bound, features without a
/// size are dropped.
pub fn filter_features(
    features: Vec<DetectedFeature>,
    parameters: &BTreeMap<String, f64>,
    tolerance: f64,
) -> Vec<DetectedFeature> {
    let min = parameters.get(PARAM_MIN_VALUE).copied();
    let max = parameters.get(PARAM_MAX_VALUE).copied();
    let target = if min.is_none() && max.is_none() {
        parameters.get(PARAM_TARGET_VALUE).copied()
    } else {
        None
    };

    if min.is_none() && max.is_none() && target.is_none() {
        return features;
    }

    features
        .into_iter()
        .filter(|feature| {
            let Some(size) = feature.size else {
                return false;
            };
            min.map_or(true, |min| size >= min)
                && max.map_or(true, |max| size <= max)
                && target.map_or(true, |target| (size - target).abs() <= tolerance)
        })
        .collect()
}

/// Top-level workflow over a shared [`ModelRegistry`]
///
/// The orchestrator holds no lock across a request. It reads the registry
/// token during validation and looks the model up afterwards, each as one
/// atomic registry operation; a registry change in between is what
/// `StateConflict` exists to detect on the caller's next request.
///
/// # Examples
///
/// ```ignore
/// use std::sync::Arc;
/// use nlmesh_agent::{AnalysisOrchestrator, AnalysisRequest, ModelRegistry};
/// use nlmesh_mesh::TriangleMeshEngine;
///
/// let engine = Arc::new(TriangleMeshEngine::new());
/// let orchestrator = AnalysisOrchestrator::new(Arc::new(ModelRegistry::new()), engine.clone());
/// let (id, token) = orchestrator.register_mesh(handle, "part.stl", ModelFormat::Stl, 1024)?;
/// let result = orchestrator.analyze(&AnalysisRequest::new(id, "测量体积", token));
/// assert!(result.success);
/// ```
pub struct AnalysisOrchestrator {
    registry: Arc<ModelRegistry>,
    engine: Arc<dyn MeshEngine>,
    selector: Arc<dyn ToolSelector>,
    parser: QueryParser,
    settings: OrchestratorSettings,
}

impl AnalysisOrchestrator {
    /// Create an orchestrator with the keyword tool selector and default settings
    pub fn new(registry: Arc<ModelRegistry>, engine: Arc<dyn MeshEngine>) -> Self {
        Self {
            registry,
            engine,
            selector: Arc::new(KeywordToolSelector::new()),
            parser: QueryParser::new(),
            settings: OrchestratorSettings::default(),
        }
    }

    /// Replace the tool selector used by [`explore`](Self::explore)
    pub fn with_selector(mut self, selector: Arc<dyn ToolSelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Replace the settings
    pub fn with_settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replace the query parser
    pub fn with_parser(mut self, parser: QueryParser) -> Self {
        self.parser = parser;
        self
    }

    /// The shared registry
    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Current settings
    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Parse text without touching the registry
    pub fn parse_query(&self, text: &str) -> ParsedQuery {
        self.parser.parse(text)
    }

    /// Register an already built record
    pub fn register_model(&self, record: ModelRecord) -> (ModelId, StateToken) {
        self.registry.register(record)
    }

    /// Build a record from the engine and register it
    ///
    /// # Errors
    ///
    /// Engine failures are reported as [`AnalysisFailure::AnalysisError`];
    /// the registry is left untouched.
    pub fn register_mesh(
        &self,
        handle: MeshHandle,
        file_name: impl Into<String>,
        format: ModelFormat,
        file_size: u64,
    ) -> Result<(ModelId, StateToken)> {
        let record =
            ModelRecord::from_engine(self.engine.as_ref(), handle, file_name, format, file_size)?;
        Ok(self.registry.register(record))
    }

    /// Rebuild the record of `id` from the engine, keeping its id
    ///
    /// # Errors
    ///
    /// `ModelNotFound` for an unknown id, `AnalysisError` for engine failures.
    pub fn refresh_model(&self, id: &ModelId) -> Result<StateToken> {
        let current = self.registry.lookup(id)?;
        let mut record = ModelRecord::from_engine(
            self.engine.as_ref(),
            current.mesh_handle,
            current.metadata.file_name.clone(),
            current.metadata.format,
            current.metadata.file_size,
        )?;
        record.metadata.registered_at = current.metadata.registered_at;
        Ok(self.registry.reregister(id, record)?)
    }

    /// Remove a model and drop its engine-side mesh
    pub fn release_model(&self, id: &ModelId) -> bool {
        match self.registry.take(id) {
            Some(record) => {
                let unloaded = self.engine.unload(&record.mesh_handle);
                debug!(model_id = %id, unloaded, "Released model");
                true
            }
            None => false,
        }
    }

    /// Current registry token
    pub fn current_state(&self) -> StateToken {
        self.registry.current_token()
    }

    /// Summary of one registered model
    pub fn model_info(&self, id: &ModelId) -> Option<ModelInfo> {
        self.registry.lookup(id).ok().map(|record| record.info())
    }

    /// Summaries of all registered models
    pub fn list_models(&self) -> Vec<ModelInfo> {
        self.registry.list()
    }

    /// Run the deterministic analysis pipeline
    ///
    /// Always returns a result; failures carry the error kind in
    /// `result_kind` and the failed stage in `data.stage`.
    pub fn analyze(&self, request: &AnalysisRequest) -> AnalysisResult {
        let span = info_span!("analyze", model_id = %request.model_id);
        let _guard = span.enter();
        let started = Instant::now();

        match self.run_pipeline(request) {
            Ok(outcome) => self.assemble(outcome, started),
            Err((stage, failure)) => self.fail(stage, failure, started),
        }
    }

    /// Analyze with tools chosen by the configured [`ToolSelector`]
    ///
    /// Validation and model resolution are the same as in
    /// [`analyze`](Self::analyze). The selector runs under the configured
    /// timeout; when it proposes no tools, volume and topology are measured.
    pub async fn explore(&self, request: &AnalysisRequest) -> AnalysisResult {
        let span = info_span!("explore", model_id = %request.model_id);
        let started = Instant::now();

        async {
            match self.run_exploration(request).await {
                Ok(outcome) => self.assemble(outcome, started),
                Err((stage, failure)) => self.fail(stage, failure, started),
            }
        }
        .instrument(span)
        .await
    }

    fn run_pipeline(&self, request: &AnalysisRequest) -> StageResult<Outcome> {
        self.validate_input(request)
            .map_err(|e| (Stage::ValidateInput, e))?;
        let record = self
            .resolve_model(request)
            .map_err(|e| (Stage::ResolveModel, e))?;
        let parsed = self.parse(request).map_err(|e| (Stage::ParseQuery, e))?;
        panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(&record, &parsed, request)))
            .unwrap_or_else(|payload| Err(panicked("Mesh engine", payload)))
            .map_err(|e| (Stage::Dispatch, e))
    }

    async fn run_exploration(&self, request: &AnalysisRequest) -> StageResult<Outcome> {
        self.validate_input(request)
            .map_err(|e| (Stage::ValidateInput, e))?;
        let record = self
            .resolve_model(request)
            .map_err(|e| (Stage::ResolveModel, e))?;

        let timeout = self.settings.tool_timeout;
        let selection = tokio::time::timeout(
            timeout,
            AssertUnwindSafe(
                self.selector
                    .select_tools(&request.query_text, &record.metadata),
            )
            .catch_unwind(),
        )
        .await;

        let calls = match selection {
            Ok(Ok(Ok(calls))) => calls,
            Ok(Ok(Err(err))) => return Err((Stage::Dispatch, err.into())),
            Ok(Err(payload)) => {
                return Err((Stage::Dispatch, panicked("Tool selector", payload)));
            }
            Err(_) => {
                let err = ToolSelectionError::Timeout(timeout.as_millis() as u64);
                return Err((Stage::Dispatch, err.into()));
            }
        };

        let calls = if calls.is_empty() {
            debug!(selector = self.selector.name(), "No tools proposed, using fallback");
            tools::fallback_tools()
        } else {
            calls
        };

        let tool_results: Vec<Value> = panic::catch_unwind(AssertUnwindSafe(|| {
            calls
                .iter()
                .map(|call| tools::execute_tool(self.engine.as_ref(), &record, call))
                .collect()
        }))
        .map_err(|payload| (Stage::Dispatch, panicked("Mesh engine", payload)))?;
        let tools_used = tool_results.len();

        Ok(Outcome {
            kind: ResultKind::LlmAnalysis,
            data: json!({
                "query": request.query_text,
                "selector": self.selector.name(),
                "tool_results": tool_results,
                "tools_used": tools_used,
            }),
            message: format!("Analysis complete using {} tools.", tools_used),
            features: Vec::new(),
        })
    }

    fn validate_input(&self, request: &AnalysisRequest) -> Result<()> {
        if request.model_id.trim().is_empty() {
            return Err(AnalysisFailure::ValidationError(
                "model_id must not be empty".to_string(),
            ));
        }
        if request.query_text.trim().is_empty() {
            return Err(AnalysisFailure::ValidationError(
                "query_text must not be empty".to_string(),
            ));
        }

        let current = self.registry.current_token();
        if !current.matches(&request.claimed_state_token) {
            return Err(AnalysisFailure::StateConflict {
                claimed: request.claimed_state_token.clone(),
                current: current.to_string(),
            });
        }
        Ok(())
    }

    fn resolve_model(&self, request: &AnalysisRequest) -> Result<Arc<ModelRecord>> {
        let id = ModelId::from_string(request.model_id.trim())
            .map_err(|_| AnalysisFailure::ModelNotFound(request.model_id.clone()))?;
        Ok(self.registry.lookup(&id)?)
    }

    fn parse(&self, request: &AnalysisRequest) -> Result<ParsedQuery> {
        let parsed = self.parser.parse(&request.query_text);
        if !parsed.is_valid {
            return Err(AnalysisFailure::InvalidQuery(render_command(&parsed)));
        }
        Ok(parsed)
    }

    /// Parsed constraints, overridden by numeric request parameters.
    fn effective_parameters(
        parsed: &ParsedQuery,
        request: &AnalysisRequest,
    ) -> BTreeMap<String, f64> {
        let mut parameters = parsed.parameters.clone();
        for key in [PARAM_MIN_VALUE, PARAM_MAX_VALUE, PARAM_TARGET_VALUE] {
            if let Some(value) = request.parameters.get(key).and_then(Value::as_f64) {
                parameters.insert(key.to_string(), value);
            }
        }
        parameters
    }

    fn dispatch(
        &self,
        record: &ModelRecord,
        parsed: &ParsedQuery,
        request: &AnalysisRequest,
    ) -> Result<Outcome> {
        let parameters = Self::effective_parameters(parsed, request);
        let handle = &record.mesh_handle;
        let query_type = parsed.query_type;

        let entity_names: Vec<&str> = parsed.entity_types().iter().map(|e| e.as_str()).collect();
        let mut data = json!({
            "query_type": query_type,
            "entities": entity_names,
            "parameters": parameters,
        });

        let (extra, message, features) = match query_type {
            QueryType::Measurement => {
                let volume = self.engine.volume(handle)?;
                let surface_area = self.engine.surface_area(handle)?;
                let message = format!(
                    "{}**Surface area**: {:.2} mm²\n",
                    templates::measurement_result(volume, "mm³", "Volume"),
                    surface_area
                );
                let extra = json!({
                    "measurements": {
                        "volume": volume,
                        "surface_area": surface_area,
                        "units": { "volume": "mm³", "surface_area": "mm²" },
                    }
                });
                (extra, message, Vec::new())
            }
            QueryType::FeatureDetection => {
                let detected = self.engine.detect_features(handle)?;
                let total = detected.len();
                let filtered =
                    filter_features(detected, &parameters, self.settings.target_tolerance_mm);
                let extra = json!({
                    "features": filtered,
                    "total_features": total,
                    "filtered_features": filtered.len(),
                });
                (extra, templates::feature_detection_result(&filtered), filtered)
            }
            QueryType::TopologyCheck => {
                let report = self.engine.topology(handle)?;
                let message = templates::topology_check_result(&report);
                (json!({ "topology": report }), message, Vec::new())
            }
            QueryType::Selection => {
                let (extra, count) = self.select(record, parsed, &parameters);
                let noun = parsed
                    .primary_entity()
                    .map(|entity| entity.as_str())
                    .unwrap_or("elements");
                let message =
                    templates::selection_result(count, noun, &templates::describe_criteria(&parameters));
                (extra, message, Vec::new())
            }
            QueryType::Modification => {
                return Ok(Outcome {
                    kind: ResultKind::Analysis(QueryType::Modification),
                    data: json!({}),
                    message: "No modification was applied.".to_string(),
                    features: Vec::new(),
                });
            }
        };

        if let (Value::Object(base), Value::Object(extra)) = (&mut data, extra) {
            base.extend(extra);
        }

        Ok(Outcome {
            kind: ResultKind::Analysis(query_type),
            data,
            message,
            features,
        })
    }

    /// Index sets for every entity type named in the query.
    ///
    /// Vertices and faces resolve to the full index range; other types use
    /// the features detected at registration, filtered by size.
    fn select(
        &self,
        record: &ModelRecord,
        parsed: &ParsedQuery,
        parameters: &BTreeMap<String, f64>,
    ) -> (Value, usize) {
        let mut per_type = serde_json::Map::new();
        let mut union = BTreeSet::new();

        for entity_type in parsed.entity_types() {
            let indices: Vec<usize> = match entity_type {
                GeometricEntity::Vertex => (0..record.metadata.vertex_count).collect(),
                GeometricEntity::Face => (0..record.metadata.face_count).collect(),
                other => {
                    let candidates: Vec<DetectedFeature> = record
                        .detected_features
                        .iter()
                        .filter(|feature| feature.entity_type == other)
                        .cloned()
                        .collect();
                    filter_features(candidates, parameters, self.settings.target_tolerance_mm)
                        .into_iter()
                        .flat_map(|feature| feature.indices)
                        .collect::<BTreeSet<_>>()
                        .into_iter()
                        .collect()
                }
            };
            union.extend(indices.iter().copied());
            per_type.insert(entity_type.as_str().to_string(), json!(indices));
        }

        let selected: Vec<usize> = union.into_iter().collect();
        let count = selected.len();
        (
            json!({
                "selected_indices": selected,
                "selected_count": count,
                "selection": per_type,
            }),
            count,
        )
    }

    fn assemble(&self, outcome: Outcome, started: Instant) -> AnalysisResult {
        let execution_time = started.elapsed().as_secs_f64();
        info!(
            result_kind = %outcome.kind,
            stage = %Stage::AssembleResult,
            execution_time,
            "Analysis completed"
        );
        AnalysisResult {
            success: true,
            result_kind: outcome.kind,
            data: outcome.data,
            message: outcome.message,
            features: outcome.features,
            execution_time,
            state_token: self.registry.current_token(),
        }
    }

    fn fail(&self, stage: Stage, failure: AnalysisFailure, started: Instant) -> AnalysisResult {
        let execution_time = started.elapsed().as_secs_f64();
        let kind = failure.kind();
        let current = self.registry.current_token();
        warn!(%kind, %stage, error = %failure, "Analysis failed");

        let mut data = json!({
            "error": failure.to_string(),
            "stage": stage.as_str(),
        });
        if let AnalysisFailure::StateConflict { .. } = failure {
            data["expected_state"] = json!(current.to_string());
        }
        if let AnalysisFailure::ModelNotFound(id) = &failure {
            data["model_id"] = json!(id);
        }
        if let AnalysisFailure::InvalidQuery(command) = &failure {
            data["parsed_query"] = json!(command);
        }

        AnalysisResult {
            success: false,
            result_kind: ResultKind::Failure(kind),
            data,
            message: templates::error_response(kind, &failure.to_string(), failure.suggestion()),
            features: Vec::new(),
            execution_time,
            state_token: current,
        }
    }
}

#[cfg(test)]
mod tests {
    use nlmesh_mesh::TriangleMesh;

    use super::*;

    fn sized(entity_type: GeometricEntity, size: Option<f64>) -> DetectedFeature {
        DetectedFeature::new(entity_type, size, vec![])
    }

    fn bounds(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn filter_without_bounds_keeps_everything() {
        let features = vec![sized(GeometricEntity::Hole, None), sized(GeometricEntity::Hole, Some(1.0))];
        assert_eq!(filter_features(features, &BTreeMap::new(), 0.5).len(), 2);
    }

    #[test]
    fn filter_min_and_max_are_inclusive() {
        let features = vec![
            sized(GeometricEntity::Hole, Some(5.0)),
            sized(GeometricEntity::Hole, Some(10.0)),
            sized(GeometricEntity::Hole, Some(15.0)),
            sized(GeometricEntity::Hole, None),
        ];
        let kept = filter_features(
            features,
            &bounds(&[(PARAM_MIN_VALUE, 10.0), (PARAM_MAX_VALUE, 15.0)]),
            0.5,
        );
        let sizes: Vec<_> = kept.iter().filter_map(|f| f.size).collect();
        assert_eq!(sizes, vec![10.0, 15.0]);
    }

    #[test]
    fn filter_target_only_without_min_or_max() {
        let features = vec![
            sized(GeometricEntity::Hole, Some(9.8)),
            sized(GeometricEntity::Hole, Some(11.0)),
        ];
        let kept = filter_features(features.clone(), &bounds(&[(PARAM_TARGET_VALUE, 10.0)]), 0.5);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].size, Some(9.8));

        // target is ignored once a min bound is present
        let kept = filter_features(
            features,
            &bounds(&[(PARAM_TARGET_VALUE, 10.0), (PARAM_MIN_VALUE, 1.0)]),
            0.5,
        );
        assert_eq!(kept.len(), 2);
    }

    fn setup() -> (AnalysisOrchestrator, ModelId, StateToken) {
        let engine = Arc::new(nlmesh_mesh::TriangleMeshEngine::new());
        let handle = engine.insert(TriangleMesh::cuboid([10.0, 20.0, 30.0]));
        let orchestrator = AnalysisOrchestrator::new(Arc::new(ModelRegistry::new()), engine);
        let (id, token) = orchestrator
            .register_mesh(handle, "box.stl", ModelFormat::Stl, 684)
            .unwrap();
        (orchestrator, id, token)
    }

    #[test]
    fn empty_fields_are_validation_errors() {
        let (orchestrator, id, token) = setup();
        let result = orchestrator.analyze(&AnalysisRequest::new("", "测量体积", token));
        assert_eq!(
            result.result_kind,
            ResultKind::Failure(crate::models::ErrorKind::ValidationError)
        );
        let result = orchestrator.analyze(&AnalysisRequest::new(id, "   ", token));
        assert_eq!(
            result.result_kind,
            ResultKind::Failure(crate::models::ErrorKind::ValidationError)
        );
        assert_eq!(result.data["stage"], "validate_input");
    }

    #[test]
    fn invalid_query_reports_parsed_command() {
        let (orchestrator, id, token) = setup();
        let result = orchestrator.analyze(&AnalysisRequest::new(id, "高亮一下", token));
        assert!(!result.success);
        assert_eq!(
            result.result_kind,
            ResultKind::Failure(crate::models::ErrorKind::InvalidQuery)
        );
        assert_eq!(result.data["stage"], "parse_query");
        assert!(result.data["parsed_query"]
            .as_str()
            .unwrap()
            .starts_with("intent:operation|"));
        assert!(result.message.contains("**Suggestion**"));
    }

    #[test]
    fn measurement_reports_volume_and_area() {
        let (orchestrator, id, token) = setup();
        let result = orchestrator.analyze(&AnalysisRequest::new(id, "测量体积", token));
        assert!(result.success);
        assert_eq!(result.result_kind, ResultKind::Analysis(QueryType::Measurement));
        let volume = result.data["measurements"]["volume"].as_f64().unwrap();
        let area = result.data["measurements"]["surface_area"].as_f64().unwrap();
        assert!((volume - 6000.0).abs() < 1e-9);
        assert!((area - 2200.0).abs() < 1e-9);
        assert!(result.message.contains("**Volume**: 6000.00 mm³"));
        assert_eq!(result.state_token, token);
    }

    #[test]
    fn topology_passes_report_through() {
        let (orchestrator, id, token) = setup();
        let result = orchestrator.analyze(&AnalysisRequest::new(id, "检查模型是否水密", token));
        assert_eq!(result.result_kind, ResultKind::Analysis(QueryType::TopologyCheck));
        assert_eq!(result.data["topology"]["is_watertight"], true);
        assert_eq!(result.data["topology"]["issues"], json!([]));
    }

    #[test]
    fn feature_detection_filters_by_size() {
        let (orchestrator, id, token) = setup();
        // planes on the box are 20 or 30 mm across
        let result = orchestrator.analyze(&AnalysisRequest::new(id, "识别大于25mm的平面", token));
        assert_eq!(
            result.result_kind,
            ResultKind::Analysis(QueryType::FeatureDetection)
        );
        assert_eq!(result.data["total_features"], 6);
        assert_eq!(result.data["filtered_features"], 4);
        assert_eq!(result.features.len(), 4);
    }

    #[test]
    fn request_parameters_override_parsed_bounds() {
        let (orchestrator, id, token) = setup();
        let request = AnalysisRequest::new(id, "识别大于25mm的平面", token)
            .with_parameter(PARAM_MIN_VALUE, 100.0);
        let result = orchestrator.analyze(&request);
        assert_eq!(result.data["filtered_features"], 0);
        assert_eq!(result.data["parameters"][PARAM_MIN_VALUE], 100.0);
    }

    #[test]
    fn selection_of_faces_covers_all_faces() {
        let (orchestrator, id, token) = setup();
        let result = orchestrator.analyze(&AnalysisRequest::new(id, "select all faces", token));
        assert_eq!(result.result_kind, ResultKind::Analysis(QueryType::Selection));
        assert_eq!(result.data["selected_count"], 12);
        assert!(result.message.contains("Selected **12** face"));
    }

    #[test]
    fn modification_dispatch_is_empty() {
        let (orchestrator, id, token) = setup();
        let record = orchestrator.registry().lookup(&id).unwrap();
        let mut parsed = orchestrator.parse_query("删除大于5mm的孔");
        parsed.query_type = QueryType::Modification;

        let request = AnalysisRequest::new(id, "删除大于5mm的孔", token);
        let outcome = orchestrator.dispatch(&record, &parsed, &request).unwrap();
        assert_eq!(outcome.kind, ResultKind::Analysis(QueryType::Modification));
        assert_eq!(outcome.data, json!({}));
        assert!(outcome.features.is_empty());
    }

    #[test]
    fn release_unloads_engine_mesh() {
        let (orchestrator, id, token) = setup();
        assert!(orchestrator.model_info(&id).is_some());
        assert!(orchestrator.release_model(&id));
        assert_ne!(orchestrator.current_state(), token);
        assert!(orchestrator.model_info(&id).is_none());
        assert!(!orchestrator.release_model(&id));
    }

    #[test]
    fn refresh_keeps_id_and_advances_token() {
        let (orchestrator, id, token) = setup();
        let refreshed = orchestrator.refresh_model(&id).unwrap();
        assert_ne!(refreshed, token);
        assert_eq!(orchestrator.model_info(&id).unwrap().model_id, id);
        assert!(matches!(
            orchestrator.refresh_model(&ModelId::new()),
            Err(AnalysisFailure::ModelNotFound(_))
        ));
    }
}
