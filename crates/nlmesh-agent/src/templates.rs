//! Response templates and prompt catalogue
//!
//! Templates are pure formatting helpers keyed by analysis kind; they never
//! touch the registry or the engine.

use std::collections::BTreeMap;

use nlmesh_mesh::{DetectedFeature, TopologyReport};
use nlmesh_nlq::{GeometricEntity, Intent, QueryType, PARAM_MAX_VALUE, PARAM_MIN_VALUE, PARAM_TARGET_VALUE};
use serde::Serialize;

use crate::models::{ErrorKind, ModelMetadata};

/// System prompt for geometric analysis assistants
pub const ANALYSIS_SYSTEM_PROMPT: &str = "\
You are a 3D geometry analysis assistant that helps users understand and inspect mesh models.

Capabilities:
- understand geometric queries written in natural language
- analyze mesh topology and geometric features
- report accurate measurements and inspection results
- explain geometric concepts in plain language

Guidelines:
1. Accuracy first: every reported value must come from a tool result.
2. Explain clearly: avoid jargon where a plain word will do.
3. Stay concrete: refer to the features of the model being inspected.
4. Suggest fixes: when a problem is found, propose a specific repair.

Available tools measure (volume, surface area), detect features (holes, planar faces)
and check topology (manifoldness, watertightness, connectivity). Pick the tools the
query needs and summarize their results.";

/// Prompt describing the intent and query-type taxonomy
pub const INTENT_CLASSIFICATION_PROMPT: &str = "\
Classify the user's natural-language query about a 3D model.

Intents:
1. query: the user wants information or a measurement (\"what is the volume of this model?\")
2. operation: the user wants to select or visualize elements (\"highlight all holes over 10mm\")
3. modification: the user wants to change the model (\"remove this extra hole\")

Query types:
- measurement: sizes, distances, angles, volume, area
- feature_detection: recognizing holes, cylinders, planes, spheres
- topology_check: manifoldness, watertightness, self-intersection
- selection: picking specific geometric elements

Answer with JSON holding the intent, the query type, the detected entities and the numeric parameters.";

/// Questions for learning the domain rather than inspecting a model
pub const TUTORIAL_QUERIES: [&str; 5] = [
    "What is a manifold mesh?",
    "How do I check whether a model is watertight?",
    "How does hole detection work?",
    "Do self-intersecting faces affect 3D printing?",
    "How can I improve the topology of a model?",
];

/// A sample query with the classification it is expected to receive
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExampleQuery {
    pub query: &'static str,
    pub intent: Intent,
    pub query_type: QueryType,
    pub description: &'static str,
}

/// Sample queries shown to new users
pub fn example_queries() -> Vec<ExampleQuery> {
    vec![
        ExampleQuery {
            query: "这个模型的体积是多少？",
            intent: Intent::Query,
            query_type: QueryType::Measurement,
            description: "Measure the model volume",
        },
        ExampleQuery {
            query: "高亮所有直径大于10mm的孔",
            intent: Intent::Operation,
            query_type: QueryType::Selection,
            description: "Select holes above a size threshold",
        },
        ExampleQuery {
            query: "检查模型是否有自相交面",
            intent: Intent::Query,
            query_type: QueryType::TopologyCheck,
            description: "Check topological integrity",
        },
        ExampleQuery {
            query: "这个圆柱面的直径是多少？",
            intent: Intent::Query,
            query_type: QueryType::Measurement,
            description: "Measure a specific feature",
        },
        ExampleQuery {
            query: "高亮所有平面表面",
            intent: Intent::Operation,
            query_type: QueryType::Selection,
            description: "Highlight planar features",
        },
        ExampleQuery {
            query: "显示所有孔洞",
            intent: Intent::Query,
            query_type: QueryType::FeatureDetection,
            description: "List detected holes",
        },
    ]
}

/// Instruction sent to a remote tool selector
pub fn tool_selection_prompt(query: &str, model: &ModelMetadata) -> String {
    format!(
        "You analyze natural-language queries about a 3D model and decide which tools to call.\n\n\
         Tool groups:\n\
         - measurement: volume, surface area\n\
         - feature detection: holes, planar faces\n\
         - topology: watertightness, manifoldness, connectivity\n\n\
         Model:\n\
         - file name: {}\n\
         - format: {}\n\
         - vertices: {}\n\
         - faces: {}\n\n\
         User query: {}\n\n\
         Call the tools needed to answer the query.",
        model.file_name, model.format, model.vertex_count, model.face_count, query
    )
}

pub fn measurement_result(value: f64, unit: &str, description: &str) -> String {
    format!(
        "**Measurement result**\n\n**{}**: {:.2} {}\n",
        description, value, unit
    )
}

/// Counts per entity type, in entity declaration order.
pub fn feature_detection_result(features: &[DetectedFeature]) -> String {
    if features.is_empty() {
        return "**Feature detection result**\n\nNo distinct geometric features were detected."
            .to_string();
    }

    let mut counts: BTreeMap<GeometricEntity, usize> = BTreeMap::new();
    for feature in features {
        *counts.entry(feature.entity_type).or_insert(0) += 1;
    }

    let mut response = String::from("**Feature detection result**\n\n");
    for (entity_type, count) in counts {
        response.push_str(&format!("- **{}**: {}\n", entity_type, count));
    }
    response
}

pub fn topology_check_result(report: &TopologyReport) -> String {
    fn verdict(passed: bool) -> &'static str {
        if passed {
            "passed"
        } else {
            "failed"
        }
    }

    let headline = if report.is_manifold && !report.has_self_intersections {
        "OK"
    } else {
        "WARNING"
    };

    let mut response = format!("**Topology check result** ({})\n\n", headline);
    response.push_str(&format!("- **Manifold**: {}\n", verdict(report.is_manifold)));
    response.push_str(&format!(
        "- **Self-intersection**: {}\n",
        verdict(!report.has_self_intersections)
    ));
    response.push_str(&format!("- **Watertight**: {}\n", verdict(report.is_watertight)));

    if !report.issues.is_empty() {
        response.push_str("\n**Issues found**:\n");
        for issue in &report.issues {
            response.push_str(&format!("- {}\n", issue));
        }
    }
    response
}

pub fn selection_result(selected_count: usize, entity_type: &str, criteria: &str) -> String {
    let mut response = format!(
        "**Selection result**\n\nSelected **{}** {}",
        selected_count, entity_type
    );
    if !criteria.is_empty() {
        response.push_str(&format!(", criteria: {}", criteria));
    }
    response
}

pub fn error_response(kind: ErrorKind, message: &str, suggestion: Option<&str>) -> String {
    let mut response = format!("**Error**: {}\n\n{}", kind, message);
    if let Some(suggestion) = suggestion.filter(|s| !s.is_empty()) {
        response.push_str(&format!("\n\n**Suggestion**: {}", suggestion));
    }
    response
}

/// Human-readable form of the size bounds, e.g. `size >= 10.00 mm`.
pub fn describe_criteria(parameters: &BTreeMap<String, f64>) -> String {
    let mut parts = Vec::new();
    if let Some(min) = parameters.get(PARAM_MIN_VALUE) {
        parts.push(format!("size >= {:.2} mm", min));
    }
    if let Some(max) = parameters.get(PARAM_MAX_VALUE) {
        parts.push(format!("size <= {:.2} mm", max));
    }
    if let Some(target) = parameters.get(PARAM_TARGET_VALUE) {
        parts.push(format!("size ~ {:.2} mm", target));
    }
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use nlmesh_nlq::QueryParser;

    use super::*;

    #[test]
    fn example_queries_match_the_parser() {
        let parser = QueryParser::new();
        for example in example_queries() {
            let parsed = parser.parse(example.query);
            assert_eq!(parsed.intent, example.intent, "intent of {}", example.query);
            assert_eq!(
                parsed.query_type, example.query_type,
                "query type of {}",
                example.query
            );
            assert!(parsed.is_valid, "{} should be valid", example.query);
        }
    }

    #[test]
    fn measurement_is_rounded() {
        let text = measurement_result(1234.5678, "mm³", "Volume");
        assert!(text.contains("**Volume**: 1234.57 mm³"));
    }

    #[test]
    fn feature_counts_per_type() {
        let features = vec![
            DetectedFeature::new(GeometricEntity::Plane, Some(1.0), vec![0, 1]),
            DetectedFeature::new(GeometricEntity::Hole, Some(2.0), vec![4, 5, 6]),
            DetectedFeature::new(GeometricEntity::Plane, Some(1.0), vec![2, 3]),
        ];
        let text = feature_detection_result(&features);
        assert!(text.contains("- **hole**: 1\n- **plane**: 2\n"));
        assert!(feature_detection_result(&[]).contains("No distinct geometric features"));
    }

    #[test]
    fn topology_lists_issues() {
        let report = TopologyReport {
            is_manifold: true,
            has_self_intersections: false,
            is_watertight: false,
            issues: vec!["4 boundary edges".to_string()],
        };
        let text = topology_check_result(&report);
        assert!(text.starts_with("**Topology check result** (OK)"));
        assert!(text.contains("- **Watertight**: failed"));
        assert!(text.contains("- 4 boundary edges"));
    }

    #[test]
    fn selection_with_and_without_criteria() {
        assert_eq!(
            selection_result(3, "hole", ""),
            "**Selection result**\n\nSelected **3** hole"
        );
        let mut parameters = BTreeMap::new();
        parameters.insert(PARAM_MIN_VALUE.to_string(), 10.0);
        assert_eq!(describe_criteria(&parameters), "size >= 10.00 mm");
        assert!(selection_result(1, "hole", &describe_criteria(&parameters))
            .ends_with(", criteria: size >= 10.00 mm"));
    }

    #[test]
    fn error_with_suggestion() {
        let text = error_response(ErrorKind::StateConflict, "stale", Some("retry"));
        assert_eq!(text, "**Error**: StateConflict\n\nstale\n\n**Suggestion**: retry");
        assert_eq!(
            error_response(ErrorKind::AnalysisError, "boom", None),
            "**Error**: AnalysisError\n\nboom"
        );
    }
}
