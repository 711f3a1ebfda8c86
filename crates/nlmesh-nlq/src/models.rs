use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Parameter key set by "greater than" and range constraints.
pub const PARAM_MIN_VALUE: &str = "min_value";
/// Parameter key set by "less than" and range constraints.
pub const PARAM_MAX_VALUE: &str = "max_value";
/// Parameter key set by bare measurements and "equal to" constraints.
pub const PARAM_TARGET_VALUE: &str = "target_value";

/// High-level purpose of a query.
///
/// Declaration order is significant: classification ties resolve to the
/// earlier variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Query,
    Operation,
    Modification,
}

impl Intent {
    pub const ALL: [Intent; 3] = [Intent::Query, Intent::Operation, Intent::Modification];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Query => "query",
            Intent::Operation => "operation",
            Intent::Modification => "modification",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of analysis requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    Measurement,
    FeatureDetection,
    TopologyCheck,
    Selection,
    Modification,
}

impl QueryType {
    /// Types the classifier scores, in tie-break order.
    pub const CLASSIFIABLE: [QueryType; 4] = [
        QueryType::Measurement,
        QueryType::FeatureDetection,
        QueryType::TopologyCheck,
        QueryType::Selection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Measurement => "measurement",
            QueryType::FeatureDetection => "feature_detection",
            QueryType::TopologyCheck => "topology_check",
            QueryType::Selection => "selection",
            QueryType::Modification => "modification",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mesh-level concept a query can mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometricEntity {
    Vertex,
    Edge,
    Face,
    Hole,
    Cylinder,
    Plane,
    Sphere,
}

impl GeometricEntity {
    pub const ALL: [GeometricEntity; 7] = [
        GeometricEntity::Vertex,
        GeometricEntity::Edge,
        GeometricEntity::Face,
        GeometricEntity::Hole,
        GeometricEntity::Cylinder,
        GeometricEntity::Plane,
        GeometricEntity::Sphere,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GeometricEntity::Vertex => "vertex",
            GeometricEntity::Edge => "edge",
            GeometricEntity::Face => "face",
            GeometricEntity::Hole => "hole",
            GeometricEntity::Cylinder => "cylinder",
            GeometricEntity::Plane => "plane",
            GeometricEntity::Sphere => "sphere",
        }
    }
}

impl fmt::Display for GeometricEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One keyword hit in the query text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub entity_type: GeometricEntity,
    pub matched_keyword: String,
    /// Character offset of the keyword's first occurrence.
    pub text_offset: usize,
}

/// Pattern family a raw constraint match came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintFamily {
    /// Comparison word, number, optional unit.
    Comparison,
    /// Low bound, high bound, optional unit.
    Range,
    /// Number followed by a unit.
    Bare,
}

/// Which bound a comparison word expresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintRole {
    Min,
    Max,
    Target,
}

impl ConstraintRole {
    pub fn parameter_key(&self) -> &'static str {
        match self {
            ConstraintRole::Min => PARAM_MIN_VALUE,
            ConstraintRole::Max => PARAM_MAX_VALUE,
            ConstraintRole::Target => PARAM_TARGET_VALUE,
        }
    }
}

/// Uninterpreted constraint match; the parser decides what it means.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawConstraintMatch {
    pub family: ConstraintFamily,
    pub matched_text: String,
    /// Captured groups in pattern order; optional groups may be absent.
    pub groups: Vec<Option<String>>,
}

impl RawConstraintMatch {
    pub fn group(&self, index: usize) -> Option<&str> {
        self.groups.get(index).and_then(|group| group.as_deref())
    }
}

/// Structured, validated form of a free-form request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedQuery {
    pub original_text: String,
    pub intent: Intent,
    pub query_type: QueryType,
    pub entities: Vec<Entity>,
    pub parameters: BTreeMap<String, f64>,
    pub is_valid: bool,
}

impl ParsedQuery {
    pub fn min_value(&self) -> Option<f64> {
        self.parameters.get(PARAM_MIN_VALUE).copied()
    }

    pub fn max_value(&self) -> Option<f64> {
        self.parameters.get(PARAM_MAX_VALUE).copied()
    }

    pub fn target_value(&self) -> Option<f64> {
        self.parameters.get(PARAM_TARGET_VALUE).copied()
    }

    /// Distinct entity types in order of first mention.
    pub fn entity_types(&self) -> Vec<GeometricEntity> {
        let mut types = Vec::new();
        for entity in &self.entities {
            if !types.contains(&entity.entity_type) {
                types.push(entity.entity_type);
            }
        }
        types
    }

    /// The earliest mentioned entity, if any.
    pub fn primary_entity(&self) -> Option<GeometricEntity> {
        self.entities.first().map(|entity| entity.entity_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_wire_names_are_snake_case() {
        assert_eq!(
            serde_json::to_string(&QueryType::FeatureDetection).unwrap(),
            "\"feature_detection\""
        );
        assert_eq!(serde_json::to_string(&Intent::Operation).unwrap(), "\"operation\"");
        assert_eq!(serde_json::to_string(&GeometricEntity::Hole).unwrap(), "\"hole\"");
    }

    #[test]
    fn entity_types_are_distinct_in_mention_order() {
        let entity = |entity_type, offset| Entity {
            entity_type,
            matched_keyword: String::new(),
            text_offset: offset,
        };
        let query = ParsedQuery {
            original_text: String::new(),
            intent: Intent::Operation,
            query_type: QueryType::Selection,
            entities: vec![
                entity(GeometricEntity::Face, 1),
                entity(GeometricEntity::Hole, 2),
                entity(GeometricEntity::Face, 3),
            ],
            parameters: BTreeMap::new(),
            is_valid: true,
        };
        assert_eq!(
            query.entity_types(),
            vec![GeometricEntity::Face, GeometricEntity::Hole]
        );
        assert_eq!(query.primary_entity(), Some(GeometricEntity::Face));
    }
}
