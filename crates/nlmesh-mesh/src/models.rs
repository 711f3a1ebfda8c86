use std::collections::BTreeMap;
use std::fmt;

use nlmesh_nlq::GeometricEntity;
use serde::{Deserialize, Serialize};

/// Opaque reference to a mesh owned by an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeshHandle(uuid::Uuid);

impl MeshHandle {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> std::result::Result<Self, uuid::Error> {
        Ok(Self(uuid::Uuid::parse_str(s)?))
    }
}

impl fmt::Display for MeshHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for MeshHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Axis-aligned bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl BoundingBox {
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a [f64; 3]>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let mut bounds = Self {
            min: *first,
            max: *first,
        };
        for point in points {
            for axis in 0..3 {
                bounds.min[axis] = bounds.min[axis].min(point[axis]);
                bounds.max[axis] = bounds.max[axis].max(point[axis]);
            }
        }
        Some(bounds)
    }

    /// `[min_x, min_y, min_z, max_x, max_y, max_z]`
    pub fn to_array(&self) -> [f64; 6] {
        [
            self.min[0],
            self.min[1],
            self.min[2],
            self.max[0],
            self.max[1],
            self.max[2],
        ]
    }

    pub fn extents(&self) -> [f64; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    pub fn largest_extent(&self) -> f64 {
        self.extents().into_iter().fold(0.0, f64::max)
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            min: [0.0; 3],
            max: [0.0; 3],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshSummary {
    pub vertex_count: usize,
    pub face_count: usize,
    pub bounding_box: BoundingBox,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyReport {
    pub is_manifold: bool,
    pub has_self_intersections: bool,
    pub is_watertight: bool,
    #[serde(default)]
    pub issues: Vec<String>,
}

impl TopologyReport {
    pub fn is_clean(&self) -> bool {
        self.is_manifold && self.is_watertight && !self.has_self_intersections
    }
}

/// A geometric feature found on a mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedFeature {
    pub entity_type: GeometricEntity,
    /// Characteristic size in millimeters (hole diameter, plane extent, ...).
    pub size: Option<f64>,
    /// Vertex or face indices, depending on the feature kind.
    pub indices: Vec<usize>,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl DetectedFeature {
    pub fn new(entity_type: GeometricEntity, size: Option<f64>, indices: Vec<usize>) -> Self {
        Self {
            entity_type,
            size,
            indices,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityReport {
    pub connected_components: usize,
    pub edge_count: usize,
    pub vertex_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_from_points() {
        let points = [[1.0, -2.0, 3.0], [-1.0, 4.0, 0.5]];
        let bounds = BoundingBox::from_points(points.iter()).unwrap();
        assert_eq!(bounds.to_array(), [-1.0, -2.0, 0.5, 1.0, 4.0, 3.0]);
        assert_eq!(bounds.largest_extent(), 6.0);
        assert!(BoundingBox::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn handle_round_trips_through_string() {
        let handle = MeshHandle::new();
        let parsed = MeshHandle::from_string(&handle.to_string()).unwrap();
        assert_eq!(handle, parsed);
    }
}
