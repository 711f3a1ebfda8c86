//! In-memory engine over indexed triangle meshes.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use nlmesh_nlq::GeometricEntity;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::{
    engine::MeshEngine,
    error::{EngineError, Result},
    geometry::{self, Face, Point},
    models::{
        BoundingBox, ConnectivityReport, DetectedFeature, MeshHandle, MeshSummary, TopologyReport,
    },
};

/// Face count above which the pairwise self-intersection test is skipped.
pub const DEFAULT_SELF_INTERSECTION_FACE_LIMIT: usize = 2000;

/// Vertex positions in millimeters plus triangles indexing into them.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangleMesh {
    vertices: Vec<Point>,
    faces: Vec<Face>,
}

impl TriangleMesh {
    pub fn new(vertices: Vec<Point>, faces: Vec<Face>) -> Result<Self> {
        if let Some((index, face)) = faces
            .iter()
            .enumerate()
            .find(|(_, face)| face.iter().any(|v| *v >= vertices.len()))
        {
            return Err(EngineError::InvalidMesh(format!(
                "face {} references vertex {:?} but the mesh has {} vertices",
                index,
                face,
                vertices.len()
            )));
        }
        if let Some(point) = vertices.iter().find(|p| p.iter().any(|c| !c.is_finite())) {
            return Err(EngineError::InvalidMesh(format!(
                "non-finite vertex coordinate {:?}",
                point
            )));
        }
        Ok(Self { vertices, faces })
    }

    /// Closed axis-aligned box with one corner at the origin.
    pub fn cuboid(size: [f64; 3]) -> Self {
        let [x, y, z] = size;
        let vertices = vec![
            [0.0, 0.0, 0.0],
            [x, 0.0, 0.0],
            [x, y, 0.0],
            [0.0, y, 0.0],
            [0.0, 0.0, z],
            [x, 0.0, z],
            [x, y, z],
            [0.0, y, z],
        ];
        let faces = vec![
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [1, 2, 6],
            [1, 6, 5],
            [2, 3, 7],
            [2, 7, 6],
            [3, 0, 4],
            [3, 4, 7],
        ];
        Self { vertices, faces }
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(self.vertices.iter()).unwrap_or_default()
    }

    /// Drops the given faces, keeping vertices untouched.
    pub fn without_faces(&self, removed: &[usize]) -> Self {
        let removed: BTreeSet<usize> = removed.iter().copied().collect();
        let faces = self
            .faces
            .iter()
            .enumerate()
            .filter(|(index, _)| !removed.contains(index))
            .map(|(_, face)| *face)
            .collect();
        Self {
            vertices: self.vertices.clone(),
            faces,
        }
    }
}

/// Thread-safe store of triangle meshes keyed by handle.
#[derive(Debug)]
pub struct TriangleMeshEngine {
    meshes: RwLock<HashMap<MeshHandle, Arc<TriangleMesh>>>,
    self_intersection_face_limit: usize,
}

impl TriangleMeshEngine {
    pub fn new() -> Self {
        Self::with_face_limit(DEFAULT_SELF_INTERSECTION_FACE_LIMIT)
    }

    pub fn with_face_limit(self_intersection_face_limit: usize) -> Self {
        Self {
            meshes: RwLock::new(HashMap::new()),
            self_intersection_face_limit,
        }
    }

    pub fn insert(&self, mesh: TriangleMesh) -> MeshHandle {
        let handle = MeshHandle::new();
        self.meshes.write().insert(handle, Arc::new(mesh));
        debug!(%handle, "mesh loaded");
        handle
    }

    pub fn remove(&self, handle: &MeshHandle) -> Option<Arc<TriangleMesh>> {
        self.meshes.write().remove(handle)
    }

    pub fn get(&self, handle: &MeshHandle) -> Result<Arc<TriangleMesh>> {
        self.meshes
            .read()
            .get(handle)
            .cloned()
            .ok_or(EngineError::UnknownHandle(*handle))
    }

    pub fn len(&self) -> usize {
        self.meshes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.read().is_empty()
    }

    fn holes(mesh: &TriangleMesh) -> Vec<DetectedFeature> {
        geometry::boundary_loops(mesh.vertices.len(), &mesh.faces)
            .into_iter()
            .map(|members| {
                let diameter = geometry::diameter(&mesh.vertices, &members);
                let perimeter = boundary_perimeter(mesh, &members);
                let vertex_count = members.len();
                DetectedFeature::new(GeometricEntity::Hole, Some(diameter), members)
                    .with_property("perimeter", perimeter)
                    .with_property("vertex_count", vertex_count)
            })
            .collect()
    }

    fn planes(mesh: &TriangleMesh) -> Vec<DetectedFeature> {
        geometry::planar_groups(&mesh.vertices, &mesh.faces)
            .into_iter()
            .filter(|group| group.len() >= 2)
            .filter_map(|group| {
                let normal = geometry::face_normal(&mesh.vertices, &mesh.faces[group[0]])?;
                let corners: BTreeSet<usize> =
                    group.iter().flat_map(|f| mesh.faces[*f]).collect();
                let extent = BoundingBox::from_points(corners.iter().map(|v| &mesh.vertices[*v]))
                    .map(|bounds| bounds.largest_extent())
                    .unwrap_or_default();
                let faces: Vec<Face> = group.iter().map(|f| mesh.faces[*f]).collect();
                let area = geometry::surface_area(&mesh.vertices, &faces);
                Some(
                    DetectedFeature::new(GeometricEntity::Plane, Some(extent), group)
                        .with_property("normal", normal.to_vec())
                        .with_property("area", area),
                )
            })
            .collect()
    }
}

impl Default for TriangleMeshEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn boundary_perimeter(mesh: &TriangleMesh, members: &[usize]) -> f64 {
    geometry::edge_counts(&mesh.faces)
        .into_iter()
        .filter(|((a, b), count)| {
            *count == 1 && members.binary_search(a).is_ok() && members.binary_search(b).is_ok()
        })
        .map(|((a, b), _)| geometry::distance(mesh.vertices[a], mesh.vertices[b]))
        .sum()
}

impl MeshEngine for TriangleMeshEngine {
    fn load_summary(&self, handle: &MeshHandle) -> Result<MeshSummary> {
        let mesh = self.get(handle)?;
        Ok(MeshSummary {
            vertex_count: mesh.vertices.len(),
            face_count: mesh.faces.len(),
            bounding_box: mesh.bounding_box(),
        })
    }

    fn volume(&self, handle: &MeshHandle) -> Result<f64> {
        let mesh = self.get(handle)?;
        if !geometry::is_watertight(&mesh.faces) {
            warn!(%handle, "volume of an open mesh is approximate");
        }
        Ok(geometry::volume(&mesh.vertices, &mesh.faces))
    }

    fn surface_area(&self, handle: &MeshHandle) -> Result<f64> {
        let mesh = self.get(handle)?;
        Ok(geometry::surface_area(&mesh.vertices, &mesh.faces))
    }

    fn topology(&self, handle: &MeshHandle) -> Result<TopologyReport> {
        let mesh = self.get(handle)?;
        let counts = geometry::edge_counts(&mesh.faces);
        let mut issues = Vec::new();

        let non_manifold = counts.values().filter(|count| **count > 2).count();
        let boundary = counts.values().filter(|count| **count == 1).count();
        if non_manifold > 0 {
            issues.push(format!("{} non-manifold edges", non_manifold));
        }
        if boundary > 0 {
            issues.push(format!("{} boundary edges", boundary));
        }
        if mesh.faces.is_empty() {
            issues.push("mesh has no faces".to_string());
        }

        let has_self_intersections = if mesh.faces.len() > self.self_intersection_face_limit {
            issues.push(format!(
                "self-intersection check skipped for {} faces",
                mesh.faces.len()
            ));
            false
        } else {
            let pairs = geometry::self_intersecting_pairs(&mesh.vertices, &mesh.faces);
            if !pairs.is_empty() {
                issues.push(format!("{} intersecting face pairs", pairs.len()));
            }
            !pairs.is_empty()
        };

        Ok(TopologyReport {
            is_manifold: non_manifold == 0,
            has_self_intersections,
            is_watertight: !mesh.faces.is_empty() && boundary == 0 && non_manifold == 0,
            issues,
        })
    }

    fn detect_features(&self, handle: &MeshHandle) -> Result<Vec<DetectedFeature>> {
        let mesh = self.get(handle)?;
        let mut features = Self::holes(&mesh);
        features.extend(Self::planes(&mesh));
        debug!(%handle, features = features.len(), "features detected");
        Ok(features)
    }

    fn connectivity(&self, handle: &MeshHandle) -> Result<ConnectivityReport> {
        let mesh = self.get(handle)?;
        Ok(ConnectivityReport {
            connected_components: geometry::connected_components(
                mesh.vertices.len(),
                &mesh.faces,
            ),
            edge_count: geometry::edge_counts(&mesh.faces).len(),
            vertex_count: mesh.vertices.len(),
        })
    }

    fn unload(&self, handle: &MeshHandle) -> bool {
        self.remove(handle).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_indices() {
        let result = TriangleMesh::new(vec![[0.0; 3]; 2], vec![[0, 1, 2]]);
        assert!(matches!(result, Err(EngineError::InvalidMesh(_))));
    }

    #[test]
    fn rejects_non_finite_vertices() {
        let result = TriangleMesh::new(vec![[f64::NAN, 0.0, 0.0]], vec![]);
        assert!(matches!(result, Err(EngineError::InvalidMesh(_))));
    }

    #[test]
    fn summary_of_cuboid() {
        let engine = TriangleMeshEngine::new();
        let handle = engine.insert(TriangleMesh::cuboid([10.0, 20.0, 30.0]));
        let summary = engine.load_summary(&handle).unwrap();
        assert_eq!(summary.vertex_count, 8);
        assert_eq!(summary.face_count, 12);
        assert_eq!(
            summary.bounding_box.to_array(),
            [0.0, 0.0, 0.0, 10.0, 20.0, 30.0]
        );
        assert!((engine.volume(&handle).unwrap() - 6000.0).abs() < 1e-9);
        assert!((engine.surface_area(&handle).unwrap() - 2200.0).abs() < 1e-9);
    }

    #[test]
    fn closed_cuboid_is_clean() {
        let engine = TriangleMeshEngine::new();
        let handle = engine.insert(TriangleMesh::cuboid([1.0, 1.0, 1.0]));
        let report = engine.topology(&handle).unwrap();
        assert!(report.is_clean());
        assert!(report.issues.is_empty());
    }

    #[test]
    fn open_box_reports_boundary_and_hole() {
        let engine = TriangleMeshEngine::new();
        let open = TriangleMesh::cuboid([4.0, 3.0, 2.0]).without_faces(&[2, 3]);
        let handle = engine.insert(open);

        let report = engine.topology(&handle).unwrap();
        assert!(report.is_manifold);
        assert!(!report.is_watertight);
        assert_eq!(report.issues, vec!["4 boundary edges".to_string()]);

        let features = engine.detect_features(&handle).unwrap();
        let holes: Vec<_> = features
            .iter()
            .filter(|f| f.entity_type == GeometricEntity::Hole)
            .collect();
        assert_eq!(holes.len(), 1);
        assert_eq!(holes[0].indices, vec![4, 5, 6, 7]);
        assert!((holes[0].size.unwrap() - 5.0).abs() < 1e-9);
        assert_eq!(holes[0].properties["vertex_count"], serde_json::json!(4));
        assert_eq!(holes[0].properties["perimeter"], serde_json::json!(14.0));
    }

    #[test]
    fn cuboid_has_six_planes() {
        let engine = TriangleMeshEngine::new();
        let handle = engine.insert(TriangleMesh::cuboid([1.0, 2.0, 3.0]));
        let planes: Vec<_> = engine
            .detect_features(&handle)
            .unwrap()
            .into_iter()
            .filter(|f| f.entity_type == GeometricEntity::Plane)
            .collect();
        assert_eq!(planes.len(), 6);
        let largest = planes.iter().filter_map(|p| p.size).fold(0.0, f64::max);
        assert_eq!(largest, 3.0);
    }

    #[test]
    fn face_limit_skips_intersection_check() {
        let engine = TriangleMeshEngine::with_face_limit(4);
        let handle = engine.insert(TriangleMesh::cuboid([1.0, 1.0, 1.0]));
        let report = engine.topology(&handle).unwrap();
        assert!(!report.has_self_intersections);
        assert_eq!(
            report.issues,
            vec!["self-intersection check skipped for 12 faces".to_string()]
        );
    }

    #[test]
    fn connectivity_counts_components() {
        let engine = TriangleMeshEngine::new();
        let handle = engine.insert(TriangleMesh::cuboid([1.0, 1.0, 1.0]));
        let report = engine.connectivity(&handle).unwrap();
        assert_eq!(report.connected_components, 1);
        assert_eq!(report.edge_count, 18);
        assert_eq!(report.vertex_count, 8);
    }

    #[test]
    fn unknown_handle_is_an_error() {
        let engine = TriangleMeshEngine::new();
        let handle = MeshHandle::new();
        assert_eq!(
            engine.volume(&handle),
            Err(EngineError::UnknownHandle(handle))
        );
    }

    #[test]
    fn removed_mesh_is_gone() {
        let engine = TriangleMeshEngine::new();
        let handle = engine.insert(TriangleMesh::cuboid([1.0, 1.0, 1.0]));
        assert_eq!(engine.len(), 1);
        assert!(engine.remove(&handle).is_some());
        assert!(engine.is_empty());
        assert!(engine.get(&handle).is_err());
    }
}
