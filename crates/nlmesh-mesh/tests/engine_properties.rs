use nlmesh_mesh::{MeshEngine, TriangleMesh, TriangleMeshEngine};
use proptest::prelude::*;

fn translated(mesh: &TriangleMesh, offset: [f64; 3]) -> TriangleMesh {
    let vertices = mesh
        .vertices()
        .iter()
        .map(|p| [p[0] + offset[0], p[1] + offset[1], p[2] + offset[2]])
        .collect();
    TriangleMesh::new(vertices, mesh.faces().to_vec()).unwrap()
}

proptest! {
    #[test]
    fn cuboid_measurements_match_dimensions(
        x in 0.1f64..500.0,
        y in 0.1f64..500.0,
        z in 0.1f64..500.0,
    ) {
        let engine = TriangleMeshEngine::new();
        let handle = engine.insert(TriangleMesh::cuboid([x, y, z]));

        let volume = engine.volume(&handle).unwrap();
        let area = engine.surface_area(&handle).unwrap();
        prop_assert!((volume - x * y * z).abs() <= 1e-6 * (x * y * z).max(1.0));
        let expected_area = 2.0 * (x * y + y * z + x * z);
        prop_assert!((area - expected_area).abs() <= 1e-6 * expected_area.max(1.0));

        let summary = engine.load_summary(&handle).unwrap();
        prop_assert_eq!(summary.bounding_box.extents(), [x, y, z]);
    }

    #[test]
    fn volume_is_translation_invariant(
        size in prop::array::uniform3(0.5f64..50.0),
        offset in prop::array::uniform3(-100.0f64..100.0),
    ) {
        let engine = TriangleMeshEngine::new();
        let base = TriangleMesh::cuboid(size);
        let origin = engine.insert(base.clone());
        let moved = engine.insert(translated(&base, offset));

        let a = engine.volume(&origin).unwrap();
        let b = engine.volume(&moved).unwrap();
        prop_assert!((a - b).abs() <= 1e-6 * a.max(1.0));
    }

    #[test]
    fn removing_any_face_opens_the_cuboid(face in 0usize..12) {
        let engine = TriangleMeshEngine::new();
        let handle = engine.insert(TriangleMesh::cuboid([2.0, 2.0, 2.0]).without_faces(&[face]));
        let report = engine.topology(&handle).unwrap();
        prop_assert!(report.is_manifold);
        prop_assert!(!report.is_watertight);
        prop_assert!(!report.is_clean());
    }
}
