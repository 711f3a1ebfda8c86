//! Geometry kernels over indexed triangle data.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::models::BoundingBox;

const NORMAL_TOLERANCE: f64 = 1e-6;
const EPSILON: f64 = 1e-9;

pub type Point = [f64; 3];
pub type Face = [usize; 3];

pub fn sub(a: Point, b: Point) -> Point {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub fn dot(a: Point, b: Point) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn cross(a: Point, b: Point) -> Point {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub fn length(v: Point) -> f64 {
    dot(v, v).sqrt()
}

pub fn distance(a: Point, b: Point) -> f64 {
    length(sub(a, b))
}

pub fn triangle_area(a: Point, b: Point, c: Point) -> f64 {
    0.5 * length(cross(sub(b, a), sub(c, a)))
}

fn corners(vertices: &[Point], face: &Face) -> (Point, Point, Point) {
    (vertices[face[0]], vertices[face[1]], vertices[face[2]])
}

/// Unit normal, or `None` for a degenerate triangle.
pub fn face_normal(vertices: &[Point], face: &Face) -> Option<Point> {
    let (a, b, c) = corners(vertices, face);
    let n = cross(sub(b, a), sub(c, a));
    let len = length(n);
    if len <= EPSILON {
        return None;
    }
    Some([n[0] / len, n[1] / len, n[2] / len])
}

/// Enclosed volume by summing signed tetrahedra against the origin.
pub fn volume(vertices: &[Point], faces: &[Face]) -> f64 {
    faces
        .iter()
        .map(|face| {
            let (a, b, c) = corners(vertices, face);
            dot(a, cross(b, c)) / 6.0
        })
        .sum::<f64>()
        .abs()
}

pub fn surface_area(vertices: &[Point], faces: &[Face]) -> f64 {
    faces
        .iter()
        .map(|face| {
            let (a, b, c) = corners(vertices, face);
            triangle_area(a, b, c)
        })
        .sum()
}

pub fn ordered_edge(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

fn face_edges(face: &Face) -> [(usize, usize); 3] {
    [
        ordered_edge(face[0], face[1]),
        ordered_edge(face[1], face[2]),
        ordered_edge(face[2], face[0]),
    ]
}

/// Number of faces using each undirected edge.
pub fn edge_counts(faces: &[Face]) -> BTreeMap<(usize, usize), usize> {
    let mut counts = BTreeMap::new();
    for face in faces {
        for edge in face_edges(face) {
            *counts.entry(edge).or_insert(0) += 1;
        }
    }
    counts
}

/// Faces using each undirected edge.
fn edge_faces(faces: &[Face]) -> BTreeMap<(usize, usize), Vec<usize>> {
    let mut map: BTreeMap<(usize, usize), Vec<usize>> = BTreeMap::new();
    for (index, face) in faces.iter().enumerate() {
        for edge in face_edges(face) {
            map.entry(edge).or_default().push(index);
        }
    }
    map
}

/// Every edge is shared by exactly two faces.
pub fn is_watertight(faces: &[Face]) -> bool {
    !faces.is_empty() && edge_counts(faces).values().all(|count| *count == 2)
}

/// No edge is shared by more than two faces.
pub fn is_edge_manifold(faces: &[Face]) -> bool {
    edge_counts(faces).values().all(|count| *count <= 2)
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, mut node: usize) -> usize {
        while self.parent[node] != node {
            self.parent[node] = self.parent[self.parent[node]];
            node = self.parent[node];
        }
        node
    }

    fn union(&mut self, a: usize, b: usize) {
        let (root_a, root_b) = (self.find(a), self.find(b));
        if root_a != root_b {
            self.parent[root_b] = root_a;
        }
    }
}

/// Vertex sets of connected groups of boundary edges (edges used once).
pub fn boundary_loops(vertex_count: usize, faces: &[Face]) -> Vec<Vec<usize>> {
    let boundary: Vec<(usize, usize)> = edge_counts(faces)
        .into_iter()
        .filter(|(_, count)| *count == 1)
        .map(|(edge, _)| edge)
        .collect();

    let mut sets = DisjointSet::new(vertex_count);
    for (a, b) in &boundary {
        sets.union(*a, *b);
    }

    let mut loops: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
    for (a, b) in &boundary {
        let root = sets.find(*a);
        let members = loops.entry(root).or_default();
        members.insert(*a);
        members.insert(*b);
    }

    loops
        .into_values()
        .map(|members| members.into_iter().collect())
        .collect()
}

/// Largest distance between any two of the given vertices.
pub fn diameter(vertices: &[Point], indices: &[usize]) -> f64 {
    let mut widest: f64 = 0.0;
    for (position, a) in indices.iter().enumerate() {
        for b in &indices[position + 1..] {
            widest = widest.max(distance(vertices[*a], vertices[*b]));
        }
    }
    widest
}

/// Groups of edge-connected faces that share one plane.
pub fn planar_groups(vertices: &[Point], faces: &[Face]) -> Vec<Vec<usize>> {
    let adjacency = edge_faces(faces);
    let normals: Vec<Option<Point>> = faces.iter().map(|f| face_normal(vertices, f)).collect();
    let mut visited = vec![false; faces.len()];
    let mut groups = Vec::new();

    for seed in 0..faces.len() {
        if visited[seed] {
            continue;
        }
        visited[seed] = true;
        let Some(normal) = normals[seed] else {
            continue;
        };
        let offset = dot(normal, vertices[faces[seed][0]]);

        let mut group = vec![seed];
        let mut queue = VecDeque::from([seed]);
        while let Some(current) = queue.pop_front() {
            for edge in face_edges(&faces[current]) {
                let Some(neighbours) = adjacency.get(&edge) else {
                    continue;
                };
                for &next in neighbours {
                    if visited[next] {
                        continue;
                    }
                    let coplanar = normals[next].is_some_and(|candidate| {
                        dot(candidate, normal) >= 1.0 - NORMAL_TOLERANCE
                            && (dot(normal, vertices[faces[next][0]]) - offset).abs()
                                <= NORMAL_TOLERANCE.max(offset.abs() * NORMAL_TOLERANCE)
                    });
                    if coplanar {
                        visited[next] = true;
                        group.push(next);
                        queue.push_back(next);
                    }
                }
            }
        }
        group.sort_unstable();
        groups.push(group);
    }

    groups
}

/// Number of connected vertex components, counting unreferenced vertices.
pub fn connected_components(vertex_count: usize, faces: &[Face]) -> usize {
    let mut sets = DisjointSet::new(vertex_count);
    for face in faces {
        sets.union(face[0], face[1]);
        sets.union(face[1], face[2]);
    }
    (0..vertex_count)
        .filter(|node| sets.find(*node) == *node)
        .count()
}

fn face_bounds(vertices: &[Point], face: &Face) -> BoundingBox {
    let (a, b, c) = corners(vertices, face);
    BoundingBox::from_points([a, b, c].iter()).unwrap_or_default()
}

fn bounds_overlap(a: &BoundingBox, b: &BoundingBox) -> bool {
    (0..3).all(|axis| a.min[axis] <= b.max[axis] + EPSILON && b.min[axis] <= a.max[axis] + EPSILON)
}

/// Möller-Trumbore against a finite segment `p -> q`.
fn segment_hits_triangle(p: Point, q: Point, v0: Point, v1: Point, v2: Point) -> bool {
    let direction = sub(q, p);
    let edge1 = sub(v1, v0);
    let edge2 = sub(v2, v0);
    let pvec = cross(direction, edge2);
    let det = dot(edge1, pvec);
    if det.abs() <= EPSILON {
        return false;
    }
    let inv_det = 1.0 / det;

    let tvec = sub(p, v0);
    let u = dot(tvec, pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return false;
    }

    let qvec = cross(tvec, edge1);
    let v = dot(direction, qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return false;
    }

    let t = dot(edge2, qvec) * inv_det;
    (0.0..=1.0).contains(&t)
}

fn triangles_intersect(vertices: &[Point], first: &Face, second: &Face) -> bool {
    let (a0, a1, a2) = corners(vertices, first);
    let (b0, b1, b2) = corners(vertices, second);
    let first_edges = [(a0, a1), (a1, a2), (a2, a0)];
    let second_edges = [(b0, b1), (b1, b2), (b2, b0)];
    first_edges
        .iter()
        .any(|(p, q)| segment_hits_triangle(*p, *q, b0, b1, b2))
        || second_edges
            .iter()
            .any(|(p, q)| segment_hits_triangle(*p, *q, a0, a1, a2))
}

/// Pairs of faces that share no vertex yet intersect. Quadratic in the face count.
pub fn self_intersecting_pairs(vertices: &[Point], faces: &[Face]) -> Vec<(usize, usize)> {
    let bounds: Vec<BoundingBox> = faces.iter().map(|f| face_bounds(vertices, f)).collect();
    let mut pairs = Vec::new();

    for i in 0..faces.len() {
        for j in (i + 1)..faces.len() {
            if faces[i].iter().any(|v| faces[j].contains(v)) {
                continue;
            }
            if !bounds_overlap(&bounds[i], &bounds[j]) {
                continue;
            }
            if triangles_intersect(vertices, &faces[i], &faces[j]) {
                pairs.push((i, j));
            }
        }
    }

    pairs
}
