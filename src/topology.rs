//! Topology analysis and constraint synthesis for smoothing (spec §4.4).
//!
//! Builds an edge map once per mesh, classifies edges as manifold
//! (shared by exactly two triangles) or boundary (shared by one), and
//! turns that into a locked/limited vertex set a smoothing pass can
//! apply without collapsing holes, tunnels, or thin bridges.

use std::collections::{HashMap, HashSet};

use glam::Vec3;

use crate::mesh::Mesh;

/// A topological feature worth preserving through smoothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureKind {
    Hole,
    Loop,
    Bridge,
}

#[derive(Debug, Clone)]
pub struct TopologicalFeature {
    pub kind: FeatureKind,
    pub vertices: Vec<u32>,
    /// 0..1 preservation priority; holes and bridges are weighted
    /// highest since collapsing either changes genus visibly.
    pub importance: f32,
}

/// Output of [`TopologyPreserver::generate_constraints`]: the vertex
/// sets and movement budget a smoothing pass must respect.
#[derive(Debug, Clone, Default)]
pub struct TopologyConstraints {
    pub locked_vertices: HashSet<u32>,
    pub limited_vertices: HashSet<u32>,
    pub max_movement_distance: f32,
}

impl TopologyConstraints {
    pub fn unconstrained() -> Self {
        Self {
            locked_vertices: HashSet::new(),
            limited_vertices: HashSet::new(),
            max_movement_distance: 0.1,
        }
    }

    pub fn is_locked(&self, vertex: u32) -> bool {
        self.locked_vertices.contains(&vertex)
    }

    /// Clamp a proposed movement to the constraint for this vertex:
    /// unmoved if locked, capped at `max_movement_distance` if
    /// limited, otherwise passed through unchanged.
    pub fn constrain_movement(&self, vertex: u32, old: Vec3, proposed: Vec3) -> Vec3 {
        if self.locked_vertices.contains(&vertex) {
            return old;
        }
        if self.limited_vertices.contains(&vertex) {
            let delta = proposed - old;
            let len = delta.length();
            if len > self.max_movement_distance && len > 1e-8 {
                return old + delta * (self.max_movement_distance / len);
            }
        }
        proposed
    }
}

struct EdgeInfo {
    faces: u32,
}

fn edge_key(a: u32, b: u32) -> (u32, u32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn build_edge_map(mesh: &Mesh) -> HashMap<(u32, u32), EdgeInfo> {
    let mut map: HashMap<(u32, u32), EdgeInfo> = HashMap::new();
    for tri in mesh.indices.chunks_exact(3) {
        let (a, b, c) = (tri[0], tri[1], tri[2]);
        for (v0, v1) in [(a, b), (b, c), (c, a)] {
            map.entry(edge_key(v0, v1))
                .or_insert(EdgeInfo { faces: 0 })
                .faces += 1;
        }
    }
    map
}

fn boundary_edges(edge_map: &HashMap<(u32, u32), EdgeInfo>) -> Vec<(u32, u32)> {
    edge_map
        .iter()
        .filter(|(_, info)| info.faces == 1)
        .map(|(&key, _)| key)
        .collect()
}

/// Walk boundary edges into closed loops by following vertex
/// adjacency; each loop is a hole boundary.
fn trace_boundary_loops(boundary: &[(u32, u32)]) -> Vec<Vec<u32>> {
    let mut adjacency: HashMap<u32, Vec<u32>> = HashMap::new();
    for &(a, b) in boundary {
        adjacency.entry(a).or_default().push(b);
        adjacency.entry(b).or_default().push(a);
    }

    let mut visited_edges: HashSet<(u32, u32)> = HashSet::new();
    let mut loops = Vec::new();

    for &(start_a, start_b) in boundary {
        if visited_edges.contains(&edge_key(start_a, start_b)) {
            continue;
        }
        let mut loop_vertices = vec![start_a];
        let mut prev = start_a;
        let mut current = start_b;
        visited_edges.insert(edge_key(start_a, start_b));

        loop {
            loop_vertices.push(current);
            let next = adjacency
                .get(&current)
                .into_iter()
                .flatten()
                .find(|&&candidate| candidate != prev && !visited_edges.contains(&edge_key(current, candidate)));
            match next {
                Some(&next_vertex) => {
                    visited_edges.insert(edge_key(current, next_vertex));
                    prev = current;
                    current = next_vertex;
                }
                None => break,
            }
            if current == start_a {
                break;
            }
        }
        loops.push(loop_vertices);
    }

    loops
}

/// Analyzes mesh topology to find features worth preserving, and
/// converts that analysis into movement constraints for smoothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopologyPreserver;

impl TopologyPreserver {
    pub fn new() -> Self {
        Self
    }

    /// Euler characteristic `V - E + F`.
    pub fn euler_characteristic(&self, mesh: &Mesh) -> i64 {
        let edge_map = build_edge_map(mesh);
        mesh.vertex_count() as i64 - edge_map.len() as i64 + mesh.triangle_count() as i64
    }

    /// Genus from the closed-surface identity `chi = 2 - 2g`, rounded
    /// toward zero and floored at 0 for meshes with open boundaries
    /// (where the identity does not hold exactly).
    pub fn genus(&self, mesh: &Mesh) -> i64 {
        let chi = self.euler_characteristic(mesh);
        ((2 - chi) / 2).max(0)
    }

    pub fn detect_holes(&self, mesh: &Mesh) -> Vec<TopologicalFeature> {
        let edge_map = build_edge_map(mesh);
        let boundary = boundary_edges(&edge_map);
        if boundary.is_empty() {
            return Vec::new();
        }
        trace_boundary_loops(&boundary)
            .into_iter()
            .map(|vertices| {
                // Larger holes matter more: scale importance by vertex
                // count rather than flagging every hole as critical.
                let importance = (vertices.len() as f32 / 20.0).min(1.0);
                TopologicalFeature {
                    kind: FeatureKind::Hole,
                    vertices,
                    importance,
                }
            })
            .collect()
    }

    /// Thin bridges: vertices whose 1-ring is small relative to the
    /// mesh average, flagged so smoothing doesn't erode them away.
    pub fn detect_bridges(&self, mesh: &Mesh, average_valence: f32) -> Vec<TopologicalFeature> {
        let mut valence: HashMap<u32, u32> = HashMap::new();
        for tri in mesh.indices.chunks_exact(3) {
            for &v in tri {
                *valence.entry(v).or_insert(0) += 1;
            }
        }
        let threshold = (average_valence * 0.4).max(2.0) as u32;
        valence
            .into_iter()
            .filter(|&(_, count)| count <= threshold)
            .map(|(v, _)| TopologicalFeature {
                kind: FeatureKind::Bridge,
                vertices: vec![v],
                importance: 0.6,
            })
            .collect()
    }

    /// A single `Loop` feature spanning every vertex when the mesh has
    /// positive genus. The reference does not localize individual
    /// handles, so one feature stands in for all of them (spec §4.5
    /// "the reference does not localize the loops").
    pub fn detect_genus_loop(&self, mesh: &Mesh) -> Option<TopologicalFeature> {
        if self.genus(mesh) > 0 {
            Some(TopologicalFeature {
                kind: FeatureKind::Loop,
                vertices: (0..mesh.vertex_count() as u32).collect(),
                importance: 1.0,
            })
        } else {
            None
        }
    }

    pub fn analyze_topology(&self, mesh: &Mesh) -> Vec<TopologicalFeature> {
        let edge_map = build_edge_map(mesh);
        let average_valence = if mesh.vertex_count() == 0 {
            0.0
        } else {
            (edge_map.len() * 2) as f32 / mesh.vertex_count() as f32
        };
        let mut features = self.detect_holes(mesh);
        features.extend(self.detect_bridges(mesh, average_valence));
        features.extend(self.detect_genus_loop(mesh));
        features
    }

    /// Turn detected features into a locked/limited vertex set (spec
    /// §4.5 "Constraint synthesis"): holes above the importance-0.8
    /// threshold are fully locked, lower-importance holes and loops
    /// only get a limited movement budget, and bridges (this crate's
    /// own addition, grounded in the "thin feature" idea of spec §4.5)
    /// are limited too since they're the easiest geometry to erode
    /// away under smoothing.
    pub fn generate_constraints(&self, features: &[TopologicalFeature]) -> TopologyConstraints {
        const LOCK_IMPORTANCE_THRESHOLD: f32 = 0.8;
        let mut constraints = TopologyConstraints::unconstrained();
        for feature in features {
            match feature.kind {
                FeatureKind::Hole if feature.importance > LOCK_IMPORTANCE_THRESHOLD => {
                    constraints.locked_vertices.extend(feature.vertices.iter().copied());
                }
                FeatureKind::Hole | FeatureKind::Loop | FeatureKind::Bridge => {
                    constraints.limited_vertices.extend(feature.vertices.iter().copied());
                }
            }
        }
        constraints
    }

    /// Post-smoothing sanity check: vertex/triangle counts are stable
    /// (smoothing never adds or removes geometry) and genus has not
    /// changed (spec §4.4 "verify topology is preserved").
    pub fn verify_preserved(&self, before: &Mesh, after: &Mesh) -> bool {
        before.vertex_count() == after.vertex_count()
            && before.triangle_count() == after.triangle_count()
            && self.genus(before) == self.genus(after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{MeshBuilder, Quad};

    fn cube_mesh() -> Mesh {
        // A closed unit cube: 6 quads, genus 0.
        let faces = [
            [
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            [
                Vec3::new(0.0, 0.0, 1.0),
                Vec3::new(0.0, 1.0, 1.0),
                Vec3::new(1.0, 1.0, 1.0),
                Vec3::new(1.0, 0.0, 1.0),
            ],
            [
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 1.0),
                Vec3::new(0.0, 0.0, 1.0),
            ],
            [
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 1.0),
                Vec3::new(1.0, 1.0, 1.0),
                Vec3::new(1.0, 1.0, 0.0),
            ],
            [
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, 1.0),
                Vec3::new(1.0, 0.0, 1.0),
                Vec3::new(1.0, 0.0, 0.0),
            ],
            [
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(1.0, 1.0, 1.0),
                Vec3::new(0.0, 1.0, 1.0),
            ],
        ];
        let quads: Vec<Quad> = faces.into_iter().map(|corners| Quad { corners }).collect();
        MeshBuilder::default().build(&quads, false)
    }

    #[test]
    fn closed_cube_has_no_boundary_and_genus_zero() {
        let mesh = cube_mesh();
        let preserver = TopologyPreserver::new();
        assert!(preserver.detect_holes(&mesh).is_empty());
        assert_eq!(preserver.genus(&mesh), 0);
    }

    #[test]
    fn open_quad_strip_has_boundary_loop() {
        // A single quad (two triangles) is a topological disk: 4
        // boundary edges forming one loop.
        let mesh = MeshBuilder::default().build(
            &[Quad {
                corners: [
                    Vec3::new(0.0, 0.0, 0.0),
                    Vec3::new(1.0, 0.0, 0.0),
                    Vec3::new(1.0, 1.0, 0.0),
                    Vec3::new(0.0, 1.0, 0.0),
                ],
            }],
            false,
        );
        let preserver = TopologyPreserver::new();
        let holes = preserver.detect_holes(&mesh);
        assert_eq!(holes.len(), 1);
        assert_eq!(holes[0].vertices.len(), 4);
    }

    #[test]
    fn small_hole_is_limited_not_locked() {
        // A single quad's 4-vertex boundary loop scores importance
        // 4/20 = 0.2, below the 0.8 lock threshold, so it must land in
        // `limited_vertices`, not `locked_vertices`.
        let mesh = MeshBuilder::default().build(
            &[Quad {
                corners: [
                    Vec3::new(0.0, 0.0, 0.0),
                    Vec3::new(1.0, 0.0, 0.0),
                    Vec3::new(1.0, 1.0, 0.0),
                    Vec3::new(0.0, 1.0, 0.0),
                ],
            }],
            false,
        );
        let preserver = TopologyPreserver::new();
        let features = preserver.analyze_topology(&mesh);
        let constraints = preserver.generate_constraints(&features);
        assert_eq!(constraints.locked_vertices.len(), 0);
        assert_eq!(constraints.limited_vertices.len(), 4);
    }

    #[test]
    fn large_hole_is_locked() {
        // A strip of 10 quads has a 22-vertex boundary loop (one cell
        // wide, so every vertex sits on the boundary), well past the
        // 20-vertex importance cap, and must be locked.
        let mut quads = Vec::new();
        let n = 10;
        for i in 0..n {
            let a = i as f32;
            let b = (i + 1) as f32;
            quads.push(Quad {
                corners: [
                    Vec3::new(a, 0.0, 0.0),
                    Vec3::new(b, 0.0, 0.0),
                    Vec3::new(b, 0.0, 1.0),
                    Vec3::new(a, 0.0, 1.0),
                ],
            });
        }
        let mesh = MeshBuilder::default().build(&quads, false);
        let preserver = TopologyPreserver::new();
        let features = preserver.analyze_topology(&mesh);
        let hole = features.iter().find(|f| f.kind == FeatureKind::Hole).expect("hole present");
        assert!(hole.importance >= 1.0);
        let constraints = preserver.generate_constraints(&features);
        assert!(hole.vertices.iter().all(|v| constraints.locked_vertices.contains(v)));
    }

    #[test]
    fn locked_vertex_never_moves() {
        let mut constraints = TopologyConstraints::unconstrained();
        constraints.locked_vertices.insert(3);
        let old = Vec3::new(1.0, 2.0, 3.0);
        let proposed = Vec3::new(5.0, 5.0, 5.0);
        assert_eq!(constraints.constrain_movement(3, old, proposed), old);
    }

    #[test]
    fn limited_vertex_caps_movement_distance() {
        let mut constraints = TopologyConstraints::unconstrained();
        constraints.limited_vertices.insert(3);
        constraints.max_movement_distance = 1.0;
        let old = Vec3::ZERO;
        let proposed = Vec3::new(10.0, 0.0, 0.0);
        let result = constraints.constrain_movement(3, old, proposed);
        assert!((result.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn verify_preserved_detects_count_change() {
        let mesh = cube_mesh();
        let preserver = TopologyPreserver::new();
        assert!(preserver.verify_preserved(&mesh, &mesh.clone()));

        let mut mutated = mesh.clone();
        mutated.vertices.push(Vec3::ZERO);
        assert!(!preserver.verify_preserved(&mesh, &mutated));
    }
}
