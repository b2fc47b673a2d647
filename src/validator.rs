//! Mesh validation and basic repair (spec §4.6).
//!
//! Watertight/manifold edge checks, degenerate-triangle detection,
//! orientation, minimum-feature-size, and a bounded-sample
//! self-intersection test, plus the repair helpers used by the
//! coordinator's final stage.

use std::collections::HashMap;

use glam::Vec3;

use crate::mesh::Mesh;

/// Upper bound on triangle-pair tests for self-intersection (spec §4.6
/// "the full O(n^2) test is not required; the cap is part of the
/// contract").
pub const MAX_SELF_INTERSECTION_PAIRS: usize = 20_000;

const DEGENERATE_AREA_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub is_watertight: bool,
    pub is_manifold: bool,
    pub has_minimum_feature_size: bool,
    pub has_correct_orientation: bool,
    pub has_self_intersections: bool,

    pub min_feature_size: f32,
    pub hole_count: usize,
    pub non_manifold_edges: usize,
    pub degenerate_triangles: usize,
    pub flipped_normals: usize,

    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

struct EdgeInfo {
    faces: Vec<u32>,
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
    for (ti, tri) in mesh.indices.chunks_exact(3).enumerate() {
        for &(a, b) in &[(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
            map.entry(edge_key(a, b)).or_insert_with(|| EdgeInfo { faces: Vec::new() }).faces.push(ti as u32);
        }
    }
    map
}

fn triangle_area(p0: Vec3, p1: Vec3, p2: Vec3) -> f32 {
    (p1 - p0).cross(p2 - p0).length() * 0.5
}

fn signed_volume_of_triangle(p0: Vec3, p1: Vec3, p2: Vec3) -> f32 {
    p0.dot(p1.cross(p2)) / 6.0
}

/// Checks a finished mesh and reports repairable defects without
/// modifying it; `repair_*` helpers below take a `&mut Mesh`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator;

impl Validator {
    pub fn new() -> Self {
        Self
    }

    pub fn is_watertight(&self, mesh: &Mesh) -> bool {
        if mesh.indices.is_empty() {
            // No edges to fail the two-incident-triangles test:
            // vacuously watertight (spec scenario 1, empty grid).
            return true;
        }
        let edge_map = build_edge_map(mesh);
        edge_map.values().all(|e| e.faces.len() == 2)
    }

    pub fn is_manifold(&self, mesh: &Mesh) -> bool {
        let edge_map = build_edge_map(mesh);
        edge_map.values().all(|e| e.faces.len() <= 2)
    }

    pub fn count_non_manifold_edges(&self, mesh: &Mesh) -> usize {
        build_edge_map(mesh).values().filter(|e| e.faces.len() > 2).count()
    }

    pub fn find_degenerate_triangles(&self, mesh: &Mesh) -> Vec<u32> {
        mesh.indices
            .chunks_exact(3)
            .enumerate()
            .filter_map(|(ti, tri)| {
                let (p0, p1, p2) = (
                    mesh.vertices[tri[0] as usize],
                    mesh.vertices[tri[1] as usize],
                    mesh.vertices[tri[2] as usize],
                );
                if triangle_area(p0, p1, p2) < DEGENERATE_AREA_EPSILON {
                    Some(ti as u32)
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn calculate_minimum_feature_size(&self, mesh: &Mesh) -> f32 {
        let mut min_len = f32::INFINITY;
        for tri in mesh.indices.chunks_exact(3) {
            let (p0, p1, p2) = (
                mesh.vertices[tri[0] as usize],
                mesh.vertices[tri[1] as usize],
                mesh.vertices[tri[2] as usize],
            );
            min_len = min_len.min(p0.distance(p1)).min(p1.distance(p2)).min(p2.distance(p0));
        }
        if min_len.is_finite() {
            min_len
        } else {
            0.0
        }
    }

    pub fn signed_volume(&self, mesh: &Mesh) -> f32 {
        mesh.triangles().map(|[p0, p1, p2]| signed_volume_of_triangle(p0, p1, p2)).sum()
    }

    /// Bounded-sample triangle-triangle overlap test. Samples at most
    /// [`MAX_SELF_INTERSECTION_PAIRS`] pairs by bounding-box proximity
    /// rather than every pair, so this never scales past the cap on
    /// large meshes (spec §4.6).
    pub fn has_self_intersections(&self, mesh: &Mesh) -> bool {
        let triangles: Vec<[Vec3; 3]> = mesh.triangles().collect();
        if triangles.len() < 3 {
            return false;
        }
        let mut tested = 0usize;
        for i in 0..triangles.len() {
            for j in (i + 1)..triangles.len() {
                if tested >= MAX_SELF_INTERSECTION_PAIRS {
                    return false;
                }
                tested += 1;
                if shares_vertex_position(&triangles[i], &triangles[j]) {
                    continue;
                }
                if triangles_overlap_bbox(&triangles[i], &triangles[j])
                    && triangles_intersect(&triangles[i], &triangles[j])
                {
                    return true;
                }
            }
        }
        false
    }

    pub fn calculate_genus(&self, mesh: &Mesh) -> i64 {
        crate::topology::TopologyPreserver::new().genus(mesh)
    }

    /// Full check per spec §4.6. Missing watertightness, non-manifold
    /// edges, and self-intersections are errors (`is_valid = false`);
    /// degenerate triangles and undersized features are warnings.
    pub fn validate(&self, mesh: &Mesh, min_feature_size: f32) -> ValidationResult {
        let mut result = ValidationResult {
            is_valid: true,
            ..Default::default()
        };

        result.is_watertight = self.is_watertight(mesh);
        result.is_manifold = self.is_manifold(mesh);
        result.non_manifold_edges = self.count_non_manifold_edges(mesh);

        let degenerate = self.find_degenerate_triangles(mesh);
        result.degenerate_triangles = degenerate.len();

        result.min_feature_size = self.calculate_minimum_feature_size(mesh);
        result.has_minimum_feature_size = result.min_feature_size >= min_feature_size;

        let volume = self.signed_volume(mesh);
        result.has_correct_orientation = volume >= 0.0;

        result.has_self_intersections = self.has_self_intersections(mesh);

        if !result.is_watertight {
            result.errors.push("mesh is not watertight".into());
            result.is_valid = false;
        }
        if !result.is_manifold {
            result.errors.push(format!("{} non-manifold edges", result.non_manifold_edges));
            result.is_valid = false;
        }
        if result.has_self_intersections {
            result.errors.push("self-intersecting triangles detected".into());
            result.is_valid = false;
        }
        if result.degenerate_triangles > 0 {
            result.warnings.push(format!("{} degenerate triangles", result.degenerate_triangles));
        }
        if !result.has_minimum_feature_size {
            result.warnings.push(format!(
                "minimum feature size {:.4} below threshold {:.4}",
                result.min_feature_size, min_feature_size
            ));
        }
        if !result.has_correct_orientation {
            result.warnings.push("mesh is inside-out (negative signed volume)".into());
        }

        result
    }

    /// Swap index 1 and 2 of every triangle so the signed volume
    /// becomes non-negative. Idempotent: calling it twice in a row
    /// leaves the mesh unchanged on the second call.
    pub fn fix_orientation(&self, mesh: &mut Mesh) -> bool {
        if self.signed_volume(mesh) >= 0.0 {
            return false;
        }
        for tri in mesh.indices.chunks_exact_mut(3) {
            tri.swap(1, 2);
        }
        true
    }

    /// Remove degenerate triangles in place, returning how many were dropped.
    pub fn remove_degenerate_triangles(&self, mesh: &mut Mesh) -> usize {
        let degenerate: std::collections::HashSet<u32> = self.find_degenerate_triangles(mesh).into_iter().collect();
        if degenerate.is_empty() {
            return 0;
        }
        let mut new_indices = Vec::with_capacity(mesh.indices.len());
        for (ti, tri) in mesh.indices.chunks_exact(3).enumerate() {
            if !degenerate.contains(&(ti as u32)) {
                new_indices.extend_from_slice(tri);
            }
        }
        mesh.indices = new_indices;
        mesh.recompute_bounds();
        degenerate.len()
    }

    /// Merge vertices that quantize to the same cell at `epsilon`
    /// resolution, rewriting indices and dropping now-unused vertices
    /// and their normals/uvs in lockstep.
    pub fn merge_duplicate_vertices(&self, mesh: &mut Mesh, epsilon: f32) -> usize {
        let before = mesh.vertex_count();
        let inv = 1.0 / epsilon;
        let mut lookup: HashMap<(i64, i64, i64), u32> = HashMap::new();
        let mut new_vertices = Vec::with_capacity(before);
        let mut new_normals = Vec::with_capacity(mesh.normals.len());
        let mut new_uvs = Vec::with_capacity(mesh.uvs.len());
        let mut remap = vec![0u32; before];

        let has_normals = mesh.normals.len() == before;
        let has_uvs = mesh.uvs.len() == before;

        for (old_index, &p) in mesh.vertices.iter().enumerate() {
            let key = (
                (p.x * inv).round() as i64,
                (p.y * inv).round() as i64,
                (p.z * inv).round() as i64,
            );
            let new_index = *lookup.entry(key).or_insert_with(|| {
                let idx = new_vertices.len() as u32;
                new_vertices.push(p);
                if has_normals {
                    new_normals.push(mesh.normals[old_index]);
                }
                if has_uvs {
                    new_uvs.push(mesh.uvs[old_index]);
                }
                idx
            });
            remap[old_index] = new_index;
        }

        let removed = before.saturating_sub(new_vertices.len());
        if removed == 0 {
            return 0;
        }

        for idx in mesh.indices.iter_mut() {
            *idx = remap[*idx as usize];
        }
        mesh.vertices = new_vertices;
        mesh.normals = new_normals;
        mesh.uvs = new_uvs;
        mesh.recompute_bounds();
        removed
    }

    /// Basic repair pass: orientation fix, degenerate removal, vertex
    /// merge, in that order. Returns whether anything changed.
    pub fn repair_basic_issues(&self, mesh: &mut Mesh, epsilon: f32) -> bool {
        let mut changed = self.fix_orientation(mesh);
        changed |= self.remove_degenerate_triangles(mesh) > 0;
        changed |= self.merge_duplicate_vertices(mesh, epsilon) > 0;
        changed
    }
}

fn shares_vertex_position(a: &[Vec3; 3], b: &[Vec3; 3]) -> bool {
    a.iter().any(|pa| b.iter().any(|pb| pa.distance(*pb) < 1e-6))
}

fn triangle_bbox(tri: &[Vec3; 3]) -> (Vec3, Vec3) {
    let min = tri[0].min(tri[1]).min(tri[2]);
    let max = tri[0].max(tri[1]).max(tri[2]);
    (min, max)
}

fn triangles_overlap_bbox(a: &[Vec3; 3], b: &[Vec3; 3]) -> bool {
    let (amin, amax) = triangle_bbox(a);
    let (bmin, bmax) = triangle_bbox(b);
    amin.x <= bmax.x && amax.x >= bmin.x && amin.y <= bmax.y && amax.y >= bmin.y && amin.z <= bmax.z && amax.z >= bmin.z
}

/// Moller-style segment-against-triangle test, applied to each edge of
/// one triangle against the other and vice versa. Sufficient for the
/// bounded sampling this validator performs; not a full robust
/// intersection kernel.
fn triangles_intersect(a: &[Vec3; 3], b: &[Vec3; 3]) -> bool {
    let edges_a = [(a[0], a[1]), (a[1], a[2]), (a[2], a[0])];
    let edges_b = [(b[0], b[1]), (b[1], b[2]), (b[2], b[0])];
    edges_a.iter().any(|&(p0, p1)| segment_intersects_triangle(p0, p1, b))
        || edges_b.iter().any(|&(p0, p1)| segment_intersects_triangle(p0, p1, a))
}

fn segment_intersects_triangle(p0: Vec3, p1: Vec3, tri: &[Vec3; 3]) -> bool {
    let edge1 = tri[1] - tri[0];
    let edge2 = tri[2] - tri[0];
    let dir = p1 - p0;
    let h = dir.cross(edge2);
    let det = edge1.dot(h);
    if det.abs() < 1e-9 {
        return false;
    }
    let inv_det = 1.0 / det;
    let s = p0 - tri[0];
    let u = s.dot(h) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return false;
    }
    let q = s.cross(edge1);
    let v = dir.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return false;
    }
    let t = edge2.dot(q) * inv_det;
    (0.0..=1.0).contains(&t)
}
