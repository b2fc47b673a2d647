//! Mesh data model (spec §3) and the `MeshBuilder` stage that turns a
//! quad soup from Dual Contouring into a deduplicated, triangulated,
//! normal-bearing mesh (spec §4.7).

use std::collections::HashMap;

use glam::{Mat3, Mat4, Vec2, Vec3};

/// Axis-aligned bounding box. `min <= max` componentwise holds for
/// every non-empty mesh (spec §8).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub const EMPTY: Bounds = Bounds {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x
    }

    pub fn from_points<'a>(points: impl Iterator<Item = &'a Vec3>) -> Bounds {
        let mut b = Bounds::EMPTY;
        for p in points {
            b.min = b.min.min(*p);
            b.max = b.max.max(*p);
        }
        b
    }

    pub fn intersects(&self, other: &Bounds) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }
}

/// The default normal used wherever a face or vertex normal cannot be
/// computed (zero-area face, zero-length gradient).
pub const DEFAULT_UP: Vec3 = Vec3::Y;

/// Three parallel arrays plus an index buffer and bounds (spec §3).
///
/// Invariants upheld by every constructor in this module:
/// - every index is `< vertices.len()`
/// - `indices.len() % 3 == 0`
/// - `normals` is either empty or has one entry per vertex, each of
///   unit length or equal to [`DEFAULT_UP`]
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub vertices: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u32>,
    pub bounds: Bounds,
}

impl Mesh {
    pub fn empty() -> Self {
        Self {
            vertices: Vec::new(),
            normals: Vec::new(),
            uvs: Vec::new(),
            indices: Vec::new(),
            bounds: Bounds::EMPTY,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn memory_usage(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.vertices.len() * std::mem::size_of::<Vec3>()
            + self.normals.len() * std::mem::size_of::<Vec3>()
            + self.uvs.len() * std::mem::size_of::<Vec2>()
            + self.indices.len() * std::mem::size_of::<u32>()
    }

    pub fn recompute_bounds(&mut self) {
        self.bounds = Bounds::from_points(self.vertices.iter());
    }

    /// Triangle vertex positions, three at a time.
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).map(move |tri| {
            [
                self.vertices[tri[0] as usize],
                self.vertices[tri[1] as usize],
                self.vertices[tri[2] as usize],
            ]
        })
    }

    /// Apply an affine transform. Normals transform by the upper-left
    /// 3x3 and are renormalized; this tolerates non-uniform scale with
    /// visible shading error rather than computing the inverse
    /// transpose (spec §4.7).
    pub fn transform(&mut self, matrix: Mat4) {
        for v in self.vertices.iter_mut() {
            *v = matrix.transform_point3(*v);
        }
        if !self.normals.is_empty() {
            let linear = Mat3::from_mat4(matrix);
            for n in self.normals.iter_mut() {
                let transformed = linear * *n;
                *n = if transformed.length() > 1e-8 {
                    transformed.normalize()
                } else {
                    DEFAULT_UP
                };
            }
        }
        self.recompute_bounds();
    }
}

/// A quad emitted by Dual Contouring: four cell-vertex corners, wound
/// so that `(v0,v1,v2,v3)` traversed in order points from occupied to
/// empty (spec §4.2 step 5).
#[derive(Debug, Clone, Copy)]
pub struct Quad {
    pub corners: [Vec3; 4],
}

/// Deduplication bucket size: 0.1mm, matching spec §4.7's example.
/// World units are meters, so this is `1e-4`.
pub const DEDUP_EPSILON_M: f32 = 1e-4;

fn quantize(p: Vec3, epsilon: f32) -> (i64, i64, i64) {
    let inv = 1.0 / epsilon;
    (
        (p.x * inv).round() as i64,
        (p.y * inv).round() as i64,
        (p.z * inv).round() as i64,
    )
}

/// Deduplicates vertices, triangulates quads, generates area-weighted
/// normals, and computes bounds (spec §4.7).
pub struct MeshBuilder {
    epsilon: f32,
}

impl Default for MeshBuilder {
    fn default() -> Self {
        Self {
            epsilon: DEDUP_EPSILON_M,
        }
    }
}

impl MeshBuilder {
    pub fn new(epsilon: f32) -> Self {
        Self { epsilon }
    }

    /// Build a triangulated, bounded mesh from a quad soup.
    /// `(v0,v1,v2,v3) -> (v0,v1,v2) + (v0,v2,v3)`, a fixed diagonal
    /// applied identically to every quad to avoid the non-planarity
    /// artifacts a mixed diagonal choice would introduce (spec §4.2
    /// step 5).
    pub fn build(&self, quads: &[Quad], generate_normals: bool) -> Mesh {
        let mut vertices: Vec<Vec3> = Vec::new();
        let mut lookup: HashMap<(i64, i64, i64), u32> = HashMap::new();
        let mut indices = Vec::with_capacity(quads.len() * 6);

        let mut index_of = |p: Vec3, vertices: &mut Vec<Vec3>, lookup: &mut HashMap<(i64, i64, i64), u32>| -> u32 {
            let key = quantize(p, self.epsilon);
            *lookup.entry(key).or_insert_with(|| {
                let idx = vertices.len() as u32;
                vertices.push(p);
                idx
            })
        };

        for quad in quads {
            let i0 = index_of(quad.corners[0], &mut vertices, &mut lookup);
            let i1 = index_of(quad.corners[1], &mut vertices, &mut lookup);
            let i2 = index_of(quad.corners[2], &mut vertices, &mut lookup);
            let i3 = index_of(quad.corners[3], &mut vertices, &mut lookup);

            indices.extend_from_slice(&[i0, i1, i2]);
            indices.extend_from_slice(&[i0, i2, i3]);
        }

        let mut mesh = Mesh {
            vertices,
            normals: Vec::new(),
            uvs: Vec::new(),
            indices,
            bounds: Bounds::EMPTY,
        };

        if generate_normals {
            self.generate_normals(&mut mesh);
        }
        mesh.recompute_bounds();
        mesh
    }

    /// Area-weighted accumulation of face normals onto incident
    /// vertices, then per-vertex normalize; zero-length normals fall
    /// back to [`DEFAULT_UP`].
    pub fn generate_normals(&self, mesh: &mut Mesh) {
        let mut accum = vec![Vec3::ZERO; mesh.vertices.len()];

        for tri in mesh.indices.chunks_exact(3) {
            let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            let (p0, p1, p2) = (mesh.vertices[a], mesh.vertices[b], mesh.vertices[c]);
            // Cross product magnitude is proportional to twice the
            // triangle area, so summing it directly area-weights the
            // contribution without an extra normalize.
            let face_normal_weighted = (p1 - p0).cross(p2 - p0);
            accum[a] += face_normal_weighted;
            accum[b] += face_normal_weighted;
            accum[c] += face_normal_weighted;
        }

        mesh.normals = accum
            .into_iter()
            .map(|n| if n.length() > 1e-8 { n.normalize() } else { DEFAULT_UP })
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_quad() -> Quad {
        Quad {
            corners: [
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
        }
    }

    #[test]
    fn build_dedups_and_triangulates_one_quad() {
        let builder = MeshBuilder::default();
        let mesh = builder.build(&[single_quad()], true);
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.indices.len(), 6);
        assert_eq!(mesh.normals.len(), 4);
        for n in &mesh.normals {
            assert!((n.length() - 1.0).abs() < 1e-4 || *n == DEFAULT_UP);
        }
    }

    #[test]
    fn shared_corners_across_quads_collapse_to_one_vertex() {
        let q0 = single_quad();
        let mut q1 = single_quad();
        for c in q1.corners.iter_mut() {
            c.x += 1.0;
        }
        let builder = MeshBuilder::default();
        let mesh = builder.build(&[q0, q1], false);
        // q0 and q1 share an edge (two corners), so 4+4-2 = 6 unique vertices.
        assert_eq!(mesh.vertex_count(), 6);
    }

    #[test]
    fn indices_always_in_bounds() {
        let builder = MeshBuilder::default();
        let mesh = builder.build(&[single_quad()], true);
        for &i in &mesh.indices {
            assert!((i as usize) < mesh.vertex_count());
        }
        assert_eq!(mesh.indices.len() % 3, 0);
    }

    #[test]
    fn bounds_are_tight() {
        let builder = MeshBuilder::default();
        let mesh = builder.build(&[single_quad()], false);
        assert_eq!(mesh.bounds.min, Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(mesh.bounds.max, Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn transform_renormalizes_normals() {
        let builder = MeshBuilder::default();
        let mut mesh = builder.build(&[single_quad()], true);
        let m = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        mesh.transform(m);
        for n in &mesh.normals {
            assert!((n.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn empty_mesh_has_empty_bounds() {
        let mesh = Mesh::empty();
        assert!(mesh.is_empty());
        assert!(mesh.bounds.is_empty());
    }
}
