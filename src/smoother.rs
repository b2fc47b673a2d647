//! Topology-aware mesh smoothing (spec §4.3): Laplacian, Taubin
//! lambda-mu, and BiLaplacian filters, each applying the constraints
//! from [`crate::topology`] so holes and bridges survive.

use glam::Vec3;
use rayon::prelude::*;

use crate::mesh::Mesh;
use crate::settings::SmoothingAlgorithm;
use crate::topology::TopologyConstraints;

/// Laplacian step size, matching the reference smoother's fixed
/// lambda for both plain Laplacian and BiLaplacian's two half-passes.
const LAMBDA: f32 = 0.5;
/// Taubin's negative (shrink-correcting) pass factor.
const MU: f32 = -0.53;

/// Above this vertex count, neighbor averaging runs on a rayon thread
/// pool instead of sequentially.
const PARALLEL_THRESHOLD: usize = 2_000;

/// Progress/cancellation callback: returns `false` to request
/// cancellation, mirroring the coordinator's callback contract
/// (spec §6.2).
pub type ProgressCallback<'a> = dyn Fn(f32) -> bool + 'a;

/// Per-vertex adjacency derived from triangle incidence.
fn vertex_neighbors(mesh: &Mesh) -> Vec<Vec<u32>> {
    let mut neighbors: Vec<Vec<u32>> = vec![Vec::new(); mesh.vertex_count()];
    let mut seen: Vec<std::collections::HashSet<u32>> = vec![std::collections::HashSet::new(); mesh.vertex_count()];

    for tri in mesh.indices.chunks_exact(3) {
        for &(a, b) in &[(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
            if seen[a as usize].insert(b) {
                neighbors[a as usize].push(b);
            }
            if seen[b as usize].insert(a) {
                neighbors[b as usize].push(a);
            }
        }
    }
    neighbors
}

fn average_position(vertices: &[Vec3], neighbors: &[u32]) -> Option<Vec3> {
    if neighbors.is_empty() {
        return None;
    }
    let sum: Vec3 = neighbors.iter().map(|&n| vertices[n as usize]).sum();
    Some(sum / neighbors.len() as f32)
}

/// Computes one neighbor-averaging pass over every vertex, applying
/// `factor` to the Laplacian delta and the topology constraint to the
/// result. Runs on rayon above [`PARALLEL_THRESHOLD`] vertices.
fn laplacian_pass(
    vertices: &[Vec3],
    originals: &[Vec3],
    neighbors: &[Vec<u32>],
    factor: f32,
    constraints: &TopologyConstraints,
) -> Vec<Vec3> {
    let compute = |i: usize| -> Vec3 {
        let current = vertices[i];
        let proposed = match average_position(vertices, &neighbors[i]) {
            Some(avg) => current + (avg - current) * factor,
            None => current,
        };
        constraints.constrain_movement(i as u32, originals[i], proposed)
    };

    if vertices.len() >= PARALLEL_THRESHOLD {
        (0..vertices.len()).into_par_iter().map(compute).collect()
    } else {
        (0..vertices.len()).map(compute).collect()
    }
}

/// Applies a configured smoothing algorithm to a mesh's vertex
/// positions, leaving topology (indices, normals, uvs) untouched
/// beyond a final normal regeneration left to the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct Smoother;

impl Smoother {
    pub fn new() -> Self {
        Self
    }

    /// Run `algorithm` for `iterations` passes. Returns `None` if
    /// cancelled partway through (the caller discards partial work,
    /// per spec §7 "generation cancelled" semantics).
    pub fn smooth(
        &self,
        mesh: &Mesh,
        algorithm: SmoothingAlgorithm,
        iterations: u32,
        constraints: &TopologyConstraints,
        progress: Option<&ProgressCallback>,
    ) -> Option<Mesh> {
        if matches!(algorithm, SmoothingAlgorithm::None | SmoothingAlgorithm::Auto) || iterations == 0 {
            return Some(mesh.clone());
        }
        if mesh.vertices.is_empty() || mesh.indices.is_empty() {
            return Some(mesh.clone());
        }

        let neighbors = vertex_neighbors(mesh);
        let originals = mesh.vertices.clone();
        let mut current = mesh.vertices.clone();

        match algorithm {
            SmoothingAlgorithm::Laplacian => {
                for iter in 0..iterations {
                    if !report(progress, iter, iterations) {
                        return None;
                    }
                    current = laplacian_pass(&current, &originals, &neighbors, LAMBDA, constraints);
                }
            }
            SmoothingAlgorithm::Taubin => {
                for iter in 0..iterations {
                    if !report(progress, iter, iterations) {
                        return None;
                    }
                    let factor = if iter % 2 == 0 { LAMBDA } else { MU };
                    current = laplacian_pass(&current, &originals, &neighbors, factor, constraints);
                }
            }
            SmoothingAlgorithm::BiLaplacian => {
                for iter in 0..iterations {
                    if !report(progress, iter, iterations) {
                        return None;
                    }
                    // Two Laplacian half-passes per iteration, a
                    // cheap approximation of bilaplacian (curvature)
                    // flow without assembling a full cotangent
                    // operator.
                    current = laplacian_pass(&current, &originals, &neighbors, LAMBDA, constraints);
                    current = laplacian_pass(&current, &originals, &neighbors, LAMBDA, constraints);
                }
            }
            SmoothingAlgorithm::None | SmoothingAlgorithm::Auto => unreachable!(),
        }

        if let Some(cb) = progress {
            cb(1.0);
        }

        let mut result = mesh.clone();
        result.vertices = current;
        result.recompute_bounds();
        Some(result)
    }
}

fn report(progress: Option<&ProgressCallback>, iter: u32, total: u32) -> bool {
    match progress {
        Some(cb) => cb(iter as f32 / total as f32),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{MeshBuilder, Quad};

    fn spike_plane() -> Mesh {
        // A 3x3 vertex grid flattened except the center vertex raised,
        // exercised as two quads sharing that center edge.
        let quads = vec![
            Quad {
                corners: [
                    Vec3::new(0.0, 0.0, 0.0),
                    Vec3::new(1.0, 0.0, 0.0),
                    Vec3::new(1.0, 2.0, 1.0),
                    Vec3::new(0.0, 0.0, 1.0),
                ],
            },
            Quad {
                corners: [
                    Vec3::new(1.0, 0.0, 0.0),
                    Vec3::new(2.0, 0.0, 0.0),
                    Vec3::new(2.0, 0.0, 1.0),
                    Vec3::new(1.0, 2.0, 1.0),
                ],
            },
        ];
        MeshBuilder::default().build(&quads, false)
    }

    #[test]
    fn none_algorithm_is_a_no_op() {
        let mesh = spike_plane();
        let smoother = Smoother::new();
        let constraints = TopologyConstraints::unconstrained();
        let result = smoother
            .smooth(&mesh, SmoothingAlgorithm::None, 5, &constraints, None)
            .unwrap();
        assert_eq!(result.vertices, mesh.vertices);
    }

    #[test]
    fn laplacian_pass_with_zero_factor_is_the_identity() {
        let mesh = spike_plane();
        let neighbors = vertex_neighbors(&mesh);
        let constraints = TopologyConstraints::unconstrained();
        let result = laplacian_pass(&mesh.vertices, &mesh.vertices, &neighbors, 0.0, &constraints);
        assert_eq!(result, mesh.vertices);
    }

    #[test]
    fn laplacian_reduces_spike_height() {
        let mesh = spike_plane();
        let smoother = Smoother::new();
        let constraints = TopologyConstraints::unconstrained();
        let result = smoother
            .smooth(&mesh, SmoothingAlgorithm::Laplacian, 3, &constraints, None)
            .unwrap();

        let spike_before = mesh.vertices.iter().map(|v| v.y).fold(0.0, f32::max);
        let spike_after = result.vertices.iter().map(|v| v.y).fold(0.0, f32::max);
        assert!(spike_after < spike_before);
    }

    #[test]
    fn locked_vertex_is_immune_to_smoothing() {
        let mesh = spike_plane();
        let spike_index = mesh
            .vertices
            .iter()
            .position(|v| v.y > 1.0)
            .expect("spike vertex present") as u32;

        let mut constraints = TopologyConstraints::unconstrained();
        constraints.locked_vertices.insert(spike_index);

        let smoother = Smoother::new();
        let result = smoother
            .smooth(&mesh, SmoothingAlgorithm::Laplacian, 3, &constraints, None)
            .unwrap();

        assert_eq!(result.vertices[spike_index as usize], mesh.vertices[spike_index as usize]);
    }

    #[test]
    fn cancellation_mid_pass_returns_none() {
        let mesh = spike_plane();
        let smoother = Smoother::new();
        let constraints = TopologyConstraints::unconstrained();
        let result = smoother.smooth(&mesh, SmoothingAlgorithm::Laplacian, 5, &constraints, Some(&|_| false));
        assert!(result.is_none());
    }

    #[test]
    fn taubin_preserves_vertex_count() {
        let mesh = spike_plane();
        let smoother = Smoother::new();
        let constraints = TopologyConstraints::unconstrained();
        let result = smoother
            .smooth(&mesh, SmoothingAlgorithm::Taubin, 4, &constraints, None)
            .unwrap();
        assert_eq!(result.vertex_count(), mesh.vertex_count());
    }
}
