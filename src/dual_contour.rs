//! Dual Contouring extraction (spec §4.2), the largest single component
//! of this crate.
//!
//! The algorithm runs in five steps: enumerate the active-cell set,
//! compute Hermite data on every active edge, solve one QEF vertex per
//! cell, optionally bias sharp corners, then walk the intersecting
//! edges once each to emit quads.

use std::collections::HashMap;

use glam::Vec3;

use crate::coord::CellCoord;
use crate::grid::{Grid, GridSampler};
use crate::hermite::{corner_offset, CellRecord, Hermite, CELL_EDGES};
use crate::mesh::Quad;
use crate::qef::QefAccumulator;
use crate::settings::Settings;

/// Edge axis: 0 = X, 1 = Y, 2 = Z.
type Axis = u8;

/// An edge identified by its lesser-indexed endpoint and axis. Hashing
/// on this key is how edges are deduplicated across the cells that
/// share them (spec §4.2 step 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct EdgeKey {
    origin: CellCoord,
    axis: Axis,
}

/// Extraction strategy seam (spec §9 "fast variants"). The reference
/// implementation below already restricts work to the dilated active
/// set, which is the "sparse variant" the spec calls out; a SIMD
/// variant would implement this same trait without changing callers.
pub trait DualContourStrategy: Send + Sync {
    /// Extract a quad soup from `grid`. `cancel` is polled between
    /// steps and between outer-loop iterations within a step; once it
    /// returns `true` extraction stops and an empty `Vec` is returned.
    fn extract(&self, grid: &dyn Grid, settings: &Settings, cancel: &dyn Fn() -> bool) -> Vec<Quad>;
}

/// Reference Dual Contouring implementation: dilated active-cell
/// enumeration, direct QEF vertex solve, lexicographically-deduplicated
/// quad emission.
#[derive(Debug, Clone, Copy, Default)]
pub struct DualContour;

impl DualContour {
    pub fn new() -> Self {
        Self
    }

    /// Step 1: the active-cell set is every occupied cell plus its
    /// 26-neighborhood, so boundary cells still get a fully-populated
    /// cube of samples around them (spec §4.2 step 1).
    fn active_cells(&self, grid: &dyn Grid) -> Vec<CellCoord> {
        let mut set: HashMap<CellCoord, ()> = HashMap::new();
        for c in grid.active_cells() {
            set.insert(c, ());
            for n in c.neighborhood_26() {
                set.entry(n).or_insert(());
            }
        }
        set.into_keys().collect()
    }

    /// Step 2: Hermite data for one cell's 12 edges, using (and
    /// populating) a process-wide cache so each distinct edge is only
    /// evaluated once regardless of how many cells share it.
    fn cell_edges(
        &self,
        coord: CellCoord,
        sampler: &GridSampler,
        cache: &mut HashMap<EdgeKey, Hermite>,
    ) -> [Hermite; 12] {
        let mut edges = [Hermite::none(); 12];
        for (i, &(a, b, axis)) in CELL_EDGES.iter().enumerate() {
            let oa = corner_offset(a);
            let ob = corner_offset(b);
            let pa = coord.offset(oa.0, oa.1, oa.2);
            let pb = coord.offset(ob.0, ob.1, ob.2);
            let origin = pa.min(pb);
            let key = EdgeKey { origin, axis };
            edges[i] = *cache
                .entry(key)
                .or_insert_with(|| compute_edge_hermite(origin, axis, sampler));
        }
        edges
    }
}

/// Evaluate one axis-aligned edge starting at `origin` (the
/// lesser-indexed endpoint by construction of the caller).
fn compute_edge_hermite(origin: CellCoord, axis: Axis, sampler: &GridSampler) -> Hermite {
    let far = match axis {
        0 => origin.offset(1, 0, 0),
        1 => origin.offset(0, 1, 0),
        _ => origin.offset(0, 0, 1),
    };
    let s0 = sampler.sample(origin);
    let s1 = sampler.sample(far);

    const EPSILON: f32 = 1e-6;
    if (s0 - s1).abs() < EPSILON || (s0 <= crate::grid::ISO_LEVEL) == (s1 <= crate::grid::ISO_LEVEL) {
        return Hermite::none();
    }

    let t = ((crate::grid::ISO_LEVEL - s0) / (s1 - s0)).clamp(0.0, 1.0);
    let p0 = sampler.world_position(origin);
    let p1 = sampler.world_position(far);
    let position = p0.lerp(p1, t);

    let grad0 = sampler.gradient(origin);
    let grad1 = sampler.gradient(far);
    let blended = grad0.lerp(grad1, t);
    let normal = if blended.length() > 1e-4 {
        blended.normalize()
    } else {
        // Fall back to the edge-axis direction, signed so it still
        // points from occupied to empty like every other normal here
        // (mirrors the sign test the quad-winding step uses below).
        let axis_dir = (p1 - p0).normalize_or_zero();
        if s1 < s0 {
            -axis_dir
        } else {
            axis_dir
        }
    };

    Hermite {
        position,
        normal,
        value: crate::grid::ISO_LEVEL,
        intersects: true,
    }
}

/// The four neighbor-cell offsets sharing an edge of the given axis,
/// walked in a consistent cyclic order around the edge (spec §4.2
/// step 5). Axis 0/1/2 vary the two axes perpendicular to the edge.
fn quad_neighbor_offsets(axis: Axis) -> [(i32, i32, i32); 4] {
    match axis {
        0 => [(0, 0, 0), (0, -1, 0), (0, -1, -1), (0, 0, -1)],
        1 => [(0, 0, 0), (-1, 0, 0), (-1, 0, -1), (0, 0, -1)],
        _ => [(0, 0, 0), (0, -1, 0), (-1, -1, 0), (-1, 0, 0)],
    }
}

impl DualContourStrategy for DualContour {
    fn extract(&self, grid: &dyn Grid, settings: &Settings, cancel: &dyn Fn() -> bool) -> Vec<Quad> {
        let sampler = GridSampler::new(grid);

        // Step 1.
        let active = self.active_cells(grid);
        if cancel() {
            return Vec::new();
        }

        // Step 2 + 3: edges and per-cell QEF solve.
        let mut edge_cache: HashMap<EdgeKey, Hermite> = HashMap::new();
        let mut records: HashMap<CellCoord, CellRecord> = HashMap::with_capacity(active.len());
        for coord in active {
            if cancel() {
                return Vec::new();
            }
            let edges = self.cell_edges(coord, &sampler, &mut edge_cache);
            let mut record = CellRecord::empty(coord);
            record.edges = edges;
            if record.any_edge_intersects() {
                record.vertex_pos = solve_cell_vertex(coord, &record, settings, &sampler);
                record.has_vertex = true;
            }
            records.insert(coord, record);
        }
        if cancel() {
            return Vec::new();
        }

        // Step 5: walk every distinct sign-changing edge once and
        // emit its quad if the full four-cell neighborhood exists.
        let mut quads = Vec::new();
        for key in edge_cache.keys().copied().collect::<Vec<_>>() {
            if cancel() {
                return Vec::new();
            }
            let hermite = edge_cache[&key];
            if !hermite.intersects {
                continue;
            }
            let far = match key.axis {
                0 => key.origin.offset(1, 0, 0),
                1 => key.origin.offset(0, 1, 0),
                _ => key.origin.offset(0, 0, 1),
            };
            let s0 = sampler.sample(key.origin);
            let s1 = sampler.sample(far);

            let offsets = quad_neighbor_offsets(key.axis);
            let mut corner_records = [None; 4];
            let mut ok = true;
            for (i, &(dx, dy, dz)) in offsets.iter().enumerate() {
                let c = key.origin.offset(dx, dy, dz);
                match records.get(&c).filter(|r| r.has_vertex) {
                    Some(r) => corner_records[i] = Some(r.vertex_pos),
                    None => {
                        ok = false;
                        break;
                    }
                }
            }
            if !ok {
                continue;
            }
            let mut corners = [
                corner_records[0].unwrap(),
                corner_records[1].unwrap(),
                corner_records[2].unwrap(),
                corner_records[3].unwrap(),
            ];
            if s1 - s0 < 0.0 {
                corners.reverse();
            }
            quads.push(Quad { corners });
        }

        quads
    }
}

/// Solve the QEF for one cell and apply the sharp-feature bias, then
/// clamp the result into the cell's extent with `y` floored at the
/// ground plane (spec §4.2 step 3-4).
fn solve_cell_vertex(
    coord: CellCoord,
    record: &CellRecord,
    settings: &Settings,
    sampler: &GridSampler,
) -> Vec3 {
    let mut qef = QefAccumulator::new();
    for edge in record.intersecting_edges() {
        qef.add_plane(edge.position, edge.normal);
    }
    let mut vertex = qef.solve();

    if settings.preserve_sharp_features && is_sharp_feature(record, settings.sharp_feature_angle) {
        const SHARPNESS: f32 = 0.7;
        let edge_center = qef.mass_point();
        vertex = vertex * (1.0 - SHARPNESS) + edge_center * SHARPNESS;
    }

    let cell_min = sampler.world_position(coord);
    let cell_max = sampler.world_position(coord.offset(1, 1, 1));
    vertex = vertex.clamp(cell_min, cell_max);
    if vertex.y < cell_min.y.max(0.0) {
        vertex.y = cell_min.y.max(0.0);
    }
    vertex
}

/// True when any pair of intersecting-edge normals spans more than
/// `angle_degrees` (spec §4.2 step 4, §9 "Sharp feature bias").
fn is_sharp_feature(record: &CellRecord, angle_degrees: f32) -> bool {
    let threshold = angle_degrees.to_radians().cos();
    let normals: Vec<Vec3> = record.intersecting_edges().map(|e| e.normal).collect();
    for i in 0..normals.len() {
        for j in (i + 1)..normals.len() {
            if normals[i].dot(normals[j]) < threshold {
                return true;
            }
        }
    }
    false
}
