//! Grid collaborator interface (spec §6.1) and the point-sampling layer
//! built on top of it (spec §4.1, `GridSampler`).
//!
//! The core never assumes a specific storage scheme for occupancy —
//! callers plug in whatever backs their voxel editor (the reference
//! implementation this crate was distilled from uses a sparse octree;
//! `astraweave-terrain`'s own `VoxelChunk` is built the same way, as a
//! `HashMap`-indexed octree of `OctreeNode`s). [`SparseGrid`] below is
//! a minimal `HashSet`-backed implementation used by this crate's own
//! tests and benches; it is not meant to be the caller's storage.

use std::collections::HashSet;

use glam::Vec3;

use crate::coord::{cell_bounds, coord_to_world, CellCoord};

/// Voxel resolution the grid was authored at. The core only records
/// this in settings/cache-key material; it never changes extraction
/// behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Resolution {
    Cm1,
    Cm2,
    Cm4,
    Cm8,
    Cm16,
    Cm32,
    Cm64,
}

impl Resolution {
    pub fn cell_size_meters(self) -> f32 {
        match self {
            Resolution::Cm1 => 0.01,
            Resolution::Cm2 => 0.02,
            Resolution::Cm4 => 0.04,
            Resolution::Cm8 => 0.08,
            Resolution::Cm16 => 0.16,
            Resolution::Cm32 => 0.32,
            Resolution::Cm64 => 0.64,
        }
    }
}

/// The sparse occupancy grid the core consumes. All operations must be
/// `O(log n)` or better; the core treats the grid as shared and
/// read-only and never mutates it (spec §5).
pub trait Grid: Send + Sync {
    fn is_occupied(&self, coord: CellCoord) -> bool;

    /// Occupied cells, in any order.
    fn active_cells(&self) -> Box<dyn Iterator<Item = CellCoord> + '_>;

    fn resolution(&self) -> Resolution;

    fn workspace_size(&self) -> Vec3;

    fn bounds(&self, coord: CellCoord) -> (Vec3, Vec3);

    fn coord_to_world(&self, coord: CellCoord) -> Vec3;
}

/// Isosurface level. Fixed at `0.5` so sign changes occur exactly at
/// the occupancy boundary (spec §4.1).
pub const ISO_LEVEL: f32 = 0.5;

/// Point queries and finite-difference gradients over a borrowed grid
/// reference (spec §4.1).
pub struct GridSampler<'g> {
    grid: &'g dyn Grid,
}

impl<'g> GridSampler<'g> {
    pub fn new(grid: &'g dyn Grid) -> Self {
        Self { grid }
    }

    /// `1.0` where the cell is occupied, `0.0` otherwise. Cells below
    /// the ground plane are always `0.0`.
    pub fn sample(&self, coord: CellCoord) -> f32 {
        if !coord.is_above_ground() {
            return 0.0;
        }
        if self.grid.is_occupied(coord) {
            1.0
        } else {
            0.0
        }
    }

    pub fn is_inside(&self, coord: CellCoord) -> bool {
        self.sample(coord) > ISO_LEVEL
    }

    /// World-space position of a lattice coordinate, delegated to the
    /// backing grid's own cell-size convention.
    pub fn world_position(&self, coord: CellCoord) -> Vec3 {
        self.grid.coord_to_world(coord)
    }

    /// Central-difference gradient of `sample` along the three axes,
    /// normalized when its length exceeds `1e-4`, else the zero
    /// vector.
    pub fn gradient(&self, coord: CellCoord) -> Vec3 {
        let dx = self.sample(coord.offset(1, 0, 0)) - self.sample(coord.offset(-1, 0, 0));
        let dy = self.sample(coord.offset(0, 1, 0)) - self.sample(coord.offset(0, -1, 0));
        let dz = self.sample(coord.offset(0, 0, 1)) - self.sample(coord.offset(0, 0, -1));
        let g = Vec3::new(dx, dy, dz);
        if g.length() > 1e-4 {
            g.normalize()
        } else {
            Vec3::ZERO
        }
    }
}

/// Minimal `HashSet`-backed occupancy grid, used by this crate's own
/// tests, benches, and doc examples.
#[derive(Debug, Clone, Default)]
pub struct SparseGrid {
    occupied: HashSet<CellCoord>,
    cell_size: f32,
    resolution: Resolution,
}

impl SparseGrid {
    pub fn new(cell_size: f32, resolution: Resolution) -> Self {
        Self {
            occupied: HashSet::new(),
            cell_size,
            resolution,
        }
    }

    pub fn set(&mut self, coord: CellCoord, occupied: bool) {
        if occupied {
            self.occupied.insert(coord);
        } else {
            self.occupied.remove(&coord);
        }
    }

    pub fn len(&self) -> usize {
        self.occupied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupied.is_empty()
    }
}

impl Grid for SparseGrid {
    fn is_occupied(&self, coord: CellCoord) -> bool {
        self.occupied.contains(&coord)
    }

    fn active_cells(&self) -> Box<dyn Iterator<Item = CellCoord> + '_> {
        Box::new(self.occupied.iter().copied())
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn workspace_size(&self) -> Vec3 {
        Vec3::splat(self.cell_size * 1024.0)
    }

    fn bounds(&self, coord: CellCoord) -> (Vec3, Vec3) {
        cell_bounds(coord, self.cell_size)
    }

    fn coord_to_world(&self, coord: CellCoord) -> Vec3 {
        coord_to_world(coord, self.cell_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_cell_grid() -> SparseGrid {
        let mut g = SparseGrid::new(0.32, Resolution::Cm32);
        g.set(CellCoord::ZERO, true);
        g
    }

    #[test]
    fn sample_is_zero_one() {
        let g = single_cell_grid();
        let s = GridSampler::new(&g);
        assert_eq!(s.sample(CellCoord::ZERO), 1.0);
        assert_eq!(s.sample(CellCoord::new(5, 5, 5)), 0.0);
    }

    #[test]
    fn below_ground_always_empty() {
        let mut g = SparseGrid::new(0.32, Resolution::Cm32);
        g.set(CellCoord::new(0, -1, 0), true);
        let s = GridSampler::new(&g);
        assert_eq!(s.sample(CellCoord::new(0, -1, 0)), 0.0);
    }

    #[test]
    fn is_inside_matches_iso() {
        let g = single_cell_grid();
        let s = GridSampler::new(&g);
        assert!(s.is_inside(CellCoord::ZERO));
        assert!(!s.is_inside(CellCoord::new(1, 0, 0)));
    }

    #[test]
    fn gradient_points_away_from_solid() {
        let g = single_cell_grid();
        let s = GridSampler::new(&g);
        // At the solid cell itself all six neighbors are empty -> zero gradient by symmetry.
        let g0 = s.gradient(CellCoord::ZERO);
        assert_eq!(g0, Vec3::ZERO);

        // One step away along +X: -X neighbor is solid, +X neighbor is empty.
        let g1 = s.gradient(CellCoord::new(1, 0, 0));
        assert!(g1.x < 0.0);
    }
}
