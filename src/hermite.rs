//! Hermite edge-crossing data and the per-cell record that accumulates
//! it during Dual Contouring (spec §3).

use glam::Vec3;

use crate::coord::CellCoord;

/// Position and surface normal at one edge-surface crossing.
#[derive(Debug, Clone, Copy)]
pub struct Hermite {
    /// Interpolated crossing position, in world space.
    pub position: Vec3,
    /// Gradient of the scalar field at the crossing. Unit length
    /// when `intersects`.
    pub normal: Vec3,
    /// Interpolated scalar value at the crossing (always `ISO_LEVEL`
    /// by construction, kept for debugging/inspection).
    pub value: f32,
    pub intersects: bool,
}

impl Hermite {
    pub fn none() -> Self {
        Self {
            position: Vec3::ZERO,
            normal: Vec3::ZERO,
            value: 0.0,
            intersects: false,
        }
    }
}

impl Default for Hermite {
    fn default() -> Self {
        Self::none()
    }
}

/// Per-cell extractor state: the 12 Hermite samples on the cell's
/// edges, and the QEF-solved vertex once computed.
///
/// Invariant: `has_vertex` implies `vertex_pos` lies within the
/// cell's axis-aligned extent, clamped above the ground plane.
#[derive(Debug, Clone)]
pub struct CellRecord {
    pub coord: CellCoord,
    pub edges: [Hermite; 12],
    pub vertex_pos: Vec3,
    pub vertex_index: u32,
    pub has_vertex: bool,
}

impl CellRecord {
    pub fn empty(coord: CellCoord) -> Self {
        Self {
            coord,
            edges: [Hermite::none(); 12],
            vertex_pos: Vec3::ZERO,
            vertex_index: u32::MAX,
            has_vertex: false,
        }
    }

    pub fn any_edge_intersects(&self) -> bool {
        self.edges.iter().any(|e| e.intersects)
    }

    pub fn intersecting_edges(&self) -> impl Iterator<Item = &Hermite> {
        self.edges.iter().filter(|e| e.intersects)
    }
}

/// The 12 edges of a unit cell, as pairs of corner indices 0..=7
/// (`corner = x | y<<1 | z<<2`), and the axis each edge runs along
/// (0 = X, 1 = Y, 2 = Z). Order defines the edge index used to index
/// `CellRecord::edges`.
pub const CELL_EDGES: [(u8, u8, u8); 12] = [
    (0, 1, 0),
    (2, 3, 0),
    (4, 5, 0),
    (6, 7, 0),
    (0, 2, 1),
    (1, 3, 1),
    (4, 6, 1),
    (5, 7, 1),
    (0, 4, 2),
    (1, 5, 2),
    (2, 6, 2),
    (3, 7, 2),
];

pub fn corner_offset(corner: u8) -> (i32, i32, i32) {
    (
        (corner & 1) as i32,
        ((corner >> 1) & 1) as i32,
        ((corner >> 2) & 1) as i32,
    )
}
