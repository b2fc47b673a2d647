//! Cell coordinates over the occupancy grid.
//!
//! The grid uses a centered convention: `(0,0,0)` is the workspace
//! center and `y=0` is the ground plane. Cells below the ground
//! (`y < 0`) are invalid and never carry occupancy.

use glam::{IVec3, Vec3};

/// Integer triple indexing one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct CellCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl CellCoord {
    pub const ZERO: CellCoord = CellCoord { x: 0, y: 0, z: 0 };

    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn to_ivec3(self) -> IVec3 {
        IVec3::new(self.x, self.y, self.z)
    }

    pub fn from_ivec3(v: IVec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }

    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// Below the ground plane is never a valid cell.
    pub fn is_above_ground(self) -> bool {
        self.y >= 0
    }

    /// The 26 axis/diagonal neighbors (excludes the cell itself).
    pub fn neighborhood_26(self) -> [CellCoord; 26] {
        let mut out = [CellCoord::ZERO; 26];
        let mut i = 0;
        for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    if dx == 0 && dy == 0 && dz == 0 {
                        continue;
                    }
                    out[i] = self.offset(dx, dy, dz);
                    i += 1;
                }
            }
        }
        out
    }

    /// Pack into 64 bits via three 20-bit fields, matching the
    /// teacher's packed-coordinate convention for dense hash-map keys
    /// (`astraweave-terrain`'s octree uses the same `(x,y,z)` packing
    /// idea for chunk tables).
    pub fn packed(self) -> u64 {
        const BIAS: i64 = 1 << 19;
        const MASK: u64 = (1 << 20) - 1;
        let px = ((self.x as i64 + BIAS) as u64) & MASK;
        let py = ((self.y as i64 + BIAS) as u64) & MASK;
        let pz = ((self.z as i64 + BIAS) as u64) & MASK;
        px | (py << 20) | (pz << 40)
    }
}

/// World-space min/max corner of one cell, given a uniform cell size.
pub fn cell_bounds(coord: CellCoord, cell_size: f32) -> (Vec3, Vec3) {
    let min = Vec3::new(
        coord.x as f32 * cell_size,
        coord.y as f32 * cell_size,
        coord.z as f32 * cell_size,
    );
    (min, min + Vec3::splat(cell_size))
}

pub fn coord_to_world(coord: CellCoord, cell_size: f32) -> Vec3 {
    Vec3::new(
        coord.x as f32 * cell_size,
        coord.y as f32 * cell_size,
        coord.z as f32 * cell_size,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ground_plane_rule() {
        assert!(CellCoord::new(0, 0, 0).is_above_ground());
        assert!(!CellCoord::new(0, -1, 0).is_above_ground());
    }

    #[test]
    fn neighborhood_has_26_distinct_cells() {
        let n = CellCoord::new(3, 3, 3).neighborhood_26();
        let mut set = std::collections::HashSet::new();
        for c in n {
            assert_ne!(c, CellCoord::new(3, 3, 3));
            set.insert(c);
        }
        assert_eq!(set.len(), 26);
    }

    #[test]
    fn packed_roundtrips_in_practical_range() {
        let c = CellCoord::new(-100, 5, 200);
        let other = CellCoord::new(-100, 5, 201);
        assert_ne!(c.packed(), other.packed());
    }

    #[test]
    fn bounds_are_cell_size_apart() {
        let (min, max) = cell_bounds(CellCoord::new(1, 0, 0), 0.32);
        assert!((max.x - min.x - 0.32).abs() < 1e-6);
    }
}
