//! Quadratic Error Function accumulation and solve (spec §4.2 step 3,
//! §9 "QEF solver").
//!
//! `QEF = Σ (n · (x - p))²` over the edge-crossing planes of one cell,
//! minimized to place that cell's Dual Contouring vertex. The 3×3
//! symmetric system is solved directly with a Cholesky decomposition;
//! this deliberately does not pull in a general linear-algebra crate
//! (spec §9).

use glam::{Mat3, Vec3};

/// Accumulates the symmetric system `A = Σ n·nᵀ`, `b = Σ (n·p) n` over
/// a cell's intersecting edges.
#[derive(Debug, Clone, Copy, Default)]
pub struct QefAccumulator {
    /// Upper triangle of the symmetric 3x3 matrix: (a00, a01, a02, a11, a12, a22).
    a: [f32; 6],
    b: Vec3,
    mass_point_sum: Vec3,
    count: u32,
}

impl QefAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_plane(&mut self, position: Vec3, normal: Vec3) {
        let n = normal;
        self.a[0] += n.x * n.x;
        self.a[1] += n.x * n.y;
        self.a[2] += n.x * n.z;
        self.a[3] += n.y * n.y;
        self.a[4] += n.y * n.z;
        self.a[5] += n.z * n.z;

        let nd = n.dot(position);
        self.b += n * nd;

        self.mass_point_sum += position;
        self.count += 1;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn mass_point(&self) -> Vec3 {
        if self.count == 0 {
            Vec3::ZERO
        } else {
            self.mass_point_sum / self.count as f32
        }
    }

    /// Solve for the position minimizing the accumulated QEF. Falls
    /// back to the mass-point average of intersection positions on a
    /// singular system (any Cholesky diagonal `<= 1e-6`).
    pub fn solve(&self) -> Vec3 {
        if self.count == 0 {
            return Vec3::ZERO;
        }
        match self.cholesky_solve() {
            Some(x) => x,
            None => self.mass_point(),
        }
    }

    fn matrix(&self) -> Mat3 {
        Mat3::from_cols(
            Vec3::new(self.a[0], self.a[1], self.a[2]),
            Vec3::new(self.a[1], self.a[3], self.a[4]),
            Vec3::new(self.a[2], self.a[4], self.a[5]),
        )
    }

    fn cholesky_solve(&self) -> Option<Vec3> {
        const EPSILON: f32 = 1e-6;
        let a = self.matrix();

        // Standard lower-triangular Cholesky A = L Lt for a symmetric
        // positive semi-definite 3x3 matrix.
        let l00_sq = a.x_axis.x;
        if l00_sq <= EPSILON {
            return None;
        }
        let l00 = l00_sq.sqrt();

        let l10 = a.x_axis.y / l00;
        let l11_sq = a.y_axis.y - l10 * l10;
        if l11_sq <= EPSILON {
            return None;
        }
        let l11 = l11_sq.sqrt();

        let l20 = a.x_axis.z / l00;
        let l21 = (a.y_axis.z - l20 * l10) / l11;
        let l22_sq = a.z_axis.z - l20 * l20 - l21 * l21;
        if l22_sq <= EPSILON {
            return None;
        }
        let l22 = l22_sq.sqrt();

        // Forward substitution L y = b.
        let y0 = self.b.x / l00;
        let y1 = (self.b.y - l10 * y0) / l11;
        let y2 = (self.b.z - l20 * y0 - l21 * y1) / l22;

        // Back substitution Lt x = y.
        let x2 = y2 / l22;
        let x1 = (y1 - l21 * x2) / l11;
        let x0 = (y0 - l10 * x1 - l20 * x2) / l00;

        if !x0.is_finite() || !x1.is_finite() || !x2.is_finite() {
            return None;
        }
        Some(Vec3::new(x0, x1, x2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_accumulator_solves_to_origin() {
        let qef = QefAccumulator::new();
        assert_eq!(qef.solve(), Vec3::ZERO);
    }

    #[test]
    fn single_plane_is_rank_deficient_and_falls_back_to_mass_point() {
        let mut qef = QefAccumulator::new();
        qef.add_plane(Vec3::new(0.5, 0.0, 0.0), Vec3::X);
        // Rank 1 system -> singular -> mass point.
        assert_eq!(qef.solve(), Vec3::new(0.5, 0.0, 0.0));
    }

    #[test]
    fn three_orthogonal_planes_recover_the_corner() {
        let mut qef = QefAccumulator::new();
        qef.add_plane(Vec3::new(0.5, 0.3, 0.7), Vec3::X);
        qef.add_plane(Vec3::new(0.3, 0.5, 0.7), Vec3::Y);
        qef.add_plane(Vec3::new(0.3, 0.3, 0.5), Vec3::Z);
        let solved = qef.solve();
        assert!((solved - Vec3::new(0.5, 0.5, 0.5)).length() < 1e-3);
    }
}
