//! Settings surface accepted by every public generation call.
//!
//! `Settings` is a plain value type: no environment variables, no
//! persisted state, no global config file. It derives `serde` so an
//! external collaborator (editor, CLI) can round-trip a value, but the
//! core itself never reads or writes one from disk.

use serde::{Deserialize, Serialize};

use crate::error::{SurfaceError, SurfaceResult};

/// Smoothing filter family. `Auto` picks one from `smoothing_level`
/// per the table in spec §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SmoothingAlgorithm {
    Auto,
    None,
    Laplacian,
    Taubin,
    BiLaplacian,
}

/// A multiplier on smoothing iterations and a switch on simplification
/// aggressiveness, selected by the caller for real-time preview vs.
/// export-quality generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PreviewQuality {
    Disabled,
    Fast,
    Balanced,
    HighQuality,
}

impl PreviewQuality {
    /// Divisor applied to the smoothing iteration count (floor, minimum 1).
    pub fn iteration_divisor(self) -> u32 {
        match self {
            PreviewQuality::Disabled => 1,
            PreviewQuality::Fast => 4,
            PreviewQuality::Balanced => 3,
            PreviewQuality::HighQuality => 2,
        }
    }

    /// `Fast` forces the Laplacian algorithm regardless of level.
    pub fn forces_laplacian(self) -> bool {
        matches!(self, PreviewQuality::Fast)
    }
}

/// Settings for one surface generation call.
///
/// Equality and hashing are hand-rolled over the bit pattern of every
/// float field (`f32::to_bits`) because `f32` does not implement
/// `Hash`/`Eq`, and the cache key (spec §9, "Cache key stability") must
/// be stable across runs and process boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub smoothing_level: u8,
    pub smoothing_algorithm: SmoothingAlgorithm,
    pub preserve_topology: bool,
    pub preserve_boundaries: bool,
    pub preserve_sharp_features: bool,
    pub sharp_feature_angle: f32,
    pub min_feature_size: f32,
    pub adaptive_error: f32,
    pub generate_normals: bool,
    pub generate_uvs: bool,
    pub simplification_ratio: f32,
    pub preview_quality: PreviewQuality,
    pub lod: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            smoothing_level: 0,
            smoothing_algorithm: SmoothingAlgorithm::Auto,
            preserve_topology: true,
            preserve_boundaries: true,
            preserve_sharp_features: true,
            sharp_feature_angle: 30.0,
            min_feature_size: 1.0,
            adaptive_error: 0.01,
            generate_normals: true,
            generate_uvs: false,
            simplification_ratio: 1.0,
            preview_quality: PreviewQuality::Disabled,
            lod: 0,
        }
    }
}

impl Settings {
    /// Preset tuned for real-time preview: lower simplification
    /// headroom, fast smoothing.
    pub fn preview() -> Self {
        Self {
            preview_quality: PreviewQuality::Fast,
            smoothing_level: 4,
            simplification_ratio: 0.5,
            ..Self::default()
        }
    }

    /// Preset tuned for final export: full smoothing headroom, no
    /// simplification.
    pub fn export() -> Self {
        Self {
            preview_quality: PreviewQuality::HighQuality,
            smoothing_level: 8,
            simplification_ratio: 1.0,
            ..Self::default()
        }
    }

    /// Validate the contradictory/out-of-range cases called out in
    /// spec §7 (`InvalidSettings`).
    pub fn validate(&self) -> SurfaceResult<()> {
        if self.smoothing_level > 15 {
            return Err(SurfaceError::InvalidSettings(format!(
                "smoothing_level {} out of range 0..=15",
                self.smoothing_level
            )));
        }
        if self.lod > 4 {
            return Err(SurfaceError::InvalidSettings(format!(
                "lod {} out of range 0..=4",
                self.lod
            )));
        }
        if !(0.0..=1.0).contains(&self.simplification_ratio) {
            return Err(SurfaceError::InvalidSettings(format!(
                "simplification_ratio {} out of range 0.0..=1.0",
                self.simplification_ratio
            )));
        }
        if self.sharp_feature_angle < 0.0 || self.sharp_feature_angle > 180.0 {
            return Err(SurfaceError::InvalidSettings(format!(
                "sharp_feature_angle {} out of range 0..=180 degrees",
                self.sharp_feature_angle
            )));
        }
        if self.min_feature_size < 0.0 {
            return Err(SurfaceError::InvalidSettings(
                "min_feature_size must be non-negative".into(),
            ));
        }
        if self.adaptive_error < 0.0 {
            return Err(SurfaceError::InvalidSettings(
                "adaptive_error must be non-negative".into(),
            ));
        }
        Ok(())
    }

    /// Resolve `Auto`/preview-adjusted algorithm and iteration count
    /// from the table in spec §4.3.
    pub fn resolved_smoothing(&self) -> (SmoothingAlgorithm, u32) {
        let (mut algorithm, mut iterations) = match self.smoothing_algorithm {
            SmoothingAlgorithm::Auto => level_to_algorithm(self.smoothing_level),
            other => (other, level_to_algorithm(self.smoothing_level).1),
        };

        if matches!(algorithm, SmoothingAlgorithm::None) || self.smoothing_level == 0 {
            return (SmoothingAlgorithm::None, 0);
        }

        let divisor = self.preview_quality.iteration_divisor();
        iterations = (iterations / divisor).max(1);
        if self.preview_quality.forces_laplacian() {
            algorithm = SmoothingAlgorithm::Laplacian;
        }

        (algorithm, iterations)
    }

    /// Stable hash for cache keys: combines the bit pattern of every
    /// field so the result is identical across process runs.
    pub fn stable_hash(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.hash_into(&mut hasher);
        hasher.finish()
    }

    fn hash_into<H: std::hash::Hasher>(&self, hasher: &mut H) {
        use std::hash::Hash;
        self.smoothing_level.hash(hasher);
        std::mem::discriminant(&self.smoothing_algorithm).hash(hasher);
        self.preserve_topology.hash(hasher);
        self.preserve_boundaries.hash(hasher);
        self.preserve_sharp_features.hash(hasher);
        self.sharp_feature_angle.to_bits().hash(hasher);
        self.min_feature_size.to_bits().hash(hasher);
        self.adaptive_error.to_bits().hash(hasher);
        self.generate_normals.hash(hasher);
        self.generate_uvs.hash(hasher);
        self.simplification_ratio.to_bits().hash(hasher);
        std::mem::discriminant(&self.preview_quality).hash(hasher);
        self.lod.hash(hasher);
    }
}

impl PartialEq for Settings {
    fn eq(&self, other: &Self) -> bool {
        self.smoothing_level == other.smoothing_level
            && self.smoothing_algorithm == other.smoothing_algorithm
            && self.preserve_topology == other.preserve_topology
            && self.preserve_boundaries == other.preserve_boundaries
            && self.preserve_sharp_features == other.preserve_sharp_features
            && self.sharp_feature_angle.to_bits() == other.sharp_feature_angle.to_bits()
            && self.min_feature_size.to_bits() == other.min_feature_size.to_bits()
            && self.adaptive_error.to_bits() == other.adaptive_error.to_bits()
            && self.generate_normals == other.generate_normals
            && self.generate_uvs == other.generate_uvs
            && self.simplification_ratio.to_bits() == other.simplification_ratio.to_bits()
            && self.preview_quality == other.preview_quality
            && self.lod == other.lod
    }
}
impl Eq for Settings {}

impl std::hash::Hash for Settings {
    fn hash<H: std::hash::Hasher>(&self, hasher: &mut H) {
        self.hash_into(hasher)
    }
}

/// Level-to-(algorithm, iterations) table, spec §4.3 (authoritative).
fn level_to_algorithm(level: u8) -> (SmoothingAlgorithm, u32) {
    match level {
        0 => (SmoothingAlgorithm::None, 0),
        1..=3 => (SmoothingAlgorithm::Laplacian, 2 * level as u32),
        4..=7 => (SmoothingAlgorithm::Taubin, 1 + 2 * (level as u32 - 3)),
        _ => (SmoothingAlgorithm::BiLaplacian, 2 + 2 * (level as u32 - 7)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_validate() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_simplification_ratio() {
        let mut s = Settings::default();
        s.simplification_ratio = 1.5;
        assert!(s.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_smoothing_level() {
        let mut s = Settings::default();
        s.smoothing_level = 16;
        assert!(s.validate().is_err());
    }

    #[test]
    fn level_zero_disables_smoothing() {
        let s = Settings::default();
        assert_eq!(s.resolved_smoothing(), (SmoothingAlgorithm::None, 0));
    }

    #[test]
    fn level_table_matches_spec() {
        let mut s = Settings::default();
        s.smoothing_level = 2;
        assert_eq!(s.resolved_smoothing(), (SmoothingAlgorithm::Laplacian, 4));

        s.smoothing_level = 5;
        assert_eq!(s.resolved_smoothing(), (SmoothingAlgorithm::Taubin, 5));

        s.smoothing_level = 9;
        assert_eq!(s.resolved_smoothing(), (SmoothingAlgorithm::BiLaplacian, 6));
    }

    #[test]
    fn preview_quality_divides_iterations() {
        let mut s = Settings::default();
        s.smoothing_level = 9; // BiLaplacian, 6 iterations
        s.preview_quality = PreviewQuality::Balanced; // divide by 3
        assert_eq!(s.resolved_smoothing(), (SmoothingAlgorithm::BiLaplacian, 2));
    }

    #[test]
    fn fast_preview_forces_laplacian() {
        let mut s = Settings::default();
        s.smoothing_level = 9;
        s.preview_quality = PreviewQuality::Fast;
        let (algo, iters) = s.resolved_smoothing();
        assert_eq!(algo, SmoothingAlgorithm::Laplacian);
        assert!(iters >= 1);
    }

    #[test]
    fn stable_hash_is_deterministic() {
        let a = Settings::default();
        let b = Settings::default();
        assert_eq!(a.stable_hash(), b.stable_hash());
        assert_eq!(a, b);
    }

    #[test]
    fn stable_hash_differs_on_change() {
        let a = Settings::default();
        let mut b = Settings::default();
        b.smoothing_level = 5;
        assert_ne!(a.stable_hash(), b.stable_hash());
        assert_ne!(a, b);
    }
}
