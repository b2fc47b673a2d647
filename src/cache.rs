//! Mesh and progressive-preview caching (spec §4.8/§9).
//!
//! Two independent caches, both plain `HashMap`s with manual
//! last-access tracking rather than an external LRU crate, matching
//! how chunk mesh results are cached elsewhere in this codebase: a
//! final-mesh cache keyed by grid content + settings + LOD, and a
//! progressive-preview cache keyed by a base key plus target
//! smoothing level and preview quality.

use std::collections::HashMap;
use std::time::Instant;

use crate::grid::Grid;
use crate::mesh::{Bounds, Mesh};
use crate::settings::{PreviewQuality, Settings};

/// Cap on how many occupied cells contribute to the content hash, so
/// hashing a huge grid stays cheap (spec §9).
const GRID_HASH_SAMPLE_CAP: usize = 1_000;

fn hash_combine(hash: &mut u64, value: u64) {
    *hash ^= value.wrapping_add(0x9e3779b97f4a7c15).wrapping_add(hash.wrapping_shl(6)).wrapping_add(*hash >> 2);
}

/// Content hash over a grid's occupied-cell set, sampled rather than
/// exhaustive once the cell count passes [`GRID_HASH_SAMPLE_CAP`].
pub fn grid_content_hash(grid: &dyn Grid) -> u64 {
    let mut hash: u64 = 0;
    let size = grid.workspace_size();
    hash_combine(&mut hash, size.x as u64);
    hash_combine(&mut hash, size.y as u64);
    hash_combine(&mut hash, size.z as u64);

    let cells: Vec<_> = grid.active_cells().collect();
    let step = (cells.len() / GRID_HASH_SAMPLE_CAP).max(1);
    for (i, coord) in cells.iter().enumerate() {
        if i % step == 0 {
            hash_combine(&mut hash, coord.packed());
        }
    }
    hash
}

/// Key identifying one finished mesh generation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshCacheKey {
    pub grid_hash: u64,
    pub settings_hash: u64,
    pub lod: u8,
}

impl MeshCacheKey {
    pub fn new(grid: &dyn Grid, settings: &Settings, lod: u8) -> Self {
        Self {
            grid_hash: grid_content_hash(grid),
            settings_hash: settings.stable_hash(),
            lod,
        }
    }
}

struct MeshEntry {
    mesh: Mesh,
    bounds: Bounds,
    last_access: Instant,
}

/// Final-mesh cache, evicted by oldest-access once `max_memory_bytes`
/// is exceeded.
pub struct MeshCache {
    entries: HashMap<MeshCacheKey, MeshEntry>,
    max_memory_bytes: usize,
    current_memory_bytes: usize,
    hits: usize,
    misses: usize,
}

impl Default for MeshCache {
    fn default() -> Self {
        // 256 MiB, matching the reference generator's default budget.
        Self::new(256 * 1024 * 1024)
    }
}

impl MeshCache {
    pub fn new(max_memory_bytes: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_memory_bytes,
            current_memory_bytes: 0,
            hits: 0,
            misses: 0,
        }
    }

    pub fn get(&mut self, key: &MeshCacheKey) -> Option<Mesh> {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.last_access = Instant::now();
            self.hits += 1;
            Some(entry.mesh.clone())
        } else {
            self.misses += 1;
            None
        }
    }

    pub fn contains(&self, key: &MeshCacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: MeshCacheKey, mesh: Mesh) {
        let size = mesh.memory_usage();
        if let Some(old) = self.entries.remove(&key) {
            self.current_memory_bytes = self.current_memory_bytes.saturating_sub(old.mesh.memory_usage());
        }
        self.current_memory_bytes += size;
        let bounds = mesh.bounds;
        self.entries.insert(
            key,
            MeshEntry {
                mesh,
                bounds,
                last_access: Instant::now(),
            },
        );
        self.evict_to_budget();
    }

    fn evict_to_budget(&mut self) {
        while self.current_memory_bytes > self.max_memory_bytes && !self.entries.is_empty() {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_access)
                .map(|(k, _)| *k);
            let Some(key) = oldest else { break };
            if let Some(entry) = self.entries.remove(&key) {
                self.current_memory_bytes = self.current_memory_bytes.saturating_sub(entry.mesh.memory_usage());
            }
        }
    }

    /// Drop every entry whose bounds overlap `region`, used when an
    /// edit invalidates part of the grid (spec §4.8 "cache
    /// invalidation on edit").
    pub fn invalidate_region(&mut self, region: &Bounds) {
        self.entries.retain(|_, entry| !entry.bounds.intersects(region));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.current_memory_bytes = 0;
    }

    pub fn memory_usage(&self) -> usize {
        self.current_memory_bytes
    }

    pub fn set_max_memory(&mut self, max_bytes: usize) {
        self.max_memory_bytes = max_bytes;
        self.evict_to_budget();
    }

    pub fn hit_rate(&self) -> f32 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f32 / total as f32
        }
    }
}

/// Key identifying one progressive-preview result: a base generation
/// key plus the smoothing level reached and the preview quality it
/// was produced under (spec §5 "progressive refinement").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgressiveCacheKey {
    pub base_key: MeshCacheKey,
    pub target_level: u8,
    pub preview_quality: PreviewQuality,
}

struct ProgressiveEntry {
    mesh: Mesh,
    is_progressive: bool,
    last_access: Instant,
}

/// Short-lived cache for in-flight progressive refinement passes.
/// Entries expire after [`ProgressiveCache::clear_expired`]'s max age
/// regardless of memory pressure, since these are only useful while a
/// generation is actively being previewed.
pub struct ProgressiveCache {
    entries: HashMap<ProgressiveCacheKey, ProgressiveEntry>,
}

impl Default for ProgressiveCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressiveCache {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    pub fn get(&mut self, key: &ProgressiveCacheKey) -> Option<Mesh> {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.last_access = Instant::now();
            Some(entry.mesh.clone())
        } else {
            None
        }
    }

    pub fn insert(&mut self, key: ProgressiveCacheKey, mesh: Mesh, is_progressive: bool) {
        self.entries.insert(
            key,
            ProgressiveEntry {
                mesh,
                is_progressive,
                last_access: Instant::now(),
            },
        );
    }

    pub fn is_progressive(&self, key: &ProgressiveCacheKey) -> bool {
        self.entries.get(key).map(|e| e.is_progressive).unwrap_or(false)
    }

    pub fn clear_expired(&mut self, max_age: std::time::Duration) {
        let now = Instant::now();
        self.entries.retain(|_, e| now.duration_since(e.last_access) < max_age);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::CellCoord;
    use crate::grid::{Resolution, SparseGrid};
    use crate::mesh::{MeshBuilder, Quad};

    fn sample_mesh() -> Mesh {
        MeshBuilder::default().build(
            &[Quad {
                corners: [
                    glam::Vec3::new(0.0, 0.0, 0.0),
                    glam::Vec3::new(1.0, 0.0, 0.0),
                    glam::Vec3::new(1.0, 1.0, 0.0),
                    glam::Vec3::new(0.0, 1.0, 0.0),
                ],
            }],
            false,
        )
    }

    #[test]
    fn cache_miss_then_hit() {
        let grid = SparseGrid::new(0.32, Resolution::Cm32);
        let settings = Settings::default();
        let key = MeshCacheKey::new(&grid, &settings, 0);
        let mut cache = MeshCache::default();
        assert!(cache.get(&key).is_none());
        cache.insert(key, sample_mesh());
        assert!(cache.get(&key).is_some());
        assert!(cache.hit_rate() > 0.0);
    }

    #[test]
    fn different_grids_produce_different_keys() {
        let mut grid_a = SparseGrid::new(0.32, Resolution::Cm32);
        let mut grid_b = SparseGrid::new(0.32, Resolution::Cm32);
        grid_a.set(CellCoord::new(1, 1, 1), true);
        grid_b.set(CellCoord::new(2, 2, 2), true);
        let settings = Settings::default();
        let key_a = MeshCacheKey::new(&grid_a, &settings, 0);
        let key_b = MeshCacheKey::new(&grid_b, &settings, 0);
        assert_ne!(key_a, key_b);
    }

    #[test]
    fn eviction_respects_memory_budget() {
        let mut cache = MeshCache::new(1);
        let grid = SparseGrid::new(0.32, Resolution::Cm32);
        let settings = Settings::default();
        let key_a = MeshCacheKey::new(&grid, &settings, 0);
        let key_b = MeshCacheKey::new(&grid, &settings, 1);
        cache.insert(key_a, sample_mesh());
        cache.insert(key_b, sample_mesh());
        // Budget of 1 byte can't hold even one mesh, so eviction keeps
        // at most the most recently inserted entry.
        assert!(cache.memory_usage() <= sample_mesh().memory_usage());
    }

    #[test]
    fn invalidate_region_drops_overlapping_entries() {
        let mut cache = MeshCache::default();
        let grid = SparseGrid::new(0.32, Resolution::Cm32);
        let settings = Settings::default();
        let key = MeshCacheKey::new(&grid, &settings, 0);
        cache.insert(key, sample_mesh());
        let region = Bounds {
            min: glam::Vec3::new(-1.0, -1.0, -1.0),
            max: glam::Vec3::new(2.0, 2.0, 2.0),
        };
        cache.invalidate_region(&region);
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn progressive_cache_roundtrip() {
        let grid = SparseGrid::new(0.32, Resolution::Cm32);
        let settings = Settings::default();
        let base = MeshCacheKey::new(&grid, &settings, 0);
        let key = ProgressiveCacheKey {
            base_key: base,
            target_level: 3,
            preview_quality: PreviewQuality::Fast,
        };
        let mut cache = ProgressiveCache::new();
        assert!(cache.get(&key).is_none());
        cache.insert(key, sample_mesh(), true);
        assert!(cache.get(&key).is_some());
        assert!(cache.is_progressive(&key));
    }
}
