//! Orchestrates the full extraction -> build -> smooth -> simplify ->
//! validate pipeline, with cache lookup, LOD downsampling, progress
//! reporting, and cancellation (spec §4.8, §5).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::cache::{MeshCache, MeshCacheKey, ProgressiveCache, ProgressiveCacheKey};
use crate::coord::CellCoord;
use crate::dual_contour::{DualContour, DualContourStrategy};
use crate::error::{SurfaceError, SurfaceResult};
use crate::grid::{Grid, Resolution};
use crate::mesh::{Bounds, Mesh, MeshBuilder};
use crate::settings::Settings;
use crate::simplifier::Simplifier;
use crate::smoother::Smoother;
use crate::topology::TopologyPreserver;
use crate::validator::Validator;

/// `0..1` progress plus a short status string, reported at every stage
/// boundary of §4.8 (spec §6.5).
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub fraction: f32,
    pub status: &'static str,
}

/// Caller-supplied progress/cancel callback. Returning `false` requests
/// cancellation; a callback that panics is treated as cancellation by
/// the caller of [`SurfaceCoordinator::generate_surface`] (spec §7).
pub type ProgressCallback<'a> = dyn Fn(ProgressEvent) -> bool + 'a;

/// Outcome of one generation call: the mesh plus whether the run was
/// cancelled partway through (spec §7 "Cancelled").
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub mesh: Mesh,
    pub is_cancelled: bool,
}

impl GenerationOutcome {
    fn cancelled() -> Self {
        Self {
            mesh: Mesh::empty(),
            is_cancelled: true,
        }
    }

    fn done(mesh: Mesh) -> Self {
        Self {
            mesh,
            is_cancelled: false,
        }
    }
}

/// A temporary grid holding the majority-vote downsample of a source
/// grid at `2^level` cubes, used for LOD levels `> 0` (spec §4.8
/// "LOD n>0").
struct DownsampledGrid {
    occupied: std::collections::HashSet<CellCoord>,
    cell_size: f32,
    resolution: Resolution,
    workspace_size: glam::Vec3,
}

fn downsample_grid(source: &dyn Grid, level: u8) -> DownsampledGrid {
    let factor = 1i32 << level;
    let mut votes: HashMap<CellCoord, u32> = HashMap::new();
    let mut total: HashMap<CellCoord, u32> = HashMap::new();

    for coord in source.active_cells() {
        let coarse = CellCoord::new(
            coord.x.div_euclid(factor),
            coord.y.div_euclid(factor),
            coord.z.div_euclid(factor),
        );
        *votes.entry(coarse).or_insert(0) += 1;
    }
    // Majority vote needs the denominator too: how many fine cells a
    // coarse cell could hold, capped by how many were actually seen
    // occupied versus the cube's full volume.
    let cube_volume = (factor * factor * factor) as u32;
    for coarse in votes.keys() {
        total.insert(*coarse, cube_volume);
    }

    let occupied: std::collections::HashSet<CellCoord> = votes
        .into_iter()
        .filter(|(coarse, count)| *count * 2 >= *total.get(coarse).unwrap_or(&cube_volume))
        .map(|(coarse, _)| coarse)
        .collect();

    DownsampledGrid {
        occupied,
        cell_size: source.bounds(CellCoord::ZERO).1.x.max(1e-6) * factor as f32,
        resolution: source.resolution(),
        workspace_size: source.workspace_size(),
    }
}

impl Grid for DownsampledGrid {
    fn is_occupied(&self, coord: CellCoord) -> bool {
        self.occupied.contains(&coord)
    }

    fn active_cells(&self) -> Box<dyn Iterator<Item = CellCoord> + '_> {
        Box::new(self.occupied.iter().copied())
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn workspace_size(&self) -> glam::Vec3 {
        self.workspace_size
    }

    fn bounds(&self, coord: CellCoord) -> (glam::Vec3, glam::Vec3) {
        crate::coord::cell_bounds(coord, self.cell_size)
    }

    fn coord_to_world(&self, coord: CellCoord) -> glam::Vec3 {
        crate::coord::coord_to_world(coord, self.cell_size)
    }
}

fn report(progress: Option<&ProgressCallback>, fraction: f32, status: &'static str) -> bool {
    match progress {
        Some(cb) => cb(ProgressEvent { fraction, status }),
        None => true,
    }
}

/// Top-level entry point: owns the two caches and runs every stage of
/// §4.8 in order, polling cancellation at each stage boundary and in
/// every inner loop that scales with grid or mesh size (spec §5).
///
/// The `Mutex` below protects only the cache maps and the
/// active-generation bookkeeping; `DualContour`, `Smoother`,
/// `Simplifier`, and `Validator` run outside the lock against data
/// they alone own, matching the "lock released before running long
/// stages" rule of spec §5.
pub struct SurfaceCoordinator {
    mesh_cache: Mutex<MeshCache>,
    progressive_cache: Mutex<ProgressiveCache>,
    strategy: Box<dyn DualContourStrategy>,
}

impl Default for SurfaceCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfaceCoordinator {
    pub fn new() -> Self {
        Self {
            mesh_cache: Mutex::new(MeshCache::default()),
            progressive_cache: Mutex::new(ProgressiveCache::new()),
            strategy: Box::new(DualContour::new()),
        }
    }

    pub fn with_strategy(strategy: Box<dyn DualContourStrategy>) -> Self {
        Self {
            mesh_cache: Mutex::new(MeshCache::default()),
            progressive_cache: Mutex::new(ProgressiveCache::new()),
            strategy,
        }
    }

    /// Run the synchronous pipeline of spec §4.8 against `grid`.
    pub fn generate_surface(
        &self,
        grid: &dyn Grid,
        settings: &Settings,
        cancel: &dyn Fn() -> bool,
        progress: Option<&ProgressCallback>,
    ) -> SurfaceResult<GenerationOutcome> {
        settings.validate()?;

        // Stage 1: cache lookup.
        if !report(progress, 0.00, "cache lookup") || cancel() {
            return Ok(GenerationOutcome::cancelled());
        }
        let cache_key = MeshCacheKey::new(grid, settings, settings.lod);
        if let Some(mesh) = self.mesh_cache.lock().unwrap().get(&cache_key) {
            tracing::trace!(lod = settings.lod, "surface cache hit");
            report(progress, 1.00, "complete");
            return Ok(GenerationOutcome::done(mesh));
        }
        tracing::debug!(lod = settings.lod, "surface cache miss, extracting");

        // LOD n>0 runs stages 2-7 against a majority-vote downsample.
        let downsampled;
        let active_grid: &dyn Grid = if settings.lod > 0 {
            downsampled = downsample_grid(grid, settings.lod);
            &downsampled
        } else {
            grid
        };

        let outcome = self.generate_uncached(active_grid, settings, cancel, progress)?;
        if !outcome.is_cancelled {
            self.mesh_cache.lock().unwrap().insert(cache_key, outcome.mesh.clone());
        }
        Ok(outcome)
    }

    fn generate_uncached(
        &self,
        grid: &dyn Grid,
        settings: &Settings,
        cancel: &dyn Fn() -> bool,
        progress: Option<&ProgressCallback>,
    ) -> SurfaceResult<GenerationOutcome> {
        // Stage 2: dilation / active-cell set construction happens
        // inside the extractor itself; this boundary only reports it.
        if !report(progress, 0.05, "building active set") || cancel() {
            return Ok(GenerationOutcome::cancelled());
        }

        // Stage 3: Dual Contouring.
        if !report(progress, 0.10, "extracting surface") || cancel() {
            return Ok(GenerationOutcome::cancelled());
        }
        let quads = self.strategy.extract(grid, settings, cancel);
        if cancel() {
            return Ok(GenerationOutcome::cancelled());
        }
        if !report(progress, 0.60, "extraction complete") {
            return Ok(GenerationOutcome::cancelled());
        }

        // Stage 4: MeshBuilder.
        let builder = MeshBuilder::default();
        let mut mesh = builder.build(&quads, settings.generate_normals);
        if settings.generate_uvs {
            generate_planar_uvs(&mut mesh);
        }
        if !report(progress, 0.80, "mesh built") || cancel() {
            return Ok(GenerationOutcome::cancelled());
        }

        // Stage 5: optional Smoother under optional TopologyPreserver
        // constraints.
        let (algorithm, iterations) = settings.resolved_smoothing();
        if iterations > 0 {
            let preserver = TopologyPreserver::new();
            let mut constraints = if settings.preserve_topology {
                preserver.generate_constraints(&preserver.analyze_topology(&mesh))
            } else {
                crate::topology::TopologyConstraints::unconstrained()
            };
            if settings.preserve_boundaries {
                for feature in preserver.detect_holes(&mesh) {
                    constraints.locked_vertices.extend(feature.vertices);
                }
            }

            let smoother = Smoother::new();
            let before_genus = preserver.genus(&mesh);
            // Smoother's own callback signature is `Fn(f32) -> bool`;
            // adapt it to the 0.80..0.95 sub-range of this stage.
            let adapt = |f: f32| -> bool {
                report(progress, 0.80 + f * 0.15, "smoothing")
            };
            match smoother.smooth(&mesh, algorithm, iterations, &constraints, Some(&adapt)) {
                Some(smoothed) => {
                    if settings.preserve_topology {
                        let after_genus = preserver.genus(&smoothed);
                        debug_assert_eq!(before_genus, after_genus, "smoothing changed genus under preserve_topology");
                    }
                    mesh = smoothed;
                }
                None => return Ok(GenerationOutcome::cancelled()),
            }
        }
        if !report(progress, 0.95, "smoothing complete") || cancel() {
            return Ok(GenerationOutcome::cancelled());
        }

        // Stage 6: optional Simplifier.
        if settings.simplification_ratio < 1.0 {
            let simplifier = Simplifier::new(settings.preserve_boundaries, settings.preserve_topology);
            mesh = simplifier.simplify(&mesh, settings.simplification_ratio, cancel);
            if settings.generate_normals {
                builder.generate_normals(&mut mesh);
            }
        }
        if !report(progress, 0.98, "simplification complete") || cancel() {
            return Ok(GenerationOutcome::cancelled());
        }

        // Stage 7: Validator repair pass.
        let validator = Validator::new();
        validator.repair_basic_issues(&mut mesh, crate::mesh::DEDUP_EPSILON_M);
        let validation = validator.validate(&mesh, settings.min_feature_size);
        if !validation.errors.is_empty() {
            tracing::debug!(errors = ?validation.errors, "validator reported unrepaired errors");
        }

        report(progress, 1.00, "complete");
        Ok(GenerationOutcome::done(mesh))
    }

    /// Spawns [`Self::generate_surface`] onto a blocking tokio task, so
    /// callers on an async runtime don't stall their executor on a
    /// CPU-bound extraction (spec §5 "asynchronous variant").
    ///
    /// `grid` and `settings` must be `'static` + `Send`/`Sync` since
    /// they cross into the blocking task; callers typically wrap the
    /// grid in an `Arc`.
    pub fn generate_surface_async(
        self: Arc<Self>,
        grid: Arc<dyn Grid>,
        settings: Settings,
    ) -> tokio::task::JoinHandle<SurfaceResult<GenerationOutcome>> {
        tokio::task::spawn_blocking(move || self.generate_surface(grid.as_ref(), &settings, &|| false, None))
    }

    /// Drop cached meshes whose bounds intersect `region` (spec §4.8
    /// "invalidate_region").
    pub fn invalidate_region(&self, region: &Bounds) {
        self.mesh_cache.lock().unwrap().invalidate_region(region);
    }

    pub fn clear_caches(&self) {
        self.mesh_cache.lock().unwrap().clear();
        self.progressive_cache.lock().unwrap().clear();
    }

    /// Store one intermediate mesh into the progressive cache, keyed
    /// by `(base_key, target_level, preview_quality)` (spec §4.8
    /// "Progressive preview").
    pub fn store_progressive(&self, base_key: MeshCacheKey, target_level: u8, settings: &Settings, mesh: Mesh) {
        let key = ProgressiveCacheKey {
            base_key,
            target_level,
            preview_quality: settings.preview_quality,
        };
        self.progressive_cache.lock().unwrap().insert(key, mesh, true);
    }

    pub fn get_progressive(&self, base_key: MeshCacheKey, target_level: u8, settings: &Settings) -> Option<Mesh> {
        let key = ProgressiveCacheKey {
            base_key,
            target_level,
            preview_quality: settings.preview_quality,
        };
        self.progressive_cache.lock().unwrap().get(&key)
    }
}

/// Planar projection UVs, the simplest fallback a caller can override
/// downstream (no UV unwrapping is in scope for this crate).
fn generate_planar_uvs(mesh: &mut Mesh) {
    if mesh.vertices.is_empty() {
        mesh.uvs.clear();
        return;
    }
    let bounds = mesh.bounds;
    let size = (bounds.max - bounds.min).max(glam::Vec3::splat(1e-6));
    mesh.uvs = mesh
        .vertices
        .iter()
        .map(|v| {
            let rel = (*v - bounds.min) / size;
            glam::Vec2::new(rel.x, rel.z)
        })
        .collect();
}
