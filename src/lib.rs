//! Voxel-to-mesh surface generation core.
//!
//! Turns a sparse occupancy grid into a triangle mesh through Dual
//! Contouring extraction, vertex deduplication and normal generation,
//! topology-aware smoothing, quadric-error simplification, and
//! watertight/manifold validation, orchestrated by
//! [`SurfaceCoordinator`] behind a two-level mesh cache.
//!
//! The command-line front end, project-file readers/writers, the
//! rendering pipeline, the voxel editing UI, and logging dispatch are
//! external collaborators and live outside this crate; only their
//! interfaces are modeled here (see [`grid::Grid`] and [`mesh::Mesh`]).

pub mod cache;
pub mod coord;
pub mod coordinator;
pub mod dual_contour;
pub mod error;
pub mod grid;
pub mod hermite;
pub mod mesh;
pub mod qef;
pub mod settings;
pub mod simplifier;
pub mod smoother;
pub mod topology;
pub mod validator;

pub use cache::{grid_content_hash, MeshCache, MeshCacheKey, ProgressiveCache, ProgressiveCacheKey};
pub use coord::CellCoord;
pub use coordinator::{GenerationOutcome, ProgressCallback, ProgressEvent, SurfaceCoordinator};
pub use dual_contour::{DualContour, DualContourStrategy};
pub use error::{SurfaceError, SurfaceResult};
pub use grid::{Grid, GridSampler, Resolution, SparseGrid, ISO_LEVEL};
pub use hermite::{CellRecord, Hermite};
pub use mesh::{Bounds, Mesh, MeshBuilder, Quad, DEFAULT_UP};
pub use qef::QefAccumulator;
pub use settings::{PreviewQuality, Settings, SmoothingAlgorithm};
pub use simplifier::Simplifier;
pub use smoother::Smoother;
pub use topology::{FeatureKind, TopologicalFeature, TopologyConstraints, TopologyPreserver};
pub use validator::{Validator, ValidationResult, MAX_SELF_INTERSECTION_PAIRS};
