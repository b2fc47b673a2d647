//! Error kinds surfaced by the surface generation core.

/// Errors returned by the public API of this crate.
///
/// Recoverable numerical fallbacks (empty grid, QEF singular system,
/// zero-length normal) are handled locally with documented defaults and
/// never reach this type — see the module-level notes on
/// [`crate::dual_contour`] and [`crate::mesh`].
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    /// Settings contradict each other or hold an out-of-range value.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// The grid reference is unusable for the requested operation.
    #[error("grid unavailable: {0}")]
    GridUnavailable(String),

    /// Cancellation was observed during a stage.
    ///
    /// Not an error in the conventional sense: callers distinguish this
    /// from a real failure by checking [`crate::coordinator::GenerationOutcome::is_cancelled`]
    /// rather than matching on this variant in most call sites.
    #[error("generation cancelled")]
    Cancelled,

    /// The validator reported errors on the finished mesh.
    #[error("mesh failed validation: {0:?}")]
    ValidationFailed(Vec<String>),

    /// A contract-violating internal state was observed (e.g. a NaN
    /// escaped the QEF solver). Never inserted into the cache.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type SurfaceResult<T> = std::result::Result<T, SurfaceError>;
