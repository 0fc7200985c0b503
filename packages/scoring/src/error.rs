//! Error taxonomy of the scoring engine.
//!
//! [`GeometryError`]s are per-record and never abort a run; they are
//! counted and degrade the affected record to a zero contribution.
//! [`ScoringError`] is the fatal error type returned by stages.

use line_risk_config::ConfigError;
use line_risk_models::DataIntegrityError;

/// A recoverable problem with a single geometry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    /// The geometry contains NaN or infinite coordinates.
    #[error("Geometry has non-finite coordinates")]
    NonFinite,

    /// The geometry has no coordinates.
    #[error("Geometry is empty")]
    Empty,

    /// The canonical repair did not produce a valid polygon.
    #[error("Geometry is still invalid after repair")]
    Unrepairable,

    /// The overlay engine failed while intersecting two polygons.
    #[error("Polygon intersection failed: {message}")]
    IntersectionFailed {
        /// Message recovered from the failure.
        message: String,
    },

    /// The intersection produced a NaN or infinite area.
    #[error("Intersection area is not finite")]
    NonFiniteArea,
}

/// A fatal error that stops the run.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    /// Invalid configuration, detected before computation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A stage cannot define the population it needs.
    #[error("Data integrity error: {0}")]
    DataIntegrity(#[from] DataIntegrityError),

    /// The run was cancelled between batches.
    #[error("Run cancelled during the {stage} stage")]
    Cancelled {
        /// Stage that observed the cancellation.
        stage: &'static str,
    },
}
