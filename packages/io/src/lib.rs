#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reading input layers from `GeoJSON` and writing results as CSV.
//!
//! All layers must already be in the planar, foot-based reference frame
//! used by the scoring engine; no reprojection happens here.

pub mod export;
pub mod load;

use line_risk_models::DataIntegrityError;
use thiserror::Error;

pub use export::{write_neighborhood_summary, write_priority_segments, write_scored_segments};
pub use load::{InputPaths, load_inputs};

/// Errors that can occur while loading input layers.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The layer file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The layer is not valid `GeoJSON`.
    #[error("Invalid GeoJSON in {path}: {source}")]
    GeoJson {
        /// Path or label of the layer.
        path: String,
        /// Underlying error.
        source: Box<geojson::Error>,
    },

    /// The layer is valid `GeoJSON` but not a `FeatureCollection`.
    #[error("{path} is not a GeoJSON FeatureCollection")]
    NotFeatureCollection {
        /// Path or label of the layer.
        path: String,
    },

    /// A feature violates the fixed layer schema.
    #[error(transparent)]
    DataIntegrity(#[from] DataIntegrityError),
}

/// Errors that can occur while writing CSV output.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization or the underlying writer failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Flushing the underlying writer failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
