#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Vegetation conflict risk scoring for overhead power lines.
//!
//! The engine runs five stages over a fixed set of input layers:
//!
//! 1. [`buffer`] offsets every conductor segment into a clearance buffer.
//! 2. [`canopy`] sums the tree canopy area inside each buffer.
//! 3. [`proximity`] classifies each segment by the distance to its
//!    nearest fire station or hospital.
//! 4. [`risk`] normalizes the factors into a weighted composite score,
//!    percentile tiers and a unique priority rank.
//! 5. Neighborhood aggregation via `line_risk_neighborhood`.
//!
//! [`pipeline::Pipeline`] chains them. Per-segment work in stages 1-3 is
//! split into bounded batches ([`batch`]) that run on the `rayon` pool.

pub mod batch;
pub mod buffer;
pub mod canopy;
mod error;
pub mod geometry;
pub mod pipeline;
pub mod progress;
pub mod proximity;
pub mod risk;

pub use error::{GeometryError, ScoringError};
pub use pipeline::{Pipeline, RunOutput};
