#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Neighborhood assignment and per-neighborhood risk summaries.
//!
//! Each scored segment is assigned to the first neighborhood polygon (in
//! partition order) whose interior contains the segment centroid.
//! Segments that fall in no polygon, including those sitting exactly on a
//! boundary, are grouped under [`OUTSIDE_CITY_LIMITS`].
//!
//! [`OUTSIDE_CITY_LIMITS`]: line_risk_models::OUTSIDE_CITY_LIMITS

pub mod index;
pub mod summary;

pub use index::NeighborhoodIndex;
pub use summary::{NeighborhoodAggregation, aggregate};
