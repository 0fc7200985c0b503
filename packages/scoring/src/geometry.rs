//! Polygon validity checks and the canonical repair.
//!
//! The repair is a single best-effort pass: an invalid polygon is
//! re-unioned with itself, which rebuilds its rings through the overlay
//! engine. If the result is still invalid the geometry is rejected.

use std::panic::{AssertUnwindSafe, catch_unwind};

use geo::{BooleanOps, CoordsIter, MultiPolygon, Validation};

use crate::GeometryError;

/// How a polygon passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    /// Valid as given.
    Valid,
    /// Valid after the canonical repair.
    Repaired,
}

/// Whether every coordinate of `polygon` is finite.
#[must_use]
pub fn has_finite_coords(polygon: &MultiPolygon<f64>) -> bool {
    polygon
        .coords_iter()
        .all(|c| c.x.is_finite() && c.y.is_finite())
}

/// Returns `polygon` unchanged when valid, otherwise the repaired shape.
///
/// # Errors
///
/// Returns [`GeometryError::NonFinite`] for NaN/infinite coordinates and
/// [`GeometryError::Unrepairable`] when the repair does not yield a valid
/// polygon.
pub fn ensure_valid(
    polygon: MultiPolygon<f64>,
) -> Result<(MultiPolygon<f64>, Validity), GeometryError> {
    if !has_finite_coords(&polygon) {
        return Err(GeometryError::NonFinite);
    }

    if polygon.is_valid() {
        return Ok((polygon, Validity::Valid));
    }

    let repaired = repair(&polygon)?;
    if repaired.is_valid() {
        Ok((repaired, Validity::Repaired))
    } else {
        Err(GeometryError::Unrepairable)
    }
}

/// Canonical repair: union of the polygon with itself.
///
/// # Errors
///
/// Returns [`GeometryError::Unrepairable`] if the overlay engine fails.
pub fn repair(polygon: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>, GeometryError> {
    guard_overlay(|| polygon.union(polygon)).map_err(|_| GeometryError::Unrepairable)
}

/// Runs an overlay operation, turning a panic inside the overlay engine
/// into a [`GeometryError::IntersectionFailed`].
///
/// # Errors
///
/// Returns [`GeometryError::IntersectionFailed`] if `op` panics.
pub fn guard_overlay<T>(op: impl FnOnce() -> T) -> Result<T, GeometryError> {
    catch_unwind(AssertUnwindSafe(op)).map_err(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "overlay engine panicked".to_string());
        GeometryError::IntersectionFailed { message }
    })
}
