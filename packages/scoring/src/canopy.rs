//! Canopy area accumulation inside segment buffers.

use geo::{Area, BooleanOps, BoundingRect, MultiPolygon};
use line_risk_models::{BufferedSegment, CanopyMeasurement, CanopyPolygon, CanopySegment};
use line_risk_spatial::SpatialIndex;

use crate::batch::{BatchOptions, process_batched};
use crate::geometry::{Validity, ensure_valid, guard_overlay, has_finite_coords};
use crate::{GeometryError, ScoringError};

/// Validated canopy polygons with their bounding-box index.
pub struct CanopyCorpus {
    polygons: Vec<MultiPolygon<f64>>,
    index: SpatialIndex,
    repaired: usize,
    dropped: usize,
}

impl CanopyCorpus {
    /// Validates every canopy polygon and indexes the survivors.
    ///
    /// Invalid polygons get the canonical repair; polygons the repair
    /// cannot fix are dropped and counted.
    #[must_use]
    pub fn new(canopy: Vec<CanopyPolygon>) -> Self {
        let total = canopy.len();
        let mut polygons = Vec::with_capacity(total);
        let mut repaired = 0;
        let mut dropped = 0;

        for (position, polygon) in canopy.into_iter().enumerate() {
            match ensure_valid(polygon.geometry) {
                Ok((geometry, Validity::Valid)) => polygons.push(geometry),
                Ok((geometry, Validity::Repaired)) => {
                    log::debug!("Canopy polygon {position} repaired");
                    repaired += 1;
                    polygons.push(geometry);
                }
                Err(e) => {
                    log::debug!("Canopy polygon {position} dropped: {e}");
                    dropped += 1;
                }
            }
        }

        let index = SpatialIndex::from_geometries(&polygons);

        log::info!(
            "Indexed {} of {total} canopy polygons ({repaired} repaired, {dropped} dropped)",
            index.len()
        );

        Self {
            polygons,
            index,
            repaired,
            dropped,
        }
    }

    /// Polygons kept after validation.
    #[must_use]
    pub fn polygons(&self) -> &[MultiPolygon<f64>] {
        &self.polygons
    }

    /// Polygons fixed by the canonical repair.
    #[must_use]
    pub const fn repaired(&self) -> usize {
        self.repaired
    }

    /// Polygons dropped because the repair failed.
    #[must_use]
    pub const fn dropped(&self) -> usize {
        self.dropped
    }
}

/// Output of the intersection stage.
#[derive(Debug, Clone)]
pub struct CanopyStage {
    /// One record per input segment, in input order.
    pub segments: Vec<CanopySegment>,
    /// Candidate intersections that failed across the whole stage.
    pub failed_candidates: usize,
}

/// Sums canopy area inside each buffer, pruning candidates through the
/// corpus index.
pub struct IntersectionAccumulator<'a> {
    corpus: &'a CanopyCorpus,
}

impl<'a> IntersectionAccumulator<'a> {
    #[must_use]
    pub const fn new(corpus: &'a CanopyCorpus) -> Self {
        Self { corpus }
    }

    /// Measures canopy inside one buffer.
    ///
    /// A candidate whose intersection fails contributes zero and is
    /// counted in [`CanopyMeasurement::failed_candidates`].
    #[must_use]
    pub fn measure(&self, buffered: &BufferedSegment) -> CanopyMeasurement {
        let Some(bbox) = buffered.buffer.bounding_rect() else {
            return CanopyMeasurement {
                canopy_area_sqft: 0.0,
                canopy_sqft_per_ft: 0.0,
                candidates: 0,
                failed_candidates: 0,
            };
        };

        let candidates = self.corpus.index.query(&bbox);
        let mut canopy_area_sqft = 0.0;
        let mut failed_candidates = 0;

        for &candidate in &candidates {
            match intersection_area(&buffered.buffer, &self.corpus.polygons[candidate]) {
                Ok(area) => canopy_area_sqft += area,
                Err(e) => {
                    log::debug!(
                        "Segment {}: canopy candidate {candidate} skipped: {e}",
                        buffered.segment.segment_id
                    );
                    failed_candidates += 1;
                }
            }
        }

        CanopyMeasurement {
            canopy_area_sqft,
            canopy_sqft_per_ft: per_foot(canopy_area_sqft, buffered.segment.length_ft),
            candidates: candidates.len(),
            failed_candidates,
        }
    }

    /// Measures every buffered segment in bounded parallel batches.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::Cancelled`] if the run is cancelled between
    /// batches.
    pub fn run(
        &self,
        segments: Vec<BufferedSegment>,
        options: &BatchOptions,
    ) -> Result<CanopyStage, ScoringError> {
        let measurements = process_batched(&segments, options, "canopy", |s| self.measure(s))?;

        let failed_candidates = measurements.iter().map(|m| m.failed_candidates).sum();
        let with_canopy = measurements
            .iter()
            .filter(|m| m.canopy_area_sqft > 0.0)
            .count();

        let segments: Vec<CanopySegment> = segments
            .into_iter()
            .zip(measurements)
            .map(|(buffered, canopy)| CanopySegment { buffered, canopy })
            .collect();

        log::info!(
            "Canopy measured for {} segments ({with_canopy} with canopy, {failed_candidates} failed intersections)",
            segments.len()
        );

        Ok(CanopyStage {
            segments,
            failed_candidates,
        })
    }
}

/// Exact area of `buffer ∩ canopy`.
///
/// # Errors
///
/// Returns a [`GeometryError`] for non-finite input, an overlay failure,
/// or a non-finite resulting area.
pub fn intersection_area(
    buffer: &MultiPolygon<f64>,
    canopy: &MultiPolygon<f64>,
) -> Result<f64, GeometryError> {
    if !has_finite_coords(buffer) || !has_finite_coords(canopy) {
        return Err(GeometryError::NonFinite);
    }

    let overlap = guard_overlay(|| buffer.intersection(canopy))?;
    let area = overlap.unsigned_area();

    if area.is_finite() {
        Ok(area)
    } else {
        Err(GeometryError::NonFiniteArea)
    }
}

fn per_foot(area: f64, length_ft: f64) -> f64 {
    if length_ft <= 0.0 {
        return 0.0;
    }
    let value = area / length_ft;
    if value.is_finite() { value } else { 0.0 }
}
