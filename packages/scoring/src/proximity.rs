//! Nearest critical facility for each segment centroid.

use geo::Point;
use line_risk_config::ProximityThresholds;
use line_risk_models::{
    CanopySegment, DataIntegrityError, Facility, ProximityClass, ProximityMeasurement,
    ProximitySegment, Segment,
};
use line_risk_spatial::PointIndex;

use crate::ScoringError;
use crate::batch::{BatchOptions, process_batched};

/// Output of the proximity stage.
#[derive(Debug, Clone)]
pub struct ProximityStage {
    /// One record per input segment, in input order.
    pub segments: Vec<ProximitySegment>,
    /// Segments without a usable centroid.
    pub unlocated: usize,
}

/// Classifies segments by distance to the nearest fire station or
/// hospital.
pub struct ProximityScorer<'a> {
    facilities: &'a [Facility],
    index: PointIndex,
    thresholds: ProximityThresholds,
}

impl<'a> ProximityScorer<'a> {
    /// Indexes the facility corpus.
    ///
    /// # Errors
    ///
    /// * If the facility corpus is empty
    /// * If the thresholds are invalid
    pub fn new(
        facilities: &'a [Facility],
        thresholds: ProximityThresholds,
    ) -> Result<Self, ScoringError> {
        thresholds.validate()?;

        let points: Vec<Point<f64>> = facilities.iter().map(|f| f.location).collect();
        let index = PointIndex::new(&points);

        if index.is_empty() {
            return Err(DataIntegrityError::EmptyCorpus {
                corpus: "facility",
            }
            .into());
        }

        if index.len() < facilities.len() {
            log::warn!(
                "{} facilities with non-finite coordinates were not indexed",
                facilities.len() - index.len()
            );
        }

        Ok(Self {
            facilities,
            index,
            thresholds,
        })
    }

    /// Maps a distance onto its proximity class. Bands are half-open on
    /// the upper side.
    #[must_use]
    pub fn classify_distance(&self, distance_ft: f64) -> ProximityClass {
        if distance_ft < self.thresholds.high {
            ProximityClass::High
        } else if distance_ft < self.thresholds.medium {
            ProximityClass::Medium
        } else {
            ProximityClass::Low
        }
    }

    /// Nearest facility to `point`.
    ///
    /// Returns `None` only for a non-finite query point.
    #[must_use]
    pub fn measure_point(&self, point: Point<f64>) -> Option<ProximityMeasurement> {
        if !point.x().is_finite() || !point.y().is_finite() {
            return None;
        }

        let nearest = self.index.nearest(point)?;
        let facility = &self.facilities[nearest.index];

        Some(ProximityMeasurement {
            proximity_dist_ft: Some(nearest.distance),
            proximity_score: self.classify_distance(nearest.distance),
            nearest_facility_type: Some(facility.facility_type),
            nearest_facility_index: Some(nearest.index),
        })
    }

    /// Measurement for one segment. A segment without a usable centroid
    /// gets [`ProximityMeasurement::unlocated`].
    #[must_use]
    pub fn measure_segment(&self, segment: &Segment) -> ProximityMeasurement {
        segment
            .centroid()
            .and_then(|centroid| self.measure_point(centroid))
            .unwrap_or_else(|| {
                log::debug!(
                    "Segment {} has no usable centroid; scoring lowest proximity class",
                    segment.segment_id
                );
                ProximityMeasurement::unlocated()
            })
    }

    /// Scores every segment from its centroid, in bounded parallel
    /// batches.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::Cancelled`] if the run is cancelled between
    /// batches.
    pub fn run(
        &self,
        segments: Vec<CanopySegment>,
        options: &BatchOptions,
    ) -> Result<ProximityStage, ScoringError> {
        let measurements = process_batched(&segments, options, "proximity", |s| {
            self.measure_segment(&s.buffered.segment)
        })?;

        let mut high = 0;
        let mut unlocated = 0;
        let mut scored = Vec::with_capacity(segments.len());

        for (segment, proximity) in segments.into_iter().zip(measurements) {
            if proximity.is_located() {
                if proximity.proximity_score == ProximityClass::High {
                    high += 1;
                }
            } else {
                unlocated += 1;
            }
            scored.push(ProximitySegment {
                buffered: segment.buffered,
                canopy: segment.canopy,
                proximity,
            });
        }

        log::info!(
            "Proximity scored {} segments ({high} within {} ft of a facility)",
            scored.len(),
            self.thresholds.high
        );
        if unlocated > 0 {
            log::warn!("{unlocated} segments have no usable centroid and were scored as far from every facility");
        }

        Ok(ProximityStage {
            segments: scored,
            unlocated,
        })
    }
}
