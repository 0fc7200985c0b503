#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Entity types shared by every stage of the line risk pipeline.
//!
//! All geometries live in a single planar reference frame measured in
//! feet. Each pipeline stage consumes the previous stage's records by
//! value and produces a strictly richer record type: [`Segment`] ->
//! [`BufferedSegment`] -> [`CanopySegment`] -> [`ProximitySegment`] ->
//! [`ScoredSegment`].

use geo::{Centroid, Euclidean, Length, LineString, MultiPolygon, Point};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Feet in one statute mile.
pub const FEET_PER_MILE: f64 = 5280.0;

/// Square feet in one acre.
pub const SQFT_PER_ACRE: f64 = 43_560.0;

/// Label assigned to segments whose centroid falls inside no neighborhood.
pub const OUTSIDE_CITY_LIMITS: &str = "Outside City Limits";

/// Stable identifier of a line segment.
pub type SegmentId = u64;

/// Errors raised when a stage cannot define the population it needs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataIntegrityError {
    /// A corpus that a stage classifies against is empty.
    #[error("The {corpus} corpus is empty")]
    EmptyCorpus {
        /// Which corpus (e.g. `"facility"`).
        corpus: &'static str,
    },

    /// Two segments share the same identifier.
    #[error("Duplicate segment id {segment_id}")]
    DuplicateSegmentId {
        /// The repeated identifier.
        segment_id: SegmentId,
    },

    /// An input feature is missing a required property.
    #[error("Feature {feature} of the {layer} layer has no `{field}` property")]
    MissingProperty {
        /// Input layer name.
        layer: &'static str,
        /// Zero-based feature position in the layer.
        feature: usize,
        /// Property name that was expected.
        field: String,
    },

    /// An input feature has a property value outside its allowed domain.
    #[error("Feature {feature} of the {layer} layer has invalid `{field}` value {value:?}")]
    InvalidProperty {
        /// Input layer name.
        layer: &'static str,
        /// Zero-based feature position in the layer.
        feature: usize,
        /// Property name.
        field: String,
        /// The rejected value.
        value: String,
    },
}

/// Kind of critical facility.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FacilityType {
    /// Fire station.
    FireStation,
    /// Hospital.
    Hospital,
}

/// Outcome of generating and validating a buffer polygon.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GeometryFlag {
    /// Buffer was valid as generated.
    #[default]
    Valid,
    /// Buffer was invalid and fixed by re-unioning it with itself.
    Repaired,
    /// Input was degenerate; the buffer is a fallback shape or empty.
    Degenerate,
}

/// Proximity class of a segment relative to its nearest facility.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProximityClass {
    /// Far from every facility (score 1).
    Low = 1,
    /// Within the medium band (score 2).
    Medium = 2,
    /// Within the high-priority band (score 3).
    High = 3,
}

impl ProximityClass {
    /// Largest possible score, used to map classes onto `[0, 1]`.
    pub const MAX_SCORE: u8 = 3;

    /// Returns the numeric score (1, 2 or 3).
    #[must_use]
    pub const fn score(self) -> u8 {
        self as u8
    }
}

/// Percentile-derived risk tier.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum RiskTier {
    /// Score at or above the high percentile.
    High,
    /// Score at or above the medium percentile but below the high one.
    Medium,
    /// Everything else.
    Low,
}

impl RiskTier {
    /// All tiers, highest first.
    pub const ALL: [Self; 3] = [Self::High, Self::Medium, Self::Low];

    /// Ordinal where a larger value means a riskier tier.
    #[must_use]
    pub const fn severity(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
        }
    }
}

/// An overhead conductor segment.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Unique identifier, stable across all stages.
    pub segment_id: SegmentId,
    /// Polyline geometry in the planar frame.
    pub geometry: LineString<f64>,
    /// Arc length of [`Self::geometry`] in feet. Zero for a line without
    /// coordinates or with non-finite ones.
    pub length_ft: f64,
}

impl Segment {
    /// Creates a segment, computing its length from the geometry.
    ///
    /// Degenerate lines are kept: they buffer to a `Degenerate` record
    /// downstream instead of failing the load.
    #[must_use]
    pub fn new(segment_id: SegmentId, geometry: LineString<f64>) -> Self {
        let length_ft = Euclidean.length(&geometry);

        Self {
            segment_id,
            geometry,
            length_ft: if length_ft.is_finite() { length_ft } else { 0.0 },
        }
    }

    /// Length-weighted centroid of the line.
    ///
    /// Zero-length lines fall back to their first vertex. Returns `None`
    /// for a line without coordinates or when the centroid is not finite.
    #[must_use]
    pub fn centroid(&self) -> Option<Point<f64>> {
        self.geometry
            .centroid()
            .or_else(|| self.geometry.0.first().map(|c| Point::from(*c)))
            .filter(|p| p.x().is_finite() && p.y().is_finite())
    }
}

/// A critical facility point.
#[derive(Debug, Clone)]
pub struct Facility {
    /// Facility location.
    pub location: Point<f64>,
    /// Facility kind.
    pub facility_type: FacilityType,
    /// Optional display name.
    pub name: Option<String>,
}

/// A tree canopy polygon. Carries geometry only.
#[derive(Debug, Clone)]
pub struct CanopyPolygon {
    /// Canopy footprint, possibly multi-part.
    pub geometry: MultiPolygon<f64>,
}

/// A neighborhood polygon with its unique label.
#[derive(Debug, Clone)]
pub struct NeighborhoodPolygon {
    /// Unique neighborhood label.
    pub neighborhood: String,
    /// Neighborhood boundary.
    pub geometry: MultiPolygon<f64>,
}

/// The four input layers of one run, already in the planar frame.
#[derive(Debug, Clone, Default)]
pub struct InputLayers {
    /// Overhead conductor segments.
    pub segments: Vec<Segment>,
    /// Tree canopy polygons.
    pub canopy: Vec<CanopyPolygon>,
    /// Critical facilities.
    pub facilities: Vec<Facility>,
    /// Neighborhood partition.
    pub neighborhoods: Vec<NeighborhoodPolygon>,
}

/// A segment together with its clearance buffer.
#[derive(Debug, Clone)]
pub struct BufferedSegment {
    /// The source segment.
    pub segment: Segment,
    /// Buffer polygon. Empty when the input could not be buffered.
    pub buffer: MultiPolygon<f64>,
    /// Area of [`Self::buffer`] in square feet.
    pub buffer_area_sqft: f64,
    /// Whether the buffer needed repair or a degenerate fallback.
    pub flag: GeometryFlag,
}

/// Canopy coverage measured inside a single buffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanopyMeasurement {
    /// Total canopy area intersecting the buffer.
    pub canopy_area_sqft: f64,
    /// Canopy area per linear foot of conductor.
    pub canopy_sqft_per_ft: f64,
    /// Index candidates whose exact intersection was attempted.
    pub candidates: usize,
    /// Candidates whose intersection failed and contributed zero.
    pub failed_candidates: usize,
}

/// Output of the intersection accumulator.
#[derive(Debug, Clone)]
pub struct CanopySegment {
    /// Buffered segment.
    pub buffered: BufferedSegment,
    /// Canopy measurement.
    pub canopy: CanopyMeasurement,
}

/// Distance from a segment centroid to its nearest critical facility.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProximityMeasurement {
    /// Planar distance to the nearest facility. `None` when the segment
    /// has no usable centroid.
    pub proximity_dist_ft: Option<f64>,
    /// Discrete class derived from the distance.
    pub proximity_score: ProximityClass,
    /// Type of the nearest facility.
    pub nearest_facility_type: Option<FacilityType>,
    /// Position of the nearest facility in the facility corpus.
    pub nearest_facility_index: Option<usize>,
}

impl ProximityMeasurement {
    /// Measurement for a segment that cannot be located. Scores the lowest
    /// class so it adds the least to the composite.
    #[must_use]
    pub const fn unlocated() -> Self {
        Self {
            proximity_dist_ft: None,
            proximity_score: ProximityClass::Low,
            nearest_facility_type: None,
            nearest_facility_index: None,
        }
    }

    /// Whether a nearest facility was found.
    #[must_use]
    pub const fn is_located(&self) -> bool {
        self.nearest_facility_index.is_some()
    }
}

/// Output of the proximity scorer.
#[derive(Debug, Clone)]
pub struct ProximitySegment {
    /// Buffered segment.
    pub buffered: BufferedSegment,
    /// Canopy measurement.
    pub canopy: CanopyMeasurement,
    /// Proximity measurement.
    pub proximity: ProximityMeasurement,
}

/// Factors normalized onto `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedFactors {
    /// Min-max scaled canopy load.
    pub vegetation: f64,
    /// Proximity class divided by [`ProximityClass::MAX_SCORE`].
    pub proximity: f64,
    /// Min-max scaled segment length.
    pub length: f64,
}

/// A fully scored segment.
#[derive(Debug, Clone)]
pub struct ScoredSegment {
    /// Buffered segment.
    pub buffered: BufferedSegment,
    /// Canopy measurement.
    pub canopy: CanopyMeasurement,
    /// Proximity measurement.
    pub proximity: ProximityMeasurement,
    /// Normalized factors feeding the composite.
    pub factors: NormalizedFactors,
    /// Weighted composite score in `[0, 1]`.
    pub risk_score: f64,
    /// Percentile-derived tier.
    pub risk_tier: RiskTier,
    /// Unique 1-based rank by descending score.
    pub priority_rank: usize,
}

impl ScoredSegment {
    /// Segment identifier.
    #[must_use]
    pub const fn segment_id(&self) -> SegmentId {
        self.buffered.segment.segment_id
    }

    /// Segment length in feet.
    #[must_use]
    pub const fn length_ft(&self) -> f64 {
        self.buffered.segment.length_ft
    }

    /// Flat projection used for tabular export.
    #[must_use]
    pub fn to_record(&self) -> PrioritySegmentRecord {
        PrioritySegmentRecord {
            segment_id: self.segment_id(),
            priority_rank: self.priority_rank,
            risk_score: self.risk_score,
            risk_tier: self.risk_tier,
            canopy_area_sqft: self.canopy.canopy_area_sqft,
            canopy_sqft_per_ft: self.canopy.canopy_sqft_per_ft,
            proximity_score: self.proximity.proximity_score.score(),
            proximity_dist_ft: self.proximity.proximity_dist_ft,
            nearest_facility_type: self.proximity.nearest_facility_type,
            length_ft: self.length_ft(),
            buffer_area_sqft: self.buffered.buffer_area_sqft,
            geometry_flag: self.buffered.flag,
        }
    }
}

/// Serializable, geometry-free view of a [`ScoredSegment`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrioritySegmentRecord {
    /// Segment identifier.
    pub segment_id: SegmentId,
    /// Unique rank, 1 is highest risk.
    pub priority_rank: usize,
    /// Composite score.
    pub risk_score: f64,
    /// Risk tier.
    pub risk_tier: RiskTier,
    /// Canopy area inside the buffer.
    pub canopy_area_sqft: f64,
    /// Canopy area per linear foot.
    pub canopy_sqft_per_ft: f64,
    /// Proximity score (1-3).
    pub proximity_score: u8,
    /// Distance to the nearest facility, empty for unlocated segments.
    pub proximity_dist_ft: Option<f64>,
    /// Type of the nearest facility.
    pub nearest_facility_type: Option<FacilityType>,
    /// Segment length.
    pub length_ft: f64,
    /// Buffer area.
    pub buffer_area_sqft: f64,
    /// Buffer geometry flag.
    pub geometry_flag: GeometryFlag,
}

impl PrioritySegmentRecord {
    /// Rounds the measurement columns to two decimals for reporting.
    #[must_use]
    pub fn rounded(mut self) -> Self {
        self.risk_score = round_to(self.risk_score, 2);
        self.canopy_area_sqft = round_to(self.canopy_area_sqft, 2);
        self.canopy_sqft_per_ft = round_to(self.canopy_sqft_per_ft, 2);
        self.proximity_dist_ft = self.proximity_dist_ft.map(|d| round_to(d, 2));
        self.length_ft = round_to(self.length_ft, 2);
        self.buffer_area_sqft = round_to(self.buffer_area_sqft, 2);
        self
    }
}

/// Score cutoffs computed from one run's score distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    /// Scores at or above this are [`RiskTier::High`].
    pub high: f64,
    /// Scores at or above this (and below `high`) are [`RiskTier::Medium`].
    pub medium: f64,
}

impl TierThresholds {
    /// Classifies a score against these cutoffs.
    #[must_use]
    pub fn classify(&self, score: f64) -> RiskTier {
        if score >= self.high {
            RiskTier::High
        } else if score >= self.medium {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }
}

/// Per-neighborhood summary statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborhoodSummary {
    /// Neighborhood label, or [`OUTSIDE_CITY_LIMITS`].
    pub neighborhood: String,
    /// Number of segments assigned to the neighborhood.
    pub total_segments: usize,
    /// Total conductor length.
    pub total_length_ft: f64,
    /// Total conductor length in miles.
    pub total_miles: f64,
    /// Segments in the High tier.
    pub high_risk_segments: usize,
    /// Length of High-tier segments.
    pub high_risk_length_ft: f64,
    /// Length of High-tier segments in miles.
    pub high_risk_miles: f64,
    /// Mean composite score.
    pub avg_risk_score: f64,
    /// Maximum composite score.
    pub max_risk_score: f64,
    /// Mean canopy load.
    pub avg_canopy_per_ft: f64,
    /// Percentage of segments in the High tier, one decimal.
    pub pct_high_risk: f64,
}

/// Segment count and mileage of one tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TierStats {
    /// Number of segments.
    pub segments: usize,
    /// Total length in miles.
    pub miles: f64,
}

/// Basic distribution statistics of the composite score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreStats {
    /// Arithmetic mean.
    pub mean: f64,
    /// Median (50th percentile, linear interpolation).
    pub median: f64,
    /// Minimum.
    pub min: f64,
    /// Maximum.
    pub max: f64,
}

/// Run-level counts reported after the pipeline completes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Number of segments scored.
    pub segments: usize,
    /// Buffers fixed by the canonical repair.
    pub repaired_buffers: usize,
    /// Buffers produced from degenerate input.
    pub degenerate_buffers: usize,
    /// Canopy polygons fixed by the canonical repair.
    pub repaired_canopy: usize,
    /// Canopy polygons dropped because repair failed.
    pub dropped_canopy: usize,
    /// Canopy intersections that failed and counted as zero.
    pub failed_canopy_candidates: usize,
    /// Segments with any canopy inside their buffer.
    pub segments_with_canopy: usize,
    /// Factors whose population had zero variance.
    pub zero_variance_factors: Vec<String>,
    /// Segments outside every neighborhood.
    pub outside_city_limits: usize,
    /// Segments without a usable centroid, scored with the lowest
    /// proximity class.
    pub unlocated_segments: usize,
    /// Canopy inside all buffers, in acres.
    pub canopy_acres: f64,
    /// Tier cutoffs used for this run.
    pub tier_thresholds: Option<TierThresholds>,
    /// High tier totals.
    pub high: TierStats,
    /// Medium tier totals.
    pub medium: TierStats,
    /// Low tier totals.
    pub low: TierStats,
    /// Composite score distribution.
    pub scores: ScoreStats,
}

impl RunSummary {
    /// Total conductor miles across all tiers.
    #[must_use]
    pub fn total_miles(&self) -> f64 {
        self.high.miles + self.medium.miles + self.low.miles
    }

    /// Tier totals for `tier`.
    #[must_use]
    pub const fn tier(&self, tier: RiskTier) -> TierStats {
        match tier {
            RiskTier::High => self.high,
            RiskTier::Medium => self.medium,
            RiskTier::Low => self.low,
        }
    }
}

/// Rounds `value` to `decimals` places.
#[must_use]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
