//! Per-neighborhood aggregation of scored segments.

use std::collections::BTreeMap;

use line_risk_models::{
    FEET_PER_MILE, NeighborhoodSummary, OUTSIDE_CITY_LIMITS, RiskTier, ScoredSegment, round_to,
};

use crate::NeighborhoodIndex;

/// Result of joining scored segments to the neighborhood partition.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborhoodAggregation {
    /// One summary per label, sorted by descending high-risk share.
    pub summaries: Vec<NeighborhoodSummary>,
    /// Label assigned to each input segment, in input order.
    pub assignments: Vec<String>,
    /// Segments whose centroid fell in no neighborhood.
    pub outside_city_limits: usize,
}

#[derive(Default)]
struct Accumulator {
    first_seen: usize,
    segments: usize,
    length_ft: f64,
    high_segments: usize,
    high_length_ft: f64,
    score_sum: f64,
    score_max: f64,
    canopy_sum: f64,
}

impl Accumulator {
    fn add(&mut self, segment: &ScoredSegment) {
        let length = segment.length_ft();

        if self.segments == 0 {
            self.score_max = segment.risk_score;
        } else {
            self.score_max = self.score_max.max(segment.risk_score);
        }

        self.segments += 1;
        self.length_ft += length;
        self.score_sum += segment.risk_score;
        self.canopy_sum += segment.canopy.canopy_sqft_per_ft;

        if segment.risk_tier == RiskTier::High {
            self.high_segments += 1;
            self.high_length_ft += length;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn finish(self, neighborhood: String) -> NeighborhoodSummary {
        let count = self.segments as f64;

        NeighborhoodSummary {
            neighborhood,
            total_segments: self.segments,
            total_length_ft: self.length_ft,
            total_miles: self.length_ft / FEET_PER_MILE,
            high_risk_segments: self.high_segments,
            high_risk_length_ft: self.high_length_ft,
            high_risk_miles: self.high_length_ft / FEET_PER_MILE,
            avg_risk_score: self.score_sum / count,
            max_risk_score: self.score_max,
            avg_canopy_per_ft: self.canopy_sum / count,
            pct_high_risk: round_to(self.high_segments as f64 / count * 100.0, 1),
        }
    }
}

/// Assigns every segment to a neighborhood by its centroid and
/// summarizes each label.
///
/// Summaries are sorted by descending `pct_high_risk`; labels with equal
/// shares keep the order in which their first segment appeared.
#[must_use]
pub fn aggregate(
    segments: &[ScoredSegment],
    index: &NeighborhoodIndex<'_>,
) -> NeighborhoodAggregation {
    let mut groups: BTreeMap<&str, Accumulator> = BTreeMap::new();
    let mut assignments = Vec::with_capacity(segments.len());
    let mut outside_city_limits = 0;

    for (position, segment) in segments.iter().enumerate() {
        let label = segment
            .buffered
            .segment
            .centroid()
            .and_then(|centroid| index.locate(centroid))
            .unwrap_or_else(|| {
                outside_city_limits += 1;
                OUTSIDE_CITY_LIMITS
            });

        groups
            .entry(label)
            .or_insert_with(|| Accumulator {
                first_seen: position,
                ..Accumulator::default()
            })
            .add(segment);
        assignments.push(label.to_string());
    }

    if outside_city_limits > 0 {
        log::warn!("{outside_city_limits} segments are not within any neighborhood boundary");
    }

    let mut groups: Vec<(&str, Accumulator)> = groups.into_iter().collect();
    groups.sort_by_key(|(_, acc)| acc.first_seen);

    let mut summaries: Vec<NeighborhoodSummary> = groups
        .into_iter()
        .map(|(label, acc)| acc.finish(label.to_string()))
        .collect();
    summaries.sort_by(|a, b| b.pct_high_risk.total_cmp(&a.pct_high_risk));

    log::info!(
        "Aggregated {} segments into {} neighborhoods",
        segments.len(),
        summaries.len()
    );

    NeighborhoodAggregation {
        summaries,
        assignments,
        outside_city_limits,
    }
}

#[cfg(test)]
mod tests {
    use geo::{LineString, MultiPolygon, polygon};
    use line_risk_models::{
        BufferedSegment, CanopyMeasurement, FacilityType, GeometryFlag, NeighborhoodPolygon,
        NormalizedFactors, ProximityClass, ProximityMeasurement, Segment,
    };

    use super::*;

    fn square(label: &str, x: f64, y: f64, size: f64) -> NeighborhoodPolygon {
        NeighborhoodPolygon {
            neighborhood: label.to_string(),
            geometry: MultiPolygon(vec![polygon![
                (x: x, y: y),
                (x: x + size, y: y),
                (x: x + size, y: y + size),
                (x: x, y: y + size),
            ]]),
        }
    }

    fn scored(id: u64, x: f64, y: f64, length: f64, score: f64, tier: RiskTier) -> ScoredSegment {
        let line = LineString::from(vec![(x - length / 2.0, y), (x + length / 2.0, y)]);
        ScoredSegment {
            buffered: BufferedSegment {
                segment: Segment::new(id, line),
                buffer: MultiPolygon(vec![]),
                buffer_area_sqft: 0.0,
                flag: GeometryFlag::Valid,
            },
            canopy: CanopyMeasurement {
                canopy_area_sqft: length * 2.0,
                canopy_sqft_per_ft: 2.0,
                candidates: 1,
                failed_candidates: 0,
            },
            proximity: ProximityMeasurement {
                proximity_dist_ft: Some(100.0),
                proximity_score: ProximityClass::High,
                nearest_facility_type: Some(FacilityType::Hospital),
                nearest_facility_index: Some(0),
            },
            factors: NormalizedFactors {
                vegetation: 0.0,
                proximity: 1.0,
                length: 0.0,
            },
            risk_score: score,
            risk_tier: tier,
            priority_rank: usize::try_from(id).unwrap(),
        }
    }

    fn partition() -> Vec<NeighborhoodPolygon> {
        vec![
            square("West", 0.0, 0.0, 1000.0),
            square("East", 1000.0, 0.0, 1000.0),
        ]
    }

    fn aggregate_west_east(segments: &[ScoredSegment]) -> NeighborhoodAggregation {
        let partition = partition();
        let index = NeighborhoodIndex::new(&partition).unwrap();
        aggregate(segments, &index)
    }

    #[test]
    fn summaries_sort_by_high_risk_share() {
        let segments = vec![
            scored(1, 100.0, 100.0, 100.0, 0.2, RiskTier::Low),
            scored(2, 200.0, 200.0, 100.0, 0.9, RiskTier::High),
            scored(3, 1500.0, 500.0, 5280.0 / 2.0, 0.95, RiskTier::High),
        ];

        let aggregation = aggregate_west_east(&segments);
        let labels: Vec<&str> = aggregation
            .summaries
            .iter()
            .map(|s| s.neighborhood.as_str())
            .collect();
        assert_eq!(labels, vec!["East", "West"]);

        let east = &aggregation.summaries[0];
        assert_eq!(east.total_segments, 1);
        assert!((east.pct_high_risk - 100.0).abs() < f64::EPSILON);
        assert!((east.total_miles - 0.5).abs() < 1e-12);
        assert!((east.high_risk_miles - 0.5).abs() < 1e-12);

        let west = &aggregation.summaries[1];
        assert_eq!(west.total_segments, 2);
        assert_eq!(west.high_risk_segments, 1);
        assert!((west.pct_high_risk - 50.0).abs() < f64::EPSILON);
        assert!((west.avg_risk_score - 0.55).abs() < 1e-12);
        assert!((west.max_risk_score - 0.9).abs() < f64::EPSILON);
        assert!((west.avg_canopy_per_ft - 2.0).abs() < f64::EPSILON);
        assert!((west.total_length_ft - 200.0).abs() < 1e-12);
    }

    #[test]
    fn segment_outside_partition_gets_sentinel() {
        let segments = vec![
            scored(1, 100.0, 100.0, 10.0, 0.2, RiskTier::Low),
            scored(2, 5000.0, 5000.0, 10.0, 0.3, RiskTier::Low),
        ];

        let aggregation = aggregate_west_east(&segments);

        assert_eq!(aggregation.outside_city_limits, 1);
        assert_eq!(aggregation.assignments, vec!["West", OUTSIDE_CITY_LIMITS]);
        assert!(
            aggregation
                .summaries
                .iter()
                .any(|s| s.neighborhood == OUTSIDE_CITY_LIMITS && s.total_segments == 1)
        );
    }

    #[test]
    fn equal_shares_keep_first_appearance_order() {
        let segments = vec![
            scored(1, 1500.0, 100.0, 10.0, 0.1, RiskTier::Low),
            scored(2, 100.0, 100.0, 10.0, 0.1, RiskTier::Low),
        ];

        let aggregation = aggregate_west_east(&segments);
        let labels: Vec<&str> = aggregation
            .summaries
            .iter()
            .map(|s| s.neighborhood.as_str())
            .collect();
        assert_eq!(labels, vec!["East", "West"]);
    }

    #[test]
    fn share_is_rounded_to_one_decimal() {
        let segments = vec![
            scored(1, 100.0, 100.0, 10.0, 0.9, RiskTier::High),
            scored(2, 200.0, 100.0, 10.0, 0.1, RiskTier::Low),
            scored(3, 300.0, 100.0, 10.0, 0.1, RiskTier::Low),
        ];

        let aggregation = aggregate_west_east(&segments);
        assert!((aggregation.summaries[0].pct_high_risk - 33.3).abs() < 1e-9);
    }

    #[test]
    fn segment_without_centroid_is_outside_city_limits() {
        let mut unlocated = scored(2, 0.0, 0.0, 10.0, 0.1, RiskTier::Low);
        unlocated.buffered.segment = Segment::new(2, LineString::new(vec![]));
        let segments = vec![scored(1, 100.0, 100.0, 10.0, 0.2, RiskTier::Low), unlocated];

        let aggregation = aggregate_west_east(&segments);

        assert_eq!(aggregation.outside_city_limits, 1);
        assert_eq!(aggregation.assignments, vec!["West", OUTSIDE_CITY_LIMITS]);
    }
}
