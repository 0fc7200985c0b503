//! CSV writers for run results.
//!
//! Numeric measurement columns are rounded to two decimals on export;
//! in-memory values are never rounded.

use std::io::Write;

use line_risk_models::{
    FacilityType, GeometryFlag, NeighborhoodSummary, PrioritySegmentRecord, RiskTier,
    ScoredSegment, SegmentId, round_to,
};
use serde::{Deserialize, Serialize};

use crate::ExportError;

/// One row of the scored segments table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredSegmentRow {
    pub segment_id: SegmentId,
    pub neighborhood: String,
    pub priority_rank: usize,
    pub risk_score: f64,
    pub risk_tier: RiskTier,
    pub veg_norm: f64,
    pub prox_norm: f64,
    pub length_norm: f64,
    pub canopy_area_sqft: f64,
    pub canopy_sqft_per_ft: f64,
    pub proximity_score: u8,
    pub proximity_dist_ft: Option<f64>,
    pub nearest_facility_type: Option<FacilityType>,
    pub length_ft: f64,
    pub buffer_area_sqft: f64,
    pub geometry_flag: GeometryFlag,
}

impl ScoredSegmentRow {
    fn new(segment: &ScoredSegment, neighborhood: &str) -> Self {
        let record = segment.to_record().rounded();

        Self {
            segment_id: record.segment_id,
            neighborhood: neighborhood.to_string(),
            priority_rank: record.priority_rank,
            risk_score: record.risk_score,
            risk_tier: record.risk_tier,
            veg_norm: round_to(segment.factors.vegetation, 4),
            prox_norm: round_to(segment.factors.proximity, 4),
            length_norm: round_to(segment.factors.length, 4),
            canopy_area_sqft: record.canopy_area_sqft,
            canopy_sqft_per_ft: record.canopy_sqft_per_ft,
            proximity_score: record.proximity_score,
            proximity_dist_ft: record.proximity_dist_ft,
            nearest_facility_type: record.nearest_facility_type,
            length_ft: record.length_ft,
            buffer_area_sqft: record.buffer_area_sqft,
            geometry_flag: record.geometry_flag,
        }
    }
}

/// Writes every scored segment with its neighborhood label.
///
/// `assignments` holds one label per segment, in the same order. Returns
/// the number of rows written.
///
/// # Errors
///
/// * If serialization or the underlying writer fails
pub fn write_scored_segments<W: Write>(
    writer: W,
    segments: &[ScoredSegment],
    assignments: &[String],
) -> Result<usize, ExportError> {
    let rows = segments
        .iter()
        .zip(assignments.iter().map(String::as_str).chain(std::iter::repeat("")))
        .map(|(segment, neighborhood)| ScoredSegmentRow::new(segment, neighborhood));
    write_rows(writer, rows)
}

/// Writes the neighborhood summary table.
///
/// # Errors
///
/// * If serialization or the underlying writer fails
pub fn write_neighborhood_summary<W: Write>(
    writer: W,
    summaries: &[NeighborhoodSummary],
) -> Result<usize, ExportError> {
    let rows = summaries.iter().map(|s| NeighborhoodSummary {
        neighborhood: s.neighborhood.clone(),
        total_length_ft: round_to(s.total_length_ft, 2),
        total_miles: round_to(s.total_miles, 2),
        high_risk_length_ft: round_to(s.high_risk_length_ft, 2),
        high_risk_miles: round_to(s.high_risk_miles, 2),
        avg_risk_score: round_to(s.avg_risk_score, 4),
        max_risk_score: round_to(s.max_risk_score, 4),
        avg_canopy_per_ft: round_to(s.avg_canopy_per_ft, 2),
        ..*s
    });
    write_rows(writer, rows)
}

/// Writes the top priority segments table.
///
/// # Errors
///
/// * If serialization or the underlying writer fails
pub fn write_priority_segments<W: Write>(
    writer: W,
    records: &[PrioritySegmentRecord],
) -> Result<usize, ExportError> {
    write_rows(writer, records.iter().cloned().map(PrioritySegmentRecord::rounded))
}

fn write_rows<W, S, I>(writer: W, rows: I) -> Result<usize, ExportError>
where
    W: Write,
    S: Serialize,
    I: IntoIterator<Item = S>,
{
    let mut csv = csv::Writer::from_writer(writer);
    let mut count = 0;

    for row in rows {
        csv.serialize(row)?;
        count += 1;
    }

    csv.flush()?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use line_risk_models::OUTSIDE_CITY_LIMITS;

    use super::*;

    fn summary(neighborhood: &str) -> NeighborhoodSummary {
        NeighborhoodSummary {
            neighborhood: neighborhood.to_string(),
            total_segments: 3,
            total_length_ft: 1234.5678,
            total_miles: 1234.5678 / 5280.0,
            high_risk_segments: 1,
            high_risk_length_ft: 400.0,
            high_risk_miles: 400.0 / 5280.0,
            avg_risk_score: 0.456_789,
            max_risk_score: 0.9,
            avg_canopy_per_ft: 12.345,
            pct_high_risk: 33.3,
        }
    }

    #[test]
    fn neighborhood_summary_has_header_and_rounded_values() {
        let mut out = vec![];
        let rows = write_neighborhood_summary(
            &mut out,
            &[summary("Fremont"), summary(OUTSIDE_CITY_LIMITS)],
        )
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(rows, 2);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("neighborhood,total_segments,total_length_ft,total_miles"));
        assert!(lines[0].ends_with("pct_high_risk"));
        assert!(lines[1].starts_with("Fremont,3,1234.57,0.23,"));
        assert!(lines[2].starts_with("Outside City Limits,"));
    }

    #[test]
    fn priority_records_serialize_enums_as_labels() {
        let record = PrioritySegmentRecord {
            segment_id: 12,
            priority_rank: 1,
            risk_score: 0.876_54,
            risk_tier: RiskTier::High,
            canopy_area_sqft: 100.0,
            canopy_sqft_per_ft: 2.5,
            proximity_score: 3,
            proximity_dist_ft: Some(321.987),
            nearest_facility_type: Some(FacilityType::FireStation),
            length_ft: 40.0,
            buffer_area_sqft: 1900.0,
            geometry_flag: GeometryFlag::Repaired,
        };

        let mut out = vec![];
        write_priority_segments(&mut out, &[record]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let row = text.lines().nth(1).unwrap();

        assert_eq!(row, "12,1,0.88,High,100.0,2.5,3,321.99,fire_station,40.0,1900.0,repaired");
    }

    #[test]
    fn unlocated_segment_leaves_facility_columns_empty() {
        let record = PrioritySegmentRecord {
            segment_id: 5,
            priority_rank: 9,
            risk_score: 0.1,
            risk_tier: RiskTier::Low,
            canopy_area_sqft: 0.0,
            canopy_sqft_per_ft: 0.0,
            proximity_score: 1,
            proximity_dist_ft: None,
            nearest_facility_type: None,
            length_ft: 0.0,
            buffer_area_sqft: 0.0,
            geometry_flag: GeometryFlag::Degenerate,
        };

        let mut out = vec![];
        write_priority_segments(&mut out, &[record]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let row = text.lines().nth(1).unwrap();

        assert_eq!(row, "5,9,0.1,Low,0.0,0.0,1,,,0.0,0.0,degenerate");
    }
}
