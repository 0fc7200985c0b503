//! End-of-run summary written to the log.

use line_risk_models::{PrioritySegmentRecord, RiskTier};
use line_risk_scoring::RunOutput;

/// Neighborhoods listed in the summary.
const TOP_NEIGHBORHOODS: usize = 10;

/// Segments listed in the summary.
const TOP_SEGMENTS: usize = 10;

#[allow(clippy::cast_precision_loss)]
pub fn log_summary(output: &RunOutput, top: &[PrioritySegmentRecord]) {
    let summary = &output.summary;
    let total = summary.segments.max(1) as f64;

    log::info!("Citywide: {} segments, {:.1} miles", summary.segments, summary.total_miles());

    if let Some(thresholds) = summary.tier_thresholds {
        log::info!(
            "Tier cutoffs: high >= {:.4}, medium >= {:.4}",
            thresholds.high,
            thresholds.medium
        );
    }

    for tier in RiskTier::ALL {
        let stats = summary.tier(tier);
        log::info!(
            "  {:<8} {:>7} segments ({:5.1}%) - {:.1} miles",
            tier.to_string(),
            stats.segments,
            stats.segments as f64 / total * 100.0,
            stats.miles
        );
    }

    log::info!(
        "Scores: mean {:.4}, median {:.4}, min {:.4}, max {:.4}",
        summary.scores.mean,
        summary.scores.median,
        summary.scores.min,
        summary.scores.max
    );

    log::info!(
        "Geometry: {} repaired / {} degenerate buffers, {} repaired / {} dropped canopy polygons, {} failed intersections",
        summary.repaired_buffers,
        summary.degenerate_buffers,
        summary.repaired_canopy,
        summary.dropped_canopy,
        summary.failed_canopy_candidates
    );

    log::info!(
        "Canopy inside buffers: {:.1} acres across {} segments",
        summary.canopy_acres,
        summary.segments_with_canopy
    );

    if summary.unlocated_segments > 0 {
        log::warn!(
            "{} segments had no usable centroid and scored the lowest proximity class",
            summary.unlocated_segments
        );
    }

    if !summary.zero_variance_factors.is_empty() {
        log::warn!(
            "Zero-variance factors: {}",
            summary.zero_variance_factors.join(", ")
        );
    }

    log::info!(
        "Top {} of {} neighborhoods by high-risk share:",
        TOP_NEIGHBORHOODS.min(output.neighborhoods.len()),
        output.neighborhoods.len()
    );
    for n in output.neighborhoods.iter().take(TOP_NEIGHBORHOODS) {
        log::info!(
            "  {:<32} {:>6.2} mi total, {:>6.2} mi high ({:.1}%), avg score {:.2}",
            n.neighborhood,
            n.total_miles,
            n.high_risk_miles,
            n.pct_high_risk,
            n.avg_risk_score
        );
    }

    log::info!("Highest risk segments:");
    for record in top.iter().take(TOP_SEGMENTS) {
        let nearest = match (record.nearest_facility_type, record.proximity_dist_ft) {
            (Some(facility_type), Some(distance)) => format!("{facility_type} at {distance:.0} ft"),
            _ => "no usable centroid".to_string(),
        };
        log::info!(
            "  #{:<4} segment {:<8} score {:.4}  canopy {:.2} sqft/ft  {nearest}",
            record.priority_rank,
            record.segment_id,
            record.risk_score,
            record.canopy_sqft_per_ft,
        );
    }
}
