//! End-to-end scoring run over one set of input layers.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use line_risk_config::RunConfig;
use line_risk_models::{
    DataIntegrityError, FEET_PER_MILE, InputLayers, NeighborhoodSummary, RiskTier, RunSummary,
    SQFT_PER_ACRE, ScoreStats, ScoredSegment, Segment, TierStats,
};
use line_risk_neighborhood::{NeighborhoodIndex, aggregate};

use crate::ScoringError;
use crate::batch::BatchOptions;
use crate::buffer::BufferGenerator;
use crate::canopy::{CanopyCorpus, IntersectionAccumulator};
use crate::progress::ProgressCallback;
use crate::proximity::ProximityScorer;
use crate::risk::{RiskComposer, percentile};

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Scored segments, in input order.
    pub segments: Vec<ScoredSegment>,
    /// Neighborhood label of each scored segment, in input order.
    pub assignments: Vec<String>,
    /// Per-neighborhood summaries, highest high-risk share first.
    pub neighborhoods: Vec<NeighborhoodSummary>,
    /// Run-level counts and statistics.
    pub summary: RunSummary,
}

/// A configured scoring run.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: RunConfig,
    options: BatchOptions,
}

impl Pipeline {
    /// Validates `config` and prepares a run with silent progress.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::Config`] if the configuration is invalid.
    pub fn new(config: RunConfig) -> Result<Self, ScoringError> {
        config.validate()?;
        let options = BatchOptions::new(config.chunk_size);
        Ok(Self { config, options })
    }

    /// Reports batch progress to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.options = self.options.with_progress(progress);
        self
    }

    /// Abandons the run at the next batch boundary once `cancel` is set.
    #[must_use]
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.options = self.options.with_cancel(cancel);
        self
    }

    /// The validated configuration.
    #[must_use]
    pub const fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Runs every stage over `inputs`.
    ///
    /// Corpora are checked before any geometry work starts, so an empty
    /// facility or neighborhood layer fails fast.
    ///
    /// # Errors
    ///
    /// * If the segment, facility or neighborhood corpus is empty
    /// * If two segments share an id
    /// * If the run is cancelled
    pub fn run(&self, inputs: InputLayers) -> Result<RunOutput, ScoringError> {
        let InputLayers {
            segments,
            canopy,
            facilities,
            neighborhoods,
        } = inputs;

        check_segments(&segments)?;
        let config = self.config();

        let partition = NeighborhoodIndex::new(&neighborhoods)?;
        let buffer = BufferGenerator::new(config.buffer_distance_ft)?;
        let scorer = ProximityScorer::new(&facilities, config.proximity_thresholds)?;
        let composer = RiskComposer::new(config.risk_weights, config.tier_percentiles)?;

        log::info!(
            "Scoring {} segments against {} canopy polygons, {} facilities and {} neighborhoods ({} ft buffers)",
            segments.len(),
            canopy.len(),
            facilities.len(),
            partition.len(),
            buffer.distance()
        );

        let buffered = buffer.run(segments, &self.options)?;

        let corpus = CanopyCorpus::new(canopy);
        let canopy_stage =
            IntersectionAccumulator::new(&corpus).run(buffered.segments, &self.options)?;

        let proximity = scorer.run(canopy_stage.segments, &self.options)?;
        let risk = composer.compose(proximity.segments)?;
        let aggregation = aggregate(&risk.segments, &partition);

        let summary = RunSummary {
            segments: risk.segments.len(),
            repaired_buffers: buffered.repaired,
            degenerate_buffers: buffered.degenerate,
            repaired_canopy: corpus.repaired(),
            dropped_canopy: corpus.dropped(),
            failed_canopy_candidates: canopy_stage.failed_candidates,
            segments_with_canopy: risk
                .segments
                .iter()
                .filter(|s| s.canopy.canopy_area_sqft > 0.0)
                .count(),
            canopy_acres: risk
                .segments
                .iter()
                .map(|s| s.canopy.canopy_area_sqft)
                .sum::<f64>()
                / SQFT_PER_ACRE,
            unlocated_segments: proximity.unlocated,
            zero_variance_factors: risk.zero_variance,
            tier_thresholds: Some(risk.thresholds),
            high: tier_stats(&risk.segments, RiskTier::High),
            medium: tier_stats(&risk.segments, RiskTier::Medium),
            low: tier_stats(&risk.segments, RiskTier::Low),
            scores: score_stats(&risk.segments),
            outside_city_limits: aggregation.outside_city_limits,
        };

        Ok(RunOutput {
            segments: risk.segments,
            assignments: aggregation.assignments,
            neighborhoods: aggregation.summaries,
            summary,
        })
    }
}

fn check_segments(segments: &[Segment]) -> Result<(), DataIntegrityError> {
    if segments.is_empty() {
        return Err(DataIntegrityError::EmptyCorpus { corpus: "segment" });
    }

    let mut seen = BTreeSet::new();
    for segment in segments {
        if !seen.insert(segment.segment_id) {
            return Err(DataIntegrityError::DuplicateSegmentId {
                segment_id: segment.segment_id,
            });
        }
    }

    Ok(())
}

fn tier_stats(segments: &[ScoredSegment], tier: RiskTier) -> TierStats {
    let in_tier = segments.iter().filter(|s| s.risk_tier == tier);
    let (count, length_ft) = in_tier.fold((0, 0.0), |(n, ft), s| (n + 1, ft + s.length_ft()));

    TierStats {
        segments: count,
        miles: length_ft / FEET_PER_MILE,
    }
}

#[allow(clippy::cast_precision_loss)]
fn score_stats(segments: &[ScoredSegment]) -> ScoreStats {
    let mut scores: Vec<f64> = segments.iter().map(|s| s.risk_score).collect();
    if scores.is_empty() {
        return ScoreStats::default();
    }
    scores.sort_by(f64::total_cmp);

    ScoreStats {
        mean: scores.iter().sum::<f64>() / scores.len() as f64,
        median: percentile(&scores, 50.0).unwrap_or_default(),
        min: scores[0],
        max: scores[scores.len() - 1],
    }
}
