//! Composite risk scoring, percentile tiers and priority ranking.
//!
//! Tier cutoffs are percentiles of the scores of the segments passed to
//! [`RiskComposer::compose`]. They are recomputed on every run, so the
//! same segment can land in a different tier when scored alongside a
//! different population. [`RiskStage::thresholds`] records the cutoffs
//! actually used.

use line_risk_config::{RiskWeights, TierPercentiles};
use line_risk_models::{
    DataIntegrityError, NormalizedFactors, PrioritySegmentRecord, ProximityClass,
    ProximitySegment, ScoredSegment, TierThresholds,
};

use crate::ScoringError;

/// Output of the risk composer.
#[derive(Debug, Clone)]
pub struct RiskStage {
    /// Scored segments, in input order.
    pub segments: Vec<ScoredSegment>,
    /// Cutoffs derived from this population.
    pub thresholds: TierThresholds,
    /// Names of factors whose population had zero variance.
    pub zero_variance: Vec<String>,
}

/// Normalizes factors, computes the weighted composite and assigns tiers
/// and ranks.
#[derive(Debug, Clone, Copy)]
pub struct RiskComposer {
    weights: RiskWeights,
    percentiles: TierPercentiles,
}

impl RiskComposer {
    /// # Errors
    ///
    /// * If the weights are negative or do not sum to one
    /// * If the percentiles are out of range or not ordered
    pub fn new(weights: RiskWeights, percentiles: TierPercentiles) -> Result<Self, ScoringError> {
        weights.validate()?;
        percentiles.validate()?;
        Ok(Self {
            weights,
            percentiles,
        })
    }

    /// Scores a whole population.
    ///
    /// A non-finite canopy load or length takes no part in the min-max
    /// range and scales to 0.
    ///
    /// # Errors
    ///
    /// Returns [`DataIntegrityError::EmptyCorpus`] if `segments` is empty.
    pub fn compose(&self, segments: Vec<ProximitySegment>) -> Result<RiskStage, ScoringError> {
        if segments.is_empty() {
            return Err(DataIntegrityError::EmptyCorpus { corpus: "segment" }.into());
        }

        let non_finite = segments
            .iter()
            .filter(|s| {
                !s.canopy.canopy_sqft_per_ft.is_finite() || !s.buffered.segment.length_ft.is_finite()
            })
            .count();
        if non_finite > 0 {
            log::warn!("{non_finite} segments have a non-finite canopy load or length; those factors score 0");
        }

        let vegetation: Vec<f64> = segments
            .iter()
            .map(|s| s.canopy.canopy_sqft_per_ft)
            .collect();
        let lengths: Vec<f64> = segments
            .iter()
            .map(|s| s.buffered.segment.length_ft)
            .collect();

        let mut zero_variance = vec![];

        let (vegetation, flat) = normalize_min_max(&vegetation);
        if flat {
            log::warn!("Canopy load has zero variance; vegetation factor set to 0 for every segment");
            zero_variance.push("vegetation".to_string());
        }

        let (lengths, flat) = normalize_min_max(&lengths);
        if flat {
            log::warn!("Segment length has zero variance; length factor set to 0 for every segment");
            zero_variance.push("length".to_string());
        }

        let factors: Vec<NormalizedFactors> = segments
            .iter()
            .zip(vegetation.iter().zip(&lengths))
            .map(|(segment, (&veg_norm, &length_norm))| NormalizedFactors {
                vegetation: veg_norm,
                proximity: proximity_factor(segment.proximity.proximity_score),
                length: length_norm,
            })
            .collect();

        let scores: Vec<f64> = factors.iter().map(|f| self.composite(f)).collect();

        let mut sorted = scores.clone();
        sorted.sort_by(f64::total_cmp);
        let thresholds = TierThresholds {
            high: percentile(&sorted, self.percentiles.high).unwrap_or(0.0),
            medium: percentile(&sorted, self.percentiles.medium).unwrap_or(0.0),
        };

        let ranks = priority_ranks(&scores);

        let scored: Vec<ScoredSegment> = segments
            .into_iter()
            .zip(factors)
            .zip(scores.into_iter().zip(ranks))
            .map(|((segment, factors), (risk_score, priority_rank))| ScoredSegment {
                buffered: segment.buffered,
                canopy: segment.canopy,
                proximity: segment.proximity,
                factors,
                risk_score,
                risk_tier: thresholds.classify(risk_score),
                priority_rank,
            })
            .collect();

        log::info!(
            "Scored {} segments (P{}={:.4}, P{}={:.4})",
            scored.len(),
            self.percentiles.high,
            thresholds.high,
            self.percentiles.medium,
            thresholds.medium
        );

        Ok(RiskStage {
            segments: scored,
            thresholds,
            zero_variance,
        })
    }

    /// Weighted composite of already-normalized factors, clamped to
    /// `[0, 1]`.
    #[must_use]
    pub fn composite(&self, factors: &NormalizedFactors) -> f64 {
        let score = self.weights.length.mul_add(
            factors.length,
            self.weights.vegetation.mul_add(
                factors.vegetation,
                self.weights.proximity * factors.proximity,
            ),
        );
        score.clamp(0.0, 1.0)
    }
}

/// Proximity class mapped onto `[0, 1]` by dividing by the top score.
#[must_use]
pub fn proximity_factor(class: ProximityClass) -> f64 {
    f64::from(class.score()) / f64::from(ProximityClass::MAX_SCORE)
}

/// Min-max scales `values` onto `[0, 1]`.
///
/// The range comes from the finite values only; non-finite values scale
/// to 0. The second element is `true` when the finite values have zero
/// variance, in which case every scaled value is 0.
#[must_use]
pub fn normalize_min_max(values: &[f64]) -> (Vec<f64>, bool) {
    let finite = values.iter().copied().filter(|v| v.is_finite());
    let min = finite.clone().fold(f64::INFINITY, f64::min);
    let max = finite.fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    if values.is_empty() || range <= 0.0 || !range.is_finite() {
        return (vec![0.0; values.len()], !values.is_empty());
    }

    let scaled = values
        .iter()
        .map(|&v| {
            if v.is_finite() {
                ((v - min) / range).clamp(0.0, 1.0)
            } else {
                0.0
            }
        })
        .collect();
    (scaled, false)
}

/// Percentile `p` (0-100) of an ascending slice, linearly interpolating
/// between the two nearest order statistics.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
#[must_use]
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;

    let rank = (p.clamp(0.0, 100.0) / 100.0) * last as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - rank.floor();

    let low = sorted[lower];
    let high = sorted[upper.min(last)];
    Some((high - low).mul_add(fraction, low))
}

/// Unique 1-based ranks by descending score. Equal scores keep their
/// input order.
#[must_use]
pub fn priority_ranks(scores: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut ranks = vec![0; scores.len()];
    for (position, index) in order.into_iter().enumerate() {
        ranks[index] = position + 1;
    }
    ranks
}

/// The `n` highest-priority segments as flat records, rank 1 first.
#[must_use]
pub fn top_priority_segments(segments: &[ScoredSegment], n: usize) -> Vec<PrioritySegmentRecord> {
    let mut ranked: Vec<&ScoredSegment> = segments.iter().collect();
    ranked.sort_by_key(|s| s.priority_rank);
    ranked.into_iter().take(n).map(ScoredSegment::to_record).collect()
}
