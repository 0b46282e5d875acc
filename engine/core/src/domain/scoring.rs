// Copyright (c) 2026 Bellwether Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Composite Score and Credible Interval
//!
//! [`calculate_composite`] and [`calculate_uncertainty`] are pure functions;
//! [`CompositeScorer`] wraps the former and reports numeric anomalies to a
//! [`MetricsSink`].
//!
//! ## Guarantees
//!
//! - The composite is finite and within `[0, 1]` for every input, including
//!   NaN and infinities.
//! - The credible interval satisfies `0 <= lower <= composite <= upper <= 1`.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::metrics::{self, MetricsSink};
use crate::domain::signal::{AuthorSignal, IntentSignal, ScoredSignal, TopicSignal, VelocitySignal};
use crate::domain::weights::WeightVector;

/// Substituted for any non-finite signal value or composite
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Velocity ratio at which the normalized value reaches `1 - 1/e`
pub const VELOCITY_SATURATION_SCALE: f64 = 3.0;

pub const MIN_HALF_WIDTH: f64 = 0.02;
pub const MAX_HALF_WIDTH: f64 = 0.35;

/// Map an unbounded velocity ratio onto `[0, 1)`; monotonic and saturating.
pub fn normalize_velocity(ratio: f64) -> f64 {
    if ratio.is_nan() || ratio <= 0.0 {
        return 0.0;
    }
    if ratio.is_infinite() {
        return 1.0;
    }
    1.0 - (-ratio / VELOCITY_SATURATION_SCALE).exp()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreAnomalies {
    /// Signal values, weights or intermediate sums that were NaN/Infinity
    pub non_finite_inputs: u32,
    /// The raw weighted sum fell outside `[0, 1]`
    pub out_of_range: bool,
}

impl ScoreAnomalies {
    pub fn is_clean(&self) -> bool {
        self.non_finite_inputs == 0 && !self.out_of_range
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    /// Clamped composite in `[0, 1]`
    pub value: f64,
    /// Weighted sum before clamping (after non-finite substitution)
    pub raw: f64,
    pub anomalies: ScoreAnomalies,
}

/// `Σ weight_i * normalize(signal_i)`, clamped to `[0, 1]`.
pub fn calculate_composite(
    sss: &IntentSignal,
    ars: &AuthorSignal,
    evs: &VelocitySignal,
    trs: &TopicSignal,
    weights: &WeightVector,
) -> CompositeScore {
    let mut anomalies = ScoreAnomalies::default();

    let mut finite_or = |value: f64, substitute: f64| {
        if value.is_finite() {
            value
        } else {
            anomalies.non_finite_inputs += 1;
            substitute
        }
    };

    let velocity = if evs.ratio.is_finite() {
        normalize_velocity(evs.ratio)
    } else {
        finite_or(evs.ratio, NEUTRAL_SCORE)
    };

    let terms = [
        (finite_or(sss.score, NEUTRAL_SCORE), finite_or(weights.sss_weight, 0.0)),
        (finite_or(ars.score, NEUTRAL_SCORE), finite_or(weights.ars_weight, 0.0)),
        (velocity, finite_or(weights.evs_weight, 0.0)),
        (finite_or(trs.score, NEUTRAL_SCORE), finite_or(weights.trs_weight, 0.0)),
    ];

    let sum: f64 = terms.iter().map(|(value, weight)| value * weight).sum();
    let raw = finite_or(sum, NEUTRAL_SCORE);

    let value = if (0.0..=1.0).contains(&raw) {
        raw
    } else {
        anomalies.out_of_range = true;
        raw.clamp(0.0, 1.0)
    };

    CompositeScore { value, raw, anomalies }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CredibleInterval {
    pub lower: f64,
    pub upper: f64,
}

impl CredibleInterval {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Uncertainty {
    pub credible_interval: CredibleInterval,
    /// Weighted mean of `1 - confidence` across the four signals
    pub aggregate_uncertainty: f64,
    pub half_width: f64,
}

/// Interval whose half-width grows linearly with aggregate uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyEstimator {
    pub min_half_width: f64,
    pub max_half_width: f64,
}

impl Default for UncertaintyEstimator {
    fn default() -> Self {
        Self {
            min_half_width: MIN_HALF_WIDTH,
            max_half_width: MAX_HALF_WIDTH,
        }
    }
}

impl UncertaintyEstimator {
    pub fn estimate(
        &self,
        sss: &IntentSignal,
        ars: &AuthorSignal,
        evs: &VelocitySignal,
        trs: &TopicSignal,
        weights: &WeightVector,
        composite: f64,
    ) -> Uncertainty {
        let signals: [&dyn ScoredSignal; 4] = [sss, ars, evs, trs];
        let doubt: Vec<f64> = signals
            .iter()
            .map(|s| {
                let c = s.confidence();
                if c.is_finite() { 1.0 - c.clamp(0.0, 1.0) } else { 1.0 }
            })
            .collect();
        let w: Vec<f64> = weights
            .components()
            .iter()
            .map(|w| if w.is_finite() && *w > 0.0 { *w } else { 0.0 })
            .collect();

        let weight_total: f64 = w.iter().sum();
        let aggregate = if weight_total > 0.0 {
            doubt.iter().zip(&w).map(|(d, w)| d * w).sum::<f64>() / weight_total
        } else {
            doubt.iter().sum::<f64>() / doubt.len() as f64
        };

        let min = self.min_half_width.max(0.0);
        let max = self.max_half_width.max(min);
        let half_width = min + (max - min) * aggregate;

        let center = if composite.is_finite() { composite.clamp(0.0, 1.0) } else { NEUTRAL_SCORE };
        let credible_interval = CredibleInterval {
            lower: (center - half_width).max(0.0),
            upper: (center + half_width).min(1.0),
        };

        Uncertainty {
            credible_interval,
            aggregate_uncertainty: aggregate,
            half_width,
        }
    }
}

/// [`UncertaintyEstimator::estimate`] with the default half-width range.
pub fn calculate_uncertainty(
    sss: &IntentSignal,
    ars: &AuthorSignal,
    evs: &VelocitySignal,
    trs: &TopicSignal,
    weights: &WeightVector,
    composite: f64,
) -> Uncertainty {
    UncertaintyEstimator::default().estimate(sss, ars, evs, trs, weights, composite)
}

/// Composite calculation that reports anomalies to the metrics sink.
#[derive(Clone)]
pub struct CompositeScorer {
    metrics: Arc<dyn MetricsSink>,
}

impl CompositeScorer {
    pub fn new(metrics: Arc<dyn MetricsSink>) -> Self {
        Self { metrics }
    }

    pub fn score(
        &self,
        sss: &IntentSignal,
        ars: &AuthorSignal,
        evs: &VelocitySignal,
        trs: &TopicSignal,
        weights: &WeightVector,
    ) -> CompositeScore {
        let composite = calculate_composite(sss, ars, evs, trs, weights);
        let segment = weights.segment_key.as_str();

        for _ in 0..composite.anomalies.non_finite_inputs {
            self.metrics.increment(metrics::NAN_INFINITY_DETECTED, &[("segment", segment)]);
        }
        if composite.anomalies.non_finite_inputs > 0 {
            tracing::warn!(
                segment = segment,
                count = composite.anomalies.non_finite_inputs,
                "Non-finite scoring input replaced with neutral default"
            );
        }

        if composite.anomalies.out_of_range {
            self.metrics.increment(metrics::COMPOSITE_OUT_OF_RANGE, &[("segment", segment)]);
            self.metrics.increment(metrics::COMPOSITE_CLAMPED, &[("segment", segment)]);
            tracing::warn!(
                segment = segment,
                raw = composite.raw,
                clamped = composite.value,
                "Composite score outside [0, 1] was clamped"
            );
        }

        composite
    }
}
