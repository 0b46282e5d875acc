// Copyright (c) 2026 Bellwether Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Operating Mode Policy
//!
//! Deterministic, ordered rule evaluation mapping a [`SignalBundle`] and the
//! [`DecisionThresholds`] to one [`OperatingMode`]. The first matching rule
//! wins:
//!
//! 1. Safety asks to disengage → `DISENGAGED` with probability 1.
//! 2. Topic relevance below the gate → `DISENGAGED`.
//! 3. Power users: helpful intent → `HELPFUL`; velocity above
//!    [`POWER_USER_VIRAL_RATIO`] → `HYBRID`; otherwise `ENGAGEMENT`.
//! 4. General ladder over intent, velocity and author strength.
//!
//! The selected mode receives a dominant probability mass that grows with
//! the margin by which the deciding signals cleared (or missed) their
//! thresholds; the rest is spread evenly over the other three modes and the
//! vector is renormalized by its actual sum.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::decision::ReviewReason;
use crate::domain::signal::SignalBundle;
use crate::domain::thresholds::{DecisionThresholds, POWER_USER_VIRAL_RATIO};

/// Dominant mass for a decision made exactly at a threshold
pub const MIN_DOMINANT_MASS: f64 = 0.4;
/// Dominant mass once the margin saturates
pub const MAX_DOMINANT_MASS: f64 = 0.95;
/// Relative margin at which confidence stops growing
pub const MARGIN_SATURATION: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperatingMode {
    Helpful,
    Engagement,
    Hybrid,
    Disengaged,
}

impl OperatingMode {
    pub const ALL: [OperatingMode; 4] = [
        OperatingMode::Helpful,
        OperatingMode::Engagement,
        OperatingMode::Hybrid,
        OperatingMode::Disengaged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperatingMode::Helpful => "HELPFUL",
            OperatingMode::Engagement => "ENGAGEMENT",
            OperatingMode::Hybrid => "HYBRID",
            OperatingMode::Disengaged => "DISENGAGED",
        }
    }

    pub fn is_engaged(&self) -> bool {
        !matches!(self, OperatingMode::Disengaged)
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OperatingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperatingMode::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown operating mode '{}'", s))
    }
}

/// Probability mass over all four modes; always sums to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModeProbabilities {
    #[serde(rename = "HELPFUL")]
    pub helpful: f64,
    #[serde(rename = "ENGAGEMENT")]
    pub engagement: f64,
    #[serde(rename = "HYBRID")]
    pub hybrid: f64,
    #[serde(rename = "DISENGAGED")]
    pub disengaged: f64,
}

impl ModeProbabilities {
    /// All mass on `mode`
    pub fn certain(mode: OperatingMode) -> Self {
        Self::dominant(mode, 1.0)
    }

    /// `mass` on `mode`, the remainder split evenly, renormalized.
    pub fn dominant(mode: OperatingMode, mass: f64) -> Self {
        let mass = if mass.is_finite() { mass.clamp(0.0, 1.0) } else { MIN_DOMINANT_MASS };
        let rest = (1.0 - mass) / 3.0;

        let mut probabilities = Self {
            helpful: rest,
            engagement: rest,
            hybrid: rest,
            disengaged: rest,
        };
        *probabilities.get_mut(mode) = mass;
        probabilities.renormalize();
        probabilities
    }

    pub fn get(&self, mode: OperatingMode) -> f64 {
        match mode {
            OperatingMode::Helpful => self.helpful,
            OperatingMode::Engagement => self.engagement,
            OperatingMode::Hybrid => self.hybrid,
            OperatingMode::Disengaged => self.disengaged,
        }
    }

    fn get_mut(&mut self, mode: OperatingMode) -> &mut f64 {
        match mode {
            OperatingMode::Helpful => &mut self.helpful,
            OperatingMode::Engagement => &mut self.engagement,
            OperatingMode::Hybrid => &mut self.hybrid,
            OperatingMode::Disengaged => &mut self.disengaged,
        }
    }

    pub fn sum(&self) -> f64 {
        OperatingMode::ALL.iter().map(|m| self.get(*m)).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (OperatingMode, f64)> + '_ {
        OperatingMode::ALL.into_iter().map(move |m| (m, self.get(m)))
    }

    fn renormalize(&mut self) {
        let total = self.sum();
        if total > 0.0 && total.is_finite() {
            for mode in OperatingMode::ALL {
                *self.get_mut(mode) /= total;
            }
        }
    }
}

/// Which rule of the policy produced the mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionRule {
    SafetyOverride,
    RelevanceGate,
    PowerUserHelpful,
    PowerUserViral,
    PowerUserEngagement,
    HelpfulIntent,
    HighViralStrongAuthor,
    HighViralModerateIntent,
    HighViralWeakSignals,
    ModerateIntentStrongAuthor,
    ModerateIntent,
    ModerateViral,
    NoQualifyingSignal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeSelection {
    pub mode: OperatingMode,
    pub rule: DecisionRule,
    pub probabilities: ModeProbabilities,
    /// Probability mass on `mode`
    pub confidence: f64,
    pub needs_review: bool,
    pub review_reason: Option<ReviewReason>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModePolicy {
    thresholds: DecisionThresholds,
}

impl ModePolicy {
    pub fn new(thresholds: DecisionThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &DecisionThresholds {
        &self.thresholds
    }

    pub fn select_mode(&self, signals: &SignalBundle) -> ModeSelection {
        select_mode(signals, &self.thresholds)
    }
}

/// Non-finite scores are treated as absent (0.0) so no comparison silently
/// evaluates false and skips the relevance gate.
fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Distance from threshold relative to the threshold's magnitude
fn relative_margin(value: f64, threshold: f64) -> f64 {
    let distance = (value - threshold).abs();
    let margin = if threshold.abs() > f64::EPSILON { distance / threshold.abs() } else { distance };
    if margin.is_finite() { margin } else { 0.0 }
}

/// Weakest margin among the deciding conditions, mapped to a dominant mass
fn dominant_mass(conditions: &[(f64, f64)]) -> f64 {
    let margin = conditions
        .iter()
        .map(|(value, threshold)| relative_margin(*value, *threshold))
        .fold(f64::INFINITY, f64::min);
    let margin = if margin.is_finite() { margin } else { 0.0 };
    let strength = (margin / MARGIN_SATURATION).clamp(0.0, 1.0);
    MIN_DOMINANT_MASS + (MAX_DOMINANT_MASS - MIN_DOMINANT_MASS) * strength
}

/// Evaluate the ordered rule set.
pub fn select_mode(signals: &SignalBundle, thresholds: &DecisionThresholds) -> ModeSelection {
    let t = thresholds;

    if signals.safety.should_disengage {
        return ModeSelection {
            mode: OperatingMode::Disengaged,
            rule: DecisionRule::SafetyOverride,
            probabilities: ModeProbabilities::certain(OperatingMode::Disengaged),
            confidence: 1.0,
            needs_review: false,
            review_reason: None,
        };
    }

    let sss = finite_or_zero(signals.intent.score);
    let ars = finite_or_zero(signals.author.score);
    let evs = finite_or_zero(signals.velocity.ratio);
    let trs = finite_or_zero(signals.topic.score);

    let (mode, rule, conditions): (OperatingMode, DecisionRule, Vec<(f64, f64)>) = if trs < t.trs_gate {
        (OperatingMode::Disengaged, DecisionRule::RelevanceGate, vec![(trs, t.trs_gate)])
    } else if signals.power_user.is_power_user {
        if sss >= t.sss_helpful {
            (OperatingMode::Helpful, DecisionRule::PowerUserHelpful, vec![(sss, t.sss_helpful)])
        } else if evs > POWER_USER_VIRAL_RATIO {
            (OperatingMode::Hybrid, DecisionRule::PowerUserViral, vec![(evs, POWER_USER_VIRAL_RATIO)])
        } else {
            (
                OperatingMode::Engagement,
                DecisionRule::PowerUserEngagement,
                vec![(sss, t.sss_helpful), (evs, POWER_USER_VIRAL_RATIO)],
            )
        }
    } else if sss >= t.sss_helpful {
        (OperatingMode::Helpful, DecisionRule::HelpfulIntent, vec![(sss, t.sss_helpful)])
    } else if evs > t.evs_high_viral {
        if ars > t.ars_strong {
            (
                OperatingMode::Hybrid,
                DecisionRule::HighViralStrongAuthor,
                vec![(evs, t.evs_high_viral), (ars, t.ars_strong)],
            )
        } else if sss >= t.sss_moderate {
            (
                OperatingMode::Engagement,
                DecisionRule::HighViralModerateIntent,
                vec![(evs, t.evs_high_viral), (sss, t.sss_moderate)],
            )
        } else {
            (
                OperatingMode::Disengaged,
                DecisionRule::HighViralWeakSignals,
                vec![(ars, t.ars_strong), (sss, t.sss_moderate)],
            )
        }
    } else if sss >= t.sss_moderate {
        if ars > t.ars_strong {
            (
                OperatingMode::Hybrid,
                DecisionRule::ModerateIntentStrongAuthor,
                vec![(sss, t.sss_moderate), (ars, t.ars_strong)],
            )
        } else {
            (
                OperatingMode::Engagement,
                DecisionRule::ModerateIntent,
                vec![(sss, t.sss_moderate), (ars, t.ars_strong)],
            )
        }
    } else if evs > t.evs_moderate_viral {
        (
            OperatingMode::Engagement,
            DecisionRule::ModerateViral,
            vec![(evs, t.evs_moderate_viral), (sss, t.sss_moderate)],
        )
    } else {
        (
            OperatingMode::Disengaged,
            DecisionRule::NoQualifyingSignal,
            vec![(sss, t.sss_moderate), (evs, t.evs_moderate_viral)],
        )
    };

    let probabilities = ModeProbabilities::dominant(mode, dominant_mass(&conditions));
    let confidence = probabilities.get(mode);
    let needs_review = confidence < t.review_cutoff();

    ModeSelection {
        mode,
        rule,
        probabilities,
        confidence,
        needs_review,
        review_reason: needs_review.then_some(ReviewReason::LowConfidence),
    }
}
