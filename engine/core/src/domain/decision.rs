// Copyright (c) 2026 Bellwether Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Decision Aggregate
//!
//! The output of one `analyze_post` call. A decision is created once per
//! post and persisted together with its follow-up work; it is not mutated by
//! the engine afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::follow_up::FollowUp;
use crate::domain::mode::{DecisionRule, ModeProbabilities, OperatingMode};
use crate::domain::post::{Platform, PostId};
use crate::domain::scoring::CredibleInterval;
use crate::domain::signal::{ArchetypeName, SignalKind, TemporalContext};
use crate::domain::weights::SegmentType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecisionId(pub Uuid);

impl DecisionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DecisionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DecisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewReason {
    /// Mode confidence below `confidence_threshold - review_confidence_delta`
    LowConfidence,
    /// The safety provider fell back while the engine chose to engage
    SafetyUnavailable,
}

impl ReviewReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewReason::LowConfidence => "LOW_CONFIDENCE",
            ReviewReason::SafetyUnavailable => "SAFETY_UNAVAILABLE",
        }
    }
}

impl fmt::Display for ReviewReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReviewReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW_CONFIDENCE" => Ok(ReviewReason::LowConfidence),
            "SAFETY_UNAVAILABLE" => Ok(ReviewReason::SafetyUnavailable),
            other => Err(format!("unknown review reason '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub id: DecisionId,
    pub post_id: PostId,
    pub platform: Platform,

    pub composite_score: f64,
    pub credible_interval: CredibleInterval,

    pub mode: OperatingMode,
    pub mode_confidence: f64,
    pub mode_probabilities: ModeProbabilities,
    pub decision_rule: DecisionRule,

    /// Segment key of the weight vector actually used (GLOBAL on fallback)
    pub segment_used: String,
    pub segment_type: SegmentType,

    pub archetype: Option<ArchetypeName>,
    pub competitor_detected: bool,
    pub competitor_name: Option<String>,
    pub is_power_user: bool,

    pub needs_review: bool,
    pub review_reason: Option<ReviewReason>,

    #[serde(default)]
    pub safety_flags: Vec<String>,
    pub temporal_context: TemporalContext,

    /// Signals whose value came from the gateway fallback
    #[serde(default)]
    pub degraded_signals: Vec<SignalKind>,

    #[serde(default)]
    pub follow_ups: Vec<FollowUp>,

    pub decided_at: DateTime<Utc>,
}

impl Decision {
    /// Flag for review unless already flagged; the first reason sticks.
    pub fn flag_for_review(&mut self, reason: ReviewReason) {
        if !self.needs_review {
            self.needs_review = true;
            self.review_reason = Some(reason);
        }
    }

    pub fn is_degraded(&self, kind: SignalKind) -> bool {
        self.degraded_signals.contains(&kind)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::decision;
    use super::*;

    #[test]
    fn test_first_review_reason_sticks() {
        let mut d = decision(OperatingMode::Engagement);
        d.flag_for_review(ReviewReason::LowConfidence);
        d.flag_for_review(ReviewReason::SafetyUnavailable);
        assert!(d.needs_review);
        assert_eq!(d.review_reason, Some(ReviewReason::LowConfidence));
    }

    #[test]
    fn test_review_reason_wire_format() {
        assert_eq!(serde_json::to_value(ReviewReason::LowConfidence).unwrap(), "LOW_CONFIDENCE");
        assert_eq!("SAFETY_UNAVAILABLE".parse::<ReviewReason>().unwrap(), ReviewReason::SafetyUnavailable);
    }

    #[test]
    fn test_decision_json_roundtrip_keeps_mode_map() {
        let d = decision(OperatingMode::Hybrid);
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["mode"], "HYBRID");
        assert!(json["mode_probabilities"]["HYBRID"].as_f64().unwrap() > 0.7);
        let back: Decision = serde_json::from_value(json).unwrap();
        assert_eq!(back.id, d.id);
    }
}
