// Copyright (c) 2026 Bellwether Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Decision thresholds injected into the mode policy and weight resolver.

use serde::{Deserialize, Serialize};

/// Velocity ratio above which a power user's post is answered in HYBRID mode.
pub const POWER_USER_VIRAL_RATIO: f64 = 3.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionThresholds {
    /// Intent score at or above which the agent answers helpfully
    #[serde(default = "default_sss_helpful")]
    pub sss_helpful: f64,

    /// Intent score at or above which light engagement is warranted
    #[serde(default = "default_sss_moderate")]
    pub sss_moderate: f64,

    #[serde(default = "default_evs_high_viral")]
    pub evs_high_viral: f64,

    #[serde(default = "default_evs_moderate_viral")]
    pub evs_moderate_viral: f64,

    /// Author relationship score above which HYBRID replaces ENGAGEMENT
    #[serde(default = "default_ars_strong")]
    pub ars_strong: f64,

    /// Topic relevance below which the engine always disengages
    #[serde(default = "default_trs_gate")]
    pub trs_gate: f64,

    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Slack below `confidence_threshold` before a decision needs review
    #[serde(default = "default_review_confidence_delta")]
    pub review_confidence_delta: f64,

    /// Minimum sample size for a segment weight vector to be trusted at all
    #[serde(default = "default_min_sample_size")]
    pub min_sample_size: u64,
}

impl DecisionThresholds {
    /// Mode confidence under which a decision is routed to human review
    pub fn review_cutoff(&self) -> f64 {
        self.confidence_threshold - self.review_confidence_delta
    }

    pub fn validate(&self) -> Result<(), String> {
        let unit = [
            ("sss_helpful", self.sss_helpful),
            ("sss_moderate", self.sss_moderate),
            ("ars_strong", self.ars_strong),
            ("trs_gate", self.trs_gate),
            ("confidence_threshold", self.confidence_threshold),
            ("review_confidence_delta", self.review_confidence_delta),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("thresholds.{} must be within [0, 1], got {}", name, value));
            }
        }

        for (name, value) in [
            ("evs_high_viral", self.evs_high_viral),
            ("evs_moderate_viral", self.evs_moderate_viral),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("thresholds.{} must be a non-negative number, got {}", name, value));
            }
        }

        if self.sss_moderate > self.sss_helpful {
            return Err(format!(
                "thresholds.sss_moderate ({}) must not exceed sss_helpful ({})",
                self.sss_moderate, self.sss_helpful
            ));
        }

        if self.evs_moderate_viral > self.evs_high_viral {
            return Err(format!(
                "thresholds.evs_moderate_viral ({}) must not exceed evs_high_viral ({})",
                self.evs_moderate_viral, self.evs_high_viral
            ));
        }

        Ok(())
    }
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        Self {
            sss_helpful: default_sss_helpful(),
            sss_moderate: default_sss_moderate(),
            evs_high_viral: default_evs_high_viral(),
            evs_moderate_viral: default_evs_moderate_viral(),
            ars_strong: default_ars_strong(),
            trs_gate: default_trs_gate(),
            confidence_threshold: default_confidence_threshold(),
            review_confidence_delta: default_review_confidence_delta(),
            min_sample_size: default_min_sample_size(),
        }
    }
}

fn default_sss_helpful() -> f64 {
    0.7
}

fn default_sss_moderate() -> f64 {
    0.5
}

fn default_evs_high_viral() -> f64 {
    5.0
}

fn default_evs_moderate_viral() -> f64 {
    2.0
}

fn default_ars_strong() -> f64 {
    0.7
}

fn default_trs_gate() -> f64 {
    0.5
}

fn default_confidence_threshold() -> f64 {
    0.7
}

fn default_review_confidence_delta() -> f64 {
    0.1
}

fn default_min_sample_size() -> u64 {
    30
}
