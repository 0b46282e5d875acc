// Copyright (c) 2026 Bellwether Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Follow-up work items created in the same transaction as their decision.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::decision::{Decision, DecisionId};
use crate::domain::post::PostId;

/// Engagement checks are never scheduled closer together than this
pub const MIN_ENGAGEMENT_CHECK_SECS: i64 = 60;

/// A monitoring multiplier can stretch the check to at most this many intervals
pub const MAX_ENGAGEMENT_CHECK_STRETCH: f64 = 24.0;

/// Hard ceiling on the engagement check delay (30 days)
pub const MAX_ENGAGEMENT_CHECK_SECS: i64 = 30 * 24 * 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FollowUpId(pub Uuid);

impl FollowUpId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FollowUpId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FollowUpKind {
    /// Draft a reply in the chosen mode and archetype
    GenerateReply,
    /// Re-measure engagement on a fast-moving or high-value post
    EngagementCheck,
    /// Notify that a competitor was mentioned
    CompetitorAlert,
    /// Route the decision to a human before anything is sent
    HumanReview,
}

impl FollowUpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FollowUpKind::GenerateReply => "GENERATE_REPLY",
            FollowUpKind::EngagementCheck => "ENGAGEMENT_CHECK",
            FollowUpKind::CompetitorAlert => "COMPETITOR_ALERT",
            FollowUpKind::HumanReview => "HUMAN_REVIEW",
        }
    }
}

impl fmt::Display for FollowUpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUp {
    pub id: FollowUpId,
    pub decision_id: DecisionId,
    pub post_id: PostId,
    pub kind: FollowUpKind,
    pub scheduled_for: DateTime<Utc>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpConfig {
    /// Engagement check delay at a monitoring multiplier of 1.0
    #[serde(default = "default_engagement_check_interval_secs")]
    pub engagement_check_interval_secs: u64,
}

impl Default for FollowUpConfig {
    fn default() -> Self {
        Self {
            engagement_check_interval_secs: default_engagement_check_interval_secs(),
        }
    }
}

fn default_engagement_check_interval_secs() -> u64 {
    3600
}

/// Derives the follow-up work implied by a decision.
#[derive(Debug, Clone)]
pub struct FollowUpPlanner {
    config: FollowUpConfig,
    /// Velocity ratio above which an engaged post gets an engagement check
    viral_ratio: f64,
}

impl FollowUpPlanner {
    pub fn new(config: FollowUpConfig, viral_ratio: f64) -> Self {
        Self { config, viral_ratio }
    }

    /// Delay before the engagement check, shortened by the temporal
    /// monitoring multiplier.
    ///
    /// Multipliers below one stretch the delay, but never past
    /// [`MAX_ENGAGEMENT_CHECK_STRETCH`] intervals or
    /// [`MAX_ENGAGEMENT_CHECK_SECS`].
    pub fn engagement_check_delay(&self, monitoring_multiplier: f64) -> Duration {
        let multiplier = if monitoring_multiplier.is_finite() && monitoring_multiplier > 0.0 {
            monitoring_multiplier.max(1.0 / MAX_ENGAGEMENT_CHECK_STRETCH)
        } else {
            1.0
        };
        let secs = (self.config.engagement_check_interval_secs as f64 / multiplier)
            .round()
            .clamp(MIN_ENGAGEMENT_CHECK_SECS as f64, MAX_ENGAGEMENT_CHECK_SECS as f64);
        Duration::seconds(secs as i64)
    }

    pub fn plan(&self, decision: &Decision, velocity_ratio: f64, now: DateTime<Utc>) -> Vec<FollowUp> {
        let mut follow_ups = Vec::new();
        let mut push = |kind: FollowUpKind, scheduled_for: DateTime<Utc>, payload: serde_json::Value| {
            follow_ups.push(FollowUp {
                id: FollowUpId::new(),
                decision_id: decision.id,
                post_id: decision.post_id,
                kind,
                scheduled_for,
                payload,
            });
        };

        if decision.needs_review {
            push(
                FollowUpKind::HumanReview,
                now,
                serde_json::json!({
                    "reason": decision.review_reason.map(|r| r.as_str()),
                    "mode": decision.mode.as_str(),
                }),
            );
        }

        if decision.mode.is_engaged() {
            push(
                FollowUpKind::GenerateReply,
                now,
                serde_json::json!({
                    "mode": decision.mode.as_str(),
                    "archetype": decision.archetype,
                }),
            );

            if decision.is_power_user || velocity_ratio > self.viral_ratio {
                let delay = self.engagement_check_delay(decision.temporal_context.monitoring_multiplier);
                let scheduled_for = now
                    .checked_add_signed(delay)
                    .unwrap_or_else(|| now + Duration::seconds(MIN_ENGAGEMENT_CHECK_SECS));
                push(
                    FollowUpKind::EngagementCheck,
                    scheduled_for,
                    serde_json::json!({ "velocity_ratio": velocity_ratio }),
                );
            }
        }

        if decision.competitor_detected {
            push(
                FollowUpKind::CompetitorAlert,
                now,
                serde_json::json!({ "competitor": decision.competitor_name }),
            );
        }

        follow_ups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::decision::fixtures::decision;
    use crate::domain::decision::ReviewReason;
    use crate::domain::mode::OperatingMode;

    fn planner() -> FollowUpPlanner {
        FollowUpPlanner::new(FollowUpConfig::default(), 2.0)
    }

    fn kinds(follow_ups: &[FollowUp]) -> Vec<FollowUpKind> {
        follow_ups.iter().map(|f| f.kind).collect()
    }

    #[test]
    fn test_disengaged_decision_has_no_work() {
        let d = decision(OperatingMode::Disengaged);
        assert!(planner().plan(&d, 10.0, Utc::now()).is_empty());
    }

    #[test]
    fn test_engaged_decision_generates_reply() {
        let d = decision(OperatingMode::Helpful);
        let plan = planner().plan(&d, 1.0, Utc::now());
        assert_eq!(kinds(&plan), vec![FollowUpKind::GenerateReply]);
        assert_eq!(plan[0].decision_id, d.id);
        assert_eq!(plan[0].post_id, d.post_id);
    }

    #[test]
    fn test_viral_post_gets_engagement_check() {
        let now = Utc::now();
        let d = decision(OperatingMode::Engagement);
        let plan = planner().plan(&d, 4.0, now);
        assert_eq!(kinds(&plan), vec![FollowUpKind::GenerateReply, FollowUpKind::EngagementCheck]);
        assert_eq!(plan[1].scheduled_for, now + Duration::seconds(3600));
    }

    #[test]
    fn test_monitoring_multiplier_shortens_check() {
        let p = planner();
        assert_eq!(p.engagement_check_delay(2.0), Duration::seconds(1800));
        assert_eq!(p.engagement_check_delay(0.0), Duration::seconds(3600));
        assert_eq!(p.engagement_check_delay(f64::NAN), Duration::seconds(3600));
        assert_eq!(p.engagement_check_delay(1_000.0), Duration::seconds(MIN_ENGAGEMENT_CHECK_SECS));
    }

    #[test]
    fn test_tiny_monitoring_multiplier_is_bounded() {
        let p = planner();
        assert_eq!(p.engagement_check_delay(0.5), Duration::seconds(7200));
        assert_eq!(p.engagement_check_delay(1e-12), Duration::seconds(3600 * 24));
        assert_eq!(p.engagement_check_delay(f64::MIN_POSITIVE), Duration::seconds(3600 * 24));

        let long = FollowUpPlanner::new(
            FollowUpConfig {
                engagement_check_interval_secs: u64::MAX,
            },
            2.0,
        );
        assert_eq!(long.engagement_check_delay(1e-12), Duration::seconds(MAX_ENGAGEMENT_CHECK_SECS));

        let now = Utc::now();
        let mut d = decision(OperatingMode::Engagement);
        d.temporal_context.monitoring_multiplier = 1e-12;
        let plan = p.plan(&d, 4.0, now);
        assert_eq!(plan[1].kind, FollowUpKind::EngagementCheck);
        assert_eq!(plan[1].scheduled_for, now + Duration::seconds(3600 * 24));
    }

    #[test]
    fn test_review_and_competitor_items() {
        let mut d = decision(OperatingMode::Disengaged);
        d.flag_for_review(ReviewReason::LowConfidence);
        d.competitor_detected = true;
        d.competitor_name = Some("Acme".to_string());
        let plan = planner().plan(&d, 1.0, Utc::now());
        assert_eq!(kinds(&plan), vec![FollowUpKind::HumanReview, FollowUpKind::CompetitorAlert]);
        assert_eq!(plan[0].payload["reason"], "LOW_CONFIDENCE");
        assert_eq!(plan[1].payload["competitor"], "Acme");
    }
}
