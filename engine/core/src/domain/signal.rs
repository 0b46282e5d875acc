// Copyright (c) 2026 Bellwether Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Signal Results and Provider Contract
//!
//! Every signal the engine consumes is produced by an external analyzer and
//! reaches the engine through the [`SignalSource`] trait. The engine never
//! looks inside an analyzer; it only combines their outputs.
//!
//! | Kind | Type | Used by |
//! |------|------|---------|
//! | `intent` (sss) | [`IntentSignal`] | composite, mode ladder |
//! | `author` (ars) | [`AuthorSignal`] | composite, mode ladder, archetypes |
//! | `velocity` (evs) | [`VelocitySignal`] | composite (normalized), mode ladder |
//! | `topic` (trs) | [`TopicSignal`] | composite, relevance gate |
//! | `safety` | [`SafetySignal`] | hard override |
//! | `power_user` | [`PowerUserSignal`] | priority branch |
//! | `competitor` | [`CompetitorSignal`] | decision metadata, follow-ups |
//! | `temporal` | [`TemporalContext`] | archetype preference, follow-up cadence |
//!
//! Each type provides a `fallback()` constructor: the value the gateway
//! substitutes when the provider fails or its breaker is open.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::domain::post::{Author, Post};

/// Name of a response voice, e.g. "educator" or "peer".
pub type ArchetypeName = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Intent,
    Author,
    Velocity,
    Topic,
    Safety,
    PowerUser,
    Competitor,
    Temporal,
}

impl SignalKind {
    pub const ALL: [SignalKind; 8] = [
        SignalKind::Intent,
        SignalKind::Author,
        SignalKind::Velocity,
        SignalKind::Topic,
        SignalKind::Safety,
        SignalKind::PowerUser,
        SignalKind::Competitor,
        SignalKind::Temporal,
    ];

    /// Breaker name for this signal
    pub fn name(&self) -> &'static str {
        match self {
            SignalKind::Intent => "intent",
            SignalKind::Author => "author",
            SignalKind::Velocity => "velocity",
            SignalKind::Topic => "topic",
            SignalKind::Safety => "safety",
            SignalKind::PowerUser => "power_user",
            SignalKind::Competitor => "competitor",
            SignalKind::Temporal => "temporal",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Common view over the four signals that feed the composite score.
pub trait ScoredSignal {
    fn value(&self) -> f64;
    fn confidence(&self) -> f64;
}

/// Linguistic intent: how much the post asks for help (sss).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentSignal {
    pub score: f64,
    pub confidence: f64,
    /// Detected intent category (e.g. "question", "complaint")
    #[serde(default)]
    pub category: Option<String>,
}

impl IntentSignal {
    pub fn new(score: f64, confidence: f64) -> Self {
        Self { score, confidence, category: None }
    }

    pub fn fallback() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl ScoredSignal for IntentSignal {
    fn value(&self) -> f64 {
        self.score
    }
    fn confidence(&self) -> f64 {
        self.confidence
    }
}

/// Author relationship strength (ars) and the archetypes this author may be
/// answered with, in author preference order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorSignal {
    pub score: f64,
    pub confidence: f64,
    #[serde(default)]
    pub archetypes: Vec<ArchetypeName>,
}

impl AuthorSignal {
    pub fn new(score: f64, confidence: f64) -> Self {
        Self { score, confidence, archetypes: Vec::new() }
    }

    pub fn with_archetypes<I, S>(mut self, archetypes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ArchetypeName>,
    {
        self.archetypes = archetypes.into_iter().map(Into::into).collect();
        self
    }

    pub fn fallback() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl ScoredSignal for AuthorSignal {
    fn value(&self) -> f64 {
        self.score
    }
    fn confidence(&self) -> f64 {
        self.confidence
    }
}

/// Engagement velocity relative to the author's baseline (evs).
///
/// `ratio` is unbounded: 1.0 is baseline, 5.0 is five times baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocitySignal {
    pub ratio: f64,
    pub confidence: f64,
}

impl VelocitySignal {
    pub fn new(ratio: f64, confidence: f64) -> Self {
        Self { ratio, confidence }
    }

    pub fn fallback() -> Self {
        Self::new(1.0, 0.0)
    }
}

impl ScoredSignal for VelocitySignal {
    fn value(&self) -> f64 {
        self.ratio
    }
    fn confidence(&self) -> f64 {
        self.confidence
    }
}

/// Topic relevance to the product (trs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicSignal {
    pub score: f64,
    pub confidence: f64,
    #[serde(default)]
    pub matched_topics: Vec<String>,
}

impl TopicSignal {
    pub fn new(score: f64, confidence: f64) -> Self {
        Self { score, confidence, matched_topics: Vec::new() }
    }

    pub fn fallback() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl ScoredSignal for TopicSignal {
    fn value(&self) -> f64 {
        self.score
    }
    fn confidence(&self) -> f64 {
        self.confidence
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SafetySignal {
    pub should_disengage: bool,
    #[serde(default)]
    pub flags: Vec<String>,
}

impl SafetySignal {
    pub fn safe() -> Self {
        Self::default()
    }

    pub fn disengage<I, S>(flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            should_disengage: true,
            flags: flags.into_iter().map(Into::into).collect(),
        }
    }

    /// Unavailable safety data does not force disengagement; the engine
    /// flags the decision for review instead.
    pub fn fallback() -> Self {
        Self::safe()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerUserSignal {
    pub is_power_user: bool,
    pub confidence: f64,
}

impl PowerUserSignal {
    pub fn new(is_power_user: bool, confidence: f64) -> Self {
        Self { is_power_user, confidence }
    }

    pub fn fallback() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompetitorSignal {
    pub detected: bool,
    #[serde(default)]
    pub name: Option<String>,
    pub confidence: f64,
}

impl CompetitorSignal {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn detected(name: impl Into<String>, confidence: f64) -> Self {
        Self {
            detected: true,
            name: Some(name.into()),
            confidence,
        }
    }

    pub fn fallback() -> Self {
        Self::none()
    }
}

/// Read-only snapshot of the temporal rule engine's view of "now".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalContext {
    /// Current campaign/calendar phase (e.g. "launch_week", "steady_state")
    pub phase: String,
    /// Multiplier applied to monitoring cadence; >1.0 means watch more closely
    #[serde(default = "default_multiplier")]
    pub monitoring_multiplier: f64,
    /// Preferred archetypes, highest priority first
    #[serde(default)]
    pub archetype_preferences: Vec<ArchetypeName>,
    /// Identifiers of the temporal rules that matched
    #[serde(default)]
    pub matched_rules: Vec<String>,
}

fn default_multiplier() -> f64 {
    1.0
}

impl Default for TemporalContext {
    fn default() -> Self {
        Self {
            phase: "steady_state".to_string(),
            monitoring_multiplier: default_multiplier(),
            archetype_preferences: Vec::new(),
            matched_rules: Vec::new(),
        }
    }
}

impl TemporalContext {
    pub fn fallback() -> Self {
        Self::default()
    }
}

/// All signal results for a single post, joined after fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalBundle {
    pub intent: IntentSignal,
    pub author: AuthorSignal,
    pub velocity: VelocitySignal,
    pub topic: TopicSignal,
    pub safety: SafetySignal,
    pub power_user: PowerUserSignal,
    pub competitor: CompetitorSignal,
    pub temporal: TemporalContext,
}

impl SignalBundle {
    /// Bundle in which every signal is its fallback value
    pub fn fallback() -> Self {
        Self {
            intent: IntentSignal::fallback(),
            author: AuthorSignal::fallback(),
            velocity: VelocitySignal::fallback(),
            topic: TopicSignal::fallback(),
            safety: SafetySignal::fallback(),
            power_user: PowerUserSignal::fallback(),
            competitor: CompetitorSignal::fallback(),
            temporal: TemporalContext::fallback(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("Signal provider unavailable: {0}")]
    Unavailable(String),

    #[error("Signal provider timed out after {0} ms")]
    Timeout(u64),

    #[error("Signal provider returned an invalid payload: {0}")]
    InvalidPayload(String),
}

/// Provider of one signal kind. Implemented by the analyzers outside this
/// crate; retry policy, if any, lives inside the implementation.
#[async_trait]
pub trait SignalSource<T: Send + 'static>: Send + Sync {
    async fn fetch(&self, post: &Post, author: &Author) -> Result<T, SignalError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_kind_names_are_unique() {
        let mut names: Vec<&str> = SignalKind::ALL.iter().map(|k| k.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), SignalKind::ALL.len());
    }

    #[test]
    fn test_fallbacks_are_conservative() {
        let bundle = SignalBundle::fallback();
        assert_eq!(bundle.intent.score, 0.0);
        assert_eq!(bundle.topic.score, 0.0);
        assert_eq!(bundle.velocity.ratio, 1.0);
        assert!(!bundle.safety.should_disengage);
        assert!(!bundle.power_user.is_power_user);
        assert!(!bundle.competitor.detected);
        assert_eq!(bundle.temporal.monitoring_multiplier, 1.0);
    }

    #[test]
    fn test_temporal_context_defaults_from_json() {
        let ctx: TemporalContext = serde_json::from_str(r#"{"phase":"launch_week"}"#).unwrap();
        assert_eq!(ctx.phase, "launch_week");
        assert_eq!(ctx.monitoring_multiplier, 1.0);
        assert!(ctx.archetype_preferences.is_empty());
    }

    #[test]
    fn test_author_signal_archetypes_builder() {
        let author = AuthorSignal::new(0.6, 0.9).with_archetypes(["educator", "peer"]);
        assert_eq!(author.archetypes, vec!["educator".to_string(), "peer".to_string()]);
    }
}
