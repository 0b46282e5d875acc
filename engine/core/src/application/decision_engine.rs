// Copyright (c) 2026 Bellwether Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Decision Engine Application Service
//!
//! Orchestrates one `analyze_post` call:
//!
//! ```text
//!            ┌─ WeightResolver::get_weights ─┐
//!   post ──► ├─ gateway("intent")            ├─► composite ─► interval ─► mode ─► archetype ─► follow-ups ─► persist
//!            ├─ gateway("author")   ...      │
//!            └─ gateway("temporal")          ┘
//! ```
//!
//! Weight resolution and all eight signal fetches run concurrently and are
//! joined before scoring. Only persistence can fail the call.

use crate::application::decision_persister::DecisionPersister;
use crate::application::latency::{LatencyHistogram, LatencyMetrics, LatencyTracker};
use crate::application::signal_gateway::{BreakerSnapshot, SignalGateway};
use crate::application::weight_resolver::{WeightCacheStats, WeightResolver};
use crate::domain::archetype::ArchetypeSelector;
use crate::domain::config::EngineConfig;
use crate::domain::decision::{Decision, DecisionId, ReviewReason};
use crate::domain::follow_up::FollowUpPlanner;
use crate::domain::metrics::{self, MetricsSink, NoopMetricsSink};
use crate::domain::mode::{ModePolicy, OperatingMode};
use crate::domain::post::{Author, Post, PostId};
use crate::domain::repository::{RepositoryError, TransactionStore, WeightStore};
use crate::domain::scoring::{CompositeScorer, UncertaintyEstimator};
use crate::domain::signal::{
    AuthorSignal, CompetitorSignal, IntentSignal, PowerUserSignal, SafetySignal, SignalBundle, SignalKind,
    SignalSource, TemporalContext, TopicSignal, VelocitySignal,
};
use crate::domain::thresholds::DecisionThresholds;
use crate::domain::weights::{SegmentContext, WeightVector};
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The decision transaction was aborted; the post may be retried
    #[error("failed to persist decision for post {post_id}: {source}")]
    Persistence {
        post_id: PostId,
        #[source]
        source: RepositoryError,
    },

    #[error("engine configuration error: {0}")]
    Configuration(String),
}

/// One provider per signal kind
#[derive(Clone)]
pub struct SignalProviders {
    pub intent: Arc<dyn SignalSource<IntentSignal>>,
    pub author: Arc<dyn SignalSource<AuthorSignal>>,
    pub velocity: Arc<dyn SignalSource<VelocitySignal>>,
    pub topic: Arc<dyn SignalSource<TopicSignal>>,
    pub safety: Arc<dyn SignalSource<SafetySignal>>,
    pub power_user: Arc<dyn SignalSource<PowerUserSignal>>,
    pub competitor: Arc<dyn SignalSource<CompetitorSignal>>,
    pub temporal: Arc<dyn SignalSource<TemporalContext>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub weight_cache: WeightCacheStats,
    pub breakers: Vec<BreakerSnapshot>,
    pub latency: LatencyMetrics,
    pub latency_histogram: LatencyHistogram,
    pub decisions_total: u64,
    pub persistence_failures: u64,
}

pub struct DecisionEngine {
    providers: SignalProviders,
    weights: Arc<WeightResolver>,
    gateway: SignalGateway,
    scorer: CompositeScorer,
    estimator: UncertaintyEstimator,
    policy: ModePolicy,
    archetypes: ArchetypeSelector,
    planner: FollowUpPlanner,
    persister: DecisionPersister,
    metrics: Arc<dyn MetricsSink>,
    latency: LatencyTracker,
    decisions_total: AtomicU64,
    persistence_failures: AtomicU64,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl DecisionEngine {
    pub fn builder() -> DecisionEngineBuilder {
        DecisionEngineBuilder::new()
    }

    pub async fn analyze_post(&self, post: &Post, author: &Author) -> Result<Decision, EngineError> {
        let started = Instant::now();
        let result = self.decide(post, author).await;
        let elapsed = started.elapsed();

        self.latency.record(elapsed);
        self.metrics.record(
            metrics::DECISION_LATENCY_MS,
            elapsed.as_secs_f64() * 1000.0,
            &[("platform", post.platform.as_str())],
        );
        result
    }

    async fn decide(&self, post: &Post, author: &Author) -> Result<Decision, EngineError> {
        let segment = SegmentContext::for_post(post);
        let p = &self.providers;
        let g = &self.gateway;

        let (weights, intent, author_sig, velocity, topic, safety, power_user, competitor, temporal) = tokio::join!(
            self.weights.get_weights(&segment),
            g.call_with_outcome(SignalKind::Intent.name(), || p.intent.fetch(post, author), IntentSignal::fallback()),
            g.call_with_outcome(SignalKind::Author.name(), || p.author.fetch(post, author), AuthorSignal::fallback()),
            g.call_with_outcome(
                SignalKind::Velocity.name(),
                || p.velocity.fetch(post, author),
                VelocitySignal::fallback()
            ),
            g.call_with_outcome(SignalKind::Topic.name(), || p.topic.fetch(post, author), TopicSignal::fallback()),
            g.call_with_outcome(SignalKind::Safety.name(), || p.safety.fetch(post, author), SafetySignal::fallback()),
            g.call_with_outcome(
                SignalKind::PowerUser.name(),
                || p.power_user.fetch(post, author),
                PowerUserSignal::fallback()
            ),
            g.call_with_outcome(
                SignalKind::Competitor.name(),
                || p.competitor.fetch(post, author),
                CompetitorSignal::fallback()
            ),
            g.call_with_outcome(
                SignalKind::Temporal.name(),
                || p.temporal.fetch(post, author),
                TemporalContext::fallback()
            ),
        );

        let mut degraded_signals = Vec::new();
        let mut note = |kind: SignalKind, degraded: bool| {
            if degraded {
                degraded_signals.push(kind);
            }
        };
        note(SignalKind::Intent, intent.degraded);
        note(SignalKind::Author, author_sig.degraded);
        note(SignalKind::Velocity, velocity.degraded);
        note(SignalKind::Topic, topic.degraded);
        note(SignalKind::Safety, safety.degraded);
        note(SignalKind::PowerUser, power_user.degraded);
        note(SignalKind::Competitor, competitor.degraded);
        note(SignalKind::Temporal, temporal.degraded);

        let bundle = SignalBundle {
            intent: intent.value,
            author: author_sig.value,
            velocity: velocity.value,
            topic: topic.value,
            safety: safety.value,
            power_user: power_user.value,
            competitor: competitor.value,
            temporal: temporal.value,
        };

        let decision = self.assemble(post, &bundle, &weights, degraded_signals);

        if let Err(source) = self.persister.persist(&decision, post).await {
            self.persistence_failures.fetch_add(1, Ordering::Relaxed);
            return Err(EngineError::Persistence {
                post_id: post.id,
                source,
            });
        }

        self.decisions_total.fetch_add(1, Ordering::Relaxed);
        self.metrics.increment(
            metrics::DECISION_MODE,
            &[("mode", decision.mode.as_str()), ("platform", post.platform.as_str())],
        );
        if let Some(reason) = decision.review_reason {
            self.metrics.increment(metrics::DECISION_NEEDS_REVIEW, &[("reason", reason.as_str())]);
        }

        info!(
            decision_id = %decision.id,
            post_id = %post.id,
            mode = decision.mode.as_str(),
            confidence = decision.mode_confidence,
            composite = decision.composite_score,
            segment = %decision.segment_used,
            needs_review = decision.needs_review,
            degraded = decision.degraded_signals.len(),
            "Decision recorded"
        );

        Ok(decision)
    }

    /// Pure part of the pipeline: scoring, policy, archetype and follow-ups.
    fn assemble(
        &self,
        post: &Post,
        bundle: &SignalBundle,
        weights: &WeightVector,
        degraded_signals: Vec<SignalKind>,
    ) -> Decision {
        let composite = self
            .scorer
            .score(&bundle.intent, &bundle.author, &bundle.velocity, &bundle.topic, weights);
        let uncertainty = self.estimator.estimate(
            &bundle.intent,
            &bundle.author,
            &bundle.velocity,
            &bundle.topic,
            weights,
            composite.value,
        );
        let selection = self.policy.select_mode(bundle);
        let archetype = self.archetypes.select(&bundle.author.archetypes, &bundle.temporal);

        let mut decision = Decision {
            id: DecisionId::new(),
            post_id: post.id,
            platform: post.platform,
            composite_score: composite.value,
            credible_interval: uncertainty.credible_interval,
            mode: selection.mode,
            mode_confidence: selection.confidence,
            mode_probabilities: selection.probabilities,
            decision_rule: selection.rule,
            segment_used: weights.segment_key.clone(),
            segment_type: weights.segment_type,
            archetype,
            competitor_detected: bundle.competitor.detected,
            competitor_name: bundle.competitor.name.clone(),
            is_power_user: bundle.power_user.is_power_user,
            needs_review: selection.needs_review,
            review_reason: selection.review_reason,
            safety_flags: bundle.safety.flags.clone(),
            temporal_context: bundle.temporal.clone(),
            degraded_signals,
            follow_ups: Vec::new(),
            decided_at: Utc::now(),
        };

        if decision.is_degraded(SignalKind::Safety) && decision.mode != OperatingMode::Disengaged {
            warn!(
                post_id = %post.id,
                mode = decision.mode.as_str(),
                "Safety signal unavailable for an engaged decision"
            );
            decision.flag_for_review(ReviewReason::SafetyUnavailable);
        }

        decision.follow_ups = self.planner.plan(&decision, bundle.velocity.ratio, decision.decided_at);
        decision
    }

    /// Start the weight cache sweeper. Must be called inside a Tokio runtime;
    /// calling it again while the sweeper runs is a no-op.
    pub fn start_background_tasks(&self) {
        let mut sweeper = self.sweeper.lock();
        if sweeper.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        *sweeper = Some(self.weights.spawn_sweeper());
    }

    pub fn background_tasks_running(&self) -> bool {
        self.sweeper
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub async fn get_weights(&self, context: &SegmentContext) -> WeightVector {
        self.weights.get_weights(context).await
    }

    pub fn weight_resolver(&self) -> &Arc<WeightResolver> {
        &self.weights
    }

    pub fn gateway(&self) -> &SignalGateway {
        &self.gateway
    }

    pub fn thresholds(&self) -> &DecisionThresholds {
        self.policy.thresholds()
    }

    pub fn latency_metrics(&self) -> LatencyMetrics {
        self.latency.metrics()
    }

    pub fn health_snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            weight_cache: self.weights.stats(),
            breakers: self.gateway.breaker_states(),
            latency: self.latency.metrics(),
            latency_histogram: self.latency.histogram(),
            decisions_total: self.decisions_total.load(Ordering::Relaxed),
            persistence_failures: self.persistence_failures.load(Ordering::Relaxed),
        }
    }
}

impl Drop for DecisionEngine {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.get_mut().take() {
            handle.abort();
        }
    }
}

/// Builds a [`DecisionEngine`] from explicit dependencies.
pub struct DecisionEngineBuilder {
    config: EngineConfig,
    weight_store: Option<Arc<dyn WeightStore>>,
    transaction_store: Option<Arc<dyn TransactionStore>>,
    providers: Option<SignalProviders>,
    metrics: Arc<dyn MetricsSink>,
    latency_window: usize,
}

impl Default for DecisionEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionEngineBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            weight_store: None,
            transaction_store: None,
            providers: None,
            metrics: Arc::new(NoopMetricsSink),
            latency_window: crate::application::latency::DEFAULT_WINDOW,
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn thresholds(mut self, thresholds: DecisionThresholds) -> Self {
        self.config.thresholds = thresholds;
        self
    }

    pub fn weight_store(mut self, store: Arc<dyn WeightStore>) -> Self {
        self.weight_store = Some(store);
        self
    }

    pub fn transaction_store(mut self, store: Arc<dyn TransactionStore>) -> Self {
        self.transaction_store = Some(store);
        self
    }

    pub fn signals(mut self, providers: SignalProviders) -> Self {
        self.providers = Some(providers);
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn latency_window(mut self, samples: usize) -> Self {
        self.latency_window = samples;
        self
    }

    pub fn build(self) -> Result<DecisionEngine, EngineError> {
        self.config
            .validate()
            .map_err(|e| EngineError::Configuration(e.to_string()))?;

        let weight_store = self
            .weight_store
            .ok_or_else(|| EngineError::Configuration("weight store is required".to_string()))?;
        let transaction_store = self
            .transaction_store
            .ok_or_else(|| EngineError::Configuration("transaction store is required".to_string()))?;
        let providers = self
            .providers
            .ok_or_else(|| EngineError::Configuration("signal providers are required".to_string()))?;

        let config = self.config;
        let metrics = self.metrics;

        Ok(DecisionEngine {
            providers,
            weights: Arc::new(WeightResolver::new(
                weight_store,
                metrics.clone(),
                config.weights.clone(),
                config.thresholds.min_sample_size,
            )),
            gateway: SignalGateway::new(config.breaker.clone(), config.signals.timeout(), metrics.clone()),
            scorer: CompositeScorer::new(metrics.clone()),
            estimator: UncertaintyEstimator::default(),
            planner: FollowUpPlanner::new(config.follow_ups.clone(), config.thresholds.evs_moderate_viral),
            policy: ModePolicy::new(config.thresholds),
            archetypes: ArchetypeSelector,
            persister: DecisionPersister::new(transaction_store, metrics.clone()),
            metrics,
            latency: LatencyTracker::new(self.latency_window),
            decisions_total: AtomicU64::new(0),
            persistence_failures: AtomicU64::new(0),
            sweeper: Mutex::new(None),
        })
    }
}
