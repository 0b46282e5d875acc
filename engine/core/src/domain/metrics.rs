// Copyright (c) 2026 Bellwether Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Metrics sink contract and the metric names the engine emits.
//!
//! Implementations live in `crate::infrastructure::metrics`.

pub const WEIGHT_CACHE_HIT: &str = "weight_cache_hit";
pub const WEIGHT_CACHE_MISS: &str = "weight_cache_miss";
pub const WEIGHT_VALIDATION_FAILURE: &str = "weight_validation_failure";
pub const WEIGHT_FETCH_FAILURE: &str = "weight_fetch_failure";
pub const WEIGHT_SHRINKAGE_APPLIED: &str = "weight_shrinkage_applied";

pub const BREAKER_STATE_OPEN: &str = "breaker_state_open";
pub const BREAKER_STATE_CLOSE: &str = "breaker_state_close";
pub const BREAKER_FALLBACK: &str = "breaker_fallback";
pub const SIGNAL_FAILURE: &str = "signal.failure";
pub const SIGNAL_LATENCY_MS: &str = "signal.latency_ms";

pub const NAN_INFINITY_DETECTED: &str = "nan_infinity_detected_count";
pub const COMPOSITE_OUT_OF_RANGE: &str = "composite_score_out_of_range";
pub const COMPOSITE_CLAMPED: &str = "composite_score_clamped";

pub const DECISION_MODE: &str = "decision_mode";
pub const DECISION_NEEDS_REVIEW: &str = "decision_needs_review";
pub const DECISION_LATENCY_MS: &str = "decision_latency_ms";
pub const DECISION_PERSIST_FAILURE: &str = "decision_persist_failure";

/// Key/value pairs attached to a metric
pub type MetricTags<'a> = &'a [(&'a str, &'a str)];

/// Narrow sink the engine reports to. Implementations must be cheap and
/// must never fail the caller.
pub trait MetricsSink: Send + Sync {
    fn increment(&self, name: &str, tags: MetricTags<'_>);

    fn record(&self, name: &str, value: f64, tags: MetricTags<'_>);
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {
    fn increment(&self, _name: &str, _tags: MetricTags<'_>) {}

    fn record(&self, _name: &str, _value: f64, _tags: MetricTags<'_>) {}
}
