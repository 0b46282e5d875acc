// Copyright (c) 2026 Bellwether Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Metrics sink adapters.
//!
//! - [`PrometheusMetricsSink`] forwards to the `metrics` facade. Whatever
//!   recorder the binary installs (the CLI installs the Prometheus exporter)
//!   receives the values; with no recorder installed they are dropped.
//! - [`InMemoryMetricsSink`] keeps counts and samples in process for tests
//!   and the simulation report.
//! - [`FanOutMetricsSink`] copies every value to several sinks.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::domain::metrics::{MetricTags, MetricsSink};

fn labels(tags: MetricTags<'_>) -> Vec<metrics::Label> {
    tags.iter()
        .map(|(k, v)| metrics::Label::new(k.to_string(), v.to_string()))
        .collect()
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusMetricsSink;

impl PrometheusMetricsSink {
    pub fn new() -> Self {
        Self
    }
}

impl MetricsSink for PrometheusMetricsSink {
    fn increment(&self, name: &str, tags: MetricTags<'_>) {
        metrics::counter!(name.to_string(), labels(tags)).increment(1);
    }

    fn record(&self, name: &str, value: f64, tags: MetricTags<'_>) {
        metrics::histogram!(name.to_string(), labels(tags)).record(value);
    }
}

/// Forwards every value to each inner sink in order.
#[derive(Clone, Default)]
pub struct FanOutMetricsSink {
    sinks: Vec<Arc<dyn MetricsSink>>,
}

impl FanOutMetricsSink {
    pub fn new(sinks: Vec<Arc<dyn MetricsSink>>) -> Self {
        Self { sinks }
    }

    pub fn with(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl MetricsSink for FanOutMetricsSink {
    fn increment(&self, name: &str, tags: MetricTags<'_>) {
        for sink in &self.sinks {
            sink.increment(name, tags);
        }
    }

    fn record(&self, name: &str, value: f64, tags: MetricTags<'_>) {
        for sink in &self.sinks {
            sink.record(name, value, tags);
        }
    }
}

type SeriesKey = (String, Vec<(String, String)>);

fn series_key(name: &str, tags: MetricTags<'_>) -> SeriesKey {
    let mut tags: Vec<(String, String)> = tags.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    tags.sort();
    (name.to_string(), tags)
}

#[derive(Debug, Default)]
pub struct InMemoryMetricsSink {
    counters: Mutex<HashMap<SeriesKey, u64>>,
    samples: Mutex<HashMap<SeriesKey, Vec<f64>>>,
}

impl InMemoryMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total for `name` across all tag sets
    pub fn counter(&self, name: &str) -> u64 {
        self.counters
            .lock()
            .iter()
            .filter(|((n, _), _)| n == name)
            .map(|(_, count)| *count)
            .sum()
    }

    /// Total for `name` across tag sets containing `key=value`
    pub fn counter_tagged(&self, name: &str, key: &str, value: &str) -> u64 {
        self.counters
            .lock()
            .iter()
            .filter(|((n, tags), _)| n == name && tags.iter().any(|(k, v)| k == key && v == value))
            .map(|(_, count)| *count)
            .sum()
    }

    /// Every value recorded under `name`, in no particular order
    pub fn samples(&self, name: &str) -> Vec<f64> {
        self.samples
            .lock()
            .iter()
            .filter(|((n, _), _)| n == name)
            .flat_map(|(_, values)| values.iter().copied())
            .collect()
    }

    /// Counter totals keyed by `name{k=v,...}`
    pub fn counter_snapshot(&self) -> BTreeMap<String, u64> {
        self.counters
            .lock()
            .iter()
            .map(|((name, tags), count)| {
                let key = if tags.is_empty() {
                    name.clone()
                } else {
                    let rendered: Vec<String> = tags.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                    format!("{}{{{}}}", name, rendered.join(","))
                };
                (key, *count)
            })
            .collect()
    }

    pub fn reset(&self) {
        self.counters.lock().clear();
        self.samples.lock().clear();
    }
}

impl MetricsSink for InMemoryMetricsSink {
    fn increment(&self, name: &str, tags: MetricTags<'_>) {
        *self.counters.lock().entry(series_key(name, tags)).or_insert(0) += 1;
    }

    fn record(&self, name: &str, value: f64, tags: MetricTags<'_>) {
        self.samples.lock().entry(series_key(name, tags)).or_default().push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

    fn counter_value(snapshotter: &Snapshotter, name: &str, label: (&str, &str)) -> Option<u64> {
        snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .find_map(|(key, _, _, value)| match value {
                DebugValue::Counter(n)
                    if key.key().name() == name
                        && key.key().labels().any(|l| l.key() == label.0 && l.value() == label.1) =>
                {
                    Some(n)
                }
                _ => None,
            })
    }

    #[test]
    fn test_counts_by_name_and_tag() {
        let sink = InMemoryMetricsSink::new();
        sink.increment("signal.failure", &[("signal_name", "intent")]);
        sink.increment("signal.failure", &[("signal_name", "intent")]);
        sink.increment("signal.failure", &[("signal_name", "safety")]);

        assert_eq!(sink.counter("signal.failure"), 3);
        assert_eq!(sink.counter_tagged("signal.failure", "signal_name", "intent"), 2);
        assert_eq!(sink.counter("weight_cache_hit"), 0);
    }

    #[test]
    fn test_tag_order_does_not_split_series() {
        let sink = InMemoryMetricsSink::new();
        sink.increment("decision_mode", &[("mode", "HELPFUL"), ("platform", "reddit")]);
        sink.increment("decision_mode", &[("platform", "reddit"), ("mode", "HELPFUL")]);

        let snapshot = sink.counter_snapshot();
        assert_eq!(snapshot.get("decision_mode{mode=HELPFUL,platform=reddit}"), Some(&2));
    }

    #[test]
    fn test_samples_and_reset() {
        let sink = InMemoryMetricsSink::new();
        sink.record("decision_latency_ms", 12.5, &[]);
        sink.record("decision_latency_ms", 7.0, &[("platform", "twitter")]);
        let mut samples = sink.samples("decision_latency_ms");
        samples.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(samples, vec![7.0, 12.5]);

        sink.reset();
        assert!(sink.samples("decision_latency_ms").is_empty());
    }

    #[test]
    fn test_prometheus_sink_forwards_to_recorder() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            let sink = PrometheusMetricsSink::new();
            sink.increment("breaker_opened", &[("signal_name", "intent")]);
            sink.increment("breaker_opened", &[("signal_name", "intent")]);
            sink.record("decision_latency_ms", 4.5, &[("platform", "reddit")]);
        });

        assert_eq!(counter_value(&snapshotter, "breaker_opened", ("signal_name", "intent")), Some(2));
        let histogram = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .find_map(|(key, _, _, value)| match value {
                DebugValue::Histogram(values) if key.key().name() == "decision_latency_ms" => Some(values.len()),
                _ => None,
            });
        assert_eq!(histogram, Some(1));
    }

    #[test]
    fn test_fan_out_feeds_every_sink() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let report = Arc::new(InMemoryMetricsSink::new());
        let sink = FanOutMetricsSink::default()
            .with(report.clone())
            .with(Arc::new(PrometheusMetricsSink::new()));
        assert_eq!(sink.len(), 2);

        metrics::with_local_recorder(&recorder, || {
            sink.increment("weight_cache_miss", &[("segment", "GLOBAL")]);
            sink.record("signal.latency_ms", 3.0, &[("signal_name", "topic")]);
        });

        assert_eq!(report.counter("weight_cache_miss"), 1);
        assert_eq!(report.samples("signal.latency_ms"), vec![3.0]);
        assert_eq!(counter_value(&snapshotter, "weight_cache_miss", ("segment", "GLOBAL")), Some(1));
    }

    #[test]
    fn test_prometheus_sink_without_recorder_is_noop() {
        let sink = PrometheusMetricsSink::new();
        sink.increment("weight_cache_miss", &[("segment", "GLOBAL")]);
        sink.record("signal.latency_ms", 3.0, &[("signal_name", "topic")]);
    }
}
