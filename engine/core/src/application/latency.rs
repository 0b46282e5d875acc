// Copyright (c) 2026 Bellwether Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Rolling latency statistics for `analyze_post`.
//!
//! Percentiles are computed over a bounded window of the most recent
//! samples; the histogram buckets are cumulative since construction.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

pub const DEFAULT_WINDOW: usize = 1_000;

/// Upper bounds (ms) of the histogram buckets; the last bucket is open-ended
pub const BUCKET_BOUNDS_MS: [f64; 8] = [10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1_000.0, 2_500.0];

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyMetrics {
    pub count: u64,
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub max_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyBucket {
    /// `None` for the overflow bucket
    pub le_ms: Option<f64>,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyHistogram {
    pub buckets: Vec<LatencyBucket>,
    pub total: u64,
}

#[derive(Debug)]
struct Inner {
    window: VecDeque<f64>,
    bucket_counts: [u64; BUCKET_BOUNDS_MS.len() + 1],
    total: u64,
}

#[derive(Debug)]
pub struct LatencyTracker {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl LatencyTracker {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(Inner {
                window: VecDeque::with_capacity(capacity),
                bucket_counts: [0; BUCKET_BOUNDS_MS.len() + 1],
                total: 0,
            }),
        }
    }

    pub fn record(&self, elapsed: Duration) {
        self.record_ms(elapsed.as_secs_f64() * 1000.0);
    }

    pub fn record_ms(&self, ms: f64) {
        if !ms.is_finite() || ms < 0.0 {
            return;
        }
        let bucket = BUCKET_BOUNDS_MS
            .iter()
            .position(|bound| ms <= *bound)
            .unwrap_or(BUCKET_BOUNDS_MS.len());

        let mut inner = self.inner.lock();
        if inner.window.len() == self.capacity {
            inner.window.pop_front();
        }
        inner.window.push_back(ms);
        inner.bucket_counts[bucket] += 1;
        inner.total += 1;
    }

    pub fn metrics(&self) -> LatencyMetrics {
        let mut samples: Vec<f64> = {
            let inner = self.inner.lock();
            inner.window.iter().copied().collect()
        };
        if samples.is_empty() {
            return LatencyMetrics::default();
        }
        samples.sort_by(|a, b| a.total_cmp(b));

        let count = samples.len();
        LatencyMetrics {
            count: count as u64,
            mean_ms: samples.iter().sum::<f64>() / count as f64,
            p50_ms: percentile(&samples, 0.50),
            p95_ms: percentile(&samples, 0.95),
            p99_ms: percentile(&samples, 0.99),
            max_ms: samples[count - 1],
        }
    }

    pub fn histogram(&self) -> LatencyHistogram {
        let inner = self.inner.lock();
        let buckets = inner
            .bucket_counts
            .iter()
            .enumerate()
            .map(|(i, count)| LatencyBucket {
                le_ms: BUCKET_BOUNDS_MS.get(i).copied(),
                count: *count,
            })
            .collect();
        LatencyHistogram {
            buckets,
            total: inner.total,
        }
    }
}

/// Nearest-rank percentile over sorted samples
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let rank = (q * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tracker_reports_zeroes() {
        let tracker = LatencyTracker::default();
        assert_eq!(tracker.metrics(), LatencyMetrics::default());
        assert_eq!(tracker.histogram().total, 0);
    }

    #[test]
    fn test_percentiles_nearest_rank() {
        let tracker = LatencyTracker::new(100);
        for ms in 1..=100 {
            tracker.record_ms(ms as f64);
        }
        let m = tracker.metrics();
        assert_eq!(m.count, 100);
        assert_eq!(m.p50_ms, 50.0);
        assert_eq!(m.p95_ms, 95.0);
        assert_eq!(m.p99_ms, 99.0);
        assert_eq!(m.max_ms, 100.0);
        assert!((m.mean_ms - 50.5).abs() < 1e-9);
    }

    #[test]
    fn test_window_is_bounded_but_histogram_is_cumulative() {
        let tracker = LatencyTracker::new(3);
        for ms in [5.0, 5.0, 5.0, 400.0, 400.0, 400.0] {
            tracker.record_ms(ms);
        }
        let m = tracker.metrics();
        assert_eq!(m.count, 3);
        assert_eq!(m.p50_ms, 400.0);

        let h = tracker.histogram();
        assert_eq!(h.total, 6);
        assert_eq!(h.buckets[0].count, 3);
        assert_eq!(h.buckets[5].le_ms, Some(500.0));
        assert_eq!(h.buckets[5].count, 3);
    }

    #[test]
    fn test_overflow_bucket_and_bad_samples() {
        let tracker = LatencyTracker::default();
        tracker.record(Duration::from_secs(10));
        tracker.record_ms(f64::NAN);
        tracker.record_ms(-1.0);

        let h = tracker.histogram();
        assert_eq!(h.total, 1);
        let last = h.buckets.last().unwrap();
        assert_eq!(last.le_ms, None);
        assert_eq!(last.count, 1);
    }
}
