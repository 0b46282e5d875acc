// Copyright (c) 2026 Bellwether Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Weight Resolver Application Service
//!
//! Resolves the scoring weight vector for a post's segment:
//!
//! 1. Cache lookup by segment key (TTL, swept in the background)
//! 2. On miss, one store fetch per key; concurrent callers for the same key
//!    wait on a per-key lock and are served from the cache afterwards
//! 3. Validation of the fetched record; anything missing, malformed,
//!    under-sampled or unreachable resolves to the GLOBAL default
//! 4. Bayesian shrinkage of valid records toward the GLOBAL default
//!
//! Only validated, shrunk vectors are cached. Fallback results are returned
//! to the caller but never stored, so a transient store failure does not
//! pin a segment to the default for a whole TTL.

use crate::domain::config::WeightConfig;
use crate::domain::metrics::{self, MetricsSink};
use crate::domain::repository::WeightStore;
use crate::domain::weights::{apply_bayesian_shrinkage, shrinkage_blend, SegmentContext, WeightVector};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
struct CachedWeights {
    weights: WeightVector,
    expires_at: Instant,
}

/// Point-in-time cache counters for the health snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub store_fetches: u64,
    pub validation_failures: u64,
    pub fetch_failures: u64,
}

impl WeightCacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

pub struct WeightResolver {
    store: Arc<dyn WeightStore>,
    metrics: Arc<dyn MetricsSink>,
    config: WeightConfig,
    min_sample_size: u64,
    cache: DashMap<String, CachedWeights>,
    inflight: DashMap<String, Arc<Mutex<()>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    store_fetches: AtomicU64,
    validation_failures: AtomicU64,
    fetch_failures: AtomicU64,
}

impl WeightResolver {
    pub fn new(
        store: Arc<dyn WeightStore>,
        metrics: Arc<dyn MetricsSink>,
        config: WeightConfig,
        min_sample_size: u64,
    ) -> Self {
        Self {
            store,
            metrics,
            config,
            min_sample_size,
            cache: DashMap::new(),
            inflight: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            store_fetches: AtomicU64::new(0),
            validation_failures: AtomicU64::new(0),
            fetch_failures: AtomicU64::new(0),
        }
    }

    /// The GLOBAL default vector every fallback resolves to
    pub fn global_default(&self) -> &WeightVector {
        &self.config.global_default
    }

    pub async fn get_weights(&self, context: &SegmentContext) -> WeightVector {
        let key = context.segment_key();

        if let Some(weights) = self.cached(&key) {
            self.record_hit(&key);
            return weights;
        }

        let lock = self
            .inflight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Another caller may have populated the entry while we waited
        if let Some(weights) = self.cached(&key) {
            self.record_hit(&key);
            return weights;
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        self.metrics.increment(metrics::WEIGHT_CACHE_MISS, &[("segment", key.as_str())]);
        debug!(segment = %key, "Weight cache miss");

        let resolved = self.fetch_and_validate(context, &key).await;
        if let Some(weights) = &resolved {
            self.cache.insert(
                key.clone(),
                CachedWeights {
                    weights: weights.clone(),
                    expires_at: Instant::now() + self.config.cache_ttl(),
                },
            );
        }
        self.inflight.remove(&key);

        resolved.unwrap_or_else(|| self.config.global_default.clone())
    }

    /// `None` means "use the GLOBAL default and do not cache".
    async fn fetch_and_validate(&self, context: &SegmentContext, key: &str) -> Option<WeightVector> {
        self.store_fetches.fetch_add(1, Ordering::Relaxed);

        let record = match self.store.find_by_segment_key(key).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(segment = %key, "No stored weights for segment, using GLOBAL default");
                return None;
            }
            Err(e) => {
                self.fetch_failures.fetch_add(1, Ordering::Relaxed);
                self.metrics.increment(metrics::WEIGHT_FETCH_FAILURE, &[("segment", key)]);
                warn!(segment = %key, error = %e, "Weight store lookup failed, using GLOBAL default");
                return None;
            }
        };

        if let Err(e) = record.validate(self.min_sample_size) {
            self.validation_failures.fetch_add(1, Ordering::Relaxed);
            self.metrics.increment(
                metrics::WEIGHT_VALIDATION_FAILURE,
                &[("segment", key), ("reason", e.reason())],
            );
            warn!(segment = %key, error = %e, "Stored weights failed validation, using GLOBAL default");
            return None;
        }

        // The resolver is the authority on validity and segment identity
        let sample_size = record.sample_size;
        let mut record = record.for_segment(context, sample_size);
        record.is_validated = true;

        if record.is_global() {
            return Some(record);
        }

        let blend = shrinkage_blend(record.sample_size, self.config.shrinkage_k);
        let shrunk = apply_bayesian_shrinkage(&record, &self.config.global_default, self.config.shrinkage_k);
        if blend < 1.0 {
            self.metrics.increment(metrics::WEIGHT_SHRINKAGE_APPLIED, &[("segment", key)]);
            debug!(
                segment = %key,
                sample_size = record.sample_size,
                blend = blend,
                "Applied Bayesian shrinkage toward GLOBAL weights"
            );
        }

        if !shrunk.is_validated {
            // Only reachable with a malformed GLOBAL default
            self.validation_failures.fetch_add(1, Ordering::Relaxed);
            self.metrics.increment(
                metrics::WEIGHT_VALIDATION_FAILURE,
                &[("segment", key), ("reason", "shrinkage")],
            );
            return None;
        }

        Some(shrunk)
    }

    fn cached(&self, key: &str) -> Option<WeightVector> {
        let entry = self.cache.get(key)?;
        if entry.expires_at > Instant::now() {
            Some(entry.weights.clone())
        } else {
            None
        }
    }

    fn record_hit(&self, key: &str) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.metrics.increment(metrics::WEIGHT_CACHE_HIT, &[("segment", key)]);
    }

    /// Drop one segment from the cache; returns whether it was present
    pub fn invalidate(&self, segment_key: &str) -> bool {
        self.cache.remove(segment_key).is_some()
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Evict expired entries; returns how many were removed
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.cache.len();
        self.cache.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.cache.len())
    }

    /// Start the background sweep task.
    ///
    /// The task holds a weak reference and exits once the resolver is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let period = self.config.sweep_interval();
        let resolver: Weak<Self> = Arc::downgrade(self);
        info!(interval_secs = period.as_secs(), "Starting weight cache sweeper");

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(resolver) = resolver.upgrade() else {
                    debug!("Weight resolver dropped, stopping cache sweeper");
                    break;
                };
                let evicted = resolver.sweep_expired();
                if evicted > 0 {
                    debug!(evicted, remaining = resolver.cache.len(), "Swept expired weight cache entries");
                }
            }
        })
    }

    pub fn stats(&self) -> WeightCacheStats {
        WeightCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.len(),
            store_fetches: self.store_fetches.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::post::{Platform, TimeOfDay};
    use crate::domain::weights::WEIGHT_SUM_TOLERANCE;
    use crate::infrastructure::metrics::InMemoryMetricsSink;
    use crate::infrastructure::repositories::InMemoryWeightStore;
    use std::time::Duration;

    fn context() -> SegmentContext {
        SegmentContext {
            platform: Some(Platform::Twitter),
            time_of_day: Some(TimeOfDay::Morning),
        }
    }

    fn resolver(store: Arc<InMemoryWeightStore>, sink: Arc<InMemoryMetricsSink>) -> Arc<WeightResolver> {
        Arc::new(WeightResolver::new(store, sink, WeightConfig::default(), 30))
    }

    fn segment_weights(sample_size: u64) -> WeightVector {
        WeightVector::new(0.5, 0.2, 0.1, 0.2).for_segment(&context(), sample_size)
    }

    #[tokio::test]
    async fn test_missing_segment_falls_back_to_global() {
        let store = Arc::new(InMemoryWeightStore::new());
        let sink = Arc::new(InMemoryMetricsSink::new());
        let resolver = resolver(store.clone(), sink.clone());

        let weights = resolver.get_weights(&context()).await;
        assert_eq!(weights, WeightVector::global_default());

        // Fallbacks are not cached
        resolver.get_weights(&context()).await;
        assert_eq!(store.fetch_count(), 2);
        assert_eq!(sink.counter(metrics::WEIGHT_CACHE_MISS), 2);
    }

    #[tokio::test]
    async fn test_valid_segment_is_shrunk_and_cached() {
        let store = Arc::new(InMemoryWeightStore::new());
        store.insert(segment_weights(50));
        let sink = Arc::new(InMemoryMetricsSink::new());
        let resolver = resolver(store.clone(), sink.clone());

        let weights = resolver.get_weights(&context()).await;
        assert!(weights.is_validated);
        assert_eq!(weights.segment_key, "twitter:morning");
        assert!((weights.sum() - 1.0).abs() <= WEIGHT_SUM_TOLERANCE);
        // n == k: halfway between segment and global
        assert!((weights.sss_weight - 0.425).abs() < 1e-9);

        let again = resolver.get_weights(&context()).await;
        assert_eq!(again, weights);
        assert_eq!(store.fetch_count(), 1);
        assert_eq!(sink.counter(metrics::WEIGHT_CACHE_HIT), 1);
        assert_eq!(sink.counter(metrics::WEIGHT_SHRINKAGE_APPLIED), 1);
    }

    #[tokio::test]
    async fn test_invalid_segment_emits_validation_failure() {
        let store = Arc::new(InMemoryWeightStore::new());
        store.insert(WeightVector::new(0.9, 0.9, 0.1, 0.1).for_segment(&context(), 500));
        let sink = Arc::new(InMemoryMetricsSink::new());
        let resolver = resolver(store, sink.clone());

        let weights = resolver.get_weights(&context()).await;
        assert!(weights.is_global());
        assert_eq!(sink.counter_tagged(metrics::WEIGHT_VALIDATION_FAILURE, "reason", "bad_sum"), 1);
        assert_eq!(resolver.stats().entries, 0);
    }

    #[tokio::test]
    async fn test_low_sample_segment_is_rejected() {
        let store = Arc::new(InMemoryWeightStore::new());
        store.insert(segment_weights(10));
        let sink = Arc::new(InMemoryMetricsSink::new());
        let resolver = resolver(store, sink.clone());

        assert!(resolver.get_weights(&context()).await.is_global());
        assert_eq!(
            sink.counter_tagged(metrics::WEIGHT_VALIDATION_FAILURE, "reason", "insufficient_samples"),
            1
        );
    }

    #[tokio::test]
    async fn test_store_error_falls_back_without_caching() {
        let store = Arc::new(InMemoryWeightStore::new());
        store.insert(segment_weights(100));
        store.fail_next_fetches(1);
        let sink = Arc::new(InMemoryMetricsSink::new());
        let resolver = resolver(store.clone(), sink.clone());

        assert!(resolver.get_weights(&context()).await.is_global());
        assert_eq!(sink.counter(metrics::WEIGHT_FETCH_FAILURE), 1);

        let recovered = resolver.get_weights(&context()).await;
        assert_eq!(recovered.segment_key, "twitter:morning");
        assert_eq!(store.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_requests_collapse_to_one_fetch() {
        let store = Arc::new(InMemoryWeightStore::new().with_delay(Duration::from_millis(50)));
        store.insert(segment_weights(100));
        let sink = Arc::new(InMemoryMetricsSink::new());
        let resolver = resolver(store.clone(), sink.clone());

        let ctx = context();
        let (a, b) = tokio::join!(resolver.get_weights(&ctx), resolver.get_weights(&ctx));

        assert_eq!(a, b);
        assert_eq!(store.fetch_count(), 1);
        assert_eq!(sink.counter(metrics::WEIGHT_CACHE_MISS), 1);
        assert_eq!(sink.counter(metrics::WEIGHT_CACHE_HIT), 1);
        let stats = resolver.stats();
        assert_eq!((stats.misses, stats.hits), (1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_are_refetched_and_swept() {
        let store = Arc::new(InMemoryWeightStore::new());
        store.insert(segment_weights(100));
        let sink = Arc::new(InMemoryMetricsSink::new());
        let resolver = resolver(store.clone(), sink);

        resolver.get_weights(&context()).await;
        tokio::time::advance(Duration::from_secs(301)).await;

        assert_eq!(resolver.sweep_expired(), 1);
        resolver.get_weights(&context()).await;
        assert_eq!(store.fetch_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweeper_evicts_expired_entries() {
        let store = Arc::new(InMemoryWeightStore::new());
        store.insert(segment_weights(100));
        let sink = Arc::new(InMemoryMetricsSink::new());
        let resolver = resolver(store, sink);

        let sweeper = resolver.spawn_sweeper();
        tokio::task::yield_now().await;

        resolver.get_weights(&context()).await;
        assert_eq!(resolver.stats().entries, 1);

        tokio::time::advance(Duration::from_secs(361)).await;
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        assert_eq!(resolver.stats().entries, 0);
        sweeper.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_stops_when_resolver_dropped() {
        let store = Arc::new(InMemoryWeightStore::new());
        let sink = Arc::new(InMemoryMetricsSink::new());
        let resolver = resolver(store, sink);

        let sweeper = resolver.spawn_sweeper();
        tokio::task::yield_now().await;
        drop(resolver);

        tokio::time::advance(Duration::from_secs(61)).await;
        sweeper.await.unwrap();
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let store = Arc::new(InMemoryWeightStore::new());
        store.insert(segment_weights(100));
        let sink = Arc::new(InMemoryMetricsSink::new());
        let resolver = resolver(store.clone(), sink);

        resolver.get_weights(&context()).await;
        assert!(resolver.invalidate("twitter:morning"));
        assert!(!resolver.invalidate("twitter:morning"));

        resolver.get_weights(&context()).await;
        resolver.clear();
        assert_eq!(resolver.stats().entries, 0);
        assert_eq!(store.fetch_count(), 2);
    }
}
