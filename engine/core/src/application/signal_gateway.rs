// Copyright (c) 2026 Bellwether Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Signal Gateway Application Service
//!
//! Every external signal call goes through [`SignalGateway::call`], which
//! owns one [`CircuitBreaker`] per signal name. A failing, slow or
//! short-circuited provider yields the caller's fallback value; errors are
//! never propagated past the gateway.
//!
//! Breakers live in a concurrent map and are shared across every in-flight
//! `analyze_post`. The breaker mutex is held only for state transitions,
//! never across the provider call.

use crate::domain::breaker::{BreakerConfig, BreakerStatus, BreakerTransition, CircuitBreaker};
use crate::domain::metrics::{self, MetricsSink};
use crate::domain::signal::SignalError;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Result of a gateway call
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayOutcome<T> {
    pub value: T,
    /// True when `value` is the fallback
    pub degraded: bool,
}

impl<T> GatewayOutcome<T> {
    fn live(value: T) -> Self {
        Self { value, degraded: false }
    }

    fn fallback(value: T) -> Self {
        Self { value, degraded: true }
    }
}

/// Breaker view for the health snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub status: BreakerStatus,
    pub consecutive_failures: u32,
    pub total_failures: u64,
    pub times_opened: u64,
}

pub struct SignalGateway {
    breakers: DashMap<String, Arc<Mutex<CircuitBreaker>>>,
    config: BreakerConfig,
    call_timeout: Duration,
    metrics: Arc<dyn MetricsSink>,
}

impl SignalGateway {
    pub fn new(config: BreakerConfig, call_timeout: Duration, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            breakers: DashMap::new(),
            config,
            call_timeout,
            metrics,
        }
    }

    fn breaker(&self, name: &str) -> Arc<Mutex<CircuitBreaker>> {
        if let Some(existing) = self.breakers.get(name) {
            return existing.clone();
        }
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(CircuitBreaker::new(self.config.clone()))))
            .clone()
    }

    /// Run `call` under the breaker for `name`, returning `fallback` on any
    /// failure, timeout or open breaker.
    pub async fn call<T, F, Fut>(&self, name: &str, call: F, fallback: T) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SignalError>>,
    {
        self.call_with_outcome(name, call, fallback).await.value
    }

    pub async fn call_with_outcome<T, F, Fut>(&self, name: &str, call: F, fallback: T) -> GatewayOutcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SignalError>>,
    {
        let breaker = self.breaker(name);

        if breaker.lock().should_short_circuit(Instant::now()) {
            self.metrics.increment(metrics::BREAKER_FALLBACK, &[("signal_name", name)]);
            debug!(signal = name, "Breaker open, serving fallback");
            return GatewayOutcome::fallback(fallback);
        }

        let started = Instant::now();
        let result = match tokio::time::timeout(self.call_timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(SignalError::Timeout(self.call_timeout.as_millis() as u64)),
        };
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.metrics.record(metrics::SIGNAL_LATENCY_MS, elapsed_ms, &[("signal_name", name)]);

        match result {
            Ok(value) => {
                let transition = breaker.lock().record_success();
                if transition == BreakerTransition::Closed {
                    self.metrics.increment(metrics::BREAKER_STATE_CLOSE, &[("signal_name", name)]);
                    info!(signal = name, "Circuit breaker closed after successful probe");
                }
                GatewayOutcome::live(value)
            }
            Err(e) => {
                self.metrics.increment(metrics::SIGNAL_FAILURE, &[("signal_name", name)]);
                let transition = breaker.lock().record_failure(Instant::now());
                match transition {
                    BreakerTransition::Opened | BreakerTransition::Reopened => {
                        self.metrics.increment(metrics::BREAKER_STATE_OPEN, &[("signal_name", name)]);
                        warn!(
                            signal = name,
                            error = %e,
                            reopened = transition == BreakerTransition::Reopened,
                            open_for_ms = self.config.open_timeout_ms,
                            "Circuit breaker opened"
                        );
                    }
                    _ => {
                        warn!(signal = name, error = %e, elapsed_ms, "Signal call failed, serving fallback");
                    }
                }
                GatewayOutcome::fallback(fallback)
            }
        }
    }

    /// Current state of every breaker created so far, sorted by name
    pub fn breaker_states(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<BreakerSnapshot> = self
            .breakers
            .iter()
            .map(|entry| {
                let breaker = entry.value().lock();
                BreakerSnapshot {
                    name: entry.key().clone(),
                    status: breaker.status(),
                    consecutive_failures: breaker.consecutive_failures(),
                    total_failures: breaker.total_failures(),
                    times_opened: breaker.times_opened(),
                }
            })
            .collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    pub fn status(&self, name: &str) -> Option<BreakerStatus> {
        self.breakers.get(name).map(|b| b.lock().status())
    }

    /// Force a breaker closed; returns false for an unknown name
    pub fn reset(&self, name: &str) -> bool {
        match self.breakers.get(name) {
            Some(breaker) => {
                breaker.lock().reset();
                info!(signal = name, "Circuit breaker reset by operator");
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::metrics::InMemoryMetricsSink;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn gateway(threshold: u32, open_timeout_ms: u64, sink: Arc<InMemoryMetricsSink>) -> SignalGateway {
        SignalGateway::new(
            BreakerConfig {
                failure_threshold: threshold,
                open_timeout_ms,
            },
            Duration::from_millis(200),
            sink,
        )
    }

    async fn failing(invocations: &AtomicUsize) -> Result<f64, SignalError> {
        invocations.fetch_add(1, Ordering::SeqCst);
        Err(SignalError::Unavailable("down".to_string()))
    }

    async fn succeeding(invocations: &AtomicUsize) -> Result<f64, SignalError> {
        invocations.fetch_add(1, Ordering::SeqCst);
        Ok(0.9)
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let sink = Arc::new(InMemoryMetricsSink::new());
        let gw = gateway(3, 1_000, sink.clone());
        let calls = AtomicUsize::new(0);

        let outcome = gw.call_with_outcome("intent", || succeeding(&calls), 0.0).await;
        assert_eq!(outcome, GatewayOutcome { value: 0.9, degraded: false });
        assert_eq!(gw.status("intent"), Some(BreakerStatus::Closed));
        assert_eq!(sink.counter(metrics::SIGNAL_FAILURE), 0);
    }

    #[tokio::test]
    async fn test_breaker_opens_short_circuits_and_recovers() {
        let sink = Arc::new(InMemoryMetricsSink::new());
        let gw = gateway(3, 50, sink.clone());
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            assert_eq!(gw.call("author", || failing(&calls), 0.1).await, 0.1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(gw.status("author"), Some(BreakerStatus::Open));
        assert_eq!(sink.counter_tagged(metrics::SIGNAL_FAILURE, "signal_name", "author"), 3);
        assert_eq!(sink.counter(metrics::BREAKER_STATE_OPEN), 1);

        // Open: fallback without invoking the provider
        let outcome = gw.call_with_outcome("author", || succeeding(&calls), 0.1).await;
        assert!(outcome.degraded);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(sink.counter(metrics::BREAKER_FALLBACK), 1);

        tokio::time::sleep(Duration::from_millis(60)).await;

        // Half-open probe succeeds and closes the breaker
        assert_eq!(gw.call("author", || succeeding(&calls), 0.1).await, 0.9);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(gw.status("author"), Some(BreakerStatus::Closed));
        assert_eq!(sink.counter(metrics::BREAKER_STATE_CLOSE), 1);
    }

    #[tokio::test]
    async fn test_failed_probe_reopens() {
        let sink = Arc::new(InMemoryMetricsSink::new());
        let gw = gateway(1, 30, sink.clone());
        let calls = AtomicUsize::new(0);

        gw.call("velocity", || failing(&calls), 1.0).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        gw.call("velocity", || failing(&calls), 1.0).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(gw.status("velocity"), Some(BreakerStatus::Open));
        assert_eq!(sink.counter(metrics::BREAKER_STATE_OPEN), 2);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let sink = Arc::new(InMemoryMetricsSink::new());
        let gw = SignalGateway::new(
            BreakerConfig {
                failure_threshold: 1,
                open_timeout_ms: 10_000,
            },
            Duration::from_millis(20),
            sink.clone(),
        );

        let outcome = gw
            .call_with_outcome(
                "topic",
                || async {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    Ok::<_, SignalError>(0.8)
                },
                0.0,
            )
            .await;

        assert_eq!(outcome, GatewayOutcome { value: 0.0, degraded: true });
        assert_eq!(gw.status("topic"), Some(BreakerStatus::Open));
        assert_eq!(sink.counter_tagged(metrics::SIGNAL_FAILURE, "signal_name", "topic"), 1);
    }

    #[tokio::test]
    async fn test_breakers_are_independent_per_name() {
        let sink = Arc::new(InMemoryMetricsSink::new());
        let gw = gateway(1, 10_000, sink);
        let calls = AtomicUsize::new(0);

        gw.call("safety", || failing(&calls), 0.0).await;
        assert_eq!(gw.call("intent", || succeeding(&calls), 0.0).await, 0.9);

        let states = gw.breaker_states();
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].name, "intent");
        assert_eq!(states[0].status, BreakerStatus::Closed);
        assert_eq!(states[1].name, "safety");
        assert_eq!(states[1].status, BreakerStatus::Open);
        assert_eq!(states[1].times_opened, 1);
    }

    #[tokio::test]
    async fn test_reset_closes_breaker() {
        let sink = Arc::new(InMemoryMetricsSink::new());
        let gw = gateway(1, 10_000, sink);
        let calls = AtomicUsize::new(0);

        gw.call("competitor", || failing(&calls), 0.0).await;
        assert!(gw.reset("competitor"));
        assert!(!gw.reset("unknown"));
        assert_eq!(gw.call("competitor", || succeeding(&calls), 0.0).await, 0.9);
    }
}
