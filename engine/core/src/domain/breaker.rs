// Copyright (c) 2026 Bellwether Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Circuit Breaker State Machine
//!
//! One [`CircuitBreaker`] guards one named signal provider.
//!
//! ```text
//!   Closed ──(failures >= threshold)──> Open
//!   Open ──(open timeout elapsed)─────> HalfOpen   (next call is the probe)
//!   HalfOpen ──(probe succeeds)───────> Closed
//!   HalfOpen ──(probe fails)──────────> Open
//! ```
//!
//! The type is a plain value: it takes the current [`Instant`] as a
//! parameter and never reads a clock itself. Sharing and locking are the
//! gateway's concern (`crate::application::signal_gateway`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures that trip a closed breaker
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// How long an open breaker short-circuits before probing
    #[serde(default = "default_open_timeout_ms")]
    pub open_timeout_ms: u64,
}

impl BreakerConfig {
    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            open_timeout_ms: default_open_timeout_ms(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_open_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed { consecutive_failures: u32 },
    Open { until: Instant },
    /// `probe_started` is set while a probe call is outstanding
    HalfOpen { probe_started: Option<Instant> },
}

/// Serializable summary of [`BreakerState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerStatus {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for BreakerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakerStatus::Closed => write!(f, "CLOSED"),
            BreakerStatus::Open => write!(f, "OPEN"),
            BreakerStatus::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// State change caused by recording an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerTransition {
    Unchanged,
    /// Closed → Open
    Opened,
    /// HalfOpen → Open
    Reopened,
    /// HalfOpen → Closed
    Closed,
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: BreakerState,
    total_failures: u64,
    times_opened: u64,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: BreakerState::Closed { consecutive_failures: 0 },
            total_failures: 0,
            times_opened: 0,
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn status(&self) -> BreakerStatus {
        match self.state {
            BreakerState::Closed { .. } => BreakerStatus::Closed,
            BreakerState::Open { .. } => BreakerStatus::Open,
            BreakerState::HalfOpen { .. } => BreakerStatus::HalfOpen,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        match self.state {
            BreakerState::Closed { consecutive_failures } => consecutive_failures,
            _ => self.config.failure_threshold,
        }
    }

    pub fn total_failures(&self) -> u64 {
        self.total_failures
    }

    pub fn times_opened(&self) -> u64 {
        self.times_opened
    }

    /// Decide whether a call at `now` must be answered with the fallback.
    ///
    /// An expired open window moves the breaker to half-open and admits the
    /// caller as the probe. While a probe is outstanding every other caller
    /// is short-circuited; a probe that never reported back is considered
    /// lost after one open timeout and a new probe is admitted.
    pub fn should_short_circuit(&mut self, now: Instant) -> bool {
        match self.state {
            BreakerState::Closed { .. } => false,
            BreakerState::Open { until } => {
                if now >= until {
                    self.state = BreakerState::HalfOpen { probe_started: Some(now) };
                    false
                } else {
                    true
                }
            }
            BreakerState::HalfOpen { probe_started: None } => {
                self.state = BreakerState::HalfOpen { probe_started: Some(now) };
                false
            }
            BreakerState::HalfOpen { probe_started: Some(started) } => {
                if now.saturating_duration_since(started) >= self.config.open_timeout() {
                    self.state = BreakerState::HalfOpen { probe_started: Some(now) };
                    false
                } else {
                    true
                }
            }
        }
    }

    pub fn record_success(&mut self) -> BreakerTransition {
        match self.state {
            BreakerState::Closed { .. } => {
                self.state = BreakerState::Closed { consecutive_failures: 0 };
                BreakerTransition::Unchanged
            }
            BreakerState::HalfOpen { .. } => {
                self.state = BreakerState::Closed { consecutive_failures: 0 };
                BreakerTransition::Closed
            }
            // A call admitted before the breaker tripped finished late
            BreakerState::Open { .. } => BreakerTransition::Unchanged,
        }
    }

    pub fn record_failure(&mut self, now: Instant) -> BreakerTransition {
        self.total_failures += 1;
        let until = now + self.config.open_timeout();

        match self.state {
            BreakerState::Closed { consecutive_failures } => {
                let failures = consecutive_failures.saturating_add(1);
                if failures >= self.config.failure_threshold {
                    self.state = BreakerState::Open { until };
                    self.times_opened += 1;
                    BreakerTransition::Opened
                } else {
                    self.state = BreakerState::Closed { consecutive_failures: failures };
                    BreakerTransition::Unchanged
                }
            }
            BreakerState::HalfOpen { .. } => {
                self.state = BreakerState::Open { until };
                self.times_opened += 1;
                BreakerTransition::Reopened
            }
            BreakerState::Open { .. } => BreakerTransition::Unchanged,
        }
    }

    /// Force the breaker closed (operator action)
    pub fn reset(&mut self) {
        self.state = BreakerState::Closed { consecutive_failures: 0 };
    }
}
