// Copyright (c) 2026 Bellwether Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod weight_resolver;
pub mod signal_gateway;
pub mod latency;
pub mod decision_persister;
pub mod decision_engine;
pub mod repository_factory;

// Re-export services for convenience
pub use weight_resolver::{WeightResolver, WeightCacheStats};
pub use signal_gateway::{SignalGateway, GatewayOutcome, BreakerSnapshot};
pub use latency::{LatencyTracker, LatencyMetrics, LatencyHistogram};
pub use decision_persister::DecisionPersister;
pub use decision_engine::{DecisionEngine, DecisionEngineBuilder, SignalProviders, HealthSnapshot, EngineError};
