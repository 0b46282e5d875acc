// Copyright (c) 2026 Bellwether Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Domain layer: value objects, policies and persistence contracts.

pub mod post;
pub mod signal;
pub mod weights;
pub mod thresholds;
pub mod breaker;
pub mod scoring;
pub mod mode;
pub mod archetype;
pub mod decision;
pub mod follow_up;
pub mod repository;
pub mod metrics;
pub mod config;
