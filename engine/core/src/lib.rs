// Copyright (c) 2026 Bellwether Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # `bellwether-core`: Engagement Decision Engine
//!
//! Decides, for every incoming social post, whether and how the agent should
//! respond.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | Signals, weights, breaker state machine, mode policy, scoring |
//! | [`application`] | Application | `WeightResolver`, `SignalGateway`, `DecisionPersister`, `DecisionEngine` |
//! | [`infrastructure`] | Infrastructure | In-memory and PostgreSQL stores, metrics sinks |

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
