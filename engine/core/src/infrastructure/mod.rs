// Copyright (c) 2026 Bellwether Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod db;
pub mod metrics;
pub mod repositories;
pub mod signals;
