// Copyright (c) 2026 Bellwether Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Bellwether CLI

pub mod config;
pub mod db;
pub mod simulate;

pub use self::config::ConfigCommand;
pub use self::db::DbCommand;
pub use self::simulate::SimulateArgs;
