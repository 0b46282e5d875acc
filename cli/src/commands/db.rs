// Copyright (c) 2026 Bellwether Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Database commands
//!
//! Commands: migrate, seed-weights

use anyhow::{Context, Result};
use bellwether_core::domain::config::{EngineConfig, DATABASE_URL_ENV};
use bellwether_core::domain::weights::WeightVector;
use bellwether_core::infrastructure::db::Database;
use bellwether_core::infrastructure::repositories::postgres_weights::PostgresWeightStore;
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Subcommand)]
pub enum DbCommand {
    /// Apply pending schema migrations
    Migrate,

    /// Insert or replace segment weight vectors from a YAML file
    #[command(name = "seed-weights")]
    SeedWeights {
        /// YAML list of weight vectors
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,

        /// Validate the file without writing
        #[arg(long)]
        dry_run: bool,
    },
}

pub async fn handle_command(command: DbCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        DbCommand::Migrate => migrate(config_override).await,
        DbCommand::SeedWeights { file, dry_run } => seed_weights(config_override, &file, dry_run).await,
    }
}

async fn connect(config_override: Option<PathBuf>) -> Result<Database> {
    let config = EngineConfig::load_or_default(config_override).context("Failed to load configuration")?;
    let db = config.database.with_context(|| {
        format!(
            "No database configured (set `database.url` or {})",
            DATABASE_URL_ENV
        )
    })?;
    Database::new(&db.url, db.max_connections).await
}

async fn migrate(config_override: Option<PathBuf>) -> Result<()> {
    let database = connect(config_override).await?;
    database.migrate().await?;
    println!("{}", "✓ Migrations applied".green());
    Ok(())
}

async fn seed_weights(config_override: Option<PathBuf>, file: &Path, dry_run: bool) -> Result<()> {
    let vectors = load_weight_file(file)?;

    if dry_run {
        println!(
            "{}",
            format!("✓ {} weight vectors are valid (dry run, nothing written)", vectors.len()).green()
        );
        return Ok(());
    }

    let database = connect(config_override).await?;
    let store = PostgresWeightStore::new(database.get_pool().clone());
    for weights in &vectors {
        store
            .upsert(weights)
            .await
            .with_context(|| format!("Failed to store weights for segment '{}'", weights.segment_key))?;
        info!(segment = %weights.segment_key, sample_size = weights.sample_size, "Seeded segment weights");
    }

    println!("{}", format!("✓ Seeded {} weight vectors", vectors.len()).green());
    Ok(())
}

/// Reads a YAML list of weight vectors, rejecting any that are malformed.
///
/// Sample size is not checked here; the engine applies `min_sample_size`
/// when it reads the vectors back.
pub(crate) fn load_weight_file(path: &Path) -> Result<Vec<WeightVector>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    let vectors: Vec<WeightVector> =
        serde_yaml::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))?;

    for weights in &vectors {
        if weights.segment_key.trim().is_empty() {
            anyhow::bail!("weight vector with empty segment_key in {:?}", path);
        }
        weights
            .check_shape()
            .with_context(|| format!("Invalid weights for segment '{}'", weights.segment_key))?;
    }

    Ok(vectors)
}
