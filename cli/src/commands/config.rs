// Copyright (c) 2026 Bellwether Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use bellwether_core::domain::config::{EngineConfig, CONFIG_PATH_ENV};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the effective configuration as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./bellwether.yaml")]
        output: PathBuf,

        /// Write the annotated template instead of bare defaults
        #[arg(long)]
        examples: bool,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate {
            output,
            examples,
            force,
        } => generate(&output, examples, force),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let config = EngineConfig::load_or_default(config_override.clone()).context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. {}: {}",
            CONFIG_PATH_ENV,
            std::env::var(CONFIG_PATH_ENV)
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./bellwether.yaml");
        println!("  4. ~/.bellwether/config.yaml");
        println!("  5. /etc/bellwether/config.yaml");
        println!();
    }

    if as_yaml {
        print!("{}", config.to_yaml_string().context("Failed to render configuration")?);
        return Ok(());
    }

    println!("{}", "Current configuration:".bold());
    println!();

    let t = &config.thresholds;
    println!("{}", "Thresholds:".bold());
    println!("  Intent helpful / moderate: {} / {}", t.sss_helpful, t.sss_moderate);
    println!("  Velocity high / moderate: {} / {}", t.evs_high_viral, t.evs_moderate_viral);
    println!("  Strong author: {}", t.ars_strong);
    println!("  Topic gate: {}", t.trs_gate);
    println!(
        "  Confidence: {} (review below {:.2})",
        t.confidence_threshold,
        t.review_cutoff()
    );
    println!("  Min segment samples: {}", t.min_sample_size);
    println!();

    let w = &config.weights;
    let g = &w.global_default;
    println!("{}", "Weights:".bold());
    println!(
        "  Global default: sss={} ars={} evs={} trs={}",
        g.sss_weight, g.ars_weight, g.evs_weight, g.trs_weight
    );
    println!("  Cache TTL: {}s (sweep every {}s)", w.cache_ttl_secs, w.sweep_interval_secs);
    println!("  Shrinkage k: {}", w.shrinkage_k);
    println!();

    println!("{}", "Signals:".bold());
    println!("  Call timeout: {}ms", config.signals.timeout_ms);
    println!(
        "  Breaker: open after {} failures, probe after {}ms",
        config.breaker.failure_threshold, config.breaker.open_timeout_ms
    );
    println!();

    println!("{}", "Storage:".bold());
    match &config.database {
        Some(db) => println!("  PostgreSQL ({} connections)", db.max_connections),
        None => println!("  In-memory {}", "(no database configured)".dimmed()),
    }
    println!();

    let o = &config.observability;
    println!("{}", "Observability:".bold());
    println!("  Log level: {}", o.log_level);
    println!("  Log format: {:?}", o.log_format);
    println!(
        "  Metrics: {}",
        o.metrics_listen.as_deref().unwrap_or("(disabled)")
    );
    println!();

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = EngineConfig::load_or_default(config_path).context("Failed to load configuration")?;

    config.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

fn generate(output: &Path, with_examples: bool, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", output.display());
    }

    if with_examples {
        std::fs::write(output, include_str!("../../templates/bellwether-with-examples.yaml"))
            .with_context(|| format!("Failed to write config to {:?}", output))?;
    } else {
        EngineConfig::default()
            .to_yaml_file(output)
            .with_context(|| format!("Failed to write config to {:?}", output))?;
    }

    println!("{}", format!("✓ Configuration generated: {}", output.display()).green());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_defaults_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bellwether.yaml");

        generate(&path, false, false).unwrap();
        let loaded = EngineConfig::from_yaml_file(&path).unwrap();
        assert_eq!(loaded, EngineConfig::default());
    }

    #[test]
    fn test_annotated_template_is_valid() {
        let config =
            EngineConfig::from_yaml_str(include_str!("../../templates/bellwether-with-examples.yaml")).unwrap();
        config.validate().unwrap();
        assert!(config.database.is_some());
    }

    #[test]
    fn test_generate_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bellwether.yaml");
        std::fs::write(&path, "thresholds: {}\n").unwrap();

        assert!(generate(&path, false, false).is_err());
        generate(&path, false, true).unwrap();
    }
}
