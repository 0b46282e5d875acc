// Copyright (c) 2026 Bellwether Contributors
// SPDX-License-Identifier: AGPL-3.0

//! # Bellwether CLI
//!
//! The `bellwether` binary operates the decision engine.
//!
//! ## Commands
//!
//! - `bellwether config show|validate|generate` - Configuration management
//! - `bellwether db migrate|seed-weights` - PostgreSQL schema and segment weights
//! - `bellwether simulate` - Run one post through the engine with fixed signals

use anyhow::{Context, Result};
use bellwether_core::domain::config::{EngineConfig, LogFormat};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{info, warn};

mod commands;

use commands::{ConfigCommand, DbCommand, SimulateArgs};

/// Bellwether - decide how to engage with social posts
#[derive(Parser)]
#[command(name = "bellwether")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "BELLWETHER_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to the config file's level
    #[arg(long, global = true, env = "BELLWETHER_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Database schema and weight management
    #[command(name = "db")]
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },

    /// Decide a single synthetic post and print the result
    #[command(name = "simulate")]
    Simulate(SimulateArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is not an error
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Logging is configured from the file, so the file is read before the
    // subscriber exists. Load problems are reported once logging is up.
    let loaded = EngineConfig::load_or_default(cli.config.clone());
    let observability = loaded
        .as_ref()
        .map(|c| c.observability.clone())
        .unwrap_or_default();

    let level = cli.log_level.as_deref().unwrap_or(&observability.log_level);
    init_logging(level, observability.log_format)?;

    if let Err(e) = &loaded {
        warn!(error = %e, "Configuration could not be loaded");
    }

    if let Some(listen) = &observability.metrics_listen {
        init_metrics(listen)?;
    }

    match cli.command {
        Commands::Config { command } => commands::config::handle_command(command, cli.config).await,
        Commands::Db { command } => commands::db::handle_command(command, cli.config).await,
        Commands::Simulate(args) => commands::simulate::run(args, cli.config).await,
    }
}

fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }

    Ok(())
}

fn init_metrics(listen: &str) -> Result<()> {
    let addr: SocketAddr = listen
        .parse()
        .with_context(|| format!("Invalid metrics listen address '{}'", listen))?;

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!(%addr, "Prometheus metrics exporter listening");
    Ok(())
}
