// Copyright (c) 2026 Bellwether Contributors
// SPDX-License-Identifier: AGPL-3.0

//! `bellwether simulate`
//!
//! Runs one synthetic post through a fully wired engine. Signals come from
//! the command line instead of the analyzers. Segment weights are read from
//! the configured store (or `--weights`), while decisions are only ever
//! written to an in-memory store.

use anyhow::{Context, Result};
use bellwether_core::application::repository_factory::{create_weight_store, storage_backend};
use bellwether_core::application::DecisionEngine;
use bellwether_core::domain::config::EngineConfig;
use bellwether_core::domain::decision::Decision;
use bellwether_core::domain::post::{Author, Platform, Post};
use bellwether_core::domain::repository::{StorageBackend, WeightStore};
use bellwether_core::domain::signal::{
    AuthorSignal, CompetitorSignal, IntentSignal, PowerUserSignal, SafetySignal, SignalBundle, SignalKind,
    TemporalContext, TopicSignal, VelocitySignal,
};
use bellwether_core::infrastructure::db::Database;
use bellwether_core::domain::metrics::MetricsSink;
use bellwether_core::infrastructure::metrics::{FanOutMetricsSink, InMemoryMetricsSink, PrometheusMetricsSink};
use bellwether_core::infrastructure::repositories::{InMemoryTransactionStore, InMemoryWeightStore};
use bellwether_core::infrastructure::signals::{static_providers, UnavailableSignalSource};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use super::db::load_weight_file;

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Platform the post came from (twitter, reddit, threads)
    #[arg(long, default_value = "twitter")]
    pub platform: Platform,

    /// Post text
    #[arg(long, default_value = "")]
    pub content: String,

    /// Author handle
    #[arg(long, default_value = "someone")]
    pub handle: String,

    /// Post timestamp (RFC 3339); selects the time-of-day weight segment
    #[arg(long, value_name = "TIMESTAMP")]
    pub posted_at: Option<DateTime<Utc>>,

    /// Intent score (sss)
    #[arg(long, default_value_t = 0.5)]
    pub intent: f64,

    #[arg(long, default_value_t = 0.8)]
    pub intent_confidence: f64,

    /// Author relationship score (ars)
    #[arg(long, default_value_t = 0.5)]
    pub author: f64,

    #[arg(long, default_value_t = 0.8)]
    pub author_confidence: f64,

    /// Archetype the author is eligible for (repeatable)
    #[arg(long = "archetype", value_name = "NAME")]
    pub archetypes: Vec<String>,

    /// Engagement velocity ratio (evs)
    #[arg(long, default_value_t = 1.0)]
    pub velocity: f64,

    #[arg(long, default_value_t = 0.8)]
    pub velocity_confidence: f64,

    /// Topic relevance (trs)
    #[arg(long, default_value_t = 0.7)]
    pub topic: f64,

    #[arg(long, default_value_t = 0.8)]
    pub topic_confidence: f64,

    /// Safety analyzer asks to disengage
    #[arg(long)]
    pub disengage: bool,

    /// Safety flag to report (repeatable)
    #[arg(long = "safety-flag", value_name = "FLAG")]
    pub safety_flags: Vec<String>,

    /// Author is a power user
    #[arg(long)]
    pub power_user: bool,

    /// Competitor mentioned in the post
    #[arg(long, value_name = "NAME")]
    pub competitor: Option<String>,

    /// Campaign phase reported by the temporal rules
    #[arg(long, default_value = "steady_state")]
    pub phase: String,

    /// Preferred archetype for the current phase (repeatable, highest first)
    #[arg(long = "prefer", value_name = "NAME")]
    pub preferred_archetypes: Vec<String>,

    #[arg(long, default_value_t = 1.0)]
    pub monitoring_multiplier: f64,

    /// Make a signal provider fail (repeatable): intent, author, velocity,
    /// topic, safety, power_user, competitor, temporal
    #[arg(long = "unavailable", value_name = "SIGNAL", value_parser = parse_signal_kind)]
    pub unavailable: Vec<SignalKind>,

    /// Segment weight vectors to use instead of the configured weight store
    #[arg(long, value_name = "FILE")]
    pub weights: Option<PathBuf>,

    /// Print the decision and engine health as JSON
    #[arg(long)]
    pub json: bool,
}

fn parse_signal_kind(s: &str) -> Result<SignalKind, String> {
    SignalKind::ALL
        .into_iter()
        .find(|kind| kind.name() == s)
        .ok_or_else(|| format!("unknown signal '{}'", s))
}

impl SimulateArgs {
    fn bundle(&self) -> SignalBundle {
        let safety = if self.disengage {
            SafetySignal::disengage(self.safety_flags.clone())
        } else {
            SafetySignal {
                flags: self.safety_flags.clone(),
                ..SafetySignal::safe()
            }
        };
        let competitor = match &self.competitor {
            Some(name) => CompetitorSignal::detected(name.clone(), 0.9),
            None => CompetitorSignal::none(),
        };

        SignalBundle {
            intent: IntentSignal::new(self.intent, self.intent_confidence),
            author: AuthorSignal::new(self.author, self.author_confidence).with_archetypes(self.archetypes.clone()),
            velocity: VelocitySignal::new(self.velocity, self.velocity_confidence),
            topic: TopicSignal::new(self.topic, self.topic_confidence),
            safety,
            power_user: PowerUserSignal::new(self.power_user, if self.power_user { 0.9 } else { 0.5 }),
            competitor,
            temporal: TemporalContext {
                phase: self.phase.clone(),
                monitoring_multiplier: self.monitoring_multiplier,
                archetype_preferences: self.preferred_archetypes.clone(),
                matched_rules: Vec::new(),
            },
        }
    }
}

pub async fn run(args: SimulateArgs, config_override: Option<PathBuf>) -> Result<()> {
    let config = EngineConfig::load_or_default(config_override).context("Failed to load configuration")?;
    let sink = Arc::new(InMemoryMetricsSink::new());
    let (engine, decision) = simulate(&args, config, sink.clone()).await?;

    if args.json {
        let report = serde_json::json!({
            "decision": decision,
            "health": engine.health_snapshot(),
            "metrics": sink.counter_snapshot(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render(&decision));
    }

    Ok(())
}

/// The report sink always sees every value; the Prometheus facade is added
/// when the exporter is configured.
fn engine_metrics(config: &EngineConfig, report: Arc<InMemoryMetricsSink>) -> Arc<dyn MetricsSink> {
    match &config.observability.metrics_listen {
        Some(_) => Arc::new(
            FanOutMetricsSink::default()
                .with(report)
                .with(Arc::new(PrometheusMetricsSink::new())),
        ),
        None => report,
    }
}

async fn simulate(
    args: &SimulateArgs,
    config: EngineConfig,
    report: Arc<InMemoryMetricsSink>,
) -> Result<(DecisionEngine, Decision)> {
    let sink = engine_metrics(&config, report);

    let weight_store: Arc<dyn WeightStore> = match &args.weights {
        Some(path) => {
            let store = InMemoryWeightStore::new();
            for weights in load_weight_file(path)? {
                store.insert(weights);
            }
            Arc::new(store)
        }
        None => {
            let backend = storage_backend(&config);
            let database = match &backend {
                StorageBackend::PostgreSQL(pg) => {
                    Some(Database::new(&pg.connection_string, pg.max_connections).await?)
                }
                StorageBackend::InMemory => None,
            };
            create_weight_store(&backend, database.as_ref())
        }
    };

    let mut providers = static_providers(args.bundle());
    for kind in &args.unavailable {
        let reason = "disabled for simulation";
        match kind {
            SignalKind::Intent => providers.intent = Arc::new(UnavailableSignalSource::new(reason)),
            SignalKind::Author => providers.author = Arc::new(UnavailableSignalSource::new(reason)),
            SignalKind::Velocity => providers.velocity = Arc::new(UnavailableSignalSource::new(reason)),
            SignalKind::Topic => providers.topic = Arc::new(UnavailableSignalSource::new(reason)),
            SignalKind::Safety => providers.safety = Arc::new(UnavailableSignalSource::new(reason)),
            SignalKind::PowerUser => providers.power_user = Arc::new(UnavailableSignalSource::new(reason)),
            SignalKind::Competitor => providers.competitor = Arc::new(UnavailableSignalSource::new(reason)),
            SignalKind::Temporal => providers.temporal = Arc::new(UnavailableSignalSource::new(reason)),
        }
    }

    let engine = DecisionEngine::builder()
        .config(config)
        .weight_store(weight_store)
        .transaction_store(Arc::new(InMemoryTransactionStore::new()))
        .signals(providers)
        .metrics(sink)
        .build()?;
    engine.start_background_tasks();

    let author = Author::new(args.platform, args.handle.clone());
    let mut post = Post::new(args.platform, "simulated", author.id, args.content.clone());
    if let Some(at) = args.posted_at {
        post.posted_at = at;
    }

    let decision = engine.analyze_post(&post, &author).await?;
    Ok((engine, decision))
}

fn render(decision: &Decision) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = write_report(&mut out, decision);
    out
}

fn write_report(out: &mut String, d: &Decision) -> std::fmt::Result {
    let mode = match d.mode.is_engaged() {
        true => d.mode.as_str().green().bold(),
        false => d.mode.as_str().yellow().bold(),
    };
    writeln!(out, "{} {}", "Decision".bold(), d.id)?;
    writeln!(
        out,
        "  Mode: {} (confidence {:.2}, rule {:?})",
        mode, d.mode_confidence, d.decision_rule
    )?;
    let probabilities: Vec<String> = d
        .mode_probabilities
        .iter()
        .map(|(m, p)| format!("{}={:.2}", m.as_str().to_lowercase(), p))
        .collect();
    writeln!(out, "  Probabilities: {}", probabilities.join(" "))?;
    writeln!(
        out,
        "  Composite: {:.3} [{:.3}, {:.3}]",
        d.composite_score, d.credible_interval.lower, d.credible_interval.upper
    )?;
    writeln!(out, "  Segment: {} ({})", d.segment_used, d.segment_type)?;
    if let Some(archetype) = &d.archetype {
        writeln!(out, "  Archetype: {}", archetype)?;
    }
    if let Some(name) = &d.competitor_name {
        writeln!(out, "  Competitor: {}", name)?;
    }
    if d.is_power_user {
        writeln!(out, "  Power user: yes")?;
    }
    if !d.safety_flags.is_empty() {
        writeln!(out, "  Safety flags: {}", d.safety_flags.join(", "))?;
    }
    if !d.degraded_signals.is_empty() {
        let names: Vec<&str> = d.degraded_signals.iter().map(|k| k.name()).collect();
        writeln!(out, "  Degraded signals: {}", names.join(", ").red())?;
    }
    if d.needs_review {
        let reason = d.review_reason.map(|r| r.as_str()).unwrap_or("unspecified");
        writeln!(out, "  {} {}", "Needs review:".red().bold(), reason)?;
    }
    if d.follow_ups.is_empty() {
        writeln!(out, "  Follow-ups: {}", "(none)".dimmed())?;
    } else {
        writeln!(out, "  Follow-ups:")?;
        for f in &d.follow_ups {
            writeln!(out, "    - {} at {}", f.kind, f.scheduled_for.to_rfc3339())?;
        }
    }
    Ok(())
}
