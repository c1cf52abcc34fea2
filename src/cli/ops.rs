//! Operational loop commands.

use clap::{Parser, Subcommand};

use super::matching::parse_topic;
use super::output;
use crate::app::Config;
use crate::core::domain::CanonicalTopic;
use crate::core::exchange::kalshi::{KalshiClient, KalshiConfig, KalshiCredentials, KalshiMaintainer};
use crate::core::ops::{collect_kpis, run_ops, OpsConfig, TaxonomyMaintainer, WatchlistCaps};
use crate::core::pipeline::{global_registry, DedupLimits};
use crate::core::store::Repository;
use crate::error::{Error, Result};

#[derive(Subcommand, Debug)]
pub enum OpsCommand {
    /// Run the operational loop once
    Run(OpsRunArgs),

    /// Print the KPI summary
    Kpi,
}

#[derive(Parser, Debug)]
pub struct OpsRunArgs {
    /// Matching mode; only v3 exists
    #[arg(long, default_value = "v3")]
    pub mode: String,

    /// Comma-separated topics
    #[arg(long)]
    pub topics: String,

    /// Write links and the watchlist instead of dry-running
    #[arg(long)]
    pub apply: bool,

    /// Auto-confirm qualifying pairs
    #[arg(long)]
    pub auto_confirm: bool,

    /// Auto-reject disqualified pairs
    #[arg(long)]
    pub auto_reject: bool,

    /// Run incremental Kalshi event sync first
    #[arg(long)]
    pub with_taxonomy_maintenance: bool,
}

pub async fn dispatch(
    store: &dyn Repository,
    config: &Config,
    command: OpsCommand,
) -> Result<i32> {
    match command {
        OpsCommand::Run(args) => run(store, config, args).await,
        OpsCommand::Kpi => kpi(store).await,
    }
}

fn parse_topics(raw: &str) -> Result<Vec<CanonicalTopic>> {
    let topics: Vec<CanonicalTopic> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_topic)
        .collect::<Result<_>>()?;
    if topics.is_empty() {
        return Err(Error::Config("no topics given".into()));
    }
    Ok(topics)
}

async fn run(store: &dyn Repository, config: &Config, args: OpsRunArgs) -> Result<i32> {
    if args.mode != "v3" {
        return Err(Error::Config(format!("unknown mode '{}'", args.mode)));
    }
    let topics = parse_topics(&args.topics)?;

    let maintainer: Option<KalshiMaintainer> = if args.with_taxonomy_maintenance {
        let client = KalshiClient::new(KalshiConfig::from_env(), KalshiCredentials::from_env())?;
        Some(KalshiMaintainer::new(client))
    } else {
        None
    };

    let ops_config = OpsConfig {
        apply: args.apply,
        auto_confirm: args.auto_confirm,
        auto_reject: args.auto_reject,
        watchlist_caps: WatchlistCaps::default(),
        dedup: DedupLimits {
            max_per_left: config.matching.max_per_left,
            max_per_right: config.matching.max_per_right,
        },
        ..OpsConfig::new(topics)
    };

    let report = run_ops(
        store,
        global_registry(),
        maintainer.as_ref().map(|m| m as &dyn TaxonomyMaintainer),
        &ops_config,
    )
    .await?;

    output::section(if args.apply {
        "ops run"
    } else {
        "ops run (dry-run)"
    });
    for (topic, reason) in &report.skipped_topics {
        output::warning(&format!("skipped {topic}: {reason}"));
    }
    for step in &report.steps {
        output::step(&step.name, step.ok, step.duration_ms, &step.summary);
    }
    let errors = report.errors();
    for error in errors.iter().take(3) {
        output::error(error);
    }
    if let Some(kpis) = &report.kpis {
        for freshness in &kpis.freshness {
            if freshness.stale {
                output::warning(&format!("{}: no recent quotes", freshness.venue));
            }
        }
    }

    Ok(i32::from(!report.healthy()))
}

async fn kpi(store: &dyn Repository) -> Result<i32> {
    let kpis = collect_kpis(store).await?;
    output::section("kpis");
    output::field("suggested", kpis.suggested_total);
    output::field(
        "confirmed",
        format!("{} ({} in 24h)", kpis.confirmed_total, kpis.confirmed_last_24h),
    );
    output::field("watchlist", kpis.watchlist_total);
    for breakdown in &kpis.per_topic {
        output::field(
            breakdown.topic.as_str(),
            format!("{} suggested, {} confirmed", breakdown.suggested, breakdown.confirmed),
        );
    }
    for freshness in &kpis.freshness {
        if freshness.stale {
            output::warning(&format!("{}: no quotes in 5m", freshness.venue));
        } else {
            output::field(
                freshness.venue.as_str(),
                format!("{} quotes in 5m", freshness.recent_quotes),
            );
        }
    }
    for issue in &kpis.ingestion_issues {
        output::warning(issue);
    }
    if kpis.healthy {
        output::success("healthy");
    } else {
        output::warning("degraded");
    }
    Ok(0)
}
