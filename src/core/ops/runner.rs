//! The multi-topic operational loop.
//!
//! One invocation runs preflight, optional taxonomy maintenance, per-topic
//! matching, watchlist sync, the quote freshness probe, and the KPI
//! summary. Every step is isolated: a failure is recorded on the report and
//! later steps still run. Only an empty preflight is fatal.

use std::time::Instant;

use async_trait::async_trait;
use tracing::{info, warn};

use super::kpi::{collect_kpis, KpiSummary};
use super::watchlist::{sync_watchlist, WatchlistCaps};
use crate::core::domain::eligibility::EligibilityParams;
use crate::core::domain::{CanonicalTopic, Venue};
use crate::core::matching::{run_matching, MatchRunConfig, RunMode};
use crate::core::pipeline::{DedupLimits, PipelineRegistry};
use crate::core::store::Repository;
use crate::error::{Error, Result};

/// External collaborator that refreshes event/series taxonomy data.
#[async_trait]
pub trait TaxonomyMaintainer: Send + Sync {
    /// Run an incremental sync; returns a one-line summary.
    async fn sync(&self, repo: &dyn Repository) -> Result<String>;
}

/// Configuration for one operational run.
#[derive(Debug, Clone)]
pub struct OpsConfig {
    pub topics: Vec<CanonicalTopic>,
    pub from_venue: Venue,
    pub to_venue: Venue,
    /// Write links and the watchlist; dry-run otherwise.
    pub apply: bool,
    pub auto_confirm: bool,
    pub auto_reject: bool,
    pub watchlist_caps: WatchlistCaps,
    pub dedup: DedupLimits,
}

impl OpsConfig {
    #[must_use]
    pub fn new(topics: Vec<CanonicalTopic>) -> Self {
        Self {
            topics,
            from_venue: Venue::Kalshi,
            to_venue: Venue::Polymarket,
            apply: false,
            auto_confirm: false,
            auto_reject: false,
            watchlist_caps: WatchlistCaps::default(),
            dedup: DedupLimits::default(),
        }
    }
}

/// One step's result.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub name: String,
    pub ok: bool,
    pub duration_ms: u128,
    pub summary: String,
    pub error: Option<String>,
}

/// The full report of one operational run.
#[derive(Debug, Clone, Default)]
pub struct OpsReport {
    pub steps: Vec<StepOutcome>,
    pub skipped_topics: Vec<(CanonicalTopic, String)>,
    pub kpis: Option<KpiSummary>,
}

impl OpsReport {
    /// Error strings across all failed steps.
    #[must_use]
    pub fn errors(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter_map(|s| s.error.as_deref())
            .collect()
    }

    /// Healthy iff no step failed.
    #[must_use]
    pub fn healthy(&self) -> bool {
        self.steps.iter().all(|s| s.ok)
    }

    fn record<T>(
        &mut self,
        name: &str,
        started: Instant,
        result: Result<T>,
        summarize: impl FnOnce(&T) -> String,
    ) -> Option<T> {
        let duration_ms = started.elapsed().as_millis();
        match result {
            Ok(value) => {
                self.steps.push(StepOutcome {
                    name: name.to_string(),
                    ok: true,
                    duration_ms,
                    summary: summarize(&value),
                    error: None,
                });
                Some(value)
            }
            Err(e) => {
                warn!(step = name, error = %e, "Step failed");
                self.steps.push(StepOutcome {
                    name: name.to_string(),
                    ok: false,
                    duration_ms,
                    summary: String::new(),
                    error: Some(e.to_string()),
                });
                None
            }
        }
    }
}

/// Preflight: a topic must have active markets on both sides of the
/// direction to be worth matching at all.
async fn preflight(
    repo: &dyn Repository,
    config: &OpsConfig,
) -> Result<(Vec<CanonicalTopic>, Vec<(CanonicalTopic, String)>)> {
    let mut surviving = Vec::new();
    let mut skipped = Vec::new();

    for &topic in &config.topics {
        let lookback = EligibilityParams::for_topic(topic).lookback_hours;
        let left = repo.count_markets_by_topic(config.from_venue, lookback).await?;
        let right = repo.count_markets_by_topic(config.to_venue, lookback).await?;
        let left_count = left.get(&topic).copied().unwrap_or(0);
        let right_count = right.get(&topic).copied().unwrap_or(0);

        if left_count == 0 || right_count == 0 {
            let reason = format!(
                "no overlap: {} has {left_count}, {} has {right_count}",
                config.from_venue, config.to_venue
            );
            warn!(topic = %topic, %reason, "Skipping topic");
            skipped.push((topic, reason));
        } else {
            surviving.push(topic);
        }
    }

    if surviving.is_empty() {
        return Err(Error::Preflight(
            "no requested topic has markets on both venues".into(),
        ));
    }
    Ok((surviving, skipped))
}

/// Run the operational loop once.
///
/// # Errors
/// Only fatal conditions error out: an empty preflight or a repository
/// that cannot be reached at all. Step-level failures are captured in the
/// report.
pub async fn run_ops(
    repo: &dyn Repository,
    registry: &PipelineRegistry,
    maintainer: Option<&dyn TaxonomyMaintainer>,
    config: &OpsConfig,
) -> Result<OpsReport> {
    let mut report = OpsReport::default();

    // 1. Preflight overlap check (fatal when nothing survives)
    let started = Instant::now();
    let (topics, skipped) = preflight(repo, config).await?;
    report.skipped_topics = skipped;
    report.steps.push(StepOutcome {
        name: "preflight".into(),
        ok: true,
        duration_ms: started.elapsed().as_millis(),
        summary: format!(
            "{} topic(s) to run, {} skipped",
            topics.len(),
            report.skipped_topics.len()
        ),
        error: None,
    });

    // 2. Optional taxonomy maintenance
    if let Some(maintainer) = maintainer {
        let started = Instant::now();
        let result = maintainer.sync(repo).await;
        report.record("taxonomy-maintenance", started, result, |s| s.clone());
    }

    // 3. Per-topic matching
    for topic in topics {
        let started = Instant::now();
        let run_config = MatchRunConfig {
            from_venue: config.from_venue,
            to_venue: config.to_venue,
            mode: if config.apply {
                RunMode::Suggest
            } else {
                RunMode::DryRun
            },
            auto_confirm: config.auto_confirm,
            auto_reject: config.auto_reject,
            dedup: config.dedup,
            ..MatchRunConfig::new(topic)
        };
        let result = run_matching(repo, registry, &run_config).await;
        report.record(
            &format!("match:{}", topic.as_str().to_lowercase()),
            started,
            result,
            |outcome| {
                format!(
                    "{} suggested, {} confirmed, {} rejected of {} evaluated",
                    outcome.suggested,
                    outcome.confirmed,
                    outcome.rejected,
                    outcome.candidates_evaluated
                )
            },
        );
    }

    // 4. Watchlist sync
    let started = Instant::now();
    let result = sync_watchlist(repo, &config.watchlist_caps, config.apply).await;
    report.record("watchlist-sync", started, result, |summary| {
        format!(
            "{} entries ({} confirmed, {} candidate-safe)",
            summary.total, summary.confirmed, summary.candidate_safe
        )
    });

    // 5 + 6. Freshness probe and KPI summary (the probe is part of the
    // KPI collection; a stale venue degrades health, not success)
    let started = Instant::now();
    let result = collect_kpis(repo).await;
    if let Some(kpis) = report.record("kpi-summary", started, result, |kpis| {
        format!(
            "{} suggested, {} confirmed ({} in 24h), watchlist {}",
            kpis.suggested_total,
            kpis.confirmed_total,
            kpis.confirmed_last_24h,
            kpis.watchlist_total
        )
    }) {
        for freshness in &kpis.freshness {
            if freshness.stale {
                warn!(venue = %freshness.venue, "No quotes in the freshness window");
            }
        }
        report.kpis = Some(kpis);
    }

    info!(
        steps = report.steps.len(),
        healthy = report.healthy(),
        "Operational run complete"
    );
    Ok(report)
}
