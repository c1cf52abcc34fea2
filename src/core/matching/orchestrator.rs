//! The suggestion orchestrator.
//!
//! Drives one topic pipeline end-to-end for one venue direction: fetch both
//! sides, index the right side, gate and score every candidate pair, dedup,
//! decide each survivor's initial status, and upsert links in a stable
//! order.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::core::domain::{CanonicalTopic, LinkStatus, Venue};
use crate::core::pipeline::{
    sort_candidates, Candidate, DedupLimits, FetchOptions, PipelineRegistry,
};
use crate::core::store::{Repository, SuggestionUpsert, UpsertOutcome};
use crate::error::{Error, Result};

/// Dry-run scores and reports; suggest writes links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    DryRun,
    Suggest,
}

/// One orchestrator invocation.
#[derive(Debug, Clone)]
pub struct MatchRunConfig {
    pub from_venue: Venue,
    pub to_venue: Venue,
    pub topic: CanonicalTopic,
    pub lookback_hours: Option<i64>,
    pub limit: Option<usize>,
    /// Overrides the pipeline's own floor when set.
    pub min_score: Option<f64>,
    pub mode: RunMode,
    pub auto_confirm: bool,
    pub auto_reject: bool,
    pub dedup: DedupLimits,
}

impl MatchRunConfig {
    #[must_use]
    pub fn new(topic: CanonicalTopic) -> Self {
        Self {
            from_venue: Venue::Kalshi,
            to_venue: Venue::Polymarket,
            topic,
            lookback_hours: None,
            limit: None,
            min_score: None,
            mode: RunMode::DryRun,
            auto_confirm: false,
            auto_reject: false,
            dedup: DedupLimits::default(),
        }
    }
}

/// Score distribution over the written candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreHistogram {
    pub ge_90: u64,
    pub from_80: u64,
    pub from_70: u64,
    pub from_60: u64,
    pub below_60: u64,
}

impl ScoreHistogram {
    pub fn record(&mut self, score: f64) {
        if score >= 0.9 {
            self.ge_90 += 1;
        } else if score >= 0.8 {
            self.from_80 += 1;
        } else if score >= 0.7 {
            self.from_70 += 1;
        } else if score >= 0.6 {
            self.from_60 += 1;
        } else {
            self.below_60 += 1;
        }
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.ge_90 + self.from_80 + self.from_70 + self.from_60 + self.below_60
    }
}

/// What one orchestrator run did.
#[derive(Debug, Clone, Default)]
pub struct MatchRunOutcome {
    pub topic: Option<CanonicalTopic>,
    pub left_count: usize,
    pub right_count: usize,
    pub candidates_evaluated: u64,
    pub candidates_passed_gates: u64,
    pub candidates_scored: u64,
    pub survivors: usize,
    pub suggested: u64,
    pub confirmed: u64,
    pub rejected: u64,
    pub status_guarded: u64,
    pub histogram: ScoreHistogram,
    pub duration_ms: u128,
}

/// Run the matching pipeline for one topic and one venue direction.
///
/// # Errors
/// Fails fast when no pipeline is registered for the topic or the
/// repository is unreachable; per-pair problems never abort the run.
pub async fn run_matching(
    repo: &dyn Repository,
    registry: &PipelineRegistry,
    config: &MatchRunConfig,
) -> Result<MatchRunOutcome> {
    let started = Instant::now();

    if config.from_venue == config.to_venue {
        return Err(Error::Config(format!(
            "from and to venue are both {}",
            config.from_venue
        )));
    }

    let pipeline = registry
        .get(config.topic)
        .ok_or_else(|| Error::PipelineNotRegistered(config.topic.to_string()))?;

    let opts = FetchOptions {
        lookback_hours: config.lookback_hours,
        limit: config.limit,
    };

    let (left, right) = tokio::join!(
        pipeline.fetch_markets(repo, config.from_venue, &opts),
        pipeline.fetch_markets(repo, config.to_venue, &opts),
    );
    let (left, right) = (left?, right?);

    info!(
        topic = %config.topic,
        from = %config.from_venue,
        to = %config.to_venue,
        left = left.len(),
        right = right.len(),
        "Markets fetched"
    );

    let index = pipeline.build_index(&right);
    debug!(keys = index.len(), "Candidate index built");

    let min_score = config.min_score.unwrap_or_else(|| pipeline.min_score());

    let mut outcome = MatchRunOutcome {
        topic: Some(config.topic),
        left_count: left.len(),
        right_count: right.len(),
        ..Default::default()
    };

    let mut candidates: Vec<Candidate> = Vec::new();
    for left_market in &left {
        for position in pipeline.find_candidates(left_market, &index) {
            let Some(right_market) = right.get(position) else {
                continue;
            };
            if left_market.venue == right_market.venue
                && left_market.external_id == right_market.external_id
            {
                continue;
            }
            outcome.candidates_evaluated += 1;

            let gate = pipeline.check_hard_gates(left_market, right_market);
            if !gate.passed() {
                continue;
            }
            outcome.candidates_passed_gates += 1;

            let Some(result) = pipeline.score(left_market, right_market) else {
                continue;
            };
            outcome.candidates_scored += 1;
            if result.score < min_score {
                continue;
            }
            candidates.push(Candidate {
                left: left_market.clone(),
                right: right_market.clone(),
                result,
            });
        }
    }

    let mut survivors = pipeline.apply_dedup(candidates, &config.dedup);
    sort_candidates(&mut survivors);
    outcome.survivors = survivors.len();

    for candidate in &survivors {
        let mut status = LinkStatus::Suggested;
        let mut stamped_reason = candidate.result.reason.clone();

        if config.auto_confirm && pipeline.supports_auto_confirm() {
            let decision =
                pipeline.should_auto_confirm(&candidate.left, &candidate.right, &candidate.result);
            if decision.should_confirm {
                status = LinkStatus::Confirmed;
                if let Some(rule) = decision.rule {
                    debug!(rule, score = candidate.result.score, "Auto-confirm");
                }
            }
        }
        if status == LinkStatus::Suggested && config.auto_reject && pipeline.supports_auto_reject()
        {
            let decision =
                pipeline.should_auto_reject(&candidate.left, &candidate.right, &candidate.result);
            if decision.should_reject {
                status = LinkStatus::Rejected;
                if let Some(reason) = decision.reason {
                    stamped_reason = format!("{stamped_reason} | {reason}");
                }
            }
        }

        outcome.histogram.record(candidate.result.score);
        match status {
            LinkStatus::Suggested => outcome.suggested += 1,
            LinkStatus::Confirmed => outcome.confirmed += 1,
            LinkStatus::Rejected => outcome.rejected += 1,
        }

        if config.mode == RunMode::Suggest {
            let upsert = SuggestionUpsert {
                left_venue: candidate.left.venue,
                left_market_id: candidate.left.id,
                right_venue: candidate.right.venue,
                right_market_id: candidate.right.id,
                score: candidate.result.score,
                reason: stamped_reason,
                algo_version: pipeline.algo_version().to_string(),
                topic: config.topic,
                status,
            };
            match repo.upsert_suggestion_v3(&upsert).await? {
                UpsertOutcome::StatusGuarded => {
                    outcome.status_guarded += 1;
                    warn!(
                        left = candidate.left.id,
                        right = candidate.right.id,
                        "Confirmed link kept its status; score and reason refreshed"
                    );
                }
                UpsertOutcome::Inserted | UpsertOutcome::Updated => {}
            }
        }
    }

    outcome.duration_ms = started.elapsed().as_millis();
    info!(
        topic = %config.topic,
        evaluated = outcome.candidates_evaluated,
        passed_gates = outcome.candidates_passed_gates,
        survivors = outcome.survivors,
        suggested = outcome.suggested,
        confirmed = outcome.confirmed,
        rejected = outcome.rejected,
        duration_ms = outcome.duration_ms as u64,
        "Matching run complete"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pipeline::register_all_pipelines;
    use crate::core::store::{LinkFilter, MemoryStore};
    use crate::core::domain::{MarketStatus, RawMarket};
    use chrono::{Duration, Utc};
    use serde_json::json;

    async fn seed_crypto_pair(store: &MemoryStore) {
        let close = Utc::now() + Duration::hours(24);
        for (venue, external_id, title) in [
            (
                Venue::Kalshi,
                "KXBTCD-26JAN21-T100",
                "Bitcoin above $100,000 on Jan 21, 2026?",
            ),
            (
                Venue::Polymarket,
                "0xbtc100",
                "BTC above $100k Jan 21 2026",
            ),
        ] {
            let market = store
                .upsert_market(&RawMarket {
                    venue,
                    external_id: external_id.into(),
                    title: title.into(),
                    status: MarketStatus::Active,
                    close_time: Some(close),
                    category: None,
                    metadata: json!({}),
                })
                .await
                .unwrap();
            store
                .update_market_taxonomy(
                    market.id,
                    CanonicalTopic::CryptoDaily,
                    crate::core::domain::TaxonomySource::TitleKeywords,
                    false,
                    false,
                )
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn dry_run_scores_without_writing() {
        let store = MemoryStore::new();
        seed_crypto_pair(&store).await;
        let registry = register_all_pipelines();

        let config = MatchRunConfig::new(CanonicalTopic::CryptoDaily);
        let outcome = run_matching(&store, &registry, &config).await.unwrap();

        assert_eq!(outcome.left_count, 1);
        assert_eq!(outcome.right_count, 1);
        assert_eq!(outcome.survivors, 1);
        assert_eq!(outcome.suggested, 1);

        let links = store.list_links(&LinkFilter::default()).await.unwrap();
        assert!(links.is_empty(), "dry-run must not write");
    }

    #[tokio::test]
    async fn suggest_mode_writes_links_idempotently() {
        let store = MemoryStore::new();
        seed_crypto_pair(&store).await;
        let registry = register_all_pipelines();

        let config = MatchRunConfig {
            mode: RunMode::Suggest,
            ..MatchRunConfig::new(CanonicalTopic::CryptoDaily)
        };
        let first = run_matching(&store, &registry, &config).await.unwrap();
        assert_eq!(first.suggested, 1);

        let links = store.list_links(&LinkFilter::default()).await.unwrap();
        assert_eq!(links.len(), 1);
        let link = &links[0];
        assert!(link.left_venue != link.right_venue);
        assert!((0.0..=1.0).contains(&link.score));
        assert_eq!(link.topic, CanonicalTopic::CryptoDaily);
        assert_eq!(link.algo_version, "v3.6.2-crypto-daily");
        assert_eq!(link.status, LinkStatus::Suggested);

        // Second run on an unchanged store: same single link, same score
        let second = run_matching(&store, &registry, &config).await.unwrap();
        assert_eq!(second.survivors, 1);
        let links_again = store.list_links(&LinkFilter::default()).await.unwrap();
        assert_eq!(links_again.len(), 1);
        assert_eq!(links_again[0].score, link.score);
        assert_eq!(links_again[0].status, LinkStatus::Suggested);
    }

    #[tokio::test]
    async fn auto_confirm_writes_confirmed_links() {
        let store = MemoryStore::new();
        seed_crypto_pair(&store).await;
        let registry = register_all_pipelines();

        let config = MatchRunConfig {
            mode: RunMode::Suggest,
            auto_confirm: true,
            ..MatchRunConfig::new(CanonicalTopic::CryptoDaily)
        };
        let outcome = run_matching(&store, &registry, &config).await.unwrap();
        assert_eq!(outcome.confirmed, 1);

        let links = store.list_links(&LinkFilter::default()).await.unwrap();
        assert_eq!(links[0].status, LinkStatus::Confirmed);
    }

    #[tokio::test]
    async fn unregistered_topic_is_fatal() {
        let store = MemoryStore::new();
        let registry = register_all_pipelines();
        let config = MatchRunConfig::new(CanonicalTopic::Unknown);
        let err = run_matching(&store, &registry, &config).await.unwrap_err();
        assert!(matches!(err, Error::PipelineNotRegistered(_)));
    }

    #[tokio::test]
    async fn same_venue_direction_is_rejected() {
        let store = MemoryStore::new();
        let registry = register_all_pipelines();
        let config = MatchRunConfig {
            to_venue: Venue::Kalshi,
            ..MatchRunConfig::new(CanonicalTopic::CryptoDaily)
        };
        let err = run_matching(&store, &registry, &config).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
