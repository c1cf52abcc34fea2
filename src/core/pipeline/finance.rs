//! Finance pipeline: equity indices and single names.
//!
//! Shares its scoring core with the commodities pipeline; only the topic
//! and the asset-class side of the gate differ.

use async_trait::async_trait;

use super::commodities::{index_by_instrument, instrument_gate, instrument_score, probe_by_instrument};
use super::{
    AutoRejectDecision, CandidateIndex, FetchOptions, GateResult, ScoreResult, TopicPipeline,
};
use crate::core::domain::eligibility::DEFAULT_LOOKBACK_HOURS_LONG;
use crate::core::domain::{CanonicalTopic, Market, Venue};
use crate::core::store::{EligibleMarketQuery, Repository};
use crate::error::Result;

pub struct FinancePipeline;

impl FinancePipeline {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for FinancePipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TopicPipeline for FinancePipeline {
    fn topic(&self) -> CanonicalTopic {
        CanonicalTopic::Finance
    }

    fn algo_version(&self) -> &'static str {
        "v3.0.1-finance"
    }

    fn supports_auto_reject(&self) -> bool {
        true
    }

    fn min_score(&self) -> f64 {
        0.55
    }

    async fn fetch_markets(
        &self,
        repo: &dyn Repository,
        venue: Venue,
        opts: &FetchOptions,
    ) -> Result<Vec<Market>> {
        let query = EligibleMarketQuery {
            lookback_hours: Some(opts.lookback_hours.unwrap_or(DEFAULT_LOOKBACK_HOURS_LONG)),
            limit: opts.limit,
            exclude_sports: true,
            ..Default::default()
        };
        repo.list_markets_by_derived_topic(CanonicalTopic::Finance, venue, &query)
            .await
    }

    fn build_index(&self, markets: &[Market]) -> CandidateIndex {
        index_by_instrument(markets)
    }

    fn find_candidates(&self, market: &Market, index: &CandidateIndex) -> Vec<usize> {
        probe_by_instrument(market, index)
    }

    fn check_hard_gates(&self, left: &Market, right: &Market) -> GateResult {
        instrument_gate(left, right, true)
    }

    fn score(&self, left: &Market, right: &Market) -> Option<ScoreResult> {
        instrument_score(left, right, "FINANCE")
    }

    fn should_auto_reject(
        &self,
        _left: &Market,
        _right: &Market,
        result: &ScoreResult,
    ) -> AutoRejectDecision {
        if result.score < 0.30 {
            return AutoRejectDecision {
                should_reject: true,
                rule: Some("hard_floor"),
                reason: Some(format!("score {:.2} below hard floor", result.score)),
            };
        }
        AutoRejectDecision::no()
    }
}
