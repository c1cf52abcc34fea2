//! Commodities pipeline, plus the shared scoring core the finance pipeline
//! reuses: both topics are "instrument vs level by date" questions.

use async_trait::async_trait;

use super::{
    AutoRejectDecision, CandidateIndex, FetchOptions, GateResult, ScoreResult, TopicPipeline,
};
use crate::core::domain::eligibility::DEFAULT_LOOKBACK_HOURS_LONG;
use crate::core::domain::fingerprint::{number_agreement, title_jaccard};
use crate::core::domain::{CanonicalTopic, Market, Venue};
use crate::core::rules::{GenericReason, Tier};
use crate::core::signal::commodities::{extract_commodity_signals, CommoditySignals};
use crate::core::store::{EligibleMarketQuery, Repository};
use crate::error::Result;

const WEIGHT_INSTRUMENT: f64 = 0.40;
const WEIGHT_DATE: f64 = 0.25;
const WEIGHT_NUMBERS: f64 = 0.20;
const WEIGHT_TEXT: f64 = 0.15;

/// Date compatibility shared with the finance pipeline.
fn date_score(left: &CommoditySignals, right: &CommoditySignals) -> Option<f64> {
    if let (Some(l), Some(r)) = (left.settle_date, right.settle_date) {
        return match (l - r).num_days().abs() {
            0 => Some(1.0),
            1 => Some(0.6),
            _ => None,
        };
    }
    match (&left.settle_period, &right.settle_period) {
        (Some(l), Some(r)) if l == r => Some(1.0),
        _ => None,
    }
}

/// Gates shared by the commodities and finance pipelines. `financial`
/// selects which asset classes belong to the calling topic.
pub(super) fn instrument_gate(
    left: &Market,
    right: &Market,
    financial: bool,
) -> GateResult {
    let l = extract_commodity_signals(left);
    let r = extract_commodity_signals(right);

    let (Some(li), Some(ri)) = (l.instrument, r.instrument) else {
        return GateResult::Failed("missing instrument".into());
    };
    if li != ri {
        return GateResult::Failed(format!("instrument mismatch: {li} vs {ri}"));
    }
    if l.asset_class.is_financial() != financial || r.asset_class.is_financial() != financial {
        return GateResult::Failed("asset class belongs to the other pipeline".into());
    }
    if date_score(&l, &r).is_none() {
        return GateResult::Failed("incompatible settle dates".into());
    }
    if !l.comparator.compatible_with(r.comparator) {
        return GateResult::Failed(format!(
            "contradictory comparators: {} vs {}",
            l.comparator, r.comparator
        ));
    }
    GateResult::Passed
}

/// Scoring shared by the commodities and finance pipelines.
pub(super) fn instrument_score(left: &Market, right: &Market, tag: &str) -> Option<ScoreResult> {
    let l = extract_commodity_signals(left);
    let r = extract_commodity_signals(right);
    if l.instrument.is_none() || l.instrument != r.instrument {
        return None;
    }
    let date = date_score(&l, &r)?;

    let instrument_score = 1.0;
    let num_score = number_agreement(&l.level_values(), &r.level_values());
    let text_score = title_jaccard(&left.title, &right.title);

    let score = (WEIGHT_INSTRUMENT * instrument_score
        + WEIGHT_DATE * date
        + WEIGHT_NUMBERS * num_score
        + WEIGHT_TEXT * text_score)
        .clamp(0.0, 1.0);

    let tier = if date >= 1.0 && num_score >= 0.6 {
        Tier::Strong
    } else {
        Tier::Weak
    };

    let mut reason = GenericReason::new(tag);
    reason
        .push("instrument", l.instrument.unwrap_or("-"))
        .push_score("date", date)
        .push_score("num", num_score)
        .push_score("text", text_score);

    Some(ScoreResult {
        score,
        reason: reason.format(),
        tier,
    })
}

pub(super) fn index_by_instrument(markets: &[Market]) -> CandidateIndex {
    let mut index = CandidateIndex::new();
    for (position, market) in markets.iter().enumerate() {
        if let Some(key) = extract_commodity_signals(market).index_key() {
            index.insert(key, position);
        }
    }
    index
}

pub(super) fn probe_by_instrument(market: &Market, index: &CandidateIndex) -> Vec<usize> {
    let signals = extract_commodity_signals(market);
    let Some(instrument) = signals.instrument else {
        return Vec::new();
    };
    let mut positions: Vec<usize> = Vec::new();
    if let Some(date) = signals.settle_date {
        for offset in [-1i64, 0, 1] {
            let day = date + chrono::Duration::days(offset);
            positions
                .extend_from_slice(index.get(&format!("{instrument}|{}", day.format("%Y-%m-%d"))));
        }
    } else if let Some(key) = signals.index_key() {
        positions.extend_from_slice(index.get(&key));
    }
    positions.sort_unstable();
    positions.dedup();
    positions
}

pub struct CommoditiesPipeline;

impl CommoditiesPipeline {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for CommoditiesPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TopicPipeline for CommoditiesPipeline {
    fn topic(&self) -> CanonicalTopic {
        CanonicalTopic::Commodities
    }

    fn algo_version(&self) -> &'static str {
        "v3.0.1-commodities"
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
        repo.list_markets_by_derived_topic(CanonicalTopic::Commodities, venue, &query)
            .await
    }

    fn build_index(&self, markets: &[Market]) -> CandidateIndex {
        index_by_instrument(markets)
    }

    fn find_candidates(&self, market: &Market, index: &CandidateIndex) -> Vec<usize> {
        probe_by_instrument(market, index)
    }

    fn check_hard_gates(&self, left: &Market, right: &Market) -> GateResult {
        instrument_gate(left, right, false)
    }

    fn score(&self, left: &Market, right: &Market) -> Option<ScoreResult> {
        instrument_score(left, right, "COMMODITIES")
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::MarketStatus;
    use serde_json::Value;

    fn market(id: i64, venue: Venue, title: &str) -> Market {
        Market {
            id,
            venue,
            external_id: format!("m{id}"),
            title: title.into(),
            status: MarketStatus::Active,
            close_time: None,
            category: None,
            metadata: Value::Null,
            derived_topic: Some(CanonicalTopic::Commodities),
            taxonomy_source: None,
            is_mve: false,
            event_ticker: None,
        }
    }

    #[test]
    fn same_oil_question_scores_strong() {
        let p = CommoditiesPipeline::new();
        let left = market(1, Venue::Kalshi, "WTI crude oil above $90 on March 31, 2026?");
        let right = market(2, Venue::Polymarket, "Oil price above $90 on March 31, 2026");

        assert!(p.check_hard_gates(&left, &right).passed());
        let result = p.score(&left, &right).unwrap();
        assert_eq!(result.tier, Tier::Strong);
        assert!(result.reason.contains("instrument=WTI"));
    }

    #[test]
    fn different_instruments_fail_gate() {
        let p = CommoditiesPipeline::new();
        let left = market(1, Venue::Kalshi, "Gold above $2,700 in June 2026");
        let right = market(2, Venue::Polymarket, "Silver above $40 in June 2026");
        assert!(!p.check_hard_gates(&left, &right).passed());
    }

    #[test]
    fn equity_index_rejected_by_commodities_gate() {
        let p = CommoditiesPipeline::new();
        let left = market(1, Venue::Kalshi, "S&P 500 above 6000 on March 31, 2026");
        let right = market(2, Venue::Polymarket, "S&P 500 above 6000 on March 31, 2026");
        match p.check_hard_gates(&left, &right) {
            GateResult::Failed(reason) => assert!(reason.contains("other pipeline")),
            GateResult::Passed => panic!("gate should fail"),
        }
    }
}
