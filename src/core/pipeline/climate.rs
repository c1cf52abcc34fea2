//! Climate and weather pipeline.

use async_trait::async_trait;

use super::{
    AutoConfirmDecision, AutoRejectDecision, CandidateIndex, FetchOptions, GateResult,
    ScoreResult, TopicPipeline,
};
use crate::core::domain::eligibility::DEFAULT_LOOKBACK_HOURS_LONG;
use crate::core::domain::fingerprint::{number_agreement, title_jaccard};
use crate::core::domain::{CanonicalTopic, Market, Venue};
use crate::core::rules::{GenericReason, Tier};
use crate::core::signal::climate::{extract_climate_signals, ClimateSignals};
use crate::core::store::{EligibleMarketQuery, Repository};
use crate::error::Result;

const WEIGHT_KIND: f64 = 0.35;
const WEIGHT_DATE: f64 = 0.30;
const WEIGHT_REGION: f64 = 0.20;
const WEIGHT_THRESHOLDS: f64 = 0.10;
const WEIGHT_TEXT: f64 = 0.05;

pub struct ClimatePipeline;

impl ClimatePipeline {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for ClimatePipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Date compatibility: day-pinned settles allow one day of skew; period
/// settles must agree exactly.
fn date_score(left: &ClimateSignals, right: &ClimateSignals) -> Option<f64> {
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

#[async_trait]
impl TopicPipeline for ClimatePipeline {
    fn topic(&self) -> CanonicalTopic {
        CanonicalTopic::Climate
    }

    fn algo_version(&self) -> &'static str {
        "v3.1.1-climate"
    }

    fn supports_auto_confirm(&self) -> bool {
        true
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
        repo.list_markets_by_derived_topic(CanonicalTopic::Climate, venue, &query)
            .await
    }

    fn build_index(&self, markets: &[Market]) -> CandidateIndex {
        let mut index = CandidateIndex::new();
        for (position, market) in markets.iter().enumerate() {
            let signals = extract_climate_signals(market);
            if let Some(key) = signals.index_key() {
                index.insert(key, position);
            }
            // Month fallback lets a day-pinned market find its month bucket
            if let Some(key) = signals.month_key() {
                index.insert(key, position);
            }
        }
        index
    }

    fn find_candidates(&self, market: &Market, index: &CandidateIndex) -> Vec<usize> {
        let signals = extract_climate_signals(market);
        let mut positions: Vec<usize> = Vec::new();
        if let Some(date) = signals.settle_date {
            for offset in [-1i64, 0, 1] {
                let day = date + chrono::Duration::days(offset);
                positions.extend_from_slice(
                    index.get(&format!("{}|{}", signals.kind.as_str(), day.format("%Y-%m-%d"))),
                );
            }
        }
        if let Some(key) = signals.index_key() {
            positions.extend_from_slice(index.get(&key));
        }
        if let Some(key) = signals.month_key() {
            positions.extend_from_slice(index.get(&key));
        }
        positions.sort_unstable();
        positions.dedup();
        positions
    }

    fn check_hard_gates(&self, left: &Market, right: &Market) -> GateResult {
        let l = extract_climate_signals(left);
        let r = extract_climate_signals(right);

        if l.kind != r.kind {
            return GateResult::Failed(format!("kind mismatch: {} vs {}", l.kind, r.kind));
        }
        if date_score(&l, &r).is_none() {
            return GateResult::Failed("incompatible settle dates".into());
        }
        if let (Some(lr), Some(rr)) = (l.region, r.region) {
            if lr != rr {
                return GateResult::Failed(format!("region mismatch: {lr} vs {rr}"));
            }
        }
        if !l.comparator.compatible_with(r.comparator) {
            return GateResult::Failed(format!(
                "contradictory comparators: {} vs {}",
                l.comparator, r.comparator
            ));
        }
        GateResult::Passed
    }

    fn score(&self, left: &Market, right: &Market) -> Option<ScoreResult> {
        let l = extract_climate_signals(left);
        let r = extract_climate_signals(right);
        if l.kind != r.kind {
            return None;
        }
        let date = date_score(&l, &r)?;

        let kind_score = 1.0;
        let region_score = match (l.region, r.region) {
            (Some(a), Some(b)) if a == b => 1.0,
            (None, None) => 0.5,
            (Some(_), Some(_)) => 0.0,
            _ => 0.5,
        };
        let threshold_score = number_agreement(&l.thresholds, &r.thresholds);
        let text_score = title_jaccard(&left.title, &right.title);

        let score = (WEIGHT_KIND * kind_score
            + WEIGHT_DATE * date
            + WEIGHT_REGION * region_score
            + WEIGHT_THRESHOLDS * threshold_score
            + WEIGHT_TEXT * text_score)
            .clamp(0.0, 1.0);

        let tier = if date >= 1.0 && threshold_score >= 0.6 {
            Tier::Strong
        } else {
            Tier::Weak
        };

        let mut reason = GenericReason::new("CLIMATE");
        reason
            .push("kind", l.kind.as_str())
            .push_score("date", date)
            .push("region", l.region.unwrap_or("-"))
            .push_score("thresh", threshold_score)
            .push_score("text", text_score);

        Some(ScoreResult {
            score,
            reason: reason.format(),
            tier,
        })
    }

    fn should_auto_confirm(
        &self,
        _left: &Market,
        _right: &Market,
        result: &ScoreResult,
    ) -> AutoConfirmDecision {
        let Some(reason) = GenericReason::parse(&result.reason) else {
            return AutoConfirmDecision::no();
        };
        let date_exact = reason.get_score("date") == Some(1.0);
        let thresholds_agree = reason.get_score("thresh").map_or(false, |t| t >= 0.9);
        if result.score >= 0.90 && date_exact && thresholds_agree {
            AutoConfirmDecision {
                should_confirm: true,
                rule: Some("climate_exact"),
                confidence: result.score,
            }
        } else {
            AutoConfirmDecision::no()
        }
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
            derived_topic: Some(CanonicalTopic::Climate),
            taxonomy_source: None,
            is_mve: false,
            event_ticker: None,
        }
    }

    #[test]
    fn same_temperature_question_scores_strong() {
        let p = ClimatePipeline::new();
        let left = market(
            1,
            Venue::Kalshi,
            "High temperature in NYC above 90 degrees on July 4, 2026?",
        );
        let right = market(
            2,
            Venue::Polymarket,
            "NYC high temperature above 90 on July 4, 2026",
        );

        assert!(p.check_hard_gates(&left, &right).passed());
        let result = p.score(&left, &right).unwrap();
        assert_eq!(result.tier, Tier::Strong);
        assert!(result.score >= 0.85, "score {}", result.score);
        assert!(result.reason.contains("kind=TEMPERATURE"));
    }

    #[test]
    fn kind_mismatch_fails_gate() {
        let p = ClimatePipeline::new();
        let left = market(1, Venue::Kalshi, "Snowfall above 12 inches on Jan 15, 2026");
        let right = market(2, Venue::Polymarket, "Rainfall above 2 inches on Jan 15, 2026");
        assert!(!p.check_hard_gates(&left, &right).passed());
    }

    #[test]
    fn region_mismatch_fails_gate() {
        let p = ClimatePipeline::new();
        let left = market(1, Venue::Kalshi, "Snow in Chicago on Jan 15, 2026?");
        let right = market(2, Venue::Polymarket, "Snow in Boston on Jan 15, 2026?");
        assert!(!p.check_hard_gates(&left, &right).passed());
    }

    #[test]
    fn contradictory_comparators_fail_gate() {
        let p = ClimatePipeline::new();
        let left = market(1, Venue::Kalshi, "NYC high above 90 on July 4, 2026");
        let right = market(2, Venue::Polymarket, "NYC high below 90 on July 4, 2026");
        assert!(!p.check_hard_gates(&left, &right).passed());
    }

    #[test]
    fn hurricane_month_bucket() {
        let p = ClimatePipeline::new();
        let left = market(
            1,
            Venue::Kalshi,
            "Hurricane makes landfall in Florida in September 2026?",
        );
        let right = market(
            2,
            Venue::Polymarket,
            "Will a hurricane hit Florida in September 2026?",
        );
        assert!(p.check_hard_gates(&left, &right).passed());
        let result = p.score(&left, &right).unwrap();
        assert!(result.score >= 0.55);
    }
}
