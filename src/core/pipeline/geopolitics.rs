//! Geopolitics pipeline.

use async_trait::async_trait;

use super::{
    AutoRejectDecision, CandidateIndex, FetchOptions, GateResult, ScoreResult, TopicPipeline,
};
use crate::core::domain::eligibility::DEFAULT_LOOKBACK_HOURS_LONG;
use crate::core::domain::fingerprint::title_jaccard;
use crate::core::domain::{CanonicalTopic, Market, Venue};
use crate::core::rules::{GenericReason, Tier};
use crate::core::signal::geopolitics::{extract_geo_signals, GeoEventType, GeoSignals};
use crate::core::store::{EligibleMarketQuery, Repository};
use crate::error::Result;

const WEIGHT_REGION: f64 = 0.30;
const WEIGHT_COUNTRIES: f64 = 0.25;
const WEIGHT_EVENT: f64 = 0.20;
const WEIGHT_ACTORS: f64 = 0.15;
const WEIGHT_TEXT: f64 = 0.10;

pub struct GeopoliticsPipeline;

impl GeopoliticsPipeline {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for GeopoliticsPipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn overlap_score(left: &[&'static str], right: &[&'static str]) -> f64 {
    match (left.len(), right.len()) {
        (0, 0) => 0.5,
        (0, _) | (_, 0) => 0.3,
        (l, r) => {
            let overlap = left.iter().filter(|x| right.contains(x)).count();
            overlap as f64 / l.min(r) as f64
        }
    }
}

#[async_trait]
impl TopicPipeline for GeopoliticsPipeline {
    fn topic(&self) -> CanonicalTopic {
        CanonicalTopic::Geopolitics
    }

    fn algo_version(&self) -> &'static str {
        "v3.0.1-geopolitics"
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
        repo.list_markets_by_derived_topic(CanonicalTopic::Geopolitics, venue, &query)
            .await
    }

    fn build_index(&self, markets: &[Market]) -> CandidateIndex {
        let mut index = CandidateIndex::new();
        for (position, market) in markets.iter().enumerate() {
            let signals = extract_geo_signals(market);
            if let Some(key) = signals.index_key() {
                index.insert(key, position);
            }
            if let Some(key) = signals.event_year_key() {
                index.insert(key, position);
            }
        }
        index
    }

    fn find_candidates(&self, market: &Market, index: &CandidateIndex) -> Vec<usize> {
        let signals = extract_geo_signals(market);
        let mut positions: Vec<usize> = Vec::new();
        if let Some(key) = signals.index_key() {
            positions.extend_from_slice(index.get(&key));
        }
        if let Some(key) = signals.event_year_key() {
            positions.extend_from_slice(index.get(&key));
        }
        positions.sort_unstable();
        positions.dedup();
        positions
    }

    fn check_hard_gates(&self, left: &Market, right: &Market) -> GateResult {
        let l = extract_geo_signals(left);
        let r = extract_geo_signals(right);

        if l.event_type != GeoEventType::Unknown
            && r.event_type != GeoEventType::Unknown
            && l.event_type != r.event_type
        {
            return GateResult::Failed(format!(
                "event type mismatch: {} vs {}",
                l.event_type, r.event_type
            ));
        }
        if let (Some(ly), Some(ry)) = (l.year, r.year) {
            if ly != ry {
                return GateResult::Failed(format!("year mismatch: {ly} vs {ry}"));
            }
        }
        if !l.countries.is_empty()
            && !r.countries.is_empty()
            && !l.countries.iter().any(|c| r.countries.contains(c))
        {
            return GateResult::Failed("no country overlap".into());
        }
        GateResult::Passed
    }

    fn score(&self, left: &Market, right: &Market) -> Option<ScoreResult> {
        let l = extract_geo_signals(left);
        let r = extract_geo_signals(right);

        let region_score = overlap_score(&l.regions, &r.regions);
        let country_score = overlap_score(&l.countries, &r.countries);
        let event_score = if l.event_type == r.event_type && l.event_type != GeoEventType::Unknown
        {
            1.0
        } else if l.event_type == r.event_type {
            0.3
        } else {
            0.0
        };
        let actor_score = overlap_score(&l.actors, &r.actors);
        let text_score = title_jaccard(&left.title, &right.title);

        let score = (WEIGHT_REGION * region_score
            + WEIGHT_COUNTRIES * country_score
            + WEIGHT_EVENT * event_score
            + WEIGHT_ACTORS * actor_score
            + WEIGHT_TEXT * text_score)
            .clamp(0.0, 1.0);

        let tier = if event_score == 1.0 && country_score >= 1.0 {
            Tier::Strong
        } else {
            Tier::Weak
        };

        let mut reason = GenericReason::new("GEOPOLITICS");
        reason
            .push_score("region", region_score)
            .push_score("country", country_score)
            .push_score("event", event_score)
            .push_score("actors", actor_score)
            .push_score("text", text_score)
            .push("type", geo_tag(&l));

        Some(ScoreResult {
            score,
            reason: reason.format(),
            tier,
        })
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

fn geo_tag(signals: &GeoSignals) -> &'static str {
    signals.event_type.as_str()
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
            derived_topic: Some(CanonicalTopic::Geopolitics),
            taxonomy_source: None,
            is_mve: false,
            event_ticker: None,
        }
    }

    #[test]
    fn same_ceasefire_question_scores_high() {
        let p = GeopoliticsPipeline::new();
        let left = market(1, Venue::Kalshi, "Russia-Ukraine ceasefire before July 2026?");
        let right = market(2, Venue::Polymarket, "Ceasefire between Russia and Ukraine in 2026?");

        assert!(p.check_hard_gates(&left, &right).passed());
        let result = p.score(&left, &right).unwrap();
        assert!(result.score >= 0.55, "score {}", result.score);
        assert!(result.reason.starts_with("GEOPOLITICS:"));
        assert!(result.reason.contains("event=1.00"));
    }

    #[test]
    fn war_vs_sanctions_fails_gate() {
        let p = GeopoliticsPipeline::new();
        let left = market(1, Venue::Kalshi, "Russia invades another country in 2026?");
        let right = market(2, Venue::Polymarket, "New sanctions on Russia in 2026?");
        assert!(!p.check_hard_gates(&left, &right).passed());
    }

    #[test]
    fn disjoint_countries_fail_gate() {
        let p = GeopoliticsPipeline::new();
        let left = market(1, Venue::Kalshi, "China invades Taiwan in 2026?");
        let right = market(2, Venue::Polymarket, "Russia invades Ukraine again in 2026?");
        assert!(!p.check_hard_gates(&left, &right).passed());
    }
}
