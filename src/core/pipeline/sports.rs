//! Sports pipeline.
//!
//! Matches per-game markets across venues on the event key (league, team
//! pair, start bucket). Multi-variable parlay markets never enter: the
//! fetch filters them and the gate double-checks.

use async_trait::async_trait;

use super::{
    AutoConfirmDecision, AutoRejectDecision, CandidateIndex, FetchOptions, GateResult,
    ScoreResult, TopicPipeline,
};
use crate::core::domain::eligibility::DEFAULT_LOOKBACK_HOURS_CRYPTO;
use crate::core::domain::fingerprint::title_jaccard;
use crate::core::domain::{CanonicalTopic, Market, Venue};
use crate::core::rules::{GenericReason, Tier};
use crate::core::signal::sports::{extract_sports_signals, League, SportsSignals};
use crate::core::store::{EligibleMarketQuery, Repository};
use crate::error::Result;

const WEIGHT_EVENT: f64 = 0.60;
const WEIGHT_MARKET_TYPE: f64 = 0.20;
const WEIGHT_LINE: f64 = 0.10;
const WEIGHT_TEXT: f64 = 0.10;

pub struct SportsPipeline;

impl SportsPipeline {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for SportsPipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn signals(market: &Market) -> SportsSignals {
    extract_sports_signals(market, None)
}

fn line_score(left: &SportsSignals, right: &SportsSignals) -> f64 {
    match (left.line_value, right.line_value) {
        (None, None) => 1.0,
        (Some(a), Some(b)) => {
            if (a - b).abs() < 0.01 {
                1.0
            } else if (a - b).abs() <= 2.0 {
                0.5
            } else {
                0.0
            }
        }
        _ => 0.4,
    }
}

#[async_trait]
impl TopicPipeline for SportsPipeline {
    fn topic(&self) -> CanonicalTopic {
        CanonicalTopic::Sports
    }

    fn algo_version(&self) -> &'static str {
        "v3.3.0-sports"
    }

    fn supports_auto_confirm(&self) -> bool {
        true
    }

    fn supports_auto_reject(&self) -> bool {
        true
    }

    fn min_score(&self) -> f64 {
        0.70
    }

    async fn fetch_markets(
        &self,
        repo: &dyn Repository,
        venue: Venue,
        opts: &FetchOptions,
    ) -> Result<Vec<Market>> {
        // Games resolve within days; the crypto-scale window fits.
        let query = EligibleMarketQuery {
            lookback_hours: Some(
                opts.lookback_hours.unwrap_or(DEFAULT_LOOKBACK_HOURS_CRYPTO),
            ),
            limit: opts.limit,
            include_mve: false,
            ..Default::default()
        };
        let mut markets = repo
            .list_markets_by_derived_topic(CanonicalTopic::Sports, venue, &query)
            .await?;

        // Enrich exchange markets with their event's teams and start time
        for market in &mut markets {
            let Some(ticker) = market.event_ticker().map(String::from) else {
                continue;
            };
            if let Some(event) = repo.get_event(&ticker).await? {
                if let serde_json::Value::Null = market.metadata {
                    market.metadata = serde_json::json!({});
                }
                if let Some(bag) = market.metadata.as_object_mut() {
                    bag.insert("event_title".into(), event.title.clone().into());
                    if let Some(strike) = event.strike_date {
                        bag.insert("event_strike_date".into(), strike.to_rfc3339().into());
                    }
                }
            }
        }

        markets.retain(|m| !m.is_mve);
        Ok(markets)
    }

    fn build_index(&self, markets: &[Market]) -> CandidateIndex {
        let mut index = CandidateIndex::new();
        for (position, market) in markets.iter().enumerate() {
            if let Some(key) = signals(market).event_key() {
                index.insert(key, position);
            }
        }
        index
    }

    fn find_candidates(&self, market: &Market, index: &CandidateIndex) -> Vec<usize> {
        signals(market)
            .event_key()
            .map(|key| index.get(&key).to_vec())
            .unwrap_or_default()
    }

    fn check_hard_gates(&self, left: &Market, right: &Market) -> GateResult {
        if left.is_mve || right.is_mve {
            return GateResult::Failed("multi-variable market".into());
        }
        let l = signals(left);
        let r = signals(right);

        if l.league != r.league {
            return GateResult::Failed(format!(
                "league mismatch: {} vs {}",
                l.league, r.league
            ));
        }
        match (&l.team_a, &l.team_b, &r.team_a, &r.team_b) {
            (Some(la), Some(lb), Some(ra), Some(rb)) => {
                if la != ra || lb != rb {
                    return GateResult::Failed(format!(
                        "team pair mismatch: {la}/{lb} vs {ra}/{rb}"
                    ));
                }
            }
            _ => return GateResult::Failed("missing team pair".into()),
        }
        match (l.start_bucket, r.start_bucket) {
            (Some(a), Some(b)) if a == b => {}
            (Some(a), Some(b)) => {
                return GateResult::Failed(format!("start bucket mismatch: {a} vs {b}"));
            }
            _ => return GateResult::Failed("missing start bucket".into()),
        }
        if !l.market_type.compatible_with(r.market_type) {
            return GateResult::Failed(format!(
                "market type mismatch: {} vs {}",
                l.market_type.as_str(),
                r.market_type.as_str()
            ));
        }
        GateResult::Passed
    }

    fn score(&self, left: &Market, right: &Market) -> Option<ScoreResult> {
        let l = signals(left);
        let r = signals(right);
        let (lk, rk) = (l.event_key()?, r.event_key()?);

        let event_score = if lk == rk {
            if l.league == League::Unknown {
                0.8
            } else {
                1.0
            }
        } else {
            0.0
        };
        let type_score = if l.market_type == r.market_type {
            1.0
        } else if l.market_type.compatible_with(r.market_type) {
            0.7
        } else {
            0.0
        };
        let line = line_score(&l, &r);
        let text_score = title_jaccard(&left.title, &right.title);

        let score = (WEIGHT_EVENT * event_score
            + WEIGHT_MARKET_TYPE * type_score
            + WEIGHT_LINE * line
            + WEIGHT_TEXT * text_score)
            .clamp(0.0, 1.0);

        let tier = if event_score >= 1.0 && type_score == 1.0 {
            Tier::Strong
        } else {
            Tier::Weak
        };

        let mut reason = GenericReason::new("SPORTS");
        reason
            .push("event", &lk)
            .push_score("event_score", event_score)
            .push("type", l.market_type.as_str())
            .push_score("type_score", type_score)
            .push_score("line", line)
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
        let event_exact = reason.get_score("event_score") == Some(1.0);
        let type_exact = reason.get_score("type_score") == Some(1.0);
        if result.score >= 0.92 && event_exact && type_exact {
            AutoConfirmDecision {
                should_confirm: true,
                rule: Some("sports_event_exact"),
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
