//! Crypto intraday up/down pipeline.

use async_trait::async_trait;

use super::{
    AutoConfirmDecision, AutoRejectDecision, CandidateIndex, FetchOptions, GateResult,
    ScoreResult, TopicPipeline,
};
use crate::core::domain::eligibility::DEFAULT_LOOKBACK_HOURS_CRYPTO;
use crate::core::domain::fingerprint::title_jaccard;
use crate::core::domain::{CanonicalTopic, Market, Venue};
use crate::core::rules::{CryptoIntradayReason, Tier};
use crate::core::signal::crypto::extract_crypto_signals;
use crate::core::store::{EligibleMarketQuery, Repository};
use crate::error::Result;

const WEIGHT_ENTITY: f64 = 0.60;
const WEIGHT_BUCKET: f64 = 0.30;
const WEIGHT_TEXT: f64 = 0.10;

pub struct CryptoIntradayPipeline;

impl CryptoIntradayPipeline {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for CryptoIntradayPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TopicPipeline for CryptoIntradayPipeline {
    fn topic(&self) -> CanonicalTopic {
        CanonicalTopic::CryptoIntraday
    }

    fn algo_version(&self) -> &'static str {
        "v3.1.0-crypto-intraday"
    }

    fn supports_auto_confirm(&self) -> bool {
        true
    }

    fn supports_auto_reject(&self) -> bool {
        true
    }

    fn min_score(&self) -> f64 {
        0.65
    }

    async fn fetch_markets(
        &self,
        repo: &dyn Repository,
        venue: Venue,
        opts: &FetchOptions,
    ) -> Result<Vec<Market>> {
        let query = EligibleMarketQuery {
            lookback_hours: Some(
                opts.lookback_hours.unwrap_or(DEFAULT_LOOKBACK_HOURS_CRYPTO),
            ),
            limit: opts.limit,
            exclude_sports: true,
            ..Default::default()
        };
        let mut markets = repo
            .list_markets_by_derived_topic(CanonicalTopic::CryptoIntraday, venue, &query)
            .await?;
        markets.retain(|m| extract_crypto_signals(m).market_type.is_intraday());
        Ok(markets)
    }

    fn build_index(&self, markets: &[Market]) -> CandidateIndex {
        let mut index = CandidateIndex::new();
        for (position, market) in markets.iter().enumerate() {
            if let Some(key) = extract_crypto_signals(market).intraday_key() {
                index.insert(key, position);
            }
        }
        index
    }

    fn find_candidates(&self, market: &Market, index: &CandidateIndex) -> Vec<usize> {
        extract_crypto_signals(market)
            .intraday_key()
            .map(|key| index.get(&key).to_vec())
            .unwrap_or_default()
    }

    fn check_hard_gates(&self, left: &Market, right: &Market) -> GateResult {
        let l = extract_crypto_signals(left);
        let r = extract_crypto_signals(right);

        let (Some(le), Some(re)) = (l.entity, r.entity) else {
            return GateResult::Failed("missing entity".into());
        };
        if le != re {
            return GateResult::Failed(format!("entity mismatch: {le} vs {re}"));
        }
        if !l.market_type.is_intraday() || !r.market_type.is_intraday() {
            return GateResult::Failed("daily market in intraday pipeline".into());
        }
        match (l.time_bucket, r.time_bucket) {
            (Some(lb), Some(rb)) if lb == rb => GateResult::Passed,
            (Some(lb), Some(rb)) => {
                GateResult::Failed(format!("bucket mismatch: {lb} vs {rb}"))
            }
            _ => GateResult::Failed("missing time bucket".into()),
        }
    }

    fn score(&self, left: &Market, right: &Market) -> Option<ScoreResult> {
        let l = extract_crypto_signals(left);
        let r = extract_crypto_signals(right);
        l.entity?;
        let bucket = l.time_bucket?;
        if r.time_bucket != Some(bucket) {
            return None;
        }

        let text_score = title_jaccard(&left.title, &right.title);
        let score =
            (WEIGHT_ENTITY + WEIGHT_BUCKET + WEIGHT_TEXT * text_score).clamp(0.0, 1.0);

        // Opposite directions still describe the same settle; the tier
        // records whether the sides agree.
        let tier = match (l.direction, r.direction) {
            (Some(a), Some(b)) if a == b => Tier::Strong,
            _ => Tier::Weak,
        };

        let reason = CryptoIntradayReason {
            entity: l.entity,
            bucket,
            dir_left: l.direction,
            dir_right: r.direction,
            text_score: (text_score * 100.0).round() / 100.0,
        };

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
        let Some(reason) = CryptoIntradayReason::parse(&result.reason) else {
            return AutoConfirmDecision::no();
        };
        let directions_agree = match (reason.dir_left, reason.dir_right) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        };
        if result.score >= 0.90
            && reason.entity.is_some()
            && directions_agree
            && reason.text_score >= 0.10
        {
            AutoConfirmDecision {
                should_confirm: true,
                rule: Some("intraday_bucket_exact"),
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
        if result.score < 0.35 {
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
    use chrono::{TimeZone, Utc};
    use serde_json::Value;

    fn market(id: i64, venue: Venue, title: &str, hour: u32) -> Market {
        Market {
            id,
            venue,
            external_id: format!("m{id}"),
            title: title.into(),
            status: MarketStatus::Active,
            close_time: Some(Utc.with_ymd_and_hms(2026, 1, 21, hour, 0, 0).unwrap()),
            category: None,
            metadata: Value::Null,
            derived_topic: Some(CanonicalTopic::CryptoIntraday),
            taxonomy_source: None,
            is_mve: false,
            event_ticker: None,
        }
    }

    #[test]
    fn same_bucket_scores_high() {
        let p = CryptoIntradayPipeline::new();
        let left = market(1, Venue::Kalshi, "Bitcoin up or down at 3pm EST?", 15);
        let right = market(2, Venue::Polymarket, "Bitcoin up at 3pm?", 15);

        assert!(p.check_hard_gates(&left, &right).passed());
        let result = p.score(&left, &right).unwrap();
        assert!(result.score >= 0.90);
        assert!(result.reason.contains("bucket=2026-01-21T15:00Z"));
    }

    #[test]
    fn different_bucket_fails_gate() {
        let p = CryptoIntradayPipeline::new();
        let left = market(1, Venue::Kalshi, "Bitcoin up or down at 3pm?", 15);
        let right = market(2, Venue::Polymarket, "Bitcoin up or down at 4pm?", 16);
        assert!(!p.check_hard_gates(&left, &right).passed());
    }

    #[test]
    fn daily_market_fails_gate() {
        let p = CryptoIntradayPipeline::new();
        let left = market(1, Venue::Kalshi, "Bitcoin up or down at 3pm?", 15);
        let right = market(2, Venue::Polymarket, "Bitcoin above $100k on Jan 21, 2026", 15);
        match p.check_hard_gates(&left, &right) {
            GateResult::Failed(reason) => assert!(reason.contains("daily market")),
            GateResult::Passed => panic!("gate should fail"),
        }
    }

    #[test]
    fn auto_confirm_requires_direction_agreement() {
        let p = CryptoIntradayPipeline::new();
        let left = market(1, Venue::Kalshi, "Bitcoin up at 3pm on Jan 21?", 15);
        let up = market(2, Venue::Polymarket, "Bitcoin up at 3pm Jan 21?", 15);
        let down = market(3, Venue::Polymarket, "Bitcoin down at 3pm Jan 21?", 15);

        let result = p.score(&left, &up).unwrap();
        if result.score >= 0.90 {
            assert!(p.should_auto_confirm(&left, &up, &result).should_confirm);
        }

        let result = p.score(&left, &down).unwrap();
        assert!(!p.should_auto_confirm(&left, &down, &result).should_confirm);
    }
}
