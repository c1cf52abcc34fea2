//! Crypto daily-threshold pipeline.

use async_trait::async_trait;

use super::{
    dedup_brackets, AutoConfirmDecision, AutoRejectDecision, BracketLimits, Candidate,
    CandidateIndex, DedupLimits, FetchOptions, GateResult, ScoreResult, TopicPipeline,
};
use crate::core::domain::eligibility::DEFAULT_LOOKBACK_HOURS_CRYPTO;
use crate::core::domain::fingerprint::{number_agreement, ticker_pattern, title_jaccard};
use crate::core::domain::{CanonicalTopic, Market, Venue};
use crate::core::rules::safe_confirm::crypto_daily_rules;
use crate::core::rules::{CryptoDailyReason, Tier};
use crate::core::signal::crypto::{
    extract_crypto_signals, CryptoEntity, CryptoSignals, PriceContext,
};
use crate::core::store::{EligibleMarketQuery, Repository};
use crate::error::Result;

const WEIGHT_ENTITY: f64 = 0.45;
const WEIGHT_DATE: f64 = 0.35;
const WEIGHT_NUMBERS: f64 = 0.15;
const WEIGHT_TEXT: f64 = 0.05;

/// Small bump when both sides phrase the threshold the same way.
const COMPARATOR_BONUS: f64 = 0.03;

pub struct CryptoDailyPipeline;

impl CryptoDailyPipeline {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn settle_key(signals: &CryptoSignals) -> Option<String> {
        signals.index_key()
    }
}

impl Default for CryptoDailyPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Date compatibility and sub-score for two daily markets.
///
/// Day-pinned settles compare by day difference (0 -> 1.0, 1 -> 0.6, more
/// is a gate failure); period settles must agree exactly.
fn date_gate_and_score(left: &CryptoSignals, right: &CryptoSignals) -> std::result::Result<(f64, i64), String> {
    if left.date_type.is_day_pinned() && right.date_type.is_day_pinned() {
        let (Some(l), Some(r)) = (left.settle_date, right.settle_date) else {
            return Err("missing settle date".into());
        };
        let diff = (l - r).num_days();
        return match diff.abs() {
            0 => Ok((1.0, diff)),
            1 => Ok((0.6, diff)),
            n => Err(format!("day diff {n} exceeds tolerance")),
        };
    }

    match (&left.settle_period, &right.settle_period) {
        (Some(l), Some(r)) if l == r => Ok((1.0, 0)),
        (Some(l), Some(r)) => Err(format!("period mismatch: {l} vs {r}")),
        _ => Err(format!(
            "date type mismatch: {} vs {}",
            left.date_type, right.date_type
        )),
    }
}

#[async_trait]
impl TopicPipeline for CryptoDailyPipeline {
    fn topic(&self) -> CanonicalTopic {
        CanonicalTopic::CryptoDaily
    }

    fn algo_version(&self) -> &'static str {
        "v3.6.2-crypto-daily"
    }

    fn supports_auto_confirm(&self) -> bool {
        true
    }

    fn supports_auto_reject(&self) -> bool {
        true
    }

    fn min_score(&self) -> f64 {
        0.60
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
            .list_markets_by_derived_topic(CanonicalTopic::CryptoDaily, venue, &query)
            .await?;

        // Catch markets the classifier has not reached yet: full names by
        // keyword, short tickers by boundary pattern.
        let crypto_query = EligibleMarketQuery {
            title_keywords: CryptoEntity::ALL
                .iter()
                .map(|e| e.full_name().to_string())
                .collect(),
            ticker_patterns: CryptoEntity::ALL
                .iter()
                .map(|e| ticker_pattern(e.ticker()))
                .collect(),
            ..query
        };
        let extra = repo.list_eligible_markets(venue, &crypto_query).await?;
        for market in extra {
            if market.derived_topic.is_none() && !markets.iter().any(|m| m.id == market.id) {
                markets.push(market);
            }
        }
        // Intraday phrasing has its own pipeline
        markets.retain(|m| !extract_crypto_signals(m).market_type.is_intraday());
        Ok(markets)
    }

    fn build_index(&self, markets: &[Market]) -> CandidateIndex {
        let mut index = CandidateIndex::new();
        for (position, market) in markets.iter().enumerate() {
            if let Some(key) = Self::settle_key(&extract_crypto_signals(market)) {
                index.insert(key, position);
            }
        }
        index
    }

    fn find_candidates(&self, market: &Market, index: &CandidateIndex) -> Vec<usize> {
        let signals = extract_crypto_signals(market);
        let Some(entity) = signals.entity else {
            return Vec::new();
        };

        let mut positions = Vec::new();
        if let Some(date) = signals.settle_date {
            // The gate allows a one-day skew, so probe the adjacent days too
            for offset in [-1i64, 0, 1] {
                let day = date + chrono::Duration::days(offset);
                let key = format!("{}|{}", entity.as_str(), day.format("%Y-%m-%d"));
                positions.extend_from_slice(index.get(&key));
            }
        } else if let Some(key) = Self::settle_key(&signals) {
            positions.extend_from_slice(index.get(&key));
        }
        positions.sort_unstable();
        positions.dedup();
        positions
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
        if l.market_type.is_intraday() || r.market_type.is_intraday() {
            return GateResult::Failed("intraday market in daily pipeline".into());
        }
        if let Err(reason) = date_gate_and_score(&l, &r) {
            return GateResult::Failed(reason);
        }
        GateResult::Passed
    }

    fn score(&self, left: &Market, right: &Market) -> Option<ScoreResult> {
        let l = extract_crypto_signals(left);
        let r = extract_crypto_signals(right);
        l.entity?;
        let (date_score, day_diff) = date_gate_and_score(&l, &r).ok()?;

        let entity_score = 1.0;
        let num_score = number_agreement(&l.threshold_values(), &r.threshold_values());
        let text_score = title_jaccard(&left.title, &right.title);

        let mut score = WEIGHT_ENTITY * entity_score
            + WEIGHT_DATE * date_score
            + WEIGHT_NUMBERS * num_score
            + WEIGHT_TEXT * text_score;
        if l.comparator == r.comparator && l.comparator.compatible_with(r.comparator) {
            score += COMPARATOR_BONUS;
        }
        let score = score.clamp(0.0, 1.0);

        let tier = if day_diff == 0 && num_score >= 0.6 {
            Tier::Strong
        } else {
            Tier::Weak
        };

        let num_context = l
            .prices
            .iter()
            .map(|p| p.context)
            .find(|c| *c != PriceContext::Unknown)
            .unwrap_or(PriceContext::Unknown);

        let reason = CryptoDailyReason {
            entity: l.entity,
            date_type: l.date_type,
            date_score: quantize(date_score),
            day_diff,
            num_score: quantize(num_score),
            num_context,
            text_score: quantize(text_score),
        };

        Some(ScoreResult {
            score,
            reason: reason.format(),
            tier,
        })
    }

    fn apply_dedup(&self, candidates: Vec<Candidate>, limits: &DedupLimits) -> Vec<Candidate> {
        let bracketed = dedup_brackets(
            candidates,
            &BracketLimits {
                max_groups_per_left: limits.max_per_left,
                per_group: 1,
            },
        );
        super::default_dedup(bracketed, limits)
    }

    fn should_auto_confirm(
        &self,
        left: &Market,
        right: &Market,
        result: &ScoreResult,
    ) -> AutoConfirmDecision {
        let Some(reason) = CryptoDailyReason::parse(&result.reason) else {
            return AutoConfirmDecision::no();
        };
        match crypto_daily_rules(result.score, &reason, &left.title, &right.title) {
            Ok(()) => AutoConfirmDecision {
                should_confirm: true,
                rule: Some("crypto_daily_safe_confirm"),
                confidence: result.score,
            },
            Err(_) => AutoConfirmDecision::no(),
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

/// Two-decimal quantization so formatted reasons round-trip exactly.
fn quantize(score: f64) -> f64 {
    (score * 100.0).round() / 100.0
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
            derived_topic: Some(CanonicalTopic::CryptoDaily),
            taxonomy_source: None,
            is_mve: false,
            event_ticker: None,
        }
    }

    fn pipeline() -> CryptoDailyPipeline {
        CryptoDailyPipeline::new()
    }

    #[test]
    fn same_question_scores_strong() {
        let left = market(1, Venue::Kalshi, "Bitcoin above $100,000 on Jan 21, 2026");
        let right = market(2, Venue::Polymarket, "BTC above $100k Jan 21 2026");

        assert!(pipeline().check_hard_gates(&left, &right).passed());
        let result = pipeline().score(&left, &right).unwrap();
        assert!(result.score >= 0.88, "score {}", result.score);
        assert_eq!(result.tier, Tier::Strong);
        assert!(result.reason.contains("entity=BITCOIN"));
        assert!(result.reason.contains("dateType=DAY_EXACT"));
        assert!(result.reason.contains("date=1.00(0d)"));
        assert!(result.reason.contains("num=1.00"));
    }

    #[test]
    fn adjacent_day_different_threshold_is_weak_and_lower() {
        let left = market(1, Venue::Kalshi, "Bitcoin above $100,000 on Jan 21, 2026");
        let near = market(2, Venue::Polymarket, "Bitcoin above $101k on Jan 22, 2026");
        let exact = market(3, Venue::Polymarket, "Bitcoin above $100,000 on Jan 21, 2026");

        assert!(pipeline().check_hard_gates(&left, &near).passed());
        let near_result = pipeline().score(&left, &near).unwrap();
        let exact_result = pipeline().score(&left, &exact).unwrap();

        assert!(near_result.score < exact_result.score);
        assert_eq!(near_result.tier, Tier::Weak);
        // 100k vs 101k: ~1% gap, no overlap
        assert!(near_result.reason.contains("date=0.60(-1d)"));
    }

    #[test]
    fn day_diff_two_fails_gate() {
        let left = market(1, Venue::Kalshi, "Bitcoin above $100k on Jan 21, 2026");
        let right = market(2, Venue::Polymarket, "Bitcoin above $100k on Jan 23, 2026");
        let gate = pipeline().check_hard_gates(&left, &right);
        assert!(!gate.passed());
    }

    #[test]
    fn entity_mismatch_fails_gate() {
        let left = market(1, Venue::Kalshi, "Bitcoin above $100k on Jan 21, 2026");
        let right = market(2, Venue::Polymarket, "Ethereum above $100k on Jan 21, 2026");
        match pipeline().check_hard_gates(&left, &right) {
            GateResult::Failed(reason) => assert!(reason.contains("entity mismatch")),
            GateResult::Passed => panic!("gate should fail"),
        }
    }

    #[test]
    fn month_end_requires_equal_period() {
        let left = market(1, Venue::Kalshi, "Bitcoin above $100k by the end of March 2026");
        let same = market(2, Venue::Polymarket, "BTC above $100k in March 2026");
        let other = market(3, Venue::Polymarket, "BTC above $100k in April 2026");

        assert!(pipeline().check_hard_gates(&left, &same).passed());
        assert!(!pipeline().check_hard_gates(&left, &other).passed());
    }

    #[test]
    fn index_and_adjacent_day_probe() {
        let p = pipeline();
        let rights = vec![
            market(10, Venue::Polymarket, "Bitcoin above $100k on Jan 21, 2026"),
            market(11, Venue::Polymarket, "Bitcoin above $100k on Jan 22, 2026"),
            market(12, Venue::Polymarket, "Bitcoin above $100k on Feb 21, 2026"),
            market(13, Venue::Polymarket, "Ethereum above $5k on Jan 21, 2026"),
        ];
        let index = p.build_index(&rights);

        let left = market(1, Venue::Kalshi, "BTC above $100k on Jan 21, 2026");
        let candidates = p.find_candidates(&left, &index);
        assert_eq!(candidates, vec![0, 1]);
    }

    #[test]
    fn auto_confirm_fires_only_above_floor() {
        let p = pipeline();
        let left = market(1, Venue::Kalshi, "Bitcoin above $100,000 on Jan 21, 2026");
        let right = market(2, Venue::Polymarket, "Bitcoin above $100,000 on Jan 21, 2026");
        let result = p.score(&left, &right).unwrap();
        assert!(result.score >= 0.88);
        let decision = p.should_auto_confirm(&left, &right, &result);
        assert!(decision.should_confirm);

        let mut below = result.clone();
        below.score = 0.87;
        let decision = p.should_auto_confirm(&left, &right, &below);
        assert!(!decision.should_confirm);
    }

    #[test]
    fn auto_reject_hard_floor() {
        let p = pipeline();
        let left = market(1, Venue::Kalshi, "Bitcoin above $100k on Jan 21, 2026");
        let right = market(2, Venue::Polymarket, "Bitcoin above $100k on Jan 21, 2026");
        let mut result = p.score(&left, &right).unwrap();
        result.score = 0.2;
        let decision = p.should_auto_reject(&left, &right, &result);
        assert!(decision.should_reject);
        assert_eq!(decision.rule, Some("hard_floor"));
    }
}
