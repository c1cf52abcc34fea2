//! Central-bank rate decision pipeline.

use async_trait::async_trait;

use super::{
    AutoRejectDecision, CandidateIndex, FetchOptions, GateResult, ScoreResult, TopicPipeline,
};
use crate::core::domain::eligibility::DEFAULT_LOOKBACK_HOURS_LONG;
use crate::core::domain::fingerprint::title_jaccard;
use crate::core::domain::{CanonicalTopic, Market, Venue};
use crate::core::rules::{GenericReason, Tier};
use crate::core::signal::rates::{extract_rates_signals, CentralBank, RatesSignals};
use crate::core::store::{EligibleMarketQuery, Repository};
use crate::error::Result;

const WEIGHT_BANK: f64 = 0.35;
const WEIGHT_ACTION: f64 = 0.25;
const WEIGHT_MEETING: f64 = 0.20;
const WEIGHT_SIZE: f64 = 0.10;
const WEIGHT_TEXT: f64 = 0.10;

pub struct RatesPipeline;

impl RatesPipeline {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for RatesPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Meeting alignment: exact day 1.0, day inside the other side's month 0.8,
/// same month 1.0, bare same year 0.4. None means the meetings contradict.
fn meeting_score(left: &RatesSignals, right: &RatesSignals) -> Option<f64> {
    if let (Some(l), Some(r)) = (left.meeting_date, right.meeting_date) {
        return (l == r).then_some(1.0);
    }
    if let (Some(date), Some(month)) = (left.meeting_date, right.meeting_month.as_deref()) {
        return (date.format("%Y-%m").to_string() == month).then_some(0.8);
    }
    if let (Some(month), Some(date)) = (left.meeting_month.as_deref(), right.meeting_date) {
        return (date.format("%Y-%m").to_string() == month).then_some(0.8);
    }
    if let (Some(l), Some(r)) = (left.meeting_month.as_deref(), right.meeting_month.as_deref()) {
        return (l == r).then_some(1.0);
    }
    if let (Some(l), Some(r)) = (left.year, right.year) {
        return (l == r).then_some(0.4);
    }
    None
}

fn size_score(left: &RatesSignals, right: &RatesSignals) -> f64 {
    match (left.bps, right.bps) {
        (Some(a), Some(b)) if a == b => 1.0,
        (Some(_), Some(_)) => 0.0,
        (None, None) => match (left.target_band, right.target_band) {
            (Some(a), Some(b)) => {
                if (a.0 - b.0).abs() < 1e-9 && (a.1 - b.1).abs() < 1e-9 {
                    1.0
                } else {
                    0.0
                }
            }
            _ => 0.5,
        },
        _ => 0.5,
    }
}

/// Every key a market should be findable under: the bundle's primary key
/// plus the meeting-month and bank-year fallbacks, so day-pinned and
/// month-pinned phrasings of the same meeting still meet in the index.
fn index_keys(signals: &RatesSignals) -> Vec<String> {
    let Some(primary) = signals.index_key() else {
        return Vec::new();
    };
    let bank = signals.bank.as_str();
    let mut keys = vec![primary];
    if let Some(date) = signals.meeting_date {
        keys.push(format!("{bank}|{}", date.format("%Y-%m")));
    }
    if let Some(year) = signals.year {
        keys.push(format!("{bank}|{year}"));
    }
    keys.dedup();
    keys
}

#[async_trait]
impl TopicPipeline for RatesPipeline {
    fn topic(&self) -> CanonicalTopic {
        CanonicalTopic::Rates
    }

    fn algo_version(&self) -> &'static str {
        "v3.0.3-rates"
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
        repo.list_markets_by_derived_topic(CanonicalTopic::Rates, venue, &query)
            .await
    }

    fn build_index(&self, markets: &[Market]) -> CandidateIndex {
        let mut index = CandidateIndex::new();
        for (position, market) in markets.iter().enumerate() {
            for key in index_keys(&extract_rates_signals(market)) {
                index.insert(key, position);
            }
        }
        index
    }

    fn find_candidates(&self, market: &Market, index: &CandidateIndex) -> Vec<usize> {
        let mut positions: Vec<usize> = Vec::new();
        for key in index_keys(&extract_rates_signals(market)) {
            positions.extend_from_slice(index.get(&key));
        }
        positions.sort_unstable();
        positions.dedup();
        positions
    }

    fn check_hard_gates(&self, left: &Market, right: &Market) -> GateResult {
        let l = extract_rates_signals(left);
        let r = extract_rates_signals(right);

        if l.bank == CentralBank::Unknown || r.bank == CentralBank::Unknown {
            return GateResult::Failed("missing central bank".into());
        }
        if l.bank != r.bank {
            return GateResult::Failed(format!("bank mismatch: {} vs {}", l.bank, r.bank));
        }
        if let (Some(la), Some(ra)) = (l.action, r.action) {
            if la != ra {
                return GateResult::Failed(format!(
                    "action mismatch: {} vs {}",
                    la.as_str(),
                    ra.as_str()
                ));
            }
        }
        if let (Some(lc), Some(rc)) = (l.action_count, r.action_count) {
            if lc != rc {
                return GateResult::Failed(format!("action count mismatch: {lc} vs {rc}"));
            }
        }
        if meeting_score(&l, &r).is_none() {
            return GateResult::Failed("incompatible meetings".into());
        }
        GateResult::Passed
    }

    fn score(&self, left: &Market, right: &Market) -> Option<ScoreResult> {
        let l = extract_rates_signals(left);
        let r = extract_rates_signals(right);
        if l.bank == CentralBank::Unknown || l.bank != r.bank {
            return None;
        }
        let meeting = meeting_score(&l, &r)?;

        let bank_score = 1.0;
        let action_score = match (l.action, r.action) {
            (Some(a), Some(b)) if a == b => 1.0,
            (Some(_), Some(_)) => 0.0,
            (None, None) => 0.4,
            _ => 0.5,
        };
        let size = size_score(&l, &r);
        let text_score = title_jaccard(&left.title, &right.title);

        let score = (WEIGHT_BANK * bank_score
            + WEIGHT_ACTION * action_score
            + WEIGHT_MEETING * meeting
            + WEIGHT_SIZE * size
            + WEIGHT_TEXT * text_score)
            .clamp(0.0, 1.0);

        let tier = if meeting >= 1.0 && action_score == 1.0 {
            Tier::Strong
        } else {
            Tier::Weak
        };

        let mut reason = GenericReason::new("RATES");
        reason
            .push("bank", l.bank.as_str())
            .push_score("action", action_score)
            .push_score("meet", meeting)
            .push_score("size", size)
            .push_score("text", text_score);

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
            derived_topic: Some(CanonicalTopic::Rates),
            taxonomy_source: None,
            is_mve: false,
            event_ticker: None,
        }
    }

    #[test]
    fn same_cut_same_meeting_scores_strong() {
        let p = RatesPipeline::new();
        let left = market(1, Venue::Kalshi, "Will the Fed cut rates by 25 bps in March 2026?");
        let right = market(
            2,
            Venue::Polymarket,
            "Fed to cut rates 25 bps at the March 2026 FOMC meeting?",
        );

        assert!(p.check_hard_gates(&left, &right).passed());
        let result = p.score(&left, &right).unwrap();
        assert_eq!(result.tier, Tier::Strong);
        assert!(result.score >= 0.90, "score {}", result.score);
        assert!(result.reason.starts_with("RATES:"));
        assert!(result.reason.contains("bank=FED"));
        assert!(result.reason.contains("meet=1.00"));
    }

    #[test]
    fn different_banks_fail_gate() {
        let p = RatesPipeline::new();
        let left = market(1, Venue::Kalshi, "Fed rate cut in March 2026?");
        let right = market(2, Venue::Polymarket, "ECB rate cut in March 2026?");
        match p.check_hard_gates(&left, &right) {
            GateResult::Failed(reason) => assert!(reason.contains("bank mismatch")),
            GateResult::Passed => panic!("gate should fail"),
        }
    }

    #[test]
    fn hike_vs_cut_fails_gate() {
        let p = RatesPipeline::new();
        let left = market(1, Venue::Kalshi, "Fed rate hike in March 2026?");
        let right = market(2, Venue::Polymarket, "Fed rate cut in March 2026?");
        match p.check_hard_gates(&left, &right) {
            GateResult::Failed(reason) => assert!(reason.contains("action mismatch")),
            GateResult::Passed => panic!("gate should fail"),
        }
    }

    #[test]
    fn meeting_day_inside_month_is_compatible() {
        let p = RatesPipeline::new();
        let left = market(1, Venue::Kalshi, "Fed rate cut on March 18, 2026?");
        let right = market(2, Venue::Polymarket, "Fed rate cut in March 2026?");

        assert!(p.check_hard_gates(&left, &right).passed());
        let result = p.score(&left, &right).unwrap();
        // Day-vs-month alignment scores below an exact meeting match
        assert_eq!(result.tier, Tier::Weak);
        assert!(result.score >= 0.55, "score {}", result.score);
        assert!(result.reason.contains("meet=0.80"));
    }

    #[test]
    fn different_years_fail_gate() {
        let p = RatesPipeline::new();
        let left = market(1, Venue::Kalshi, "Fed rate cut in 2026?");
        let right = market(2, Venue::Polymarket, "Fed rate cut in 2025?");
        match p.check_hard_gates(&left, &right) {
            GateResult::Failed(reason) => assert!(reason.contains("incompatible meetings")),
            GateResult::Passed => panic!("gate should fail"),
        }
    }

    #[test]
    fn bps_mismatch_drags_score() {
        let p = RatesPipeline::new();
        let left = market(1, Venue::Kalshi, "Fed rate cut of 25 bps in March 2026?");
        let same = market(2, Venue::Polymarket, "Fed rate cut of 25 bps in March 2026?");
        let other = market(3, Venue::Polymarket, "Fed rate cut of 50 bps in March 2026?");

        let exact = p.score(&left, &same).unwrap();
        let skewed = p.score(&left, &other).unwrap();
        assert!(skewed.score < exact.score);
        assert!(skewed.reason.contains("size=0.00"));
    }

    #[test]
    fn index_joins_day_and_month_markets() {
        let p = RatesPipeline::new();
        let rights = vec![
            market(10, Venue::Polymarket, "Fed rate cut in March 2026?"),
            market(11, Venue::Polymarket, "ECB rate cut in March 2026?"),
        ];
        let index = p.build_index(&rights);

        let left = market(1, Venue::Kalshi, "Fed rate cut on March 18, 2026?");
        let candidates = p.find_candidates(&left, &index);
        assert!(candidates.contains(&0));
        assert!(!candidates.contains(&1));
    }

    #[test]
    fn auto_reject_hard_floor() {
        let p = RatesPipeline::new();
        let left = market(1, Venue::Kalshi, "Fed rate cut in March 2026?");
        let right = market(2, Venue::Polymarket, "Fed rate cut in March 2026?");
        let mut result = p.score(&left, &right).unwrap();
        result.score = 0.2;
        let decision = p.should_auto_reject(&left, &right, &result);
        assert!(decision.should_reject);
        assert_eq!(decision.rule, Some("hard_floor"));
    }
}
