//! Macroeconomic indicator pipeline.

use async_trait::async_trait;

use super::{
    AutoConfirmDecision, AutoRejectDecision, CandidateIndex, FetchOptions, GateResult,
    ScoreResult, TopicPipeline,
};
use crate::core::domain::eligibility::DEFAULT_LOOKBACK_HOURS_LONG;
use crate::core::domain::fingerprint::{number_agreement, title_jaccard};
use crate::core::domain::{CanonicalTopic, Market, Venue};
use crate::core::rules::safe_confirm::macro_rules;
use crate::core::rules::{MacroReason, Tier};
use crate::core::signal::macro_econ::{extract_macro_signals, match_periods};
use crate::core::store::{EligibleMarketQuery, Repository};
use crate::error::Result;

const WEIGHT_ENTITY: f64 = 0.50;
const WEIGHT_PERIOD: f64 = 0.35;
const WEIGHT_NUMBERS: f64 = 0.10;
const WEIGHT_TEXT: f64 = 0.05;

pub struct MacroPipeline;

impl MacroPipeline {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for MacroPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TopicPipeline for MacroPipeline {
    fn topic(&self) -> CanonicalTopic {
        CanonicalTopic::Macro
    }

    fn algo_version(&self) -> &'static str {
        "v3.2.4-macro"
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
        repo.list_markets_by_derived_topic(CanonicalTopic::Macro, venue, &query)
            .await
    }

    fn build_index(&self, markets: &[Market]) -> CandidateIndex {
        let mut index = CandidateIndex::new();
        for (position, market) in markets.iter().enumerate() {
            if let Some(key) = extract_macro_signals(market).index_key() {
                index.insert(key, position);
            }
        }
        index
    }

    fn find_candidates(&self, market: &Market, index: &CandidateIndex) -> Vec<usize> {
        extract_macro_signals(market)
            .index_key()
            .map(|key| index.get(&key).to_vec())
            .unwrap_or_default()
    }

    fn check_hard_gates(&self, left: &Market, right: &Market) -> GateResult {
        let l = extract_macro_signals(left);
        let r = extract_macro_signals(right);

        let (Some(le), Some(re)) = (l.entity, r.entity) else {
            return GateResult::Failed("missing macro entity".into());
        };
        if le != re {
            return GateResult::Failed(format!("macro entity mismatch: {le} vs {re}"));
        }
        match (&l.period, &r.period) {
            (Some(lp), Some(rp)) => match match_periods(lp, rp) {
                Some(_) => GateResult::Passed,
                None => GateResult::Failed(format!(
                    "period mismatch: {} vs {}",
                    lp.label(),
                    rp.label()
                )),
            },
            _ => GateResult::Failed("missing period".into()),
        }
    }

    fn score(&self, left: &Market, right: &Market) -> Option<ScoreResult> {
        let l = extract_macro_signals(left);
        let r = extract_macro_signals(right);
        if l.entity.is_none() || l.entity != r.entity {
            return None;
        }
        let (lp, rp) = (l.period.as_ref()?, r.period.as_ref()?);
        let kind = match_periods(lp, rp)?;

        let me_score = 1.0;
        let per_score = kind.score();
        let num_score = number_agreement(&l.values, &r.values);
        let text_score = title_jaccard(&left.title, &right.title);

        let score = (WEIGHT_ENTITY * me_score
            + WEIGHT_PERIOD * per_score
            + WEIGHT_NUMBERS * num_score
            + WEIGHT_TEXT * text_score)
            .clamp(0.0, 1.0);

        let tier = if kind.is_strong() {
            Tier::Strong
        } else {
            Tier::Weak
        };

        let reason = MacroReason {
            tier,
            me_score,
            per_score: quantize(per_score),
            per_kind: Some(kind),
            period_left: lp.label(),
            period_right: rp.label(),
            num_score: quantize(num_score),
            text_score: quantize(text_score),
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
        let Some(reason) = MacroReason::parse(&result.reason) else {
            return AutoConfirmDecision::no();
        };
        match macro_rules(&reason) {
            Ok(()) => AutoConfirmDecision {
                should_confirm: true,
                rule: Some("macro_strong_confirm"),
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
            derived_topic: Some(CanonicalTopic::Macro),
            taxonomy_source: None,
            is_mve: false,
            event_ticker: None,
        }
    }

    #[test]
    fn same_print_same_month_is_strong() {
        let p = MacroPipeline::new();
        let left = market(1, Venue::Kalshi, "CPI above 3.5% for March 2026?");
        let right = market(2, Venue::Polymarket, "Will March 2026 CPI come in above 3.5%?");

        assert!(p.check_hard_gates(&left, &right).passed());
        let result = p.score(&left, &right).unwrap();
        assert_eq!(result.tier, Tier::Strong);
        assert!(result.reason.starts_with("MACRO: tier=STRONG"));
        assert!(result.reason.contains("[exact](2026-03/2026-03)"));
        assert!(result.score >= 0.85);
    }

    #[test]
    fn different_entities_fail_gate() {
        let p = MacroPipeline::new();
        let left = market(1, Venue::Kalshi, "CPI above 3% in March 2026");
        let right = market(2, Venue::Polymarket, "GDP above 3% in March 2026");
        assert!(!p.check_hard_gates(&left, &right).passed());
    }

    #[test]
    fn month_vs_bare_year_is_weak() {
        let p = MacroPipeline::new();
        let left = market(1, Venue::Kalshi, "Unemployment below 4% in March 2026");
        let right = market(2, Venue::Polymarket, "Unemployment below 4% in 2026");

        assert!(p.check_hard_gates(&left, &right).passed());
        let result = p.score(&left, &right).unwrap();
        assert_eq!(result.tier, Tier::Weak);
        assert!(result.reason.contains("[month_in_year]"));
        assert!(!p.should_auto_confirm(&left, &right, &result).should_confirm);
    }

    #[test]
    fn different_years_fail_gate() {
        let p = MacroPipeline::new();
        let left = market(1, Venue::Kalshi, "CPI above 3% in March 2026");
        let right = market(2, Venue::Polymarket, "CPI above 3% in March 2025");
        assert!(!p.check_hard_gates(&left, &right).passed());
    }

    #[test]
    fn strong_exact_pair_auto_confirms() {
        let p = MacroPipeline::new();
        let left = market(1, Venue::Kalshi, "CPI above 3.5% for March 2026?");
        let right = market(2, Venue::Polymarket, "March 2026 CPI above 3.5%?");
        let result = p.score(&left, &right).unwrap();
        let decision = p.should_auto_confirm(&left, &right, &result);
        assert!(decision.should_confirm, "reason: {}", result.reason);
        assert_eq!(decision.rule, Some("macro_strong_confirm"));
    }
}
