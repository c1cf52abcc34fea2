//! Entertainment and awards pipeline.

use async_trait::async_trait;

use super::{
    AutoRejectDecision, CandidateIndex, FetchOptions, GateResult, ScoreResult, TopicPipeline,
};
use crate::core::domain::eligibility::DEFAULT_LOOKBACK_HOURS_LONG;
use crate::core::domain::fingerprint::title_jaccard;
use crate::core::domain::{CanonicalTopic, Market, Venue};
use crate::core::rules::{GenericReason, Tier};
use crate::core::signal::entertainment::{
    extract_entertainment_signals, AwardShow, EntertainmentSignals,
};
use crate::core::store::{EligibleMarketQuery, Repository};
use crate::error::Result;

const WEIGHT_AWARD: f64 = 0.30;
const WEIGHT_CATEGORY: f64 = 0.25;
const WEIGHT_YEAR: f64 = 0.15;
const WEIGHT_NOMINEES: f64 = 0.20;
const WEIGHT_TEXT: f64 = 0.10;

pub struct EntertainmentPipeline;

impl EntertainmentPipeline {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for EntertainmentPipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn nominee_score(left: &EntertainmentSignals, right: &EntertainmentSignals) -> f64 {
    match (left.nominees.len(), right.nominees.len()) {
        (0, 0) => 0.5,
        (0, _) | (_, 0) => 0.4,
        (l, r) => {
            let overlap = left
                .nominees
                .iter()
                .filter(|n| right.nominees.contains(n))
                .count();
            overlap as f64 / l.min(r) as f64
        }
    }
}

#[async_trait]
impl TopicPipeline for EntertainmentPipeline {
    fn topic(&self) -> CanonicalTopic {
        CanonicalTopic::Entertainment
    }

    fn algo_version(&self) -> &'static str {
        "v3.0.2-entertainment"
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
        repo.list_markets_by_derived_topic(CanonicalTopic::Entertainment, venue, &query)
            .await
    }

    fn build_index(&self, markets: &[Market]) -> CandidateIndex {
        let mut index = CandidateIndex::new();
        for (position, market) in markets.iter().enumerate() {
            if let Some(key) = extract_entertainment_signals(market).index_key() {
                index.insert(key, position);
            }
        }
        index
    }

    fn find_candidates(&self, market: &Market, index: &CandidateIndex) -> Vec<usize> {
        extract_entertainment_signals(market)
            .index_key()
            .map(|key| index.get(&key).to_vec())
            .unwrap_or_default()
    }

    fn check_hard_gates(&self, left: &Market, right: &Market) -> GateResult {
        let l = extract_entertainment_signals(left);
        let r = extract_entertainment_signals(right);

        if l.award_show != r.award_show {
            return GateResult::Failed(format!(
                "award show mismatch: {} vs {}",
                l.award_show, r.award_show
            ));
        }
        if let (Some(ly), Some(ry)) = (l.year, r.year) {
            if ly != ry {
                return GateResult::Failed(format!("year mismatch: {ly} vs {ry}"));
            }
        }
        if let (Some(lc), Some(rc)) = (l.category, r.category) {
            if lc != rc {
                return GateResult::Failed(format!("category mismatch: {lc} vs {rc}"));
            }
        }
        GateResult::Passed
    }

    fn score(&self, left: &Market, right: &Market) -> Option<ScoreResult> {
        let l = extract_entertainment_signals(left);
        let r = extract_entertainment_signals(right);

        let award_score = if l.award_show == r.award_show && l.award_show != AwardShow::Unknown {
            1.0
        } else {
            0.0
        };
        let category_score = match (l.category, r.category) {
            (Some(a), Some(b)) if a == b => 1.0,
            (None, None) => 0.3,
            _ => 0.5,
        };
        let year_score = match (l.year, r.year) {
            (Some(a), Some(b)) if a == b => 1.0,
            _ => 0.0,
        };
        let nominees = nominee_score(&l, &r);
        let text_score = title_jaccard(&left.title, &right.title);

        let score = (WEIGHT_AWARD * award_score
            + WEIGHT_CATEGORY * category_score
            + WEIGHT_YEAR * year_score
            + WEIGHT_NOMINEES * nominees
            + WEIGHT_TEXT * text_score)
            .clamp(0.0, 1.0);

        let tier = if award_score == 1.0 && category_score == 1.0 && year_score == 1.0 {
            Tier::Strong
        } else {
            Tier::Weak
        };

        let mut reason = GenericReason::new("ENTERTAINMENT");
        reason
            .push_score("award", award_score)
            .push_score("category", category_score)
            .push_score("year", year_score)
            .push_score("nominees", nominees)
            .push_score("text", text_score)
            .push("show", l.award_show.as_str());

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
