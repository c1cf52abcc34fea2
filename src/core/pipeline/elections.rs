//! Elections pipeline.

use async_trait::async_trait;

use super::{
    AutoConfirmDecision, AutoRejectDecision, CandidateIndex, FetchOptions, GateResult,
    ScoreResult, TopicPipeline,
};
use crate::core::domain::eligibility::DEFAULT_LOOKBACK_HOURS_LONG;
use crate::core::domain::fingerprint::title_jaccard;
use crate::core::domain::{CanonicalTopic, Market, Venue};
use crate::core::rules::safe_confirm::elections_rules;
use crate::core::rules::{GenericReason, Tier};
use crate::core::signal::elections::{extract_election_signals, Country, ElectionSignals, Office};
use crate::core::store::{EligibleMarketQuery, Repository};
use crate::error::Result;

const WEIGHT_COUNTRY: f64 = 0.20;
const WEIGHT_OFFICE: f64 = 0.20;
const WEIGHT_YEAR: f64 = 0.15;
const WEIGHT_CANDIDATES: f64 = 0.25;
const WEIGHT_TEXT: f64 = 0.20;

pub struct ElectionsPipeline;

impl ElectionsPipeline {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for ElectionsPipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn candidate_overlap(left: &ElectionSignals, right: &ElectionSignals) -> usize {
    left.candidates
        .iter()
        .filter(|c| right.candidates.contains(c))
        .count()
}

fn candidate_score(left: &ElectionSignals, right: &ElectionSignals) -> f64 {
    match (left.candidates.len(), right.candidates.len()) {
        (0, 0) => 0.5,
        (0, _) | (_, 0) => 0.4,
        (l, r) => {
            let overlap = candidate_overlap(left, right);
            overlap as f64 / l.min(r) as f64
        }
    }
}

#[async_trait]
impl TopicPipeline for ElectionsPipeline {
    fn topic(&self) -> CanonicalTopic {
        CanonicalTopic::Elections
    }

    fn algo_version(&self) -> &'static str {
        "v3.0.15-elections"
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
            lookback_hours: Some(opts.lookback_hours.unwrap_or(DEFAULT_LOOKBACK_HOURS_LONG)),
            limit: opts.limit,
            exclude_sports: true,
            ..Default::default()
        };
        repo.list_markets_by_derived_topic(CanonicalTopic::Elections, venue, &query)
            .await
    }

    fn build_index(&self, markets: &[Market]) -> CandidateIndex {
        let mut index = CandidateIndex::new();
        for (position, market) in markets.iter().enumerate() {
            let signals = extract_election_signals(market);
            index.insert(signals.race_key(), position);
            if let Some(key) = signals.country_year_key() {
                index.insert(key, position);
            }
            for candidate in &signals.candidates {
                index.insert(format!("cand|{candidate}"), position);
            }
        }
        index
    }

    fn find_candidates(&self, market: &Market, index: &CandidateIndex) -> Vec<usize> {
        let signals = extract_election_signals(market);
        let mut positions: Vec<usize> = Vec::new();
        positions.extend_from_slice(index.get(&signals.race_key()));
        if let Some(key) = signals.country_year_key() {
            positions.extend_from_slice(index.get(&key));
        }
        for candidate in &signals.candidates {
            positions.extend_from_slice(index.get(&format!("cand|{candidate}")));
        }
        positions.sort_unstable();
        positions.dedup();
        positions
    }

    fn check_hard_gates(&self, left: &Market, right: &Market) -> GateResult {
        let l = extract_election_signals(left);
        let r = extract_election_signals(right);

        // UNKNOWN never matches a known country
        if l.country != r.country {
            return GateResult::Failed(format!(
                "Country mismatch: {} vs {}",
                l.country, r.country
            ));
        }
        if !l.office.compatible_with(r.office) {
            return GateResult::Failed(format!(
                "Office mismatch: {} vs {}",
                l.office, r.office
            ));
        }
        if l.year != r.year {
            return GateResult::Failed(format!(
                "Year mismatch: {:?} vs {:?}",
                l.year, r.year
            ));
        }
        if let (Some(ls), Some(rs)) = (l.state, r.state) {
            if ls != rs {
                return GateResult::Failed(format!("State mismatch: {ls} vs {rs}"));
            }
        }
        GateResult::Passed
    }

    fn score(&self, left: &Market, right: &Market) -> Option<ScoreResult> {
        let l = extract_election_signals(left);
        let r = extract_election_signals(right);

        let country_score = if l.country == r.country && l.country != Country::Unknown {
            1.0
        } else {
            0.0
        };
        let office_score = if l.office == r.office && l.office != Office::Unknown {
            1.0
        } else if l.office.compatible_with(r.office) && l.office != r.office {
            0.7
        } else {
            0.0
        };
        let year_score = match (l.year, r.year) {
            (Some(a), Some(b)) if a == b => 1.0,
            _ => 0.0,
        };
        let cand_score = candidate_score(&l, &r);
        let text_score = title_jaccard(&left.title, &right.title);

        let score = (WEIGHT_COUNTRY * country_score
            + WEIGHT_OFFICE * office_score
            + WEIGHT_YEAR * year_score
            + WEIGHT_CANDIDATES * cand_score
            + WEIGHT_TEXT * text_score)
            .clamp(0.0, 1.0);

        let overlap = candidate_overlap(&l, &r);
        let tier = if country_score == 1.0
            && office_score == 1.0
            && year_score == 1.0
            && cand_score >= 0.5
        {
            Tier::Strong
        } else {
            Tier::Weak
        };

        let mut reason = GenericReason::new("ELECTIONS");
        reason
            .push_score("country", country_score)
            .push_score("office", office_score)
            .push_score("year", year_score)
            .push_score("cand", cand_score)
            .push_score("text", text_score)
            .push("candL", l.candidates.len())
            .push("candR", r.candidates.len())
            .push("overlap", overlap)
            .push("race", l.race_key());

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
        match elections_rules(result.score, &reason) {
            Ok(()) => AutoConfirmDecision {
                should_confirm: true,
                rule: Some("elections_exact_race"),
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
