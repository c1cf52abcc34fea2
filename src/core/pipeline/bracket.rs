//! Bracket deduplication for crypto candidates.
//!
//! One venue often lists a ladder of strike prices ("above $95k", "above
//! $100k", "above $105k") against a single market on the other side.
//! Without dedup every rung pairs with the same left market and the
//! suggestion queue drowns. Candidates are grouped per left market by the
//! right side's `entity|settle|comparator` bracket; each bracket keeps its
//! best-scoring rung, and only the best few brackets survive.

use std::collections::HashMap;

use super::{sort_candidates, Candidate};
use crate::core::signal::crypto::extract_crypto_signals;

/// Caps for bracket dedup.
#[derive(Debug, Clone, Copy)]
pub struct BracketLimits {
    /// Brackets kept per left market.
    pub max_groups_per_left: usize,
    /// Rungs kept per bracket.
    pub per_group: usize,
}

impl Default for BracketLimits {
    fn default() -> Self {
        Self {
            max_groups_per_left: 3,
            per_group: 1,
        }
    }
}

fn bracket_key(candidate: &Candidate) -> String {
    let signals = extract_crypto_signals(&candidate.right);
    let entity = signals.entity.map_or("NONE", |e| e.as_str());
    let settle = signals
        .settle_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .or(signals.settle_period.clone())
        .unwrap_or_else(|| "?".to_string());
    format!("{entity}|{settle}|{}", signals.comparator.as_str())
}

/// Deduplicate a candidate list by bracket, preserving stable score order.
#[must_use]
pub fn dedup_brackets(mut candidates: Vec<Candidate>, limits: &BracketLimits) -> Vec<Candidate> {
    sort_candidates(&mut candidates);

    // (left id, bracket key) -> rungs kept; left id -> brackets seen
    let mut rungs: HashMap<(i64, String), usize> = HashMap::new();
    let mut groups: HashMap<i64, Vec<String>> = HashMap::new();

    candidates
        .into_iter()
        .filter(|candidate| {
            let key = bracket_key(candidate);
            let seen = groups.entry(candidate.left.id).or_default();
            if !seen.contains(&key) {
                if seen.len() >= limits.max_groups_per_left {
                    return false;
                }
                seen.push(key.clone());
            }
            let rung = rungs.entry((candidate.left.id, key)).or_insert(0);
            if *rung >= limits.per_group {
                return false;
            }
            *rung += 1;
            true
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{Market, MarketStatus, Venue};
    use crate::core::pipeline::ScoreResult;
    use crate::core::rules::Tier;
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
            derived_topic: None,
            taxonomy_source: None,
            is_mve: false,
            event_ticker: None,
        }
    }

    fn candidate(left_id: i64, right_id: i64, right_title: &str, score: f64) -> Candidate {
        Candidate {
            left: market(left_id, Venue::Kalshi, "Bitcoin above $100k on Jan 21, 2026"),
            right: market(right_id, Venue::Polymarket, right_title),
            result: ScoreResult {
                score,
                reason: String::new(),
                tier: Tier::Weak,
            },
        }
    }

    #[test]
    fn ladder_collapses_to_one_rung() {
        let candidates = vec![
            candidate(1, 10, "Bitcoin above $95,000 on Jan 21, 2026", 0.80),
            candidate(1, 11, "Bitcoin above $100,000 on Jan 21, 2026", 0.95),
            candidate(1, 12, "Bitcoin above $105,000 on Jan 21, 2026", 0.78),
        ];
        let kept = dedup_brackets(candidates, &BracketLimits::default());
        // All three share entity|settle|GE, so only the best rung survives
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].right.id, 11);
    }

    #[test]
    fn different_comparators_are_different_brackets() {
        let candidates = vec![
            candidate(1, 10, "Bitcoin above $100,000 on Jan 21, 2026", 0.90),
            candidate(1, 11, "Bitcoin below $100,000 on Jan 21, 2026", 0.85),
        ];
        let kept = dedup_brackets(candidates, &BracketLimits::default());
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn group_cap_per_left() {
        // Four brackets for one left market: GE/LE on two dates
        let candidates = vec![
            candidate(1, 10, "Bitcoin above $100k on Jan 21, 2026", 0.90),
            candidate(1, 11, "Bitcoin below $100k on Jan 21, 2026", 0.88),
            candidate(1, 12, "Bitcoin above $100k on Jan 22, 2026", 0.86),
            candidate(1, 13, "Bitcoin below $100k on Jan 22, 2026", 0.84),
        ];
        let limits = BracketLimits::default();
        let kept = dedup_brackets(candidates, &limits);
        assert_eq!(kept.len(), limits.max_groups_per_left);
        // Best three brackets by score survived
        let ids: Vec<i64> = kept.iter().map(|c| c.right.id).collect();
        assert_eq!(ids, vec![10, 11, 12]);
    }

    #[test]
    fn separate_left_markets_do_not_share_caps() {
        let candidates = vec![
            candidate(1, 10, "Bitcoin above $100k on Jan 21, 2026", 0.90),
            candidate(2, 10, "Bitcoin above $100k on Jan 21, 2026", 0.89),
        ];
        let kept = dedup_brackets(candidates, &BracketLimits::default());
        assert_eq!(kept.len(), 2);
    }
}
