//! Auto-reject rule pack.
//!
//! Any firing rule demotes a suggested link. The pack is shared across
//! topics with per-topic floors and tolerances.

use chrono::{DateTime, Utc};

use super::reason::{parse_reason, ParsedReason};
use crate::core::domain::{CanonicalTopic, LinkStatus, MarketLink};
use crate::core::signal::crypto::extract_crypto_entity;

pub const REJECT_PACK_VERSION: &str = "1.4.2";

/// Configuration for a reject pass.
#[derive(Debug, Clone)]
pub struct RejectConfig {
    /// Only links at least this old are eligible for the stale rule.
    pub min_age_hours: i64,
    /// Demote confirmed links too (logged as an override by the caller).
    pub include_confirmed: bool,
}

impl Default for RejectConfig {
    fn default() -> Self {
        Self {
            min_age_hours: 24,
            include_confirmed: false,
        }
    }
}

/// Verdict for one link: every rule that fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectVerdict {
    pub rules: Vec<&'static str>,
}

impl RejectVerdict {
    #[must_use]
    pub fn should_reject(&self) -> bool {
        !self.rules.is_empty()
    }
}

/// Score below which a link is indefensible regardless of anything else.
#[must_use]
pub fn hard_floor(topic: CanonicalTopic) -> f64 {
    match topic {
        CanonicalTopic::CryptoDaily | CanonicalTopic::CryptoIntraday => 0.35,
        _ => 0.30,
    }
}

/// A suggested link that has aged past `min_age_hours` without confirmation
/// and still scores under this is noise.
const STALE_LOW_SCORE: f64 = 0.70;

fn text_score_of(reason: &ParsedReason) -> Option<f64> {
    match reason {
        ParsedReason::CryptoDaily(r) => Some(r.text_score),
        ParsedReason::CryptoIntraday(r) => Some(r.text_score),
        ParsedReason::Macro(r) => Some(r.text_score),
        ParsedReason::Generic(r) => r.get_score("text"),
        ParsedReason::Auto { .. } => None,
    }
}

/// Evaluate the reject pack against one link.
#[must_use]
pub fn evaluate_reject(
    link: &MarketLink,
    left_title: &str,
    right_title: &str,
    now: DateTime<Utc>,
    config: &RejectConfig,
) -> RejectVerdict {
    let mut rules: Vec<&'static str> = Vec::new();

    if link.status == LinkStatus::Rejected {
        return RejectVerdict { rules };
    }
    if link.status == LinkStatus::Confirmed && !config.include_confirmed {
        return RejectVerdict { rules };
    }

    if link.score < hard_floor(link.topic) {
        rules.push("hard_floor");
    }

    let is_crypto = matches!(
        link.topic,
        CanonicalTopic::CryptoDaily | CanonicalTopic::CryptoIntraday
    );
    if is_crypto {
        let left_entity = extract_crypto_entity(left_title);
        let right_entity = extract_crypto_entity(right_title);
        if let (Some(l), Some(r)) = (left_entity, right_entity) {
            if l != r {
                rules.push("entity_mismatch");
            }
        }
    }

    let parsed = parse_reason(&link.reason);

    // Daily vs intraday pairs should have been gated out; a daily link whose
    // reason parses as intraday (or vice versa) is a class mix-up.
    match (&parsed, link.topic) {
        (Some(ParsedReason::CryptoIntraday(_)), CanonicalTopic::CryptoDaily)
        | (Some(ParsedReason::CryptoDaily(_)), CanonicalTopic::CryptoIntraday) => {
            rules.push("type_incompatible");
        }
        _ => {}
    }

    if let Some(ParsedReason::CryptoDaily(r)) = &parsed {
        if r.day_diff.abs() > 1 {
            rules.push("date_mismatch");
        }
    }

    if let Some(text) = parsed.as_ref().and_then(text_score_of) {
        if text < 0.02 {
            rules.push("text_floor");
        }
    }

    if link.status == LinkStatus::Suggested {
        let age_hours = now.signed_duration_since(link.created_at).num_hours();
        if age_hours >= config.min_age_hours && link.score < STALE_LOW_SCORE {
            rules.push("stale_low_score");
        }
    }

    RejectVerdict { rules }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::Venue;
    use chrono::Duration;

    fn link(score: f64, status: LinkStatus, age_hours: i64) -> MarketLink {
        let now = Utc::now();
        MarketLink {
            id: 1,
            left_venue: Venue::Kalshi,
            left_market_id: 1,
            right_venue: Venue::Polymarket,
            right_market_id: 2,
            score,
            status,
            reason: "entity=BITCOIN dateType=DAY_EXACT date=1.00(0d) num=0.90[price] text=0.30"
                .into(),
            topic: CanonicalTopic::CryptoDaily,
            algo_version: "test".into(),
            created_at: now - Duration::hours(age_hours),
            updated_at: now,
        }
    }

    const BTC_L: &str = "Bitcoin above $100k on Jan 21, 2026";
    const BTC_R: &str = "BTC above $100k Jan 21 2026";

    #[test]
    fn healthy_link_passes() {
        let verdict = evaluate_reject(
            &link(0.92, LinkStatus::Suggested, 1),
            BTC_L,
            BTC_R,
            Utc::now(),
            &RejectConfig::default(),
        );
        assert!(!verdict.should_reject());
    }

    #[test]
    fn hard_floor_fires() {
        let verdict = evaluate_reject(
            &link(0.2, LinkStatus::Suggested, 1),
            BTC_L,
            BTC_R,
            Utc::now(),
            &RejectConfig::default(),
        );
        assert!(verdict.rules.contains(&"hard_floor"));
    }

    #[test]
    fn entity_mismatch_fires() {
        let verdict = evaluate_reject(
            &link(0.8, LinkStatus::Suggested, 1),
            "Bitcoin above $100k on Jan 21, 2026",
            "Ethereum above $100k on Jan 21, 2026",
            Utc::now(),
            &RejectConfig::default(),
        );
        assert!(verdict.rules.contains(&"entity_mismatch"));
    }

    #[test]
    fn stale_low_score_fires_after_min_age() {
        let config = RejectConfig::default();
        let fresh = evaluate_reject(
            &link(0.62, LinkStatus::Suggested, 2),
            BTC_L,
            BTC_R,
            Utc::now(),
            &config,
        );
        assert!(!fresh.should_reject());

        let stale = evaluate_reject(
            &link(0.62, LinkStatus::Suggested, 48),
            BTC_L,
            BTC_R,
            Utc::now(),
            &config,
        );
        assert_eq!(stale.rules, vec!["stale_low_score"]);
    }

    #[test]
    fn confirmed_links_skipped_without_flag() {
        let config = RejectConfig::default();
        let verdict = evaluate_reject(
            &link(0.2, LinkStatus::Confirmed, 48),
            BTC_L,
            BTC_R,
            Utc::now(),
            &config,
        );
        assert!(!verdict.should_reject());

        let with_flag = RejectConfig {
            include_confirmed: true,
            ..config
        };
        let verdict = evaluate_reject(
            &link(0.2, LinkStatus::Confirmed, 48),
            BTC_L,
            BTC_R,
            Utc::now(),
            &with_flag,
        );
        assert!(verdict.rules.contains(&"hard_floor"));
    }

    #[test]
    fn rejected_links_are_left_alone() {
        let verdict = evaluate_reject(
            &link(0.1, LinkStatus::Rejected, 48),
            BTC_L,
            BTC_R,
            Utc::now(),
            &RejectConfig::default(),
        );
        assert!(!verdict.should_reject());
    }

    #[test]
    fn intraday_reason_on_daily_link_is_type_incompatible() {
        let mut l = link(0.8, LinkStatus::Suggested, 1);
        l.reason = "entity=BITCOIN bucket=2026-01-21T15:00Z dir=up/up text=0.40".into();
        let verdict = evaluate_reject(&l, BTC_L, BTC_R, Utc::now(), &RejectConfig::default());
        assert!(verdict.rules.contains(&"type_incompatible"));
    }
}
