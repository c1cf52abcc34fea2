//! Safe-confirm rule packs.
//!
//! A pack is an ordered list of named rules; every rule must pass for a
//! suggested link to be promoted. Rules read the parsed reason plus the two
//! titles, never the stores.

use super::reason::{CryptoDailyReason, GenericReason, MacroReason, Tier};
use crate::core::domain::fingerprint::{extract_comparator, relative_gap};
use crate::core::domain::{CanonicalTopic, MarketLink};
use crate::core::signal::crypto::extract_crypto_signals;
use crate::core::signal::SettleDateType;

/// Rule-pack versions, stamped into rewritten reasons.
pub const SAFE_CONFIRM_VERSIONS: &[(CanonicalTopic, &str)] = &[
    (CanonicalTopic::CryptoDaily, "2.6.8"),
    (CanonicalTopic::Macro, "1.3.2"),
    (CanonicalTopic::Elections, "3.0.15"),
];

/// Version for one topic's pack, when it has one.
#[must_use]
pub fn pack_version(topic: CanonicalTopic) -> Option<&'static str> {
    SAFE_CONFIRM_VERSIONS
        .iter()
        .find(|(t, _)| *t == topic)
        .map(|(_, v)| *v)
}

/// Verdict for one link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmVerdict {
    /// All rules passed; promote.
    Confirm { rule: &'static str },
    /// A named rule failed; leave suggested.
    Blocked { rule: &'static str },
    /// The topic has no safe-confirm pack or the reason did not parse.
    NotApplicable,
}

/// Crypto-daily pack (v2.6.8). Returns the first failing rule.
pub fn crypto_daily_rules(
    score: f64,
    reason: &CryptoDailyReason,
    left_title: &str,
    right_title: &str,
) -> Result<(), &'static str> {
    if score < 0.88 {
        return Err("score_floor");
    }
    if reason.entity.is_none() {
        return Err("entity_present");
    }
    if reason.date_type == SettleDateType::Unknown {
        return Err("date_type");
    }
    if reason.day_diff != 0 {
        return Err("date_diff_zero");
    }
    let left_cmp = extract_comparator(left_title);
    let right_cmp = extract_comparator(right_title);
    if !left_cmp.compatible_with(right_cmp) {
        return Err("comparator_compat");
    }
    if !numbers_within_tolerance(left_title, right_title) {
        return Err("number_tolerance");
    }
    if reason.text_score < 0.12 {
        return Err("text_floor");
    }
    if reason.date_score < 0.90 {
        return Err("date_score_floor");
    }
    Ok(())
}

/// Absolute <= 1 or relative <= 0.1% between the closest threshold pair.
fn numbers_within_tolerance(left_title: &str, right_title: &str) -> bool {
    let fake = |title: &str| {
        let market = crate::core::domain::Market {
            id: 0,
            venue: crate::core::domain::Venue::Kalshi,
            external_id: String::new(),
            title: title.to_string(),
            status: crate::core::domain::MarketStatus::Active,
            close_time: None,
            category: None,
            metadata: serde_json::Value::Null,
            derived_topic: None,
            taxonomy_source: None,
            is_mve: false,
            event_ticker: None,
        };
        extract_crypto_signals(&market).threshold_values()
    };
    let left = fake(left_title);
    let right = fake(right_title);
    if left.is_empty() || right.is_empty() {
        return false;
    }
    left.iter().any(|l| {
        right
            .iter()
            .any(|r| (l - r).abs() <= 1.0 || relative_gap(*l, *r) <= 0.001)
    })
}

/// Macro pack: STRONG tier with a period alignment worth trusting.
pub fn macro_rules(reason: &MacroReason) -> Result<(), &'static str> {
    if reason.tier != Tier::Strong {
        return Err("tier_strong");
    }
    if reason.me_score < 0.50 {
        return Err("me_floor");
    }
    match reason.per_kind {
        Some(kind) if kind.is_strong() => {}
        _ => return Err("period_kind"),
    }
    if reason.per_score < 0.22 {
        return Err("period_floor");
    }
    if reason.text_score < 0.10 {
        return Err("text_floor");
    }
    Ok(())
}

/// Elections pack (v3.0.15): perfect race alignment plus candidate overlap
/// when both sides name candidates.
pub fn elections_rules(score: f64, reason: &GenericReason) -> Result<(), &'static str> {
    if score < 0.95 {
        return Err("score_floor");
    }
    for (key, rule) in [
        ("country", "country_exact"),
        ("office", "office_exact"),
        ("year", "year_exact"),
    ] {
        if reason.get_score(key) != Some(1.0) {
            return Err(rule);
        }
    }
    let cand_left: u32 = reason.get("candL").and_then(|v| v.parse().ok()).unwrap_or(0);
    let cand_right: u32 = reason.get("candR").and_then(|v| v.parse().ok()).unwrap_or(0);
    if cand_left > 0 && cand_right > 0 {
        let overlap: u32 = reason
            .get("overlap")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        if overlap < 1 {
            return Err("candidate_overlap");
        }
    }
    Ok(())
}

/// Evaluate the safe-confirm pack for one suggested link.
#[must_use]
pub fn evaluate_safe_confirm(
    link: &MarketLink,
    left_title: &str,
    right_title: &str,
) -> ConfirmVerdict {
    match link.topic {
        CanonicalTopic::CryptoDaily => {
            let Some(reason) = CryptoDailyReason::parse(&link.reason) else {
                return ConfirmVerdict::NotApplicable;
            };
            match crypto_daily_rules(link.score, &reason, left_title, right_title) {
                Ok(()) => ConfirmVerdict::Confirm {
                    rule: "crypto_daily_safe_confirm",
                },
                Err(rule) => ConfirmVerdict::Blocked { rule },
            }
        }
        CanonicalTopic::Macro => {
            let Some(reason) = MacroReason::parse(&link.reason) else {
                return ConfirmVerdict::NotApplicable;
            };
            match macro_rules(&reason) {
                Ok(()) => ConfirmVerdict::Confirm {
                    rule: "macro_strong_confirm",
                },
                Err(rule) => ConfirmVerdict::Blocked { rule },
            }
        }
        CanonicalTopic::Elections => {
            let Some(reason) = GenericReason::parse(&link.reason) else {
                return ConfirmVerdict::NotApplicable;
            };
            if reason.tag != "ELECTIONS" {
                return ConfirmVerdict::NotApplicable;
            }
            match elections_rules(link.score, &reason) {
                Ok(()) => ConfirmVerdict::Confirm {
                    rule: "elections_exact_race",
                },
                Err(rule) => ConfirmVerdict::Blocked { rule },
            }
        }
        _ => ConfirmVerdict::NotApplicable,
    }
}
