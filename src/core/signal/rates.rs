//! Central-bank rate decision signal extraction.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::domain::fingerprint::{extract_dates, DatePrecision};
use crate::core::domain::Market;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CentralBank {
    Fed,
    Ecb,
    Boe,
    Boj,
    Snb,
    Rba,
    Boc,
    Unknown,
}

impl CentralBank {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fed => "FED",
            Self::Ecb => "ECB",
            Self::Boe => "BOE",
            Self::Boj => "BOJ",
            Self::Snb => "SNB",
            Self::Rba => "RBA",
            Self::Boc => "BOC",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for CentralBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateAction {
    Hike,
    Cut,
    Hold,
}

impl RateAction {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hike => "HIKE",
            Self::Cut => "CUT",
            Self::Hold => "HOLD",
        }
    }
}

static BANK_PATTERNS: Lazy<Vec<(CentralBank, Regex)>> = Lazy::new(|| {
    let table: &[(CentralBank, &str)] = &[
        (
            CentralBank::Fed,
            r"\b(fed|fomc|federal reserve|federal funds)\b",
        ),
        (CentralBank::Ecb, r"\b(ecb|european central bank)\b"),
        (CentralBank::Boe, r"\b(boe|bank of england)\b"),
        (CentralBank::Boj, r"\b(boj|bank of japan)\b"),
        (CentralBank::Snb, r"\b(snb|swiss national bank)\b"),
        (CentralBank::Rba, r"\b(rba|reserve bank of australia)\b"),
        (CentralBank::Boc, r"\b(boc|bank of canada)\b"),
    ];
    table
        .iter()
        .map(|(b, p)| (*b, Regex::new(p).expect("bank regex")))
        .collect()
});

static HIKE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(hike|raise|increase)\b").expect("hike regex"));
static CUT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(cut|lower|decrease)\b").expect("cut regex"));
static HOLD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(hold|unchanged|pause|no change)\b").expect("hold regex"));

static BPS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*(?:bps|bp|basis points?)\b").expect("bps regex"));

static BAND_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s*(?:%)?\s*[-\u{2013}]\s*(\d+(?:\.\d+)?)\s*%").expect("band regex")
});

static COUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(one|two|three|four|five|\d)\s+(?:rate\s+)?(?:cuts?|hikes?)\b")
        .expect("action count regex")
});

fn count_word(word: &str) -> Option<u32> {
    match word {
        "one" => Some(1),
        "two" => Some(2),
        "three" => Some(3),
        "four" => Some(4),
        "five" => Some(5),
        _ => word.parse().ok(),
    }
}

/// Typed signal bundle for rate-decision markets.
#[derive(Debug, Clone)]
pub struct RatesSignals {
    pub bank: CentralBank,
    pub action: Option<RateAction>,
    pub bps: Option<u32>,
    pub meeting_date: Option<NaiveDate>,
    /// `YYYY-MM` when the title pins only the meeting month.
    pub meeting_month: Option<String>,
    pub target_band: Option<(f64, f64)>,
    pub action_count: Option<u32>,
    pub year: Option<i32>,
    pub confidence: f64,
}

impl RatesSignals {
    /// Primary index key: `bank|meeting`, falling back to `bank|year`.
    #[must_use]
    pub fn index_key(&self) -> Option<String> {
        if self.bank == CentralBank::Unknown {
            return None;
        }
        if let Some(date) = self.meeting_date {
            return Some(format!("{}|{}", self.bank.as_str(), date.format("%Y-%m-%d")));
        }
        if let Some(month) = &self.meeting_month {
            return Some(format!("{}|{}", self.bank.as_str(), month));
        }
        self.year
            .map(|y| format!("{}|{}", self.bank.as_str(), y))
    }
}

/// Extract the rates signal bundle from a market.
#[must_use]
pub fn extract_rates_signals(market: &Market) -> RatesSignals {
    let lower = market.title.to_lowercase();

    let bank = BANK_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(&lower))
        .map_or(CentralBank::Unknown, |(b, _)| *b);

    let action = if HIKE_RE.is_match(&lower) {
        Some(RateAction::Hike)
    } else if CUT_RE.is_match(&lower) {
        Some(RateAction::Cut)
    } else if HOLD_RE.is_match(&lower) {
        Some(RateAction::Hold)
    } else {
        None
    };

    let bps = BPS_RE
        .captures(&lower)
        .and_then(|c| c[1].parse().ok())
        .or_else(|| {
            if lower.contains("quarter point") {
                Some(25)
            } else if lower.contains("half point") {
                Some(50)
            } else {
                None
            }
        });

    let target_band = BAND_RE.captures(&lower).and_then(|c| {
        let low: f64 = c[1].parse().ok()?;
        let high: f64 = c[2].parse().ok()?;
        (low < high && high < 30.0).then_some((low, high))
    });

    let action_count = COUNT_RE
        .captures(&lower)
        .and_then(|c| count_word(&c[1]));

    let dates = extract_dates(&market.title);
    let meeting_date = dates
        .iter()
        .find(|d| d.precision == DatePrecision::Day)
        .and_then(|d| d.naive_date());
    let meeting_month = dates
        .iter()
        .find(|d| d.precision == DatePrecision::Month)
        .and_then(|d| d.period_key());
    let year = dates.first().map(|d| d.year);

    let mut confidence: f64 = 0.0;
    if bank != CentralBank::Unknown {
        confidence += 0.5;
    }
    if action.is_some() {
        confidence += 0.3;
    }
    if meeting_date.is_some() || meeting_month.is_some() {
        confidence += 0.2;
    }

    RatesSignals {
        bank,
        action,
        bps,
        meeting_date,
        meeting_month,
        target_band,
        action_count,
        year,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{MarketStatus, Venue};
    use serde_json::Value;

    fn market(title: &str) -> Market {
        Market {
            id: 1,
            venue: Venue::Kalshi,
            external_id: "X".into(),
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

    #[test]
    fn fed_cut_with_bps() {
        let s = extract_rates_signals(&market("Will the Fed cut rates by 25 bps in March 2026?"));
        assert_eq!(s.bank, CentralBank::Fed);
        assert_eq!(s.action, Some(RateAction::Cut));
        assert_eq!(s.bps, Some(25));
        assert_eq!(s.meeting_month.as_deref(), Some("2026-03"));
        assert_eq!(s.index_key().as_deref(), Some("FED|2026-03"));
    }

    #[test]
    fn ecb_hold() {
        let s = extract_rates_signals(&market("ECB holds rates unchanged at June meeting 2026"));
        assert_eq!(s.bank, CentralBank::Ecb);
        assert_eq!(s.action, Some(RateAction::Hold));
    }

    #[test]
    fn target_band() {
        let s = extract_rates_signals(&market(
            "Federal funds rate in the 4.25-4.50% range after the Dec 2026 meeting?",
        ));
        assert_eq!(s.bank, CentralBank::Fed);
        assert_eq!(s.target_band, Some((4.25, 4.50)));
    }

    #[test]
    fn action_count() {
        let s = extract_rates_signals(&market("Three rate cuts by the Fed in 2026?"));
        assert_eq!(s.action_count, Some(3));
        assert_eq!(s.action, Some(RateAction::Cut));
        assert_eq!(s.index_key().as_deref(), Some("FED|2026"));
    }

    #[test]
    fn quarter_point_maps_to_bps() {
        let s = extract_rates_signals(&market("Fed quarter point cut at the January meeting?"));
        assert_eq!(s.bps, Some(25));
    }

    #[test]
    fn unknown_bank_has_no_key() {
        let s = extract_rates_signals(&market("Rates go up somewhere"));
        assert_eq!(s.bank, CentralBank::Unknown);
        assert_eq!(s.index_key(), None);
    }
}
