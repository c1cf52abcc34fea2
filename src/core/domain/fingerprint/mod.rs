//! Text primitives: tokenization, dates, numbers, comparators, tickers.
//!
//! Everything in this module is a pure function of the title (plus, for
//! [`build_fingerprint`], the close time and metadata bag). The per-topic
//! signal extractors compose these primitives; scoring never re-parses raw
//! titles.

mod comparator;
mod dates;
mod numbers;
mod ticker;
mod tokenize;

pub use comparator::{extract_comparator, Comparator};
pub use dates::{extract_dates, extract_month_day, DatePrecision, ExtractedDate};
pub use numbers::{extract_numbers, number_agreement, relative_gap, ExtractedNumber};
pub use ticker::{compile_ticker_regex, matches_ticker, ticker_pattern};
pub use tokenize::{jaccard, title_jaccard, token_set, tokenize};

use chrono::{DateTime, Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Broad intent of a market question, derived from its phrasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleIntent {
    PriceThreshold,
    UpDown,
    Winner,
    Range,
    Other,
}

/// Typed signals shared by every topic extractor.
#[derive(Debug, Clone)]
pub struct Fingerprint {
    pub tokens: Vec<String>,
    pub dates: Vec<ExtractedDate>,
    pub numbers: Vec<ExtractedNumber>,
    pub comparator: Comparator,
    pub intent: TitleIntent,
    pub macro_entities: Vec<&'static str>,
}

static MACRO_ENTITY_RES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    let table: &[(&str, &str)] = &[
        ("CPI", r"\b(cpi|consumer price index|inflation rate|inflation)\b"),
        ("GDP", r"\b(gdp|gross domestic product)\b"),
        ("NFP", r"\b(nfp|nonfarm payrolls?|non-farm payrolls?|payrolls)\b"),
        ("UNEMPLOYMENT", r"\b(unemployment|jobless rate)\b"),
        ("PCE", r"\b(pce|personal consumption)\b"),
        ("PMI", r"\b(pmi|purchasing managers)\b"),
        ("JOBLESS_CLAIMS", r"\b(jobless claims|initial claims)\b"),
        ("RETAIL_SALES", r"\bretail sales\b"),
    ];
    table
        .iter()
        .map(|(name, pattern)| (*name, Regex::new(pattern).expect("macro entity regex")))
        .collect()
});

static UP_DOWN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(up or down|higher or lower|up at|down at)\b").expect("up/down regex")
});

static WINNER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(winner|to win|win|wins|elected|champion|championship)\b").expect("winner regex")
});

/// Macro indicators mentioned in a title, canonical names only.
#[must_use]
pub fn extract_macro_entities(title: &str) -> Vec<&'static str> {
    let lower = title.to_lowercase();
    MACRO_ENTITY_RES
        .iter()
        .filter(|(_, re)| re.is_match(&lower))
        .map(|(name, _)| *name)
        .collect()
}

fn classify_intent(
    lower: &str,
    comparator: Comparator,
    numbers: &[ExtractedNumber],
) -> TitleIntent {
    if UP_DOWN_RE.is_match(lower) {
        return TitleIntent::UpDown;
    }
    if comparator == Comparator::Between {
        return TitleIntent::Range;
    }
    if matches!(comparator, Comparator::Ge | Comparator::Le | Comparator::Eq)
        && !numbers.is_empty()
    {
        return TitleIntent::PriceThreshold;
    }
    if WINNER_RE.is_match(lower) {
        return TitleIntent::Winner;
    }
    TitleIntent::Other
}

/// Build the full signal bundle for a title.
///
/// The close time resolves year-less day mentions ("on Jan 21?"); a
/// `strike_date` in the metadata bag is folded in as an extra day-precision
/// date when the title itself carries none.
#[must_use]
pub fn build_fingerprint(
    title: &str,
    close_time: Option<DateTime<Utc>>,
    metadata: &Value,
) -> Fingerprint {
    let lower = title.to_lowercase();
    let tokens = tokenize(title);
    let mut dates = extract_dates(title);
    let numbers = extract_numbers(title);
    let comparator = extract_comparator(title);
    let intent = classify_intent(&lower, comparator, &numbers);
    let macro_entities = extract_macro_entities(title);

    if dates.iter().all(|d| d.precision != DatePrecision::Day) {
        if let (Some((month, day, raw)), Some(close)) = (extract_month_day(title), close_time) {
            // Year-less day mention: borrow the year from the close time,
            // rolling forward when the close falls in the next January.
            let mut year = close.year();
            if month == 12 && close.month() == 1 {
                year -= 1;
            }
            dates.push(ExtractedDate {
                year,
                month: Some(month),
                day: Some(day),
                quarter: None,
                precision: DatePrecision::Day,
                raw,
            });
        }
    }

    if dates.is_empty() {
        if let Some(strike) = metadata
            .get("strike_date")
            .or_else(|| metadata.get("strikeDate"))
            .and_then(Value::as_str)
        {
            dates.extend(extract_dates(strike));
        }
    }

    Fingerprint {
        tokens,
        dates,
        numbers,
        comparator,
        intent,
        macro_entities,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn fingerprint_for_threshold_title() {
        let fp = build_fingerprint(
            "Bitcoin above $100,000 on Jan 21, 2026?",
            None,
            &Value::Null,
        );
        assert_eq!(fp.comparator, Comparator::Ge);
        assert_eq!(fp.intent, TitleIntent::PriceThreshold);
        assert_eq!(fp.dates.len(), 1);
        assert_eq!(fp.numbers.len(), 1);
        assert_eq!(fp.numbers[0].value, 100_000.0);
    }

    #[test]
    fn close_time_resolves_yearless_day() {
        let close = Utc.with_ymd_and_hms(2026, 1, 21, 17, 0, 0).unwrap();
        let fp = build_fingerprint("Bitcoin above $100,000 on Jan 21?", Some(close), &Value::Null);
        let day = fp
            .dates
            .iter()
            .find(|d| d.precision == DatePrecision::Day)
            .unwrap();
        assert_eq!(day.year, 2026);
        assert_eq!(day.month, Some(1));
        assert_eq!(day.day, Some(21));
    }

    #[test]
    fn december_title_closing_in_january_rolls_back() {
        let close = Utc.with_ymd_and_hms(2026, 1, 2, 12, 0, 0).unwrap();
        let fp = build_fingerprint("BTC above $95k on Dec 31?", Some(close), &Value::Null);
        let day = fp
            .dates
            .iter()
            .find(|d| d.precision == DatePrecision::Day)
            .unwrap();
        assert_eq!(day.year, 2025);
    }

    #[test]
    fn strike_date_metadata_fallback() {
        let fp = build_fingerprint(
            "Will it happen?",
            None,
            &json!({"strike_date": "2026-03-15"}),
        );
        assert_eq!(fp.dates.len(), 1);
        assert_eq!(fp.dates[0].day, Some(15));
    }

    #[test]
    fn macro_entities_detected() {
        assert_eq!(extract_macro_entities("CPI above 3% in March"), vec!["CPI"]);
        assert_eq!(
            extract_macro_entities("US GDP growth and unemployment"),
            vec!["GDP", "UNEMPLOYMENT"]
        );
        assert!(extract_macro_entities("Lakers vs Celtics").is_empty());
    }

    #[test]
    fn up_down_intent() {
        let fp = build_fingerprint("Bitcoin up or down at 3pm EST?", None, &Value::Null);
        assert_eq!(fp.intent, TitleIntent::UpDown);
    }

    #[test]
    fn winner_intent() {
        let fp = build_fingerprint("2024 US Presidential Election Winner", None, &Value::Null);
        assert_eq!(fp.intent, TitleIntent::Winner);
    }

    #[test]
    fn range_intent() {
        let fp = build_fingerprint("BTC between $99k and $101k", None, &Value::Null);
        assert_eq!(fp.intent, TitleIntent::Range);
    }
}
