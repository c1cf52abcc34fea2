//! Canonical topic assignment.
//!
//! Resolution is ordered; the first sufficient signal wins:
//! series-ticker patterns (exchange only), then the category map, then
//! event/series tags, then title keyword rules, then UNKNOWN.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::domain::fingerprint::{
    build_fingerprint, extract_macro_entities, TitleIntent,
};
use crate::core::domain::{CanonicalTopic, KalshiEvent, Market, TaxonomySource, Venue};

/// Classifier output: the topic plus how sure we are and where it came from.
#[derive(Debug, Clone)]
pub struct Classification {
    pub topic: CanonicalTopic,
    pub confidence: f64,
    pub source: TaxonomySource,
    pub reason: String,
}

impl Classification {
    fn new(
        topic: CanonicalTopic,
        confidence: f64,
        source: TaxonomySource,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            topic,
            confidence,
            source,
            reason: reason.into(),
        }
    }
}

/// Crypto series can be daily or intraday; the ticker or title decides.
enum CategoryTopic {
    Direct(CanonicalTopic),
    CryptoFamily,
}

static SERIES_CRYPTO_DAILY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^KX(BTC|ETH|SOL|XRP|DOGE)D").expect("crypto daily series regex")
});

static SERIES_CRYPTO_INTRADAY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^KX(BTC|ETH|SOL|XRP|DOGE)(U|15M|H)").expect("crypto intraday series regex")
});

/// Non-crypto series prefixes with their topics.
static SERIES_PREFIXES: &[(&str, CanonicalTopic)] = &[
    ("KXCPI", CanonicalTopic::Macro),
    ("KXGDP", CanonicalTopic::Macro),
    ("KXNFP", CanonicalTopic::Macro),
    ("KXPAYROLL", CanonicalTopic::Macro),
    ("KXU3", CanonicalTopic::Macro),
    ("KXFED", CanonicalTopic::Rates),
    ("KXECB", CanonicalTopic::Rates),
    ("KXNBA", CanonicalTopic::Sports),
    ("KXNFL", CanonicalTopic::Sports),
    ("KXNHL", CanonicalTopic::Sports),
    ("KXMLB", CanonicalTopic::Sports),
    ("KXUFC", CanonicalTopic::Sports),
    ("KXEPL", CanonicalTopic::Sports),
    ("KXOSCAR", CanonicalTopic::Entertainment),
    ("KXGRAMMY", CanonicalTopic::Entertainment),
    ("KXHIGH", CanonicalTopic::Climate),
    ("KXLOW", CanonicalTopic::Climate),
    ("KXSNOW", CanonicalTopic::Climate),
    ("KXOIL", CanonicalTopic::Commodities),
    ("KXGAS", CanonicalTopic::Commodities),
    ("KXGOLD", CanonicalTopic::Commodities),
];

/// Multi-variable event prefix; the topic is usually still SPORTS, so the
/// classifier keeps going after noting it.
const MVE_PREFIX: &str = "KXMV";

fn normalize_category(category: &str) -> String {
    category
        .to_lowercase()
        .replace([' ', '_'], "-")
        .replace("--", "-")
}

fn category_topic(normalized: &str) -> Option<CategoryTopic> {
    use CanonicalTopic::*;
    let direct = |t| Some(CategoryTopic::Direct(t));
    match normalized {
        "crypto" | "cryptocurrency" | "crypto-prices" => Some(CategoryTopic::CryptoFamily),
        "economics" | "economy" | "macro" => direct(Macro),
        "politics" | "elections" | "us-current-affairs" => direct(Elections),
        "world" | "world-affairs" | "geopolitics" => direct(Geopolitics),
        "sports" => direct(Sports),
        "entertainment" | "pop-culture" | "culture" => direct(Entertainment),
        "climate" | "climate-and-weather" | "weather" => direct(Climate),
        "commodities" | "energy" => direct(Commodities),
        "financials" | "finance" | "companies" | "stocks" => direct(Finance),
        _ => None,
    }
}

/// Tag vocabulary observed across both venues' event metadata.
static TAG_TOPICS: &[(&str, CanonicalTopic)] = &[
    ("oil", CanonicalTopic::Commodities),
    ("crude-oil", CanonicalTopic::Commodities),
    ("natural-gas", CanonicalTopic::Commodities),
    ("gold", CanonicalTopic::Commodities),
    ("fed", CanonicalTopic::Rates),
    ("interest-rates", CanonicalTopic::Rates),
    ("fomc", CanonicalTopic::Rates),
    ("inflation", CanonicalTopic::Macro),
    ("jobs-report", CanonicalTopic::Macro),
    ("awards", CanonicalTopic::Entertainment),
    ("movies", CanonicalTopic::Entertainment),
    ("music", CanonicalTopic::Entertainment),
    ("hurricane", CanonicalTopic::Climate),
    ("weather", CanonicalTopic::Climate),
    ("nba", CanonicalTopic::Sports),
    ("nfl", CanonicalTopic::Sports),
    ("soccer", CanonicalTopic::Sports),
    ("bitcoin", CanonicalTopic::CryptoDaily),
    ("ethereum", CanonicalTopic::CryptoDaily),
];

struct KeywordRule {
    topic: CanonicalTopic,
    confidence: f64,
    label: &'static str,
    pattern: &'static str,
}

/// Title keyword rules; confidences are fixed per rule, in [0.70, 0.95].
/// Order matters: the first matching rule wins, so the more specific
/// domains precede the catch-alls.
static KEYWORD_RULES: &[KeywordRule] = &[
    KeywordRule {
        topic: CanonicalTopic::Rates,
        confidence: 0.90,
        label: "central_bank_action",
        pattern: r"\b(fed|fomc|ecb|boe|boj|rate (hike|cut)|basis points|bps)\b",
    },
    KeywordRule {
        topic: CanonicalTopic::Elections,
        confidence: 0.90,
        label: "election_office",
        pattern: r"\b(election|presidential|president|senate|governor|prime minister|mayoral|mayor|ballot|primary|nominee)\b",
    },
    KeywordRule {
        topic: CanonicalTopic::Geopolitics,
        confidence: 0.80,
        label: "conflict_diplomacy",
        pattern: r"\b(war|ceasefire|invasion|invade|sanctions|treaty|nato|annex|territory|missile|nuclear test)\b",
    },
    KeywordRule {
        topic: CanonicalTopic::Entertainment,
        confidence: 0.85,
        label: "awards_media",
        pattern: r"\b(oscars?|academy award|grammys?|emmys?|golden globes?|tonys?|baftas?|box office|album|billboard)\b",
    },
    KeywordRule {
        topic: CanonicalTopic::Climate,
        confidence: 0.85,
        label: "weather_event",
        pattern: r"\b(hurricane|temperature|heat wave|snowfall|snow|rainfall|drought|wildfire|flood|earthquake|volcano)\b",
    },
    KeywordRule {
        topic: CanonicalTopic::Commodities,
        confidence: 0.80,
        label: "commodity_instrument",
        pattern: r"\b(crude oil|wti|brent|natural gas|gold price|silver price|wheat|corn futures)\b",
    },
    KeywordRule {
        topic: CanonicalTopic::Finance,
        confidence: 0.75,
        label: "equity_instrument",
        pattern: r"\b(s&p ?500|nasdaq|dow jones|stock price|ipo|market cap|earnings)\b",
    },
    KeywordRule {
        topic: CanonicalTopic::Sports,
        confidence: 0.80,
        label: "league_or_matchup",
        pattern: r"\b(nba|nfl|nhl|mlb|ufc|premier league|super bowl|world series|stanley cup|grand slam)\b",
    },
];

static KEYWORD_RES: Lazy<Vec<(usize, Regex)>> = Lazy::new(|| {
    KEYWORD_RULES
        .iter()
        .enumerate()
        .map(|(i, rule)| {
            (
                i,
                Regex::new(&format!("(?i){}", rule.pattern)).expect("keyword rule regex"),
            )
        })
        .collect()
});

static CRYPTO_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(bitcoin|ethereum|solana|dogecoin)\b|(^|[^a-zA-Z0-9])\$?(btc|eth|sol|xrp|doge)([^a-zA-Z0-9]|$)")
        .expect("crypto name regex")
});

fn classify_crypto_family(market: &Market, source: TaxonomySource, reason: String) -> Classification {
    let fp = build_fingerprint(&market.title, market.close_time, &market.metadata);
    if fp.intent == TitleIntent::UpDown {
        Classification::new(CanonicalTopic::CryptoIntraday, 0.85, source, reason)
    } else {
        Classification::new(CanonicalTopic::CryptoDaily, 0.85, source, reason)
    }
}

/// Classify a market into a canonical topic.
///
/// The event argument carries exchange event metadata when the caller has
/// it; its category participates in the category-map step.
#[must_use]
pub fn classify(market: &Market, event: Option<&KalshiEvent>) -> Classification {
    // 1. Exchange series-ticker patterns
    if market.venue == Venue::Kalshi {
        if let Some(series) = market.series_ticker() {
            let series = series.to_ascii_uppercase();
            if SERIES_CRYPTO_DAILY_RE.is_match(&series) {
                return Classification::new(
                    CanonicalTopic::CryptoDaily,
                    0.95,
                    TaxonomySource::TickerPattern,
                    format!("series ticker {series} matches daily-threshold pattern"),
                );
            }
            if SERIES_CRYPTO_INTRADAY_RE.is_match(&series) {
                return Classification::new(
                    CanonicalTopic::CryptoIntraday,
                    0.95,
                    TaxonomySource::TickerPattern,
                    format!("series ticker {series} matches intraday up/down pattern"),
                );
            }
            if let Some((prefix, topic)) = SERIES_PREFIXES
                .iter()
                .find(|(p, _)| series.starts_with(p))
            {
                return Classification::new(
                    *topic,
                    0.95,
                    TaxonomySource::TickerPattern,
                    format!("series ticker {series} has known prefix {prefix}"),
                );
            }
            if series.starts_with(MVE_PREFIX) {
                // MVE marker only; fall through for the topic itself
                tracing::debug!(series = %series, "multi-variable series prefix");
            }
        }
    }

    // 2. Category map (market's own category, then the event's)
    let category = market
        .category
        .as_deref()
        .or_else(|| event.and_then(|e| e.category.as_deref()));
    if let Some(raw) = category {
        let normalized = normalize_category(raw);
        if let Some(mapped) = category_topic(&normalized) {
            let reason = format!("category '{raw}' maps to topic");
            return match mapped {
                CategoryTopic::Direct(topic) => {
                    Classification::new(topic, 0.90, TaxonomySource::Category, reason)
                }
                CategoryTopic::CryptoFamily => {
                    classify_crypto_family(market, TaxonomySource::Category, reason)
                }
            };
        }
    }

    // 3. Event/series tags from the metadata bag
    if let Some(tags) = market.metadata.get("tags").and_then(|t| t.as_array()) {
        for tag in tags.iter().filter_map(|t| t.as_str()) {
            let normalized = normalize_category(tag);
            if let Some((_, topic)) = TAG_TOPICS.iter().find(|(t, _)| *t == normalized) {
                let reason = format!("tag '{tag}' maps to topic");
                if matches!(topic, CanonicalTopic::CryptoDaily) {
                    return classify_crypto_family(market, TaxonomySource::Metadata, reason);
                }
                return Classification::new(*topic, 0.85, TaxonomySource::Metadata, reason);
            }
        }
    }

    // 4. Title keyword rules
    if CRYPTO_NAME_RE.is_match(&market.title) {
        return classify_crypto_family(
            market,
            TaxonomySource::TitleKeywords,
            "crypto asset named in title".into(),
        );
    }
    if !extract_macro_entities(&market.title).is_empty() {
        return Classification::new(
            CanonicalTopic::Macro,
            0.85,
            TaxonomySource::TitleKeywords,
            "macro indicator named in title",
        );
    }
    for (idx, re) in KEYWORD_RES.iter() {
        if re.is_match(&market.title) {
            let rule = &KEYWORD_RULES[*idx];
            return Classification::new(
                rule.topic,
                rule.confidence,
                TaxonomySource::TitleKeywords,
                format!("title keyword rule '{}'", rule.label),
            );
        }
    }

    // 5. Fallback
    Classification::new(
        CanonicalTopic::Unknown,
        0.0,
        TaxonomySource::Fallback,
        "no classification signal",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::MarketStatus;
    use serde_json::{json, Value};

    fn market(venue: Venue, title: &str, category: Option<&str>, metadata: Value) -> Market {
        Market {
            id: 1,
            venue,
            external_id: "X".into(),
            title: title.into(),
            status: MarketStatus::Active,
            close_time: None,
            category: category.map(String::from),
            metadata,
            derived_topic: None,
            taxonomy_source: None,
            is_mve: false,
            event_ticker: None,
        }
    }

    #[test]
    fn series_ticker_beats_category() {
        let m = market(
            Venue::Kalshi,
            "Bitcoin price today",
            Some("entertainment"),
            json!({"series_ticker": "KXBTCD"}),
        );
        let c = classify(&m, None);
        assert_eq!(c.topic, CanonicalTopic::CryptoDaily);
        assert_eq!(c.source, TaxonomySource::TickerPattern);
        assert!(c.confidence >= 0.95);
    }

    #[test]
    fn intraday_series_ticker() {
        let m = market(
            Venue::Kalshi,
            "BTC up or down",
            None,
            json!({"series_ticker": "KXBTCU"}),
        );
        assert_eq!(classify(&m, None).topic, CanonicalTopic::CryptoIntraday);
    }

    #[test]
    fn macro_series_prefix() {
        let m = market(
            Venue::Kalshi,
            "CPI for March",
            None,
            json!({"series_ticker": "KXCPIYOY"}),
        );
        let c = classify(&m, None);
        assert_eq!(c.topic, CanonicalTopic::Macro);
        assert_eq!(c.source, TaxonomySource::TickerPattern);
    }

    #[test]
    fn category_variants_resolve_equivalently() {
        for cat in ["us-current-affairs", "us current affairs", "US Current Affairs"] {
            let m = market(Venue::Polymarket, "Something happens", Some(cat), Value::Null);
            let c = classify(&m, None);
            assert_eq!(c.topic, CanonicalTopic::Elections, "{cat}");
            assert_eq!(c.source, TaxonomySource::Category);
        }
    }

    #[test]
    fn crypto_category_splits_on_intent() {
        let daily = market(
            Venue::Polymarket,
            "Bitcoin above $100k on Jan 21, 2026?",
            Some("Crypto"),
            Value::Null,
        );
        assert_eq!(classify(&daily, None).topic, CanonicalTopic::CryptoDaily);

        let intraday = market(
            Venue::Polymarket,
            "Bitcoin up or down at 3pm?",
            Some("Crypto"),
            Value::Null,
        );
        assert_eq!(classify(&intraday, None).topic, CanonicalTopic::CryptoIntraday);
    }

    #[test]
    fn oil_tag_maps_to_commodities() {
        let m = market(
            Venue::Kalshi,
            "Price at the pump",
            None,
            json!({"tags": ["Financials", "oil"]}),
        );
        let c = classify(&m, None);
        assert_eq!(c.topic, CanonicalTopic::Commodities);
        assert_eq!(c.source, TaxonomySource::Metadata);
    }

    #[test]
    fn title_keywords_elections() {
        let m = market(
            Venue::Polymarket,
            "2024 US Presidential Election Winner",
            None,
            Value::Null,
        );
        let c = classify(&m, None);
        assert_eq!(c.topic, CanonicalTopic::Elections);
        assert_eq!(c.source, TaxonomySource::TitleKeywords);
        assert!((0.70..=0.95).contains(&c.confidence));
    }

    #[test]
    fn title_keywords_crypto_respects_ticker_boundaries() {
        let m = market(Venue::Polymarket, "Pete Hegseth nomination", None, Value::Null);
        let c = classify(&m, None);
        // "eth" inside "Hegseth" must not classify as crypto
        assert_ne!(c.topic, CanonicalTopic::CryptoDaily);
        assert_ne!(c.topic, CanonicalTopic::CryptoIntraday);
    }

    #[test]
    fn fallback_is_unknown_with_zero_confidence() {
        let m = market(Venue::Polymarket, "Will the thing happen?", None, Value::Null);
        let c = classify(&m, None);
        assert_eq!(c.topic, CanonicalTopic::Unknown);
        assert_eq!(c.confidence, 0.0);
        assert_eq!(c.source, TaxonomySource::Fallback);
    }

    #[test]
    fn event_category_used_when_market_has_none() {
        let event = KalshiEvent {
            event_ticker: "KXRAIN-26MAR".into(),
            series_ticker: None,
            title: "Rainfall".into(),
            subtitle: None,
            category: Some("Climate and Weather".into()),
            strike_date: None,
            mutually_exclusive: true,
            market_count: 2,
        };
        let m = market(Venue::Kalshi, "Over 2 inches of rain in Seattle?", None, Value::Null);
        let c = classify(&m, Some(&event));
        assert_eq!(c.topic, CanonicalTopic::Climate);
    }

    #[test]
    fn every_market_gets_a_canonical_topic() {
        for title in ["", "x", "Will BTC?", "Random words here"] {
            let m = market(Venue::Polymarket, title, None, Value::Null);
            let c = classify(&m, None);
            assert!(CanonicalTopic::ALL.contains(&c.topic));
        }
    }
}
