//! Crypto signal extraction (daily and intraday).

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use super::{Direction, SettleDateType};
use crate::core::domain::fingerprint::{
    build_fingerprint, compile_ticker_regex, Comparator, DatePrecision, TitleIntent,
};
use crate::core::domain::Market;

/// The crypto assets this system matches across venues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CryptoEntity {
    Bitcoin,
    Ethereum,
    Solana,
    Xrp,
    Dogecoin,
}

impl CryptoEntity {
    pub const ALL: [CryptoEntity; 5] = [
        CryptoEntity::Bitcoin,
        CryptoEntity::Ethereum,
        CryptoEntity::Solana,
        CryptoEntity::Xrp,
        CryptoEntity::Dogecoin,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bitcoin => "BITCOIN",
            Self::Ethereum => "ETHEREUM",
            Self::Solana => "SOLANA",
            Self::Xrp => "XRP",
            Self::Dogecoin => "DOGECOIN",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BITCOIN" => Some(Self::Bitcoin),
            "ETHEREUM" => Some(Self::Ethereum),
            "SOLANA" => Some(Self::Solana),
            "XRP" => Some(Self::Xrp),
            "DOGECOIN" => Some(Self::Dogecoin),
            _ => None,
        }
    }

    /// Full asset name; long enough to match by substring.
    #[must_use]
    pub const fn full_name(&self) -> &'static str {
        match self {
            Self::Bitcoin => "bitcoin",
            Self::Ethereum => "ethereum",
            Self::Solana => "solana",
            Self::Xrp => "ripple",
            Self::Dogecoin => "dogecoin",
        }
    }

    /// Short ticker; matches only at word boundaries.
    #[must_use]
    pub const fn ticker(&self) -> &'static str {
        match self {
            Self::Bitcoin => "btc",
            Self::Ethereum => "eth",
            Self::Solana => "sol",
            Self::Xrp => "xrp",
            Self::Dogecoin => "doge",
        }
    }
}

impl std::fmt::Display for CryptoEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

static TICKER_RES: Lazy<Vec<(CryptoEntity, Regex)>> = Lazy::new(|| {
    CryptoEntity::ALL
        .iter()
        .map(|e| {
            (
                *e,
                compile_ticker_regex(e.ticker()).expect("ticker regex"),
            )
        })
        .collect()
});

/// Extract the crypto asset a title is about, or None.
///
/// Full names match by substring; tickers only at word boundaries, so
/// "Hegseth" and "solution" stay out.
#[must_use]
pub fn extract_crypto_entity(title: &str) -> Option<CryptoEntity> {
    let lower = title.to_lowercase();
    for entity in CryptoEntity::ALL {
        if lower.contains(entity.full_name()) {
            return Some(entity);
        }
    }
    TICKER_RES
        .iter()
        .find(|(_, re)| re.is_match(&lower))
        .map(|(e, _)| *e)
}

/// Shape of the crypto market question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoMarketType {
    DailyThreshold,
    DailyRange,
    YearlyThreshold,
    IntradayUpdown,
}

impl CryptoMarketType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DailyThreshold => "DAILY_THRESHOLD",
            Self::DailyRange => "DAILY_RANGE",
            Self::YearlyThreshold => "YEARLY_THRESHOLD",
            Self::IntradayUpdown => "INTRADAY_UPDOWN",
        }
    }

    #[must_use]
    pub const fn is_intraday(&self) -> bool {
        matches!(self, Self::IntradayUpdown)
    }
}

/// What a number in a crypto title refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceContext {
    Price,
    Threshold,
    Unknown,
}

impl PriceContext {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Threshold => "threshold",
            Self::Unknown => "unknown",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "price" => Some(Self::Price),
            "threshold" => Some(Self::Threshold),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// A price extracted from a crypto title, tagged by role.
#[derive(Debug, Clone, PartialEq)]
pub struct CryptoPrice {
    pub value: f64,
    pub context: PriceContext,
}

/// Typed signal bundle for crypto markets.
#[derive(Debug, Clone)]
pub struct CryptoSignals {
    pub entity: Option<CryptoEntity>,
    pub market_type: CryptoMarketType,
    pub settle_date: Option<NaiveDate>,
    pub date_type: SettleDateType,
    /// `YYYY-MM`, `YYYY-Qn`, or `YYYY` when the settle is not day-pinned.
    pub settle_period: Option<String>,
    pub prices: Vec<CryptoPrice>,
    pub comparator: Comparator,
    /// Intraday only: hour-truncated settle instant.
    pub time_bucket: Option<DateTime<Utc>>,
    pub direction: Option<Direction>,
    pub confidence: f64,
}

impl CryptoSignals {
    /// Primary index key: `entity|settle`, where settle is the day for
    /// day-pinned markets and the period otherwise.
    #[must_use]
    pub fn index_key(&self) -> Option<String> {
        let entity = self.entity?;
        if let Some(date) = self.settle_date {
            return Some(format!("{}|{}", entity.as_str(), date.format("%Y-%m-%d")));
        }
        self.settle_period
            .as_ref()
            .map(|p| format!("{}|{}", entity.as_str(), p))
    }

    /// Intraday index key: `entity|bucket`.
    #[must_use]
    pub fn intraday_key(&self) -> Option<String> {
        let entity = self.entity?;
        let bucket = self.time_bucket?;
        Some(format!(
            "{}|{}",
            entity.as_str(),
            bucket.format("%Y-%m-%dT%H:00Z")
        ))
    }

    /// Threshold-context values, for number agreement scoring.
    #[must_use]
    pub fn threshold_values(&self) -> Vec<f64> {
        self.prices
            .iter()
            .filter(|p| p.context != PriceContext::Unknown)
            .map(|p| p.value)
            .collect()
    }
}

static DOWN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bdown\b").expect("down regex"));
static UP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bup\b").expect("up regex"));
static MONTH_END_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(end of|by the end of|month.end)\b").expect("month end regex"));

fn looks_like_year(value: f64) -> bool {
    value.fract() == 0.0 && (1900.0..=2100.0).contains(&value)
}

/// Extract the crypto signal bundle from a market.
#[must_use]
pub fn extract_crypto_signals(market: &Market) -> CryptoSignals {
    let fp = build_fingerprint(&market.title, market.close_time, &market.metadata);
    let entity = extract_crypto_entity(&market.title);

    // Market type from phrasing
    let only_year_date = !fp.dates.is_empty()
        && fp.dates.iter().all(|d| d.precision == DatePrecision::Year);
    let market_type = if fp.intent == TitleIntent::UpDown {
        CryptoMarketType::IntradayUpdown
    } else if fp.comparator == Comparator::Between {
        CryptoMarketType::DailyRange
    } else if only_year_date {
        CryptoMarketType::YearlyThreshold
    } else {
        CryptoMarketType::DailyThreshold
    };

    // Settle date / period
    let day = fp
        .dates
        .iter()
        .find(|d| d.precision == DatePrecision::Day)
        .and_then(|d| d.naive_date());
    let month = fp
        .dates
        .iter()
        .find(|d| d.precision == DatePrecision::Month);
    let quarter = fp
        .dates
        .iter()
        .find(|d| d.precision == DatePrecision::Quarter);
    let year_only = fp
        .dates
        .iter()
        .find(|d| d.precision == DatePrecision::Year);

    let (settle_date, date_type, settle_period) = if market_type.is_intraday() {
        let date = market.close_time.map(|t| t.date_naive());
        (date, SettleDateType::CloseTime, None)
    } else if let Some(date) = day {
        (Some(date), SettleDateType::DayExact, None)
    } else if let Some(m) = month {
        // A month-precision settle means "by the end of the month" whether
        // or not the title says so.
        let _ = MONTH_END_RE.is_match(&market.title);
        (None, SettleDateType::MonthEnd, m.period_key())
    } else if let Some(q) = quarter {
        (None, SettleDateType::Quarter, q.period_key())
    } else if let Some(y) = year_only {
        (None, SettleDateType::Unknown, Some(y.year.to_string()))
    } else if let Some(close) = market.close_time {
        (
            Some(close.date_naive()),
            SettleDateType::CloseTime,
            None,
        )
    } else {
        (None, SettleDateType::Unknown, None)
    };

    // Prices with context tags; bare year-looking numbers are calendar, not
    // price.
    let directional = matches!(
        fp.comparator,
        Comparator::Ge | Comparator::Le | Comparator::Eq | Comparator::Between
    );
    let prices: Vec<CryptoPrice> = fp
        .numbers
        .iter()
        .filter(|n| !(!n.monetary && !n.percent && looks_like_year(n.value)))
        .map(|n| {
            let context = if n.monetary && directional {
                PriceContext::Threshold
            } else if n.monetary {
                PriceContext::Price
            } else {
                PriceContext::Unknown
            };
            CryptoPrice {
                value: n.value,
                context,
            }
        })
        .collect();

    // Intraday extras
    let (time_bucket, direction) = if market_type.is_intraday() {
        let bucket = market.close_time.map(|t| {
            t.with_minute(0)
                .and_then(|t| t.with_second(0))
                .and_then(|t| t.with_nanosecond(0))
                .unwrap_or(t)
        });
        let direction = if DOWN_RE.is_match(&market.title) && !UP_RE.is_match(&market.title) {
            Some(Direction::Down)
        } else if UP_RE.is_match(&market.title) {
            Some(Direction::Up)
        } else {
            None
        };
        (bucket, direction)
    } else {
        (None, None)
    };

    let confidence = match (entity, settle_date.is_some() || settle_period.is_some()) {
        (Some(_), true) => 1.0,
        (Some(_), false) => 0.6,
        (None, _) => 0.0,
    };

    CryptoSignals {
        entity,
        market_type,
        settle_date,
        date_type,
        settle_period,
        prices,
        comparator: fp.comparator,
        time_bucket,
        direction,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{MarketStatus, Venue};
    use chrono::TimeZone;
    use serde_json::Value;

    fn market(title: &str, close_time: Option<DateTime<Utc>>) -> Market {
        Market {
            id: 1,
            venue: Venue::Polymarket,
            external_id: "X".into(),
            title: title.into(),
            status: MarketStatus::Active,
            close_time,
            category: None,
            metadata: Value::Null,
            derived_topic: None,
            taxonomy_source: None,
            is_mve: false,
            event_ticker: None,
        }
    }

    #[test]
    fn entity_ticker_hygiene() {
        assert_eq!(extract_crypto_entity("Pete Hegseth nomination"), None);
        assert_eq!(
            extract_crypto_entity("$ETH to $5000"),
            Some(CryptoEntity::Ethereum)
        );
        assert_eq!(
            extract_crypto_entity("Bitcoin above $100k"),
            Some(CryptoEntity::Bitcoin)
        );
        assert_eq!(extract_crypto_entity("the solution to everything"), None);
        assert_eq!(
            extract_crypto_entity("SOL above $200"),
            Some(CryptoEntity::Solana)
        );
        assert_eq!(extract_crypto_entity("Kenneth wins"), None);
    }

    #[test]
    fn daily_threshold_signals() {
        let m = market("Bitcoin above $100,000 on Jan 21, 2026?", None);
        let s = extract_crypto_signals(&m);
        assert_eq!(s.entity, Some(CryptoEntity::Bitcoin));
        assert_eq!(s.market_type, CryptoMarketType::DailyThreshold);
        assert_eq!(s.date_type, SettleDateType::DayExact);
        assert_eq!(s.settle_date, NaiveDate::from_ymd_opt(2026, 1, 21));
        assert_eq!(s.comparator, Comparator::Ge);
        assert_eq!(s.threshold_values(), vec![100_000.0]);
        assert_eq!(s.confidence, 1.0);
        assert_eq!(
            s.index_key().as_deref(),
            Some("BITCOIN|2026-01-21")
        );
    }

    #[test]
    fn range_market() {
        let m = market("BTC between $99k and $101k on Jan 21, 2026", None);
        let s = extract_crypto_signals(&m);
        assert_eq!(s.market_type, CryptoMarketType::DailyRange);
        assert_eq!(s.threshold_values(), vec![99_000.0, 101_000.0]);
    }

    #[test]
    fn month_end_period() {
        let m = market("Ethereum above $5k by the end of March 2026?", None);
        let s = extract_crypto_signals(&m);
        assert_eq!(s.date_type, SettleDateType::MonthEnd);
        assert_eq!(s.settle_period.as_deref(), Some("2026-03"));
        assert_eq!(s.index_key().as_deref(), Some("ETHEREUM|2026-03"));
    }

    #[test]
    fn quarter_period() {
        let m = market("Solana above $500 in Q2 2026?", None);
        let s = extract_crypto_signals(&m);
        assert_eq!(s.date_type, SettleDateType::Quarter);
        assert_eq!(s.settle_period.as_deref(), Some("2026-Q2"));
    }

    #[test]
    fn yearly_threshold() {
        let m = market("Bitcoin to hit $200k in 2026?", None);
        let s = extract_crypto_signals(&m);
        assert_eq!(s.market_type, CryptoMarketType::YearlyThreshold);
        assert_eq!(s.settle_period.as_deref(), Some("2026"));
        // The bare 2026 is calendar, not a price
        assert_eq!(s.threshold_values(), vec![200_000.0]);
    }

    #[test]
    fn close_time_fallback() {
        let close = Utc.with_ymd_and_hms(2026, 1, 21, 17, 0, 0).unwrap();
        let m = market("Bitcoin above $100k?", Some(close));
        let s = extract_crypto_signals(&m);
        assert_eq!(s.date_type, SettleDateType::CloseTime);
        assert_eq!(s.settle_date, NaiveDate::from_ymd_opt(2026, 1, 21));
    }

    #[test]
    fn intraday_updown() {
        let close = Utc.with_ymd_and_hms(2026, 1, 21, 15, 0, 0).unwrap();
        let m = market("Bitcoin up or down at 3pm EST?", Some(close));
        let s = extract_crypto_signals(&m);
        assert_eq!(s.market_type, CryptoMarketType::IntradayUpdown);
        assert_eq!(
            s.intraday_key().as_deref(),
            Some("BITCOIN|2026-01-21T15:00Z")
        );
    }

    #[test]
    fn intraday_direction() {
        let close = Utc.with_ymd_and_hms(2026, 1, 21, 15, 30, 0, ).unwrap();
        let m = market("Ethereum down at 3:30pm?", Some(close));
        let s = extract_crypto_signals(&m);
        assert_eq!(s.market_type, CryptoMarketType::IntradayUpdown);
        assert_eq!(s.direction, Some(Direction::Down));
        // Bucket truncates to the hour
        assert_eq!(
            s.intraday_key().as_deref(),
            Some("ETHEREUM|2026-01-21T15:00Z")
        );
    }

    #[test]
    fn no_entity_no_key() {
        let m = market("Will something happen Jan 21, 2026?", None);
        let s = extract_crypto_signals(&m);
        assert_eq!(s.entity, None);
        assert_eq!(s.index_key(), None);
        assert_eq!(s.confidence, 0.0);
    }
}
