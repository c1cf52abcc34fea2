//! Market-related domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::topic::{CanonicalTopic, TaxonomySource};

/// A trading venue carrying prediction markets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    Kalshi,
    Polymarket,
}

impl Venue {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Kalshi => "kalshi",
            Self::Polymarket => "polymarket",
        }
    }

    /// The venue on the other side of a cross-venue pair.
    #[must_use]
    pub const fn other(&self) -> Self {
        match self {
            Self::Kalshi => Self::Polymarket,
            Self::Polymarket => Self::Kalshi,
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kalshi" => Some(Self::Kalshi),
            "polymarket" => Some(Self::Polymarket),
            _ => None,
        }
    }
}

impl std::fmt::Display for Venue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a market at its venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    Active,
    Closed,
    Resolved,
    Archived,
}

impl MarketStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Closed => "closed",
            Self::Resolved => "resolved",
            Self::Archived => "archived",
        }
    }

    /// Resolved and archived markets never re-enter matching.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Archived)
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" | "open" => Some(Self::Active),
            "closed" => Some(Self::Closed),
            "resolved" | "settled" | "finalized" => Some(Self::Resolved),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

impl std::fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A binary side of a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeSide {
    Yes,
    No,
}

/// One side of a binary market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub market_id: i64,
    pub side: OutcomeSide,
    pub external_id: String,
}

/// A question being traded at a venue.
///
/// `(venue, external_id)` is unique. `metadata` is the venue's opaque
/// key-value bag; it is read defensively by the classifier and the signal
/// extractors and never leaks into scoring.
#[derive(Debug, Clone)]
pub struct Market {
    pub id: i64,
    pub venue: Venue,
    pub external_id: String,
    pub title: String,
    pub status: MarketStatus,
    pub close_time: Option<DateTime<Utc>>,
    pub category: Option<String>,
    pub metadata: Value,
    pub derived_topic: Option<CanonicalTopic>,
    pub taxonomy_source: Option<TaxonomySource>,
    pub is_mve: bool,
    /// Exchange venue only: parent event ticker.
    pub event_ticker: Option<String>,
}

impl Market {
    /// Read a string field from the metadata bag, trying each key in order.
    ///
    /// Venue payloads disagree on casing (`series_ticker` vs `seriesTicker`),
    /// so callers pass every spelling they accept.
    #[must_use]
    pub fn meta_str(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .find_map(|k| self.metadata.get(k).and_then(Value::as_str))
            .filter(|s| !s.is_empty())
    }

    /// Read a boolean field from the metadata bag, trying each key in order.
    #[must_use]
    pub fn meta_bool(&self, keys: &[&str]) -> Option<bool> {
        keys.iter()
            .find_map(|k| self.metadata.get(k).and_then(Value::as_bool))
    }

    /// Series ticker for exchange markets, read from metadata.
    #[must_use]
    pub fn series_ticker(&self) -> Option<&str> {
        self.meta_str(&["series_ticker", "seriesTicker"])
    }

    /// Event ticker, preferring the structured link over metadata.
    #[must_use]
    pub fn event_ticker(&self) -> Option<&str> {
        self.event_ticker
            .as_deref()
            .or_else(|| self.meta_str(&["event_ticker", "eventTicker"]))
    }
}

/// Raw market DTO as yielded by a venue adapter, before persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMarket {
    pub venue: Venue,
    pub external_id: String,
    pub title: String,
    pub status: MarketStatus,
    pub close_time: Option<DateTime<Utc>>,
    pub category: Option<String>,
    #[serde(default)]
    pub metadata: Value,
}

/// A price observation for one market side.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub venue: Venue,
    pub market_id: i64,
    pub yes_price: Decimal,
    pub captured_at: DateTime<Utc>,
}

/// Decide whether a new quote observation should be persisted.
///
/// Records on a heartbeat: once `min_interval_secs` has elapsed since the
/// last stored quote the new observation is written even at an unchanged
/// price. The freshness probe counts recent quotes per venue, so suppressing
/// unchanged prices would make quiet venues look stale.
#[must_use]
pub fn should_record_quote(
    last: Option<&Quote>,
    next: &Quote,
    min_interval_secs: i64,
) -> bool {
    match last {
        None => true,
        Some(prev) => {
            if prev.yes_price != next.yes_price {
                return true;
            }
            let elapsed = next
                .captured_at
                .signed_duration_since(prev.captured_at)
                .num_seconds();
            elapsed >= min_interval_secs
        }
    }
}

/// Per-(venue, job) ingestion bookkeeping.
#[derive(Debug, Clone)]
pub struct IngestionState {
    pub venue: Venue,
    pub job_name: String,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
}

/// A watchlist entry; rebuilt every operational cycle, never authoritative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchlistEntry {
    pub venue: Venue,
    pub market_id: i64,
    pub priority: i32,
    pub reason: String,
}

impl WatchlistEntry {
    pub const PRIORITY_CONFIRMED: i32 = 100;
    pub const PRIORITY_CANDIDATE_SAFE: i32 = 80;
    pub const PRIORITY_TOP_SUGGESTED: i32 = 50;
}

/// Exchange-venue event grouping; enriches sports signals with
/// authoritative team and start-time data.
#[derive(Debug, Clone)]
pub struct KalshiEvent {
    pub event_ticker: String,
    pub series_ticker: Option<String>,
    pub title: String,
    pub subtitle: Option<String>,
    pub category: Option<String>,
    pub strike_date: Option<DateTime<Utc>>,
    pub mutually_exclusive: bool,
    pub market_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn market_with_metadata(metadata: Value) -> Market {
        Market {
            id: 1,
            venue: Venue::Kalshi,
            external_id: "KXBTC-26JAN21".into(),
            title: "Bitcoin above $100,000 on Jan 21?".into(),
            status: MarketStatus::Active,
            close_time: None,
            category: None,
            metadata,
            derived_topic: None,
            taxonomy_source: None,
            is_mve: false,
            event_ticker: None,
        }
    }

    #[test]
    fn meta_str_tries_each_spelling() {
        let m = market_with_metadata(json!({"seriesTicker": "KXBTCD"}));
        assert_eq!(m.series_ticker(), Some("KXBTCD"));

        let m = market_with_metadata(json!({"series_ticker": "KXBTCD"}));
        assert_eq!(m.series_ticker(), Some("KXBTCD"));

        let m = market_with_metadata(json!({"series_ticker": ""}));
        assert_eq!(m.series_ticker(), None);
    }

    #[test]
    fn event_ticker_prefers_structured_link() {
        let mut m = market_with_metadata(json!({"event_ticker": "FROM-META"}));
        assert_eq!(m.event_ticker(), Some("FROM-META"));

        m.event_ticker = Some("FROM-LINK".into());
        assert_eq!(m.event_ticker(), Some("FROM-LINK"));
    }

    #[test]
    fn terminal_statuses() {
        assert!(MarketStatus::Resolved.is_terminal());
        assert!(MarketStatus::Archived.is_terminal());
        assert!(!MarketStatus::Active.is_terminal());
        assert!(!MarketStatus::Closed.is_terminal());
    }

    #[test]
    fn status_parse_accepts_venue_spellings() {
        assert_eq!(MarketStatus::parse("open"), Some(MarketStatus::Active));
        assert_eq!(MarketStatus::parse("settled"), Some(MarketStatus::Resolved));
        assert_eq!(MarketStatus::parse("finalized"), Some(MarketStatus::Resolved));
    }

    #[test]
    fn quote_heartbeat_records_unchanged_price_after_interval() {
        let t0 = Utc::now();
        let prev = Quote {
            venue: Venue::Kalshi,
            market_id: 1,
            yes_price: dec!(0.42),
            captured_at: t0,
        };

        let same_price_soon = Quote {
            captured_at: t0 + Duration::seconds(10),
            ..prev.clone()
        };
        assert!(!should_record_quote(Some(&prev), &same_price_soon, 60));

        let same_price_later = Quote {
            captured_at: t0 + Duration::seconds(60),
            ..prev.clone()
        };
        assert!(should_record_quote(Some(&prev), &same_price_later, 60));

        let changed_price = Quote {
            yes_price: dec!(0.43),
            captured_at: t0 + Duration::seconds(5),
            ..prev.clone()
        };
        assert!(should_record_quote(Some(&prev), &changed_price, 60));

        assert!(should_record_quote(None, &prev, 60));
    }
}
