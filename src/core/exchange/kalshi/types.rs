//! Kalshi API DTOs and conversions into domain types.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::core::domain::{KalshiEvent, MarketStatus, RawMarket, Venue};

/// A market as the trade API returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiMarket {
    pub ticker: String,
    #[serde(default)]
    pub event_ticker: Option<String>,
    pub title: String,
    pub status: String,
    #[serde(default)]
    pub close_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub yes_bid: Option<i64>,
    #[serde(default)]
    pub yes_ask: Option<i64>,
}

impl ApiMarket {
    /// Convert into the adapter DTO, deriving the series ticker from the
    /// event ticker prefix (everything before the first `-`).
    #[must_use]
    pub fn into_raw(self) -> RawMarket {
        let series_ticker = self
            .event_ticker
            .as_deref()
            .and_then(|t| t.split('-').next())
            .map(str::to_string);
        let status = MarketStatus::parse(&self.status).unwrap_or(MarketStatus::Archived);
        RawMarket {
            venue: Venue::Kalshi,
            external_id: self.ticker.clone(),
            title: self.title,
            status,
            close_time: self.close_time,
            category: self.category,
            metadata: json!({
                "ticker": self.ticker,
                "event_ticker": self.event_ticker,
                "series_ticker": series_ticker,
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketsResponse {
    #[serde(default)]
    pub markets: Vec<ApiMarket>,
    #[serde(default)]
    pub cursor: Option<String>,
}

/// An event as the trade API returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEvent {
    pub event_ticker: String,
    #[serde(default)]
    pub series_ticker: Option<String>,
    pub title: String,
    #[serde(default)]
    pub sub_title: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub strike_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub mutually_exclusive: bool,
    #[serde(default)]
    pub markets: Option<Vec<ApiMarket>>,
}

impl ApiEvent {
    #[must_use]
    pub fn into_domain(self) -> KalshiEvent {
        let market_count = self.markets.as_ref().map_or(0, Vec::len) as u32;
        KalshiEvent {
            event_ticker: self.event_ticker,
            series_ticker: self.series_ticker,
            title: self.title,
            subtitle: self.sub_title,
            category: self.category,
            strike_date: self.strike_date,
            mutually_exclusive: self.mutually_exclusive,
            market_count,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventsResponse {
    #[serde(default)]
    pub events: Vec<ApiEvent>,
    #[serde(default)]
    pub cursor: Option<String>,
}

/// A series as the trade API returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSeries {
    pub ticker: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeriesResponse {
    #[serde(default)]
    pub series: Vec<ApiSeries>,
}
