//! Database row types for Diesel ORM, with conversions to domain types.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;

use super::schema::{ingestion_state, kalshi_events, market_links, markets, quote_watchlist, quotes};
use crate::core::domain::{
    CanonicalTopic, IngestionState, KalshiEvent, LinkStatus, Market, MarketLink, MarketStatus,
    Quote, TaxonomySource, Venue, WatchlistEntry,
};
use crate::error::{Error, Result};

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Parse(format!("bad timestamp '{raw}': {e}")))
}

fn parse_optional_timestamp(raw: &Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.as_deref().map(parse_timestamp).transpose()
}

/// Database row for a market.
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = markets)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MarketRow {
    pub id: i64,
    pub venue: String,
    pub external_id: String,
    pub title: String,
    pub status: String,
    pub close_time: Option<String>,
    pub category: Option<String>,
    pub metadata: String,
    pub derived_topic: Option<String>,
    pub taxonomy_source: Option<String>,
    pub is_mve: i32,
    pub event_ticker: Option<String>,
}

/// Insertable market row; the id comes from sqlite.
#[derive(Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = markets)]
pub struct NewMarketRow {
    pub venue: String,
    pub external_id: String,
    pub title: String,
    pub status: String,
    pub close_time: Option<String>,
    pub category: Option<String>,
    pub metadata: String,
}

impl TryFrom<MarketRow> for Market {
    type Error = Error;

    fn try_from(row: MarketRow) -> Result<Market> {
        let venue = Venue::parse(&row.venue)
            .ok_or_else(|| Error::Parse(format!("bad venue '{}'", row.venue)))?;
        let status = MarketStatus::parse(&row.status)
            .ok_or_else(|| Error::Parse(format!("bad status '{}'", row.status)))?;
        let derived_topic = row
            .derived_topic
            .as_deref()
            .map(|t| {
                CanonicalTopic::parse(t)
                    .ok_or_else(|| Error::Parse(format!("bad topic '{t}'")))
            })
            .transpose()?;
        let taxonomy_source = row.taxonomy_source.as_deref().and_then(TaxonomySource::parse);
        Ok(Market {
            id: row.id,
            venue,
            external_id: row.external_id,
            title: row.title,
            status,
            close_time: parse_optional_timestamp(&row.close_time)?,
            category: row.category,
            metadata: serde_json::from_str(&row.metadata).unwrap_or(serde_json::Value::Null),
            derived_topic,
            taxonomy_source,
            is_mve: row.is_mve != 0,
            event_ticker: row.event_ticker,
        })
    }
}

/// Database row for a link.
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = market_links)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MarketLinkRow {
    pub id: i64,
    pub left_venue: String,
    pub left_market_id: i64,
    pub right_venue: String,
    pub right_market_id: i64,
    pub score: f64,
    pub status: String,
    pub reason: String,
    pub topic: String,
    pub algo_version: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = market_links)]
pub struct NewMarketLinkRow {
    pub left_venue: String,
    pub left_market_id: i64,
    pub right_venue: String,
    pub right_market_id: i64,
    pub score: f64,
    pub status: String,
    pub reason: String,
    pub topic: String,
    pub algo_version: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<MarketLinkRow> for MarketLink {
    type Error = Error;

    fn try_from(row: MarketLinkRow) -> Result<MarketLink> {
        Ok(MarketLink {
            id: row.id,
            left_venue: Venue::parse(&row.left_venue)
                .ok_or_else(|| Error::Parse(format!("bad venue '{}'", row.left_venue)))?,
            left_market_id: row.left_market_id,
            right_venue: Venue::parse(&row.right_venue)
                .ok_or_else(|| Error::Parse(format!("bad venue '{}'", row.right_venue)))?,
            right_market_id: row.right_market_id,
            score: row.score,
            status: LinkStatus::parse(&row.status)
                .ok_or_else(|| Error::Parse(format!("bad link status '{}'", row.status)))?,
            reason: row.reason,
            topic: CanonicalTopic::parse(&row.topic)
                .ok_or_else(|| Error::Parse(format!("bad topic '{}'", row.topic)))?,
            algo_version: row.algo_version,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

/// Database row for a quote.
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = quotes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct QuoteRow {
    pub id: i64,
    pub venue: String,
    pub market_id: i64,
    pub yes_price: String,
    pub captured_at: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = quotes)]
pub struct NewQuoteRow {
    pub venue: String,
    pub market_id: i64,
    pub yes_price: String,
    pub captured_at: String,
}

impl TryFrom<QuoteRow> for Quote {
    type Error = Error;

    fn try_from(row: QuoteRow) -> Result<Quote> {
        Ok(Quote {
            venue: Venue::parse(&row.venue)
                .ok_or_else(|| Error::Parse(format!("bad venue '{}'", row.venue)))?,
            market_id: row.market_id,
            yes_price: Decimal::from_str(&row.yes_price)
                .map_err(|e| Error::Parse(format!("bad price '{}': {e}", row.yes_price)))?,
            captured_at: parse_timestamp(&row.captured_at)?,
        })
    }
}

/// Database row for a watchlist entry.
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = quote_watchlist)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct WatchlistRow {
    pub id: i64,
    pub venue: String,
    pub market_id: i64,
    pub priority: i32,
    pub reason: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = quote_watchlist)]
pub struct NewWatchlistRow {
    pub venue: String,
    pub market_id: i64,
    pub priority: i32,
    pub reason: String,
}

impl TryFrom<WatchlistRow> for WatchlistEntry {
    type Error = Error;

    fn try_from(row: WatchlistRow) -> Result<WatchlistEntry> {
        Ok(WatchlistEntry {
            venue: Venue::parse(&row.venue)
                .ok_or_else(|| Error::Parse(format!("bad venue '{}'", row.venue)))?,
            market_id: row.market_id,
            priority: row.priority,
            reason: row.reason,
        })
    }
}

/// Database row for ingestion state.
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = ingestion_state)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct IngestionStateRow {
    pub id: i64,
    pub venue: String,
    pub job_name: String,
    pub last_success_at: Option<String>,
    pub last_error: Option<String>,
    pub consecutive_failures: i32,
}

impl TryFrom<IngestionStateRow> for IngestionState {
    type Error = Error;

    fn try_from(row: IngestionStateRow) -> Result<IngestionState> {
        Ok(IngestionState {
            venue: Venue::parse(&row.venue)
                .ok_or_else(|| Error::Parse(format!("bad venue '{}'", row.venue)))?,
            job_name: row.job_name,
            last_success_at: parse_optional_timestamp(&row.last_success_at)?,
            last_error: row.last_error,
            consecutive_failures: row.consecutive_failures.max(0) as u32,
        })
    }
}

/// Database row for an exchange event.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = kalshi_events)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct KalshiEventRow {
    pub event_ticker: String,
    pub series_ticker: Option<String>,
    pub title: String,
    pub subtitle: Option<String>,
    pub category: Option<String>,
    pub strike_date: Option<String>,
    pub mutually_exclusive: i32,
    pub market_count: i32,
}

impl TryFrom<KalshiEventRow> for KalshiEvent {
    type Error = Error;

    fn try_from(row: KalshiEventRow) -> Result<KalshiEvent> {
        Ok(KalshiEvent {
            event_ticker: row.event_ticker,
            series_ticker: row.series_ticker,
            title: row.title,
            subtitle: row.subtitle,
            category: row.category,
            strike_date: parse_optional_timestamp(&row.strike_date)?,
            mutually_exclusive: row.mutually_exclusive != 0,
            market_count: row.market_count.max(0) as u32,
        })
    }
}

impl From<&KalshiEvent> for KalshiEventRow {
    fn from(event: &KalshiEvent) -> Self {
        Self {
            event_ticker: event.event_ticker.clone(),
            series_ticker: event.series_ticker.clone(),
            title: event.title.clone(),
            subtitle: event.subtitle.clone(),
            category: event.category.clone(),
            strike_date: event.strike_date.map(|t| t.to_rfc3339()),
            mutually_exclusive: i32::from(event.mutually_exclusive),
            market_count: event.market_count as i32,
        }
    }
}
