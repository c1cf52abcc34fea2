//! Venue adapters: the feed port, HTTP clients, auth, and retry plumbing.

pub mod kalshi;
pub mod polymarket;
pub mod retry;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::core::domain::{RawMarket, Venue};
use crate::error::Result;

/// Pagination parameters for a market fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchParams {
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

/// One page of raw markets.
#[derive(Debug, Clone)]
pub struct FetchPage {
    pub markets: Vec<RawMarket>,
    pub next_cursor: Option<String>,
}

/// A price observation before persistence.
#[derive(Debug, Clone)]
pub struct RawQuote {
    pub venue: Venue,
    pub external_id: String,
    pub yes_price: Decimal,
    pub captured_at: DateTime<Utc>,
}

/// The adapter port every venue client implements.
#[async_trait]
pub trait MarketFeed: Send + Sync {
    fn venue(&self) -> Venue;

    /// Fetch one page of markets.
    async fn fetch_markets(&self, params: &FetchParams) -> Result<FetchPage>;

    /// Fetch current quotes for the given markets.
    async fn fetch_quotes(&self, markets: &[RawMarket]) -> Result<Vec<RawQuote>>;
}
