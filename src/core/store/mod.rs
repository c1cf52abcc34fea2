//! Persistence port with pluggable storage backends.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::core::domain::{
    CanonicalTopic, IngestionState, KalshiEvent, LinkStatus, Market, MarketLink, Quote, RawMarket,
    TaxonomySource, Venue, WatchlistEntry,
};
use crate::error::Result;

/// Query shape for eligible-market listings.
#[derive(Debug, Clone, Default)]
pub struct EligibleMarketQuery {
    pub lookback_hours: Option<i64>,
    pub forward_hours: Option<i64>,
    pub grace_minutes: Option<i64>,
    pub limit: Option<usize>,
    /// Titles must contain at least one keyword (case-insensitive).
    pub title_keywords: Vec<String>,
    /// Titles must match at least one of these regex patterns; used by the
    /// crypto fetch path with the ticker-boundary patterns.
    pub ticker_patterns: Vec<String>,
    pub include_terminal: bool,
    /// Multi-variable markets are excluded unless this is set.
    pub include_mve: bool,
    /// Markets with `derived_topic = SPORTS` are excluded when set.
    pub exclude_sports: bool,
}

/// The single write path for links, keyed by the market pair.
#[derive(Debug, Clone)]
pub struct SuggestionUpsert {
    pub left_venue: Venue,
    pub left_market_id: i64,
    pub right_venue: Venue,
    pub right_market_id: i64,
    pub score: f64,
    pub reason: String,
    pub algo_version: String,
    pub topic: CanonicalTopic,
    pub status: LinkStatus,
}

/// What an upsert actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// The status guard blocked a `confirmed -> suggested` regression; the
    /// score and reason were still refreshed.
    StatusGuarded,
}

/// Filter for link scans.
#[derive(Debug, Clone, Default)]
pub struct LinkFilter {
    pub topic: Option<CanonicalTopic>,
    pub status: Option<LinkStatus>,
    pub min_score: Option<f64>,
    pub updated_before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// Apply the eligibility predicate and text filters of a query to markets
/// already narrowed to one venue. Shared by the storage backends so their
/// semantics cannot drift.
pub(crate) fn apply_market_query(
    markets: impl IntoIterator<Item = Market>,
    topic: Option<CanonicalTopic>,
    query: &EligibleMarketQuery,
    now: DateTime<Utc>,
) -> Result<Vec<Market>> {
    use crate::core::domain::eligibility::{is_eligible, EligibilityParams};

    let mut params = EligibilityParams::for_topic(topic.unwrap_or(CanonicalTopic::Universal));
    if let Some(grace) = query.grace_minutes {
        params.grace_minutes = grace;
    }
    if let Some(forward) = query.forward_hours {
        params.forward_hours = forward;
    }
    if let Some(lookback) = query.lookback_hours {
        params.lookback_hours = lookback;
    }
    params.include_terminal = query.include_terminal;

    let ticker_res: Vec<regex::Regex> = query
        .ticker_patterns
        .iter()
        .map(|p| regex::Regex::new(p).map_err(|e| crate::error::Error::Parse(e.to_string())))
        .collect::<Result<_>>()?;
    let keywords: Vec<String> = query
        .title_keywords
        .iter()
        .map(|k| k.to_lowercase())
        .collect();

    let mut out = Vec::new();
    for market in markets {
        if let Some(topic) = topic {
            if market.derived_topic != Some(topic) {
                continue;
            }
        }
        if query.exclude_sports && market.derived_topic == Some(CanonicalTopic::Sports) {
            continue;
        }
        if !query.include_mve && market.is_mve {
            continue;
        }
        if !is_eligible(&market, now, &params) {
            continue;
        }
        if !keywords.is_empty() || !ticker_res.is_empty() {
            let lower = market.title.to_lowercase();
            let keyword_hit = keywords.iter().any(|k| lower.contains(k));
            let ticker_hit = ticker_res.iter().any(|re| re.is_match(&lower));
            if !keyword_hit && !ticker_hit {
                continue;
            }
        }
        out.push(market);
        if let Some(limit) = query.limit {
            if out.len() >= limit {
                break;
            }
        }
    }
    Ok(out)
}

/// Storage operations the matching engine depends on.
///
/// Implementations must treat `(venue, external_id)` as unique for markets
/// and `(left_venue, left_market_id, right_venue, right_market_id)` as
/// unique for links.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Upsert a raw market; returns the stored row. Existing taxonomy
    /// fields survive a re-ingest.
    async fn upsert_market(&self, raw: &RawMarket) -> Result<Market>;

    async fn get_market(&self, id: i64) -> Result<Option<Market>>;

    /// Eligible markets for a venue per the canonical predicate.
    async fn list_eligible_markets(
        &self,
        venue: Venue,
        query: &EligibleMarketQuery,
    ) -> Result<Vec<Market>>;

    /// Eligible markets restricted to a derived topic.
    async fn list_markets_by_derived_topic(
        &self,
        topic: CanonicalTopic,
        venue: Venue,
        query: &EligibleMarketQuery,
    ) -> Result<Vec<Market>>;

    /// Write the classifier's verdict. A non-UNKNOWN topic is only
    /// overwritten when `force` is set; returns whether anything changed.
    async fn update_market_taxonomy(
        &self,
        market_id: i64,
        topic: CanonicalTopic,
        source: TaxonomySource,
        is_mve: bool,
        force: bool,
    ) -> Result<bool>;

    /// Count active markets per derived topic within the lookback, for the
    /// preflight overlap check.
    async fn count_markets_by_topic(
        &self,
        venue: Venue,
        lookback_hours: i64,
    ) -> Result<HashMap<CanonicalTopic, u64>>;

    /// The single write path for links; idempotent on the pair key and
    /// guarded against status regressions.
    async fn upsert_suggestion_v3(&self, upsert: &SuggestionUpsert) -> Result<UpsertOutcome>;

    async fn get_link(&self, id: i64) -> Result<Option<MarketLink>>;

    async fn list_links(&self, filter: &LinkFilter) -> Result<Vec<MarketLink>>;

    async fn count_links(&self, filter: &LinkFilter) -> Result<u64>;

    /// Status/reason mutation used by the rule engines and manual review.
    /// Never touches score or the market pair.
    async fn update_link_status(
        &self,
        link_id: i64,
        status: LinkStatus,
        reason: &str,
    ) -> Result<()>;

    /// Replace the whole watchlist; it is rebuilt every cycle.
    async fn replace_watchlist(&self, entries: &[WatchlistEntry]) -> Result<()>;

    async fn list_watchlist(&self) -> Result<Vec<WatchlistEntry>>;

    /// Record a quote observation, honoring the heartbeat interval.
    /// Returns whether the quote was stored.
    async fn record_quote(&self, quote: &Quote, min_interval_secs: i64) -> Result<bool>;

    /// Quotes captured at or after `since`, per venue.
    async fn count_recent_quotes(&self, venue: Venue, since: DateTime<Utc>) -> Result<u64>;

    async fn get_ingestion_state(
        &self,
        venue: Venue,
        job_name: &str,
    ) -> Result<Option<IngestionState>>;

    async fn upsert_event(&self, event: &KalshiEvent) -> Result<()>;

    async fn get_event(&self, event_ticker: &str) -> Result<Option<KalshiEvent>>;
}
