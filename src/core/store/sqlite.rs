//! SQLite store implementation using Diesel.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;

use super::{
    apply_market_query, EligibleMarketQuery, LinkFilter, Repository, SuggestionUpsert,
    UpsertOutcome,
};
use crate::core::db::model::{
    IngestionStateRow, KalshiEventRow, MarketLinkRow, MarketRow, NewMarketLinkRow, NewMarketRow,
    NewQuoteRow, NewWatchlistRow, QuoteRow, WatchlistRow,
};
use crate::core::db::schema::{
    ingestion_state, kalshi_events, market_links, markets, quote_watchlist, quotes,
};
use crate::core::db::DbPool;
use crate::core::domain::{
    should_record_quote, CanonicalTopic, IngestionState, KalshiEvent, LinkStatus, Market,
    MarketLink, MarketStatus, Quote, RawMarket, TaxonomySource, Venue, WatchlistEntry,
};
use crate::error::{Error, Result};

/// SQLite-backed repository.
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    /// Create a new SQLite store over an existing pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(
        &self,
    ) -> Result<diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<SqliteConnection>>>
    {
        self.pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))
    }

    fn load_venue_markets(&self, venue: Venue) -> Result<Vec<Market>> {
        let mut conn = self.conn()?;
        let rows: Vec<MarketRow> = markets::table
            .filter(markets::venue.eq(venue.as_str()))
            .load(&mut *conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        rows.into_iter().map(Market::try_from).collect()
    }

    fn link_matches(link: &MarketLink, filter: &LinkFilter) -> bool {
        if let Some(topic) = filter.topic {
            if link.topic != topic {
                return false;
            }
        }
        if let Some(status) = filter.status {
            if link.status != status {
                return false;
            }
        }
        if let Some(min_score) = filter.min_score {
            if link.score < min_score {
                return false;
            }
        }
        if let Some(before) = filter.updated_before {
            if link.updated_at >= before {
                return false;
            }
        }
        true
    }

    fn load_links(&self, filter: &LinkFilter) -> Result<Vec<MarketLink>> {
        let mut conn = self.conn()?;
        let mut query = market_links::table.into_boxed();
        if let Some(topic) = filter.topic {
            query = query.filter(market_links::topic.eq(topic.as_str()));
        }
        if let Some(status) = filter.status {
            query = query.filter(market_links::status.eq(status.as_str()));
        }
        let rows: Vec<MarketLinkRow> = query
            .load(&mut *conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        let mut links: Vec<MarketLink> = rows
            .into_iter()
            .map(MarketLink::try_from)
            .collect::<Result<_>>()?;
        links.retain(|l| Self::link_matches(l, filter));
        links.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        if let Some(limit) = filter.limit {
            links.truncate(limit);
        }
        Ok(links)
    }
}

#[async_trait]
impl Repository for SqliteStore {
    async fn upsert_market(&self, raw: &RawMarket) -> Result<Market> {
        let mut conn = self.conn()?;
        let new_row = NewMarketRow {
            venue: raw.venue.as_str().to_string(),
            external_id: raw.external_id.clone(),
            title: raw.title.clone(),
            status: raw.status.as_str().to_string(),
            close_time: raw.close_time.map(|t| t.to_rfc3339()),
            category: raw.category.clone(),
            metadata: raw.metadata.to_string(),
        };

        let existing: Option<MarketRow> = markets::table
            .filter(markets::venue.eq(raw.venue.as_str()))
            .filter(markets::external_id.eq(&raw.external_id))
            .first(&mut *conn)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;

        if let Some(row) = existing {
            diesel::update(markets::table.find(row.id))
                .set(&new_row)
                .execute(&mut *conn)
                .map_err(|e| Error::Database(e.to_string()))?;
        } else {
            diesel::insert_into(markets::table)
                .values(&new_row)
                .execute(&mut *conn)
                .map_err(|e| Error::Database(e.to_string()))?;
        }

        let row: MarketRow = markets::table
            .filter(markets::venue.eq(raw.venue.as_str()))
            .filter(markets::external_id.eq(&raw.external_id))
            .first(&mut *conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        Market::try_from(row)
    }

    async fn get_market(&self, id: i64) -> Result<Option<Market>> {
        let mut conn = self.conn()?;
        let row: Option<MarketRow> = markets::table
            .find(id)
            .first(&mut *conn)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        row.map(Market::try_from).transpose()
    }

    async fn list_eligible_markets(
        &self,
        venue: Venue,
        query: &EligibleMarketQuery,
    ) -> Result<Vec<Market>> {
        let loaded = self.load_venue_markets(venue)?;
        apply_market_query(loaded, None, query, Utc::now())
    }

    async fn list_markets_by_derived_topic(
        &self,
        topic: CanonicalTopic,
        venue: Venue,
        query: &EligibleMarketQuery,
    ) -> Result<Vec<Market>> {
        let loaded = self.load_venue_markets(venue)?;
        apply_market_query(loaded, Some(topic), query, Utc::now())
    }

    async fn update_market_taxonomy(
        &self,
        market_id: i64,
        topic: CanonicalTopic,
        source: TaxonomySource,
        is_mve: bool,
        force: bool,
    ) -> Result<bool> {
        let mut conn = self.conn()?;
        let row: MarketRow = markets::table
            .find(market_id)
            .first(&mut *conn)
            .map_err(|e| Error::Database(format!("no market with id {market_id}: {e}")))?;

        let mut changed = false;
        if (row.is_mve != 0) != is_mve {
            diesel::update(markets::table.find(market_id))
                .set(markets::is_mve.eq(i32::from(is_mve)))
                .execute(&mut *conn)
                .map_err(|e| Error::Database(e.to_string()))?;
            changed = true;
        }

        let topic_locked = row
            .derived_topic
            .as_deref()
            .and_then(CanonicalTopic::parse)
            .map_or(false, |t| t != CanonicalTopic::Unknown);
        if (!topic_locked || force) && row.derived_topic.as_deref() != Some(topic.as_str()) {
            diesel::update(markets::table.find(market_id))
                .set((
                    markets::derived_topic.eq(topic.as_str()),
                    markets::taxonomy_source.eq(source.as_str()),
                ))
                .execute(&mut *conn)
                .map_err(|e| Error::Database(e.to_string()))?;
            changed = true;
        }
        Ok(changed)
    }

    async fn count_markets_by_topic(
        &self,
        venue: Venue,
        lookback_hours: i64,
    ) -> Result<HashMap<CanonicalTopic, u64>> {
        let cutoff = Utc::now() - Duration::hours(lookback_hours);
        let loaded = self.load_venue_markets(venue)?;
        let mut counts: HashMap<CanonicalTopic, u64> = HashMap::new();
        for market in loaded {
            if market.status != MarketStatus::Active {
                continue;
            }
            if market.close_time.map_or(false, |t| t < cutoff) {
                continue;
            }
            let topic = market.derived_topic.unwrap_or(CanonicalTopic::Unknown);
            *counts.entry(topic).or_default() += 1;
        }
        Ok(counts)
    }

    async fn upsert_suggestion_v3(&self, upsert: &SuggestionUpsert) -> Result<UpsertOutcome> {
        let mut conn = self.conn()?;
        let now = Utc::now().to_rfc3339();

        let existing: Option<MarketLinkRow> = market_links::table
            .filter(market_links::left_venue.eq(upsert.left_venue.as_str()))
            .filter(market_links::left_market_id.eq(upsert.left_market_id))
            .filter(market_links::right_venue.eq(upsert.right_venue.as_str()))
            .filter(market_links::right_market_id.eq(upsert.right_market_id))
            .first(&mut *conn)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;

        if let Some(row) = existing {
            let guarded = row.status == LinkStatus::Confirmed.as_str()
                && upsert.status == LinkStatus::Suggested;
            let status = if guarded {
                row.status.clone()
            } else {
                upsert.status.as_str().to_string()
            };
            diesel::update(market_links::table.find(row.id))
                .set((
                    market_links::score.eq(upsert.score),
                    market_links::reason.eq(&upsert.reason),
                    market_links::algo_version.eq(&upsert.algo_version),
                    market_links::status.eq(status),
                    market_links::updated_at.eq(&now),
                ))
                .execute(&mut *conn)
                .map_err(|e| Error::Database(e.to_string()))?;
            return Ok(if guarded {
                UpsertOutcome::StatusGuarded
            } else {
                UpsertOutcome::Updated
            });
        }

        let row = NewMarketLinkRow {
            left_venue: upsert.left_venue.as_str().to_string(),
            left_market_id: upsert.left_market_id,
            right_venue: upsert.right_venue.as_str().to_string(),
            right_market_id: upsert.right_market_id,
            score: upsert.score,
            status: upsert.status.as_str().to_string(),
            reason: upsert.reason.clone(),
            topic: upsert.topic.as_str().to_string(),
            algo_version: upsert.algo_version.clone(),
            created_at: now.clone(),
            updated_at: now,
        };
        diesel::insert_into(market_links::table)
            .values(&row)
            .execute(&mut *conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(UpsertOutcome::Inserted)
    }

    async fn get_link(&self, id: i64) -> Result<Option<MarketLink>> {
        let mut conn = self.conn()?;
        let row: Option<MarketLinkRow> = market_links::table
            .find(id)
            .first(&mut *conn)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        row.map(MarketLink::try_from).transpose()
    }

    async fn list_links(&self, filter: &LinkFilter) -> Result<Vec<MarketLink>> {
        self.load_links(filter)
    }

    async fn count_links(&self, filter: &LinkFilter) -> Result<u64> {
        Ok(self.load_links(&LinkFilter {
            limit: None,
            ..filter.clone()
        })?
        .len() as u64)
    }

    async fn update_link_status(
        &self,
        link_id: i64,
        status: LinkStatus,
        reason: &str,
    ) -> Result<()> {
        let mut conn = self.conn()?;
        let row: MarketLinkRow = market_links::table
            .find(link_id)
            .first(&mut *conn)
            .map_err(|e| Error::Database(format!("no link with id {link_id}: {e}")))?;
        let current = LinkStatus::parse(&row.status)
            .ok_or_else(|| Error::Parse(format!("bad link status '{}'", row.status)))?;
        if !MarketLink::can_transition(current, status) {
            return Err(Error::Database(format!(
                "illegal status transition {current} -> {status}"
            )));
        }
        diesel::update(market_links::table.find(link_id))
            .set((
                market_links::status.eq(status.as_str()),
                market_links::reason.eq(reason),
                market_links::updated_at.eq(Utc::now().to_rfc3339()),
            ))
            .execute(&mut *conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn replace_watchlist(&self, entries: &[WatchlistEntry]) -> Result<()> {
        let mut conn = self.conn()?;
        let rows: Vec<NewWatchlistRow> = entries
            .iter()
            .map(|e| NewWatchlistRow {
                venue: e.venue.as_str().to_string(),
                market_id: e.market_id,
                priority: e.priority,
                reason: e.reason.clone(),
            })
            .collect();
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            diesel::delete(quote_watchlist::table).execute(conn)?;
            diesel::insert_into(quote_watchlist::table)
                .values(&rows)
                .execute(conn)?;
            Ok(())
        })
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn list_watchlist(&self) -> Result<Vec<WatchlistEntry>> {
        let mut conn = self.conn()?;
        let rows: Vec<WatchlistRow> = quote_watchlist::table
            .order(quote_watchlist::priority.desc())
            .load(&mut *conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        rows.into_iter().map(WatchlistEntry::try_from).collect()
    }

    async fn record_quote(&self, quote: &Quote, min_interval_secs: i64) -> Result<bool> {
        let mut conn = self.conn()?;
        let last: Option<QuoteRow> = quotes::table
            .filter(quotes::venue.eq(quote.venue.as_str()))
            .filter(quotes::market_id.eq(quote.market_id))
            .order(quotes::captured_at.desc())
            .first(&mut *conn)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        let last = last.map(Quote::try_from).transpose()?;

        if !should_record_quote(last.as_ref(), quote, min_interval_secs) {
            return Ok(false);
        }
        let row = NewQuoteRow {
            venue: quote.venue.as_str().to_string(),
            market_id: quote.market_id,
            yes_price: quote.yes_price.to_string(),
            captured_at: quote.captured_at.to_rfc3339(),
        };
        diesel::insert_into(quotes::table)
            .values(&row)
            .execute(&mut *conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(true)
    }

    async fn count_recent_quotes(&self, venue: Venue, since: DateTime<Utc>) -> Result<u64> {
        let mut conn = self.conn()?;
        // RFC3339 UTC timestamps compare lexicographically
        let count: i64 = quotes::table
            .filter(quotes::venue.eq(venue.as_str()))
            .filter(quotes::captured_at.ge(since.to_rfc3339()))
            .count()
            .get_result(&mut *conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(count.max(0) as u64)
    }

    async fn get_ingestion_state(
        &self,
        venue: Venue,
        job_name: &str,
    ) -> Result<Option<IngestionState>> {
        let mut conn = self.conn()?;
        let row: Option<IngestionStateRow> = ingestion_state::table
            .filter(ingestion_state::venue.eq(venue.as_str()))
            .filter(ingestion_state::job_name.eq(job_name))
            .first(&mut *conn)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        row.map(IngestionState::try_from).transpose()
    }

    async fn upsert_event(&self, event: &KalshiEvent) -> Result<()> {
        let mut conn = self.conn()?;
        let row = KalshiEventRow::from(event);
        diesel::replace_into(kalshi_events::table)
            .values(&row)
            .execute(&mut *conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_event(&self, event_ticker: &str) -> Result<Option<KalshiEvent>> {
        let mut conn = self.conn()?;
        let row: Option<KalshiEventRow> = kalshi_events::table
            .find(event_ticker)
            .first(&mut *conn)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        row.map(KalshiEvent::try_from).transpose()
    }
}
