//! In-memory store for tests and dry-runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::RwLock;

use super::{
    EligibleMarketQuery, LinkFilter, Repository, SuggestionUpsert, UpsertOutcome,
};
use crate::core::domain::{
    should_record_quote, CanonicalTopic, IngestionState, KalshiEvent, LinkStatus, Market,
    MarketLink, MarketStatus, Quote, RawMarket, TaxonomySource, Venue, WatchlistEntry,
};
use crate::error::{Error, Result};

type LinkKey = (Venue, i64, Venue, i64);

/// In-memory repository backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    markets: RwLock<Vec<Market>>,
    links: RwLock<Vec<MarketLink>>,
    link_index: RwLock<HashMap<LinkKey, usize>>,
    watchlist: RwLock<Vec<WatchlistEntry>>,
    quotes: RwLock<Vec<Quote>>,
    ingestion: RwLock<HashMap<(Venue, String), IngestionState>>,
    events: RwLock<HashMap<String, KalshiEvent>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Test helper: seed ingestion state directly.
    pub fn set_ingestion_state(&self, state: IngestionState) {
        self.ingestion
            .write()
            .insert((state.venue, state.job_name.clone()), state);
    }

    fn filter_markets(
        &self,
        venue: Venue,
        topic: Option<CanonicalTopic>,
        query: &EligibleMarketQuery,
    ) -> Result<Vec<Market>> {
        let markets = self.markets.read();
        let venue_markets: Vec<Market> = markets
            .iter()
            .filter(|m| m.venue == venue)
            .cloned()
            .collect();
        super::apply_market_query(venue_markets, topic, query, Utc::now())
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
}

#[async_trait]
impl Repository for MemoryStore {
    async fn upsert_market(&self, raw: &RawMarket) -> Result<Market> {
        let mut markets = self.markets.write();
        if let Some(existing) = markets
            .iter_mut()
            .find(|m| m.venue == raw.venue && m.external_id == raw.external_id)
        {
            existing.title = raw.title.clone();
            existing.status = raw.status;
            existing.close_time = raw.close_time;
            existing.category = raw.category.clone();
            existing.metadata = raw.metadata.clone();
            return Ok(existing.clone());
        }

        let market = Market {
            id: markets.len() as i64 + 1,
            venue: raw.venue,
            external_id: raw.external_id.clone(),
            title: raw.title.clone(),
            status: raw.status,
            close_time: raw.close_time,
            category: raw.category.clone(),
            metadata: raw.metadata.clone(),
            derived_topic: None,
            taxonomy_source: None,
            is_mve: false,
            event_ticker: raw
                .metadata
                .get("event_ticker")
                .and_then(serde_json::Value::as_str)
                .map(String::from),
        };
        markets.push(market.clone());
        Ok(market)
    }

    async fn get_market(&self, id: i64) -> Result<Option<Market>> {
        Ok(self.markets.read().iter().find(|m| m.id == id).cloned())
    }

    async fn list_eligible_markets(
        &self,
        venue: Venue,
        query: &EligibleMarketQuery,
    ) -> Result<Vec<Market>> {
        self.filter_markets(venue, None, query)
    }

    async fn list_markets_by_derived_topic(
        &self,
        topic: CanonicalTopic,
        venue: Venue,
        query: &EligibleMarketQuery,
    ) -> Result<Vec<Market>> {
        self.filter_markets(venue, Some(topic), query)
    }

    async fn update_market_taxonomy(
        &self,
        market_id: i64,
        topic: CanonicalTopic,
        source: TaxonomySource,
        is_mve: bool,
        force: bool,
    ) -> Result<bool> {
        let mut markets = self.markets.write();
        let Some(market) = markets.iter_mut().find(|m| m.id == market_id) else {
            return Err(Error::Database(format!("no market with id {market_id}")));
        };

        let mut changed = false;
        if market.is_mve != is_mve {
            market.is_mve = is_mve;
            changed = true;
        }
        let topic_locked = market
            .derived_topic
            .map_or(false, |t| t != CanonicalTopic::Unknown);
        if (!topic_locked || force) && market.derived_topic != Some(topic) {
            market.derived_topic = Some(topic);
            market.taxonomy_source = Some(source);
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
        let markets = self.markets.read();
        let mut counts: HashMap<CanonicalTopic, u64> = HashMap::new();
        for market in markets.iter() {
            if market.venue != venue || market.status != MarketStatus::Active {
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
        let key: LinkKey = (
            upsert.left_venue,
            upsert.left_market_id,
            upsert.right_venue,
            upsert.right_market_id,
        );
        let now = Utc::now();
        let mut links = self.links.write();
        let mut index = self.link_index.write();

        if let Some(&position) = index.get(&key) {
            let link = &mut links[position];
            link.score = upsert.score;
            link.reason = upsert.reason.clone();
            link.algo_version = upsert.algo_version.clone();
            link.updated_at = now;

            // Never regress confirmed -> suggested
            if link.status == LinkStatus::Confirmed && upsert.status == LinkStatus::Suggested {
                return Ok(UpsertOutcome::StatusGuarded);
            }
            link.status = upsert.status;
            return Ok(UpsertOutcome::Updated);
        }

        let link = MarketLink {
            id: links.len() as i64 + 1,
            left_venue: upsert.left_venue,
            left_market_id: upsert.left_market_id,
            right_venue: upsert.right_venue,
            right_market_id: upsert.right_market_id,
            score: upsert.score,
            status: upsert.status,
            reason: upsert.reason.clone(),
            topic: upsert.topic,
            algo_version: upsert.algo_version.clone(),
            created_at: now,
            updated_at: now,
        };
        index.insert(key, links.len());
        links.push(link);
        Ok(UpsertOutcome::Inserted)
    }

    async fn get_link(&self, id: i64) -> Result<Option<MarketLink>> {
        Ok(self.links.read().iter().find(|l| l.id == id).cloned())
    }

    async fn list_links(&self, filter: &LinkFilter) -> Result<Vec<MarketLink>> {
        let links = self.links.read();
        let mut out: Vec<MarketLink> = links
            .iter()
            .filter(|l| Self::link_matches(l, filter))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        if let Some(limit) = filter.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn count_links(&self, filter: &LinkFilter) -> Result<u64> {
        Ok(self
            .links
            .read()
            .iter()
            .filter(|l| Self::link_matches(l, filter))
            .count() as u64)
    }

    async fn update_link_status(
        &self,
        link_id: i64,
        status: LinkStatus,
        reason: &str,
    ) -> Result<()> {
        let mut links = self.links.write();
        let Some(link) = links.iter_mut().find(|l| l.id == link_id) else {
            return Err(Error::Database(format!("no link with id {link_id}")));
        };
        if !MarketLink::can_transition(link.status, status) {
            return Err(Error::Database(format!(
                "illegal status transition {} -> {}",
                link.status, status
            )));
        }
        link.status = status;
        link.reason = reason.to_string();
        link.updated_at = Utc::now();
        Ok(())
    }

    async fn replace_watchlist(&self, entries: &[WatchlistEntry]) -> Result<()> {
        *self.watchlist.write() = entries.to_vec();
        Ok(())
    }

    async fn list_watchlist(&self) -> Result<Vec<WatchlistEntry>> {
        Ok(self.watchlist.read().clone())
    }

    async fn record_quote(&self, quote: &Quote, min_interval_secs: i64) -> Result<bool> {
        let mut quotes = self.quotes.write();
        let last = quotes
            .iter()
            .filter(|q| q.venue == quote.venue && q.market_id == quote.market_id)
            .max_by_key(|q| q.captured_at);
        if !should_record_quote(last, quote, min_interval_secs) {
            return Ok(false);
        }
        quotes.push(quote.clone());
        Ok(true)
    }

    async fn count_recent_quotes(
        &self,
        venue: Venue,
        since: chrono::DateTime<Utc>,
    ) -> Result<u64> {
        Ok(self
            .quotes
            .read()
            .iter()
            .filter(|q| q.venue == venue && q.captured_at >= since)
            .count() as u64)
    }

    async fn get_ingestion_state(
        &self,
        venue: Venue,
        job_name: &str,
    ) -> Result<Option<IngestionState>> {
        Ok(self
            .ingestion
            .read()
            .get(&(venue, job_name.to_string()))
            .cloned())
    }

    async fn upsert_event(&self, event: &KalshiEvent) -> Result<()> {
        self.events
            .write()
            .insert(event.event_ticker.clone(), event.clone());
        Ok(())
    }

    async fn get_event(&self, event_ticker: &str) -> Result<Option<KalshiEvent>> {
        Ok(self.events.read().get(event_ticker).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn raw(venue: Venue, external_id: &str, title: &str) -> RawMarket {
        RawMarket {
            venue,
            external_id: external_id.into(),
            title: title.into(),
            status: MarketStatus::Active,
            close_time: Some(Utc::now() + Duration::hours(24)),
            category: None,
            metadata: json!({}),
        }
    }

    #[tokio::test]
    async fn upsert_market_is_unique_per_venue_and_external_id() {
        let store = MemoryStore::new();
        let first = store
            .upsert_market(&raw(Venue::Kalshi, "X-1", "first title"))
            .await
            .unwrap();
        let second = store
            .upsert_market(&raw(Venue::Kalshi, "X-1", "updated title"))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.title, "updated title");

        let other_venue = store
            .upsert_market(&raw(Venue::Polymarket, "X-1", "same external id"))
            .await
            .unwrap();
        assert_ne!(first.id, other_venue.id);
    }

    #[tokio::test]
    async fn taxonomy_lock_requires_force() {
        let store = MemoryStore::new();
        let market = store
            .upsert_market(&raw(Venue::Kalshi, "X-1", "CPI above 3%"))
            .await
            .unwrap();

        assert!(store
            .update_market_taxonomy(
                market.id,
                CanonicalTopic::Macro,
                TaxonomySource::TitleKeywords,
                false,
                false
            )
            .await
            .unwrap());

        // Second classification without force cannot flip the topic
        let changed = store
            .update_market_taxonomy(
                market.id,
                CanonicalTopic::Finance,
                TaxonomySource::Category,
                false,
                false,
            )
            .await
            .unwrap();
        assert!(!changed);
        assert_eq!(
            store.get_market(market.id).await.unwrap().unwrap().derived_topic,
            Some(CanonicalTopic::Macro)
        );

        // With force it can
        assert!(store
            .update_market_taxonomy(
                market.id,
                CanonicalTopic::Finance,
                TaxonomySource::Category,
                false,
                true
            )
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn status_guard_blocks_confirmed_to_suggested() {
        let store = MemoryStore::new();
        let upsert = SuggestionUpsert {
            left_venue: Venue::Kalshi,
            left_market_id: 1,
            right_venue: Venue::Polymarket,
            right_market_id: 2,
            score: 0.9,
            reason: "r1".into(),
            algo_version: "v1".into(),
            topic: CanonicalTopic::CryptoDaily,
            status: LinkStatus::Confirmed,
        };
        assert_eq!(
            store.upsert_suggestion_v3(&upsert).await.unwrap(),
            UpsertOutcome::Inserted
        );

        let regress = SuggestionUpsert {
            status: LinkStatus::Suggested,
            score: 0.8,
            reason: "r2".into(),
            ..upsert.clone()
        };
        assert_eq!(
            store.upsert_suggestion_v3(&regress).await.unwrap(),
            UpsertOutcome::StatusGuarded
        );

        let links = store.list_links(&LinkFilter::default()).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].status, LinkStatus::Confirmed);
        // Score and reason still refreshed
        assert_eq!(links[0].score, 0.8);
        assert_eq!(links[0].reason, "r2");

        // confirmed -> rejected is allowed
        let override_reject = SuggestionUpsert {
            status: LinkStatus::Rejected,
            ..upsert
        };
        assert_eq!(
            store.upsert_suggestion_v3(&override_reject).await.unwrap(),
            UpsertOutcome::Updated
        );
    }

    #[tokio::test]
    async fn crypto_text_filters() {
        let store = MemoryStore::new();
        store
            .upsert_market(&raw(Venue::Polymarket, "a", "Bitcoin above $100k tomorrow"))
            .await
            .unwrap();
        store
            .upsert_market(&raw(Venue::Polymarket, "b", "Pete Hegseth confirmed as secretary"))
            .await
            .unwrap();
        store
            .upsert_market(&raw(Venue::Polymarket, "c", "$ETH to $5000"))
            .await
            .unwrap();

        let query = EligibleMarketQuery {
            title_keywords: vec!["bitcoin".into()],
            ticker_patterns: vec![crate::core::domain::fingerprint::ticker_pattern("eth")],
            ..Default::default()
        };
        let markets = store
            .list_eligible_markets(Venue::Polymarket, &query)
            .await
            .unwrap();
        let ids: Vec<&str> = markets.iter().map(|m| m.external_id.as_str()).collect();
        // "eth" inside "Hegseth" must not match the boundary pattern
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn quote_heartbeat_interval() {
        let store = MemoryStore::new();
        let t0 = Utc::now();
        let quote = Quote {
            venue: Venue::Kalshi,
            market_id: 1,
            yes_price: dec!(0.42),
            captured_at: t0,
        };
        assert!(store.record_quote(&quote, 60).await.unwrap());

        let unchanged_soon = Quote {
            captured_at: t0 + Duration::seconds(10),
            ..quote.clone()
        };
        assert!(!store.record_quote(&unchanged_soon, 60).await.unwrap());

        let unchanged_later = Quote {
            captured_at: t0 + Duration::seconds(61),
            ..quote.clone()
        };
        assert!(store.record_quote(&unchanged_later, 60).await.unwrap());

        assert_eq!(
            store
                .count_recent_quotes(Venue::Kalshi, t0 - Duration::seconds(1))
                .await
                .unwrap(),
            2
        );
        assert_eq!(
            store
                .count_recent_quotes(Venue::Polymarket, t0 - Duration::seconds(1))
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn illegal_manual_transition_errors() {
        let store = MemoryStore::new();
        let upsert = SuggestionUpsert {
            left_venue: Venue::Kalshi,
            left_market_id: 1,
            right_venue: Venue::Polymarket,
            right_market_id: 2,
            score: 0.9,
            reason: "r".into(),
            algo_version: "v1".into(),
            topic: CanonicalTopic::Macro,
            status: LinkStatus::Confirmed,
        };
        store.upsert_suggestion_v3(&upsert).await.unwrap();

        let err = store
            .update_link_status(1, LinkStatus::Suggested, "undo")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Database(_)));

        store
            .update_link_status(1, LinkStatus::Rejected, "override")
            .await
            .unwrap();
        let link = store.get_link(1).await.unwrap().unwrap();
        assert_eq!(link.status, LinkStatus::Rejected);
    }
}
