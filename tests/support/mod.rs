//! Shared fixtures for integration tests.
#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};

use matchlock::core::domain::{
    CanonicalTopic, Market, MarketStatus, RawMarket, TaxonomySource, Venue,
};
use matchlock::core::store::{MemoryStore, Repository};

/// Builder for seeded markets.
pub struct MarketSeed {
    pub venue: Venue,
    pub external_id: String,
    pub title: String,
    pub status: MarketStatus,
    pub close_time: Option<DateTime<Utc>>,
    pub metadata: Value,
    pub topic: Option<CanonicalTopic>,
}

impl MarketSeed {
    pub fn new(venue: Venue, external_id: &str, title: &str) -> Self {
        Self {
            venue,
            external_id: external_id.to_string(),
            title: title.to_string(),
            status: MarketStatus::Active,
            close_time: Some(Utc::now() + Duration::hours(24)),
            metadata: json!({}),
            topic: None,
        }
    }

    pub fn topic(mut self, topic: CanonicalTopic) -> Self {
        self.topic = Some(topic);
        self
    }

    pub fn close_time(mut self, close_time: DateTime<Utc>) -> Self {
        self.close_time = Some(close_time);
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub async fn insert(self, store: &MemoryStore) -> Market {
        let market = store
            .upsert_market(&RawMarket {
                venue: self.venue,
                external_id: self.external_id,
                title: self.title,
                status: self.status,
                close_time: self.close_time,
                category: None,
                metadata: self.metadata,
            })
            .await
            .expect("insert market");
        if let Some(topic) = self.topic {
            store
                .update_market_taxonomy(
                    market.id,
                    topic,
                    TaxonomySource::TitleKeywords,
                    false,
                    false,
                )
                .await
                .expect("set topic");
            return store
                .get_market(market.id)
                .await
                .expect("reload market")
                .expect("market exists");
        }
        market
    }
}

/// A kalshi/polymarket market pair sharing a topic.
pub async fn seed_pair(
    store: &MemoryStore,
    topic: CanonicalTopic,
    left_title: &str,
    right_title: &str,
) -> (Market, Market) {
    let left = MarketSeed::new(Venue::Kalshi, &format!("k-{left_title}"), left_title)
        .topic(topic)
        .insert(store)
        .await;
    let right = MarketSeed::new(Venue::Polymarket, &format!("p-{right_title}"), right_title)
        .topic(topic)
        .insert(store)
        .await;
    (left, right)
}
