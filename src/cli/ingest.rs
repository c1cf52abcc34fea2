//! Market ingestion through the venue feed port.

use clap::Parser;

use super::matching::parse_venue;
use super::output;
use crate::app::Config;
use crate::core::domain::{Quote, Venue};
use crate::core::exchange::kalshi::{KalshiClient, KalshiConfig, KalshiCredentials};
use crate::core::exchange::polymarket::{PolymarketClient, PolymarketConfig};
use crate::core::exchange::{FetchParams, MarketFeed};
use crate::core::store::Repository;
use crate::error::Result;

#[derive(Parser, Debug)]
pub struct IngestArgs {
    /// Venue to ingest from
    #[arg(long)]
    pub venue: String,

    /// Maximum pages to fetch (0 = until exhausted)
    #[arg(long, default_value = "0")]
    pub pages: u32,

    /// Also capture quotes for the ingested markets
    #[arg(long)]
    pub with_quotes: bool,
}

fn build_feed(venue: Venue) -> Result<Box<dyn MarketFeed>> {
    Ok(match venue {
        Venue::Kalshi => Box::new(KalshiClient::new(
            KalshiConfig::from_env(),
            KalshiCredentials::from_env(),
        )?),
        Venue::Polymarket => Box::new(PolymarketClient::new(PolymarketConfig::from_env())?),
    })
}

pub async fn ingest(store: &dyn Repository, config: &Config, args: IngestArgs) -> Result<i32> {
    let venue = parse_venue(&args.venue)?;
    let feed = build_feed(venue)?;

    let mut upserted = 0u64;
    let mut quotes_recorded = 0u64;
    let mut cursor: Option<String> = None;
    let mut pages = 0u32;

    loop {
        let page = feed
            .fetch_markets(&FetchParams {
                cursor: cursor.take(),
                limit: None,
            })
            .await?;

        for raw in &page.markets {
            store.upsert_market(raw).await?;
            upserted += 1;
        }

        if args.with_quotes && !page.markets.is_empty() {
            let raw_quotes = feed.fetch_quotes(&page.markets).await?;
            for raw_quote in raw_quotes {
                // Resolve the stored market id from the venue-native id
                let Some(market) = page
                    .markets
                    .iter()
                    .find(|m| m.external_id == raw_quote.external_id)
                else {
                    continue;
                };
                let stored = store.upsert_market(market).await?;
                let quote = Quote {
                    venue,
                    market_id: stored.id,
                    yes_price: raw_quote.yes_price,
                    captured_at: raw_quote.captured_at,
                };
                if store
                    .record_quote(&quote, config.matching.quote_heartbeat_secs)
                    .await?
                {
                    quotes_recorded += 1;
                }
            }
        }

        pages += 1;
        if args.pages > 0 && pages >= args.pages {
            break;
        }
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    output::section(&format!("ingest {venue}"));
    output::field("pages", pages);
    output::field("markets", upserted);
    if args.with_quotes {
        output::field("quotes", quotes_recorded);
    }
    output::success("done");
    Ok(0)
}
