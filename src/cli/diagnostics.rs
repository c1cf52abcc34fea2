//! Diagnostic commands: taxonomy, crypto, sports, catalog sync, overlap.

use std::collections::BTreeMap;

use clap::{Parser, Subcommand};

use super::matching::parse_venue;
use super::output;
use crate::core::domain::{CanonicalTopic, Market, Venue};
use crate::core::exchange::kalshi::{KalshiClient, KalshiConfig, KalshiCredentials, KalshiMaintainer};
use crate::core::signal::crypto::{extract_crypto_signals, CryptoEntity};
use crate::core::signal::sports::extract_sports_signals;
use crate::core::store::{EligibleMarketQuery, Repository};
use crate::core::taxonomy::{classify, detect_mve};
use crate::error::Result;

const DIAGNOSTIC_LOOKBACK_HOURS: i64 = 720;

#[derive(Subcommand, Debug)]
pub enum TaxonomyCommand {
    /// Per-topic market counts on both venues
    Overlap,

    /// Classify unlabeled markets (and detect MVE flags)
    Classify(ClassifyArgs),
}

#[derive(Parser, Debug)]
pub struct ClassifyArgs {
    /// Write classifications instead of dry-running
    #[arg(long)]
    pub apply: bool,

    /// Re-classify markets that already carry a topic
    #[arg(long)]
    pub force: bool,

    /// Classify at most this many markets per venue
    #[arg(long, default_value = "5000")]
    pub limit: usize,
}

#[derive(Subcommand, Debug)]
pub enum CryptoCommand {
    /// Strike ladders per entity and settle date
    Brackets,

    /// Market counts per entity and venue
    Counts,

    /// Settle-key overlap across venues
    Overlap,
}

#[derive(Subcommand, Debug)]
pub enum SportsCommand {
    /// Signal completeness audit for sports markets
    Audit,
}

#[derive(Subcommand, Debug)]
pub enum KalshiCommand {
    /// Incremental event/series sync
    #[command(name = "events-smart-sync")]
    EventsSmartSync(SmartSyncArgs),
}

#[derive(Parser, Debug)]
pub struct SmartSyncArgs {
    /// Skip multi-variable events
    #[arg(long)]
    pub non_mve_only: bool,

    /// Actually call the API and write; dry-run prints the plan
    #[arg(long)]
    pub apply: bool,
}

#[derive(Parser, Debug)]
pub struct OverlapReportArgs {
    /// Keywords to look for in titles on both venues
    pub keywords: Vec<String>,
}

async fn eligible(store: &dyn Repository, venue: Venue, query: EligibleMarketQuery) -> Result<Vec<Market>> {
    store.list_eligible_markets(venue, &query).await
}

pub async fn taxonomy(store: &dyn Repository, command: TaxonomyCommand) -> Result<i32> {
    match command {
        TaxonomyCommand::Overlap => taxonomy_overlap(store).await,
        TaxonomyCommand::Classify(args) => taxonomy_classify(store, args).await,
    }
}

async fn taxonomy_overlap(store: &dyn Repository) -> Result<i32> {
    let left = store
        .count_markets_by_topic(Venue::Kalshi, DIAGNOSTIC_LOOKBACK_HOURS)
        .await?;
    let right = store
        .count_markets_by_topic(Venue::Polymarket, DIAGNOSTIC_LOOKBACK_HOURS)
        .await?;

    output::section("taxonomy overlap");
    for topic in CanonicalTopic::ALL {
        let l = left.get(&topic).copied().unwrap_or(0);
        let r = right.get(&topic).copied().unwrap_or(0);
        if l == 0 && r == 0 {
            continue;
        }
        let marker = if l > 0 && r > 0 { "both" } else { "one-sided" };
        output::field(topic.as_str(), format!("kalshi {l:>5}  polymarket {r:>5}  {marker}"));
    }
    Ok(0)
}

async fn taxonomy_classify(store: &dyn Repository, args: ClassifyArgs) -> Result<i32> {
    let mut by_topic: BTreeMap<&'static str, u64> = BTreeMap::new();
    let mut by_source: BTreeMap<&'static str, u64> = BTreeMap::new();
    let mut mve_count = 0u64;
    let mut written = 0u64;

    for venue in [Venue::Kalshi, Venue::Polymarket] {
        let markets = eligible(
            store,
            venue,
            EligibleMarketQuery {
                lookback_hours: Some(DIAGNOSTIC_LOOKBACK_HOURS),
                limit: Some(args.limit),
                include_mve: true,
                ..Default::default()
            },
        )
        .await?;

        for market in markets {
            if market.derived_topic.is_some() && !args.force {
                continue;
            }
            let event = match market.event_ticker() {
                Some(ticker) => store.get_event(ticker).await?,
                None => None,
            };
            let classification = classify(&market, event.as_ref());
            let mve = detect_mve(&market);
            if mve.is_mve {
                mve_count += 1;
            }
            *by_topic.entry(classification.topic.as_str()).or_default() += 1;
            *by_source.entry(classification.source.as_str()).or_default() += 1;

            if args.apply {
                let changed = store
                    .update_market_taxonomy(
                        market.id,
                        classification.topic,
                        classification.source,
                        mve.is_mve,
                        args.force,
                    )
                    .await?;
                if changed {
                    written += 1;
                }
            }
        }
    }

    output::section(if args.apply {
        "taxonomy classify"
    } else {
        "taxonomy classify (dry-run)"
    });
    for (topic, count) in &by_topic {
        output::field(topic, count);
    }
    output::section("by source");
    for (source, count) in &by_source {
        output::field(source, count);
    }
    output::field("mve", mve_count);
    if args.apply {
        output::success(&format!("{written} markets updated"));
    }
    Ok(0)
}

pub async fn crypto(store: &dyn Repository, command: CryptoCommand) -> Result<i32> {
    let mut per_venue: Vec<(Venue, Vec<Market>)> = Vec::new();
    for venue in [Venue::Kalshi, Venue::Polymarket] {
        let markets = store
            .list_markets_by_derived_topic(
                CanonicalTopic::CryptoDaily,
                venue,
                &EligibleMarketQuery::default(),
            )
            .await?;
        per_venue.push((venue, markets));
    }

    match command {
        CryptoCommand::Brackets => {
            output::section("crypto brackets");
            for (venue, markets) in &per_venue {
                let mut groups: BTreeMap<String, u64> = BTreeMap::new();
                for market in markets {
                    let signals = extract_crypto_signals(market);
                    let Some(key) = signals.index_key() else {
                        continue;
                    };
                    *groups
                        .entry(format!("{key}|{}", signals.comparator))
                        .or_default() += 1;
                }
                output::section(venue.as_str());
                for (key, count) in groups.iter().filter(|(_, c)| **c > 1) {
                    output::field(key, count);
                }
            }
        }
        CryptoCommand::Counts => {
            output::section("crypto counts");
            for (venue, markets) in &per_venue {
                let mut counts: BTreeMap<&'static str, u64> = BTreeMap::new();
                for market in markets {
                    if let Some(entity) = extract_crypto_signals(market).entity {
                        *counts.entry(entity.as_str()).or_default() += 1;
                    }
                }
                output::section(venue.as_str());
                for entity in CryptoEntity::ALL {
                    let count = counts.get(entity.as_str()).copied().unwrap_or(0);
                    output::field(entity.as_str(), count);
                }
            }
        }
        CryptoCommand::Overlap => {
            output::section("crypto settle-key overlap");
            let keys_of = |markets: &[Market]| -> Vec<String> {
                markets
                    .iter()
                    .filter_map(|m| extract_crypto_signals(m).index_key())
                    .collect()
            };
            let left = keys_of(&per_venue[0].1);
            let right = keys_of(&per_venue[1].1);
            let overlap = left.iter().filter(|k| right.contains(k)).count();
            output::field("kalshi keys", left.len());
            output::field("polymarket keys", right.len());
            output::field("overlapping", overlap);
        }
    }
    Ok(0)
}

pub async fn sports(store: &dyn Repository, command: SportsCommand) -> Result<i32> {
    let SportsCommand::Audit = command;
    output::section("sports audit");
    for venue in [Venue::Kalshi, Venue::Polymarket] {
        let markets = store
            .list_markets_by_derived_topic(
                CanonicalTopic::Sports,
                venue,
                &EligibleMarketQuery {
                    include_mve: true,
                    ..Default::default()
                },
            )
            .await?;
        let mut with_teams = 0u64;
        let mut with_bucket = 0u64;
        let mut mve = 0u64;
        for market in &markets {
            if market.is_mve {
                mve += 1;
                continue;
            }
            let signals = extract_sports_signals(market, None);
            if signals.team_a.is_some() {
                with_teams += 1;
            }
            if signals.start_bucket.is_some() {
                with_bucket += 1;
            }
        }
        output::section(venue.as_str());
        output::field("total", markets.len());
        output::field("with teams", with_teams);
        output::field("with start bucket", with_bucket);
        output::field("mve (excluded)", mve);
    }
    Ok(0)
}

pub async fn kalshi(store: &dyn Repository, command: KalshiCommand) -> Result<i32> {
    let KalshiCommand::EventsSmartSync(args) = command;
    let config = KalshiConfig::from_env();

    if !args.apply {
        output::section("events smart-sync (dry-run)");
        output::field("base url", &config.base_url);
        output::field("statuses", config.events_status.join(","));
        output::field("nested markets", config.with_nested_markets);
        output::field("non-mve only", args.non_mve_only);
        output::success("pass --apply to sync");
        return Ok(0);
    }

    let client = KalshiClient::new(config, KalshiCredentials::from_env())?;
    let mut maintainer = KalshiMaintainer::new(client);
    maintainer.non_mve_only = args.non_mve_only;
    let (synced, skipped) = maintainer.sync_events(store).await?;
    output::success(&format!("{synced} events synced, {skipped} MVE skipped"));
    Ok(0)
}

pub async fn overlap_report(store: &dyn Repository, args: OverlapReportArgs) -> Result<i32> {
    if args.keywords.is_empty() {
        output::warning("no keywords given");
        return Ok(0);
    }
    output::section("overlap report");
    for raw_venue in ["kalshi", "polymarket"] {
        let venue = parse_venue(raw_venue)?;
        let markets = eligible(
            store,
            venue,
            EligibleMarketQuery {
                lookback_hours: Some(DIAGNOSTIC_LOOKBACK_HOURS),
                title_keywords: args.keywords.clone(),
                ..Default::default()
            },
        )
        .await?;
        output::section(venue.as_str());
        output::field("matches", markets.len());
        for market in markets.iter().take(5) {
            output::field("title", &market.title);
        }
    }
    Ok(0)
}
