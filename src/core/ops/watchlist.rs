//! Watchlist rebuild.
//!
//! The watchlist tells the quote ingester which markets deserve frequent
//! quotes. It is derived state: rebuilt from links every cycle, never
//! authoritative.

use std::collections::HashMap;

use tracing::info;

use crate::core::domain::{LinkStatus, Venue, WatchlistEntry};
use crate::core::rules::safe_confirm::{evaluate_safe_confirm, ConfirmVerdict};
use crate::core::store::{LinkFilter, Repository};
use crate::error::Result;

/// Caps applied after priority bucketing.
#[derive(Debug, Clone, Copy)]
pub struct WatchlistCaps {
    pub max_total: usize,
    pub max_per_venue: usize,
    pub max_suggested: usize,
}

impl Default for WatchlistCaps {
    fn default() -> Self {
        Self {
            max_total: 200,
            max_per_venue: 120,
            max_suggested: 80,
        }
    }
}

/// What a rebuild produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchlistSummary {
    pub total: usize,
    pub confirmed: usize,
    pub candidate_safe: usize,
    pub suggested: usize,
    pub dropped_by_caps: usize,
    pub written: bool,
}

/// Score from which a plain suggestion is still worth watching closely.
const TOP_SUGGESTED_FLOOR: f64 = 0.80;
const PRIORITY_OTHER: i32 = 30;

/// Rebuild the watchlist from current links.
///
/// Priorities: confirmed markets 100, safe-confirmable suggestions 80, top
/// suggestions 50, the rest 30. When `write` is false the summary is
/// computed but nothing is stored (dry-run).
pub async fn sync_watchlist(
    repo: &dyn Repository,
    caps: &WatchlistCaps,
    write: bool,
) -> Result<WatchlistSummary> {
    let mut best: HashMap<(Venue, i64), WatchlistEntry> = HashMap::new();

    let mut add = |venue: Venue, market_id: i64, priority: i32, reason: String| {
        let entry = WatchlistEntry {
            venue,
            market_id,
            priority,
            reason,
        };
        best.entry((venue, market_id))
            .and_modify(|existing| {
                if priority > existing.priority {
                    *existing = entry.clone();
                }
            })
            .or_insert(entry);
    };

    let confirmed = repo
        .list_links(&LinkFilter {
            status: Some(LinkStatus::Confirmed),
            ..Default::default()
        })
        .await?;
    for link in &confirmed {
        let reason = format!("confirmed link #{}", link.id);
        add(
            link.left_venue,
            link.left_market_id,
            WatchlistEntry::PRIORITY_CONFIRMED,
            reason.clone(),
        );
        add(
            link.right_venue,
            link.right_market_id,
            WatchlistEntry::PRIORITY_CONFIRMED,
            reason,
        );
    }

    let suggested = repo
        .list_links(&LinkFilter {
            status: Some(LinkStatus::Suggested),
            ..Default::default()
        })
        .await?;
    for link in &suggested {
        let left = repo.get_market(link.left_market_id).await?;
        let right = repo.get_market(link.right_market_id).await?;
        let safe = match (&left, &right) {
            (Some(l), Some(r)) => matches!(
                evaluate_safe_confirm(link, &l.title, &r.title),
                ConfirmVerdict::Confirm { .. }
            ),
            _ => false,
        };
        let (priority, label) = if safe {
            (WatchlistEntry::PRIORITY_CANDIDATE_SAFE, "candidate-safe")
        } else if link.score >= TOP_SUGGESTED_FLOOR {
            (WatchlistEntry::PRIORITY_TOP_SUGGESTED, "top suggestion")
        } else {
            (PRIORITY_OTHER, "suggestion")
        };
        let reason = format!("{label} link #{} ({:.2})", link.id, link.score);
        add(link.left_venue, link.left_market_id, priority, reason.clone());
        add(link.right_venue, link.right_market_id, priority, reason);
    }

    // Priority-descending, then stable by (venue, market id)
    let mut entries: Vec<WatchlistEntry> = best.into_values().collect();
    entries.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.venue.as_str().cmp(b.venue.as_str()))
            .then_with(|| a.market_id.cmp(&b.market_id))
    });

    let before = entries.len();
    let mut per_venue: HashMap<Venue, usize> = HashMap::new();
    let mut suggested_kept = 0usize;
    let caps_copy = *caps;
    entries.retain(|entry| {
        if entry.priority < WatchlistEntry::PRIORITY_CONFIRMED {
            if suggested_kept >= caps_copy.max_suggested {
                return false;
            }
        }
        let venue_count = per_venue.entry(entry.venue).or_insert(0);
        if *venue_count >= caps_copy.max_per_venue {
            return false;
        }
        *venue_count += 1;
        if entry.priority < WatchlistEntry::PRIORITY_CONFIRMED {
            suggested_kept += 1;
        }
        true
    });
    entries.truncate(caps.max_total);
    let dropped = before - entries.len();

    let summary = WatchlistSummary {
        total: entries.len(),
        confirmed: entries
            .iter()
            .filter(|e| e.priority == WatchlistEntry::PRIORITY_CONFIRMED)
            .count(),
        candidate_safe: entries
            .iter()
            .filter(|e| e.priority == WatchlistEntry::PRIORITY_CANDIDATE_SAFE)
            .count(),
        suggested: entries
            .iter()
            .filter(|e| e.priority < WatchlistEntry::PRIORITY_CANDIDATE_SAFE)
            .count(),
        dropped_by_caps: dropped,
        written: write,
    };

    if write {
        repo.replace_watchlist(&entries).await?;
    }
    info!(
        total = summary.total,
        confirmed = summary.confirmed,
        dropped = summary.dropped_by_caps,
        written = write,
        "Watchlist rebuilt"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{CanonicalTopic, MarketStatus, RawMarket};
    use crate::core::store::{MemoryStore, SuggestionUpsert};
    use chrono::{Duration, Utc};
    use serde_json::json;

    async fn seed_pair(store: &MemoryStore, n: i64, score: f64, status: LinkStatus) {
        let close = Utc::now() + Duration::hours(24);
        let left = store
            .upsert_market(&RawMarket {
                venue: Venue::Kalshi,
                external_id: format!("k{n}"),
                title: format!("Left market {n}"),
                status: MarketStatus::Active,
                close_time: Some(close),
                category: None,
                metadata: json!({}),
            })
            .await
            .unwrap();
        let right = store
            .upsert_market(&RawMarket {
                venue: Venue::Polymarket,
                external_id: format!("p{n}"),
                title: format!("Right market {n}"),
                status: MarketStatus::Active,
                close_time: Some(close),
                category: None,
                metadata: json!({}),
            })
            .await
            .unwrap();
        store
            .upsert_suggestion_v3(&SuggestionUpsert {
                left_venue: Venue::Kalshi,
                left_market_id: left.id,
                right_venue: Venue::Polymarket,
                right_market_id: right.id,
                score,
                reason: "X: text=0.10".into(),
                algo_version: "test".into(),
                topic: CanonicalTopic::Macro,
                status,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn confirmed_links_get_top_priority() {
        let store = MemoryStore::new();
        seed_pair(&store, 1, 0.95, LinkStatus::Confirmed).await;
        seed_pair(&store, 2, 0.85, LinkStatus::Suggested).await;
        seed_pair(&store, 3, 0.65, LinkStatus::Suggested).await;

        let summary = sync_watchlist(&store, &WatchlistCaps::default(), true)
            .await
            .unwrap();
        assert_eq!(summary.confirmed, 2); // both sides of the confirmed link
        assert!(summary.written);

        let entries = store.list_watchlist().await.unwrap();
        assert_eq!(entries.len(), summary.total);
        assert_eq!(entries[0].priority, WatchlistEntry::PRIORITY_CONFIRMED);
        // 0.85 suggestion lands in the top-suggested bucket
        assert!(entries
            .iter()
            .any(|e| e.priority == WatchlistEntry::PRIORITY_TOP_SUGGESTED));
    }

    #[tokio::test]
    async fn dry_run_does_not_write() {
        let store = MemoryStore::new();
        seed_pair(&store, 1, 0.95, LinkStatus::Confirmed).await;
        let summary = sync_watchlist(&store, &WatchlistCaps::default(), false)
            .await
            .unwrap();
        assert!(!summary.written);
        assert!(store.list_watchlist().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn suggested_cap_applies() {
        let store = MemoryStore::new();
        for n in 0..10 {
            seed_pair(&store, n, 0.85, LinkStatus::Suggested).await;
        }
        let caps = WatchlistCaps {
            max_total: 200,
            max_per_venue: 120,
            max_suggested: 6,
        };
        let summary = sync_watchlist(&store, &caps, true).await.unwrap();
        assert_eq!(summary.total, 6);
        assert!(summary.dropped_by_caps >= 14);
    }
}
