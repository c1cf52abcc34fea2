//! KPI summary and quote freshness probe.

use chrono::{Duration, Utc};

use crate::core::domain::{CanonicalTopic, LinkStatus, Venue};
use crate::core::store::{LinkFilter, Repository};
use crate::error::Result;

/// Per-venue quote recency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteFreshness {
    pub venue: Venue,
    pub recent_quotes: u64,
    pub stale: bool,
}

/// The freshness window: a venue with zero quotes in it is flagged.
const FRESHNESS_WINDOW_MINUTES: i64 = 5;

/// Probe quote recency for both venues.
pub async fn probe_quote_freshness(repo: &dyn Repository) -> Result<Vec<QuoteFreshness>> {
    let since = Utc::now() - Duration::minutes(FRESHNESS_WINDOW_MINUTES);
    let mut out = Vec::new();
    for venue in [Venue::Kalshi, Venue::Polymarket] {
        let recent_quotes = repo.count_recent_quotes(venue, since).await?;
        out.push(QuoteFreshness {
            venue,
            recent_quotes,
            stale: recent_quotes == 0,
        });
    }
    Ok(out)
}

/// Per-topic link counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicBreakdown {
    pub topic: CanonicalTopic,
    pub suggested: u64,
    pub confirmed: u64,
}

/// Ingestion job names the probe checks per venue.
const INGESTION_JOBS: &[&str] = &["markets-sync", "quotes-sync"];

fn env_i64_or(name: &str, default: i64) -> i64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Flag ingestion jobs that look stuck: too long since the last success,
/// or too many consecutive failures. Thresholds come from
/// `KALSHI_STUCK_THRESHOLD_MIN` and `KALSHI_MAX_FAILURES_IN_ROW`.
pub async fn probe_ingestion_health(repo: &dyn Repository) -> Result<Vec<String>> {
    let stuck_threshold_min = env_i64_or("KALSHI_STUCK_THRESHOLD_MIN", 30);
    let max_failures = env_i64_or("KALSHI_MAX_FAILURES_IN_ROW", 5);
    let now = Utc::now();

    let mut issues = Vec::new();
    for venue in [Venue::Kalshi, Venue::Polymarket] {
        for job in INGESTION_JOBS {
            let Some(state) = repo.get_ingestion_state(venue, job).await? else {
                continue;
            };
            if i64::from(state.consecutive_failures) >= max_failures {
                issues.push(format!(
                    "{venue}/{job}: {} consecutive failures",
                    state.consecutive_failures
                ));
                continue;
            }
            if let Some(last_success) = state.last_success_at {
                let age_min = now.signed_duration_since(last_success).num_minutes();
                if age_min >= stuck_threshold_min {
                    issues.push(format!("{venue}/{job}: stuck for {age_min}m"));
                }
            }
        }
    }
    Ok(issues)
}

/// The operational KPI summary.
#[derive(Debug, Clone, Default)]
pub struct KpiSummary {
    pub suggested_total: u64,
    pub confirmed_total: u64,
    pub confirmed_last_24h: u64,
    pub watchlist_total: usize,
    pub per_topic: Vec<TopicBreakdown>,
    pub freshness: Vec<QuoteFreshness>,
    pub ingestion_issues: Vec<String>,
    pub healthy: bool,
}

/// Collect the KPI summary.
pub async fn collect_kpis(repo: &dyn Repository) -> Result<KpiSummary> {
    let suggested_total = repo
        .count_links(&LinkFilter {
            status: Some(LinkStatus::Suggested),
            ..Default::default()
        })
        .await?;

    let confirmed = repo
        .list_links(&LinkFilter {
            status: Some(LinkStatus::Confirmed),
            ..Default::default()
        })
        .await?;
    let confirmed_total = confirmed.len() as u64;
    let day_ago = Utc::now() - Duration::hours(24);
    let confirmed_last_24h = confirmed
        .iter()
        .filter(|l| l.updated_at >= day_ago)
        .count() as u64;

    let mut per_topic = Vec::new();
    for topic in CanonicalTopic::ALL {
        let suggested = repo
            .count_links(&LinkFilter {
                topic: Some(topic),
                status: Some(LinkStatus::Suggested),
                ..Default::default()
            })
            .await?;
        let confirmed = repo
            .count_links(&LinkFilter {
                topic: Some(topic),
                status: Some(LinkStatus::Confirmed),
                ..Default::default()
            })
            .await?;
        if suggested > 0 || confirmed > 0 {
            per_topic.push(TopicBreakdown {
                topic,
                suggested,
                confirmed,
            });
        }
    }

    let watchlist_total = repo.list_watchlist().await?.len();
    let freshness = probe_quote_freshness(repo).await?;
    let ingestion_issues = probe_ingestion_health(repo).await?;
    let healthy = freshness.iter().all(|f| !f.stale) && ingestion_issues.is_empty();

    Ok(KpiSummary {
        suggested_total,
        confirmed_total,
        confirmed_last_24h,
        watchlist_total,
        per_topic,
        freshness,
        ingestion_issues,
        healthy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::Quote;
    use crate::core::store::{MemoryStore, SuggestionUpsert};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn freshness_flags_quiet_venues() {
        let store = MemoryStore::new();
        store
            .record_quote(
                &Quote {
                    venue: Venue::Kalshi,
                    market_id: 1,
                    yes_price: dec!(0.5),
                    captured_at: Utc::now(),
                },
                60,
            )
            .await
            .unwrap();

        let freshness = probe_quote_freshness(&store).await.unwrap();
        let kalshi = freshness.iter().find(|f| f.venue == Venue::Kalshi).unwrap();
        let poly = freshness
            .iter()
            .find(|f| f.venue == Venue::Polymarket)
            .unwrap();
        assert!(!kalshi.stale);
        assert!(poly.stale);
    }

    #[tokio::test]
    async fn ingestion_probe_flags_failures_and_staleness() {
        let store = MemoryStore::new();
        store.set_ingestion_state(crate::core::domain::IngestionState {
            venue: Venue::Kalshi,
            job_name: "markets-sync".into(),
            last_success_at: Some(Utc::now()),
            last_error: Some("boom".into()),
            consecutive_failures: 7,
        });
        store.set_ingestion_state(crate::core::domain::IngestionState {
            venue: Venue::Polymarket,
            job_name: "quotes-sync".into(),
            last_success_at: Some(Utc::now() - Duration::minutes(90)),
            last_error: None,
            consecutive_failures: 0,
        });

        let issues = probe_ingestion_health(&store).await.unwrap();
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().any(|i| i.contains("consecutive failures")));
        assert!(issues.iter().any(|i| i.contains("stuck")));
    }

    #[tokio::test]
    async fn kpi_counts_by_status_and_topic() {
        let store = MemoryStore::new();
        for (n, status) in [
            (1, LinkStatus::Suggested),
            (2, LinkStatus::Suggested),
            (3, LinkStatus::Confirmed),
        ] {
            store
                .upsert_suggestion_v3(&SuggestionUpsert {
                    left_venue: Venue::Kalshi,
                    left_market_id: n,
                    right_venue: Venue::Polymarket,
                    right_market_id: n + 100,
                    score: 0.9,
                    reason: "r".into(),
                    algo_version: "v".into(),
                    topic: CanonicalTopic::CryptoDaily,
                    status,
                })
                .await
                .unwrap();
        }

        let kpis = collect_kpis(&store).await.unwrap();
        assert_eq!(kpis.suggested_total, 2);
        assert_eq!(kpis.confirmed_total, 1);
        assert_eq!(kpis.confirmed_last_24h, 1);
        assert_eq!(kpis.per_topic.len(), 1);
        assert_eq!(kpis.per_topic[0].topic, CanonicalTopic::CryptoDaily);
        // No quotes at all: both venues stale, not healthy
        assert!(!kpis.healthy);
    }
}
