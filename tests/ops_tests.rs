//! Operational loop scenarios.

mod support;

use matchlock::core::domain::{CanonicalTopic, LinkStatus, Venue};
use matchlock::core::ops::{run_ops, OpsConfig};
use matchlock::core::pipeline::register_all_pipelines;
use matchlock::core::store::{LinkFilter, MemoryStore, Repository};
use matchlock::error::Error;

use support::{seed_pair, MarketSeed};

#[tokio::test]
async fn preflight_skips_finance_and_runs_the_rest() {
    let store = MemoryStore::new();
    seed_pair(
        &store,
        CanonicalTopic::CryptoDaily,
        "Bitcoin above $100,000 on Jan 21, 2026",
        "BTC above $100k Jan 21 2026",
    )
    .await;
    // FINANCE exists only on the left venue
    MarketSeed::new(Venue::Kalshi, "fin-1", "S&P 500 above 6000 on March 31, 2026")
        .topic(CanonicalTopic::Finance)
        .insert(&store)
        .await;

    let registry = register_all_pipelines();
    let config = OpsConfig {
        apply: true,
        auto_confirm: true,
        ..OpsConfig::new(vec![CanonicalTopic::Finance, CanonicalTopic::CryptoDaily])
    };
    let report = run_ops(&store, &registry, None, &config).await.unwrap();

    // FINANCE skipped with a warning, the rest finished cleanly
    assert_eq!(report.skipped_topics.len(), 1);
    assert_eq!(report.skipped_topics[0].0, CanonicalTopic::Finance);
    assert!(report.skipped_topics[0].1.contains("no overlap"));
    assert!(report.healthy(), "errors: {:?}", report.errors());

    // The crypto pair auto-confirmed and landed on the watchlist
    let confirmed = store
        .list_links(&LinkFilter {
            status: Some(LinkStatus::Confirmed),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(confirmed.len(), 1);

    let watchlist = store.list_watchlist().await.unwrap();
    assert!(watchlist.len() >= 2);
    assert!(watchlist.iter().all(|e| e.priority == 100));
}

#[tokio::test]
async fn all_topics_skipped_is_fatal() {
    let store = MemoryStore::new();
    let registry = register_all_pipelines();
    let config = OpsConfig::new(vec![CanonicalTopic::Finance, CanonicalTopic::Climate]);
    let err = run_ops(&store, &registry, None, &config).await.unwrap_err();
    assert!(matches!(err, Error::Preflight(_)));
}

#[tokio::test]
async fn dry_run_reports_without_writing() {
    let store = MemoryStore::new();
    seed_pair(
        &store,
        CanonicalTopic::CryptoDaily,
        "Bitcoin above $100,000 on Jan 21, 2026",
        "BTC above $100k Jan 21 2026",
    )
    .await;

    let registry = register_all_pipelines();
    let config = OpsConfig::new(vec![CanonicalTopic::CryptoDaily]);
    let report = run_ops(&store, &registry, None, &config).await.unwrap();

    assert!(report.healthy());
    assert!(store.list_links(&LinkFilter::default()).await.unwrap().is_empty());
    assert!(store.list_watchlist().await.unwrap().is_empty());
    // KPI step still produced a summary
    assert!(report.kpis.is_some());
}
