//! The operational loop and its supporting pieces.

mod kpi;
mod runner;
mod watchlist;

pub use kpi::{
    collect_kpis, probe_ingestion_health, probe_quote_freshness, KpiSummary, QuoteFreshness,
    TopicBreakdown,
};
pub use runner::{run_ops, OpsConfig, OpsReport, StepOutcome, TaxonomyMaintainer};
pub use watchlist::{sync_watchlist, WatchlistCaps, WatchlistSummary};
