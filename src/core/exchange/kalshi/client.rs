//! Kalshi trade API client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client as HttpClient;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::auth::{bearer_token, KalshiCredentials};
use super::types::{ApiMarket, EventsResponse, MarketsResponse, SeriesResponse};
use crate::core::domain::{RawMarket, Venue};
use crate::core::exchange::retry::{
    classify_status, classify_transport, retry_with_backoff, RetryPolicy,
};
use crate::core::exchange::{FetchPage, FetchParams, MarketFeed, RawQuote};
use crate::core::ops::TaxonomyMaintainer;
use crate::core::store::Repository;
use crate::core::taxonomy::detect_mve;
use crate::error::{Error, Result};

const PRODUCTION_BASE_URL: &str = "https://api.elections.kalshi.com/trade-api/v2";
const DEMO_BASE_URL: &str = "https://demo-api.kalshi.co/trade-api/v2";
const REQUEST_TIMEOUT_SECS: u64 = 10;
const MAX_MARKETS_LIMIT: u32 = 1000;

/// Client configuration, resolved from the environment.
#[derive(Debug, Clone)]
pub struct KalshiConfig {
    pub base_url: String,
    /// Page size; the API caps it at 1000.
    pub markets_limit: u32,
    /// 0 means unlimited.
    pub max_pages: u32,
    /// Fetch mode: plain markets or the event/series catalog.
    pub mode: String,
    pub series_tickers: Vec<String>,
    pub series_categories: Vec<String>,
    pub events_status: Vec<String>,
    pub with_nested_markets: bool,
    /// Hard cap on markets per run; 0 means unlimited.
    pub global_cap_markets: u32,
    pub stuck_threshold_min: i64,
    pub max_failures_in_row: u32,
}

impl Default for KalshiConfig {
    fn default() -> Self {
        Self {
            base_url: PRODUCTION_BASE_URL.to_string(),
            markets_limit: 200,
            max_pages: 0,
            mode: "markets".to_string(),
            series_tickers: Vec::new(),
            series_categories: Vec::new(),
            events_status: vec!["open".to_string()],
            with_nested_markets: false,
            global_cap_markets: 0,
            stuck_threshold_min: 30,
            max_failures_in_row: 5,
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_list(name: &str, lowercase: bool) -> Vec<String> {
    env_var(name)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    if lowercase {
                        s.to_lowercase()
                    } else {
                        s.to_string()
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}

impl KalshiConfig {
    /// Resolve configuration from `KALSHI_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let use_demo = env_var("KALSHI_USE_DEMO")
            .map_or(false, |v| v == "1" || v.eq_ignore_ascii_case("true"));
        let base_url = env_var("KALSHI_BASE_URL").unwrap_or_else(|| {
            if use_demo {
                DEMO_BASE_URL.to_string()
            } else {
                PRODUCTION_BASE_URL.to_string()
            }
        });
        let markets_limit = env_var("KALSHI_MARKETS_LIMIT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.markets_limit)
            .min(MAX_MARKETS_LIMIT);
        let events_status = {
            let list = env_list("KALSHI_EVENTS_STATUS", true);
            let valid: Vec<String> = list
                .into_iter()
                .filter(|s| matches!(s.as_str(), "open" | "closed" | "settled"))
                .collect();
            if valid.is_empty() {
                defaults.events_status.clone()
            } else {
                valid
            }
        };
        Self {
            base_url,
            markets_limit,
            max_pages: env_var("KALSHI_MAX_PAGES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_pages),
            mode: env_var("KALSHI_MODE").unwrap_or(defaults.mode),
            series_tickers: env_list("KALSHI_SERIES_TICKERS", false),
            series_categories: env_list("KALSHI_SERIES_CATEGORIES", true),
            events_status,
            with_nested_markets: env_var("KALSHI_WITH_NESTED_MARKETS")
                .map_or(false, |v| v == "1" || v.eq_ignore_ascii_case("true")),
            global_cap_markets: env_var("KALSHI_GLOBAL_CAP_MARKETS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.global_cap_markets),
            stuck_threshold_min: env_var("KALSHI_STUCK_THRESHOLD_MIN")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.stuck_threshold_min),
            max_failures_in_row: env_var("KALSHI_MAX_FAILURES_IN_ROW")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_failures_in_row),
        }
    }
}

/// HTTP client for the Kalshi trade API.
pub struct KalshiClient {
    http: HttpClient,
    config: KalshiConfig,
    credentials: Option<KalshiCredentials>,
    retry: RetryPolicy,
}

impl KalshiClient {
    /// Create a client; credentials are optional since the market listing
    /// endpoints are public.
    pub fn new(config: KalshiConfig, credentials: Option<KalshiCredentials>) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(Error::Http)?;
        Ok(Self {
            http,
            config,
            credentials,
            retry: RetryPolicy::default(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        retry_with_backoff(&self.retry, url, |attempt| {
            let http = self.http.clone();
            let url = url.to_string();
            let auth = self
                .credentials
                .as_ref()
                .map(bearer_token)
                .transpose()
                .ok()
                .flatten();
            async move {
                if attempt > 1 {
                    debug!(url = %url, attempt, "Retrying request");
                }
                let mut request = http.get(&url);
                if let Some(token) = auth {
                    request = request.bearer_auth(token);
                }
                let response = request
                    .send()
                    .await
                    .map_err(|e| classify_transport(&e))?;
                let status = response.status();
                if !status.is_success() {
                    let retry_after = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    return Err(classify_status(
                        status.as_u16(),
                        retry_after.as_deref(),
                        Utc::now(),
                    ));
                }
                response
                    .json::<T>()
                    .await
                    .map_err(|e| classify_transport(&e))
            }
        })
        .await
    }

    /// Fetch one page of markets.
    pub async fn fetch_markets_page(&self, cursor: Option<&str>) -> Result<MarketsResponse> {
        let mut url = format!(
            "{}/markets?limit={}",
            self.config.base_url, self.config.markets_limit
        );
        if let Some(cursor) = cursor {
            url.push_str(&format!("&cursor={cursor}"));
        }
        self.get_json(&url).await
    }

    /// Fetch every market, honoring the page and global caps.
    pub async fn fetch_all_markets(&self) -> Result<Vec<RawMarket>> {
        let mut out: Vec<RawMarket> = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0u32;

        loop {
            let page = self.fetch_markets_page(cursor.as_deref()).await?;
            let fetched = page.markets.len();
            out.extend(page.markets.into_iter().map(ApiMarket::into_raw));
            pages += 1;
            debug!(pages, fetched, total = out.len(), "Markets page fetched");

            if self.config.global_cap_markets > 0
                && out.len() >= self.config.global_cap_markets as usize
            {
                out.truncate(self.config.global_cap_markets as usize);
                warn!(cap = self.config.global_cap_markets, "Global market cap hit");
                break;
            }
            if self.config.max_pages > 0 && pages >= self.config.max_pages {
                break;
            }
            match page.cursor.filter(|c| !c.is_empty()) {
                Some(next) if fetched > 0 => cursor = Some(next),
                _ => break,
            }
        }
        info!(markets = out.len(), pages, "Kalshi markets fetched");
        Ok(out)
    }

    /// Fetch one page of events, optionally with nested markets.
    pub async fn fetch_events_page(
        &self,
        status: &str,
        cursor: Option<&str>,
    ) -> Result<EventsResponse> {
        let mut url = format!(
            "{}/events?limit=200&status={status}&with_nested_markets={}",
            self.config.base_url, self.config.with_nested_markets
        );
        if let Some(cursor) = cursor {
            url.push_str(&format!("&cursor={cursor}"));
        }
        self.get_json(&url).await
    }

    /// Fetch series metadata for one series ticker.
    pub async fn fetch_series(&self, series_ticker: &str) -> Result<SeriesResponse> {
        let url = format!("{}/series/{series_ticker}", self.config.base_url);
        self.get_json(&url).await
    }

    #[must_use]
    pub fn config(&self) -> &KalshiConfig {
        &self.config
    }
}

#[async_trait]
impl MarketFeed for KalshiClient {
    fn venue(&self) -> Venue {
        Venue::Kalshi
    }

    async fn fetch_markets(&self, params: &FetchParams) -> Result<FetchPage> {
        let page = self.fetch_markets_page(params.cursor.as_deref()).await?;
        Ok(FetchPage {
            markets: page.markets.into_iter().map(ApiMarket::into_raw).collect(),
            next_cursor: page.cursor.filter(|c| !c.is_empty()),
        })
    }

    async fn fetch_quotes(&self, markets: &[RawMarket]) -> Result<Vec<RawQuote>> {
        // The markets listing already carries the current bid; re-fetch the
        // requested tickers in one page and read their yes bids.
        let tickers: Vec<&str> = markets.iter().map(|m| m.external_id.as_str()).collect();
        if tickers.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!(
            "{}/markets?tickers={}",
            self.config.base_url,
            tickers.join(",")
        );
        let page: MarketsResponse = self.get_json(&url).await?;
        let now = Utc::now();
        Ok(page
            .markets
            .into_iter()
            .filter_map(|m| {
                let cents = m.yes_bid?;
                Some(RawQuote {
                    venue: Venue::Kalshi,
                    external_id: m.ticker,
                    yes_price: Decimal::new(cents, 2),
                    captured_at: now,
                })
            })
            .collect())
    }
}

/// Taxonomy maintenance: incremental event sync into the store.
pub struct KalshiMaintainer {
    client: KalshiClient,
    /// Skip multi-variable events entirely.
    pub non_mve_only: bool,
}

impl KalshiMaintainer {
    #[must_use]
    pub fn new(client: KalshiClient) -> Self {
        Self {
            client,
            non_mve_only: false,
        }
    }

    /// Sync events for the configured statuses; returns counts.
    pub async fn sync_events(&self, repo: &dyn Repository) -> Result<(u64, u64)> {
        let mut synced = 0u64;
        let mut skipped_mve = 0u64;

        for status in self.client.config.events_status.clone() {
            let mut cursor: Option<String> = None;
            let mut pages = 0u32;
            loop {
                let page = self
                    .client
                    .fetch_events_page(&status, cursor.as_deref())
                    .await?;
                let fetched = page.events.len();
                for api_event in page.events {
                    if self.non_mve_only && api_event.event_ticker.starts_with("KXMV") {
                        skipped_mve += 1;
                        continue;
                    }
                    // Nested markets ride along into the market table
                    if let Some(nested) = &api_event.markets {
                        for market in nested.clone() {
                            let raw = market.into_raw();
                            let stored = repo.upsert_market(&raw).await?;
                            let mve = detect_mve(&stored);
                            if mve.is_mve && !stored.is_mve {
                                repo.update_market_taxonomy(
                                    stored.id,
                                    stored
                                        .derived_topic
                                        .unwrap_or(crate::core::domain::CanonicalTopic::Unknown),
                                    stored
                                        .taxonomy_source
                                        .unwrap_or(crate::core::domain::TaxonomySource::Fallback),
                                    true,
                                    false,
                                )
                                .await?;
                            }
                        }
                    }
                    repo.upsert_event(&api_event.into_domain()).await?;
                    synced += 1;
                }
                pages += 1;
                if self.client.config.max_pages > 0 && pages >= self.client.config.max_pages {
                    break;
                }
                match page.cursor.filter(|c| !c.is_empty()) {
                    Some(next) if fetched > 0 => cursor = Some(next),
                    _ => break,
                }
            }
        }
        Ok((synced, skipped_mve))
    }
}

#[async_trait]
impl TaxonomyMaintainer for KalshiMaintainer {
    async fn sync(&self, repo: &dyn Repository) -> Result<String> {
        let (synced, skipped_mve) = self.sync_events(repo).await?;
        Ok(format!("{synced} events synced, {skipped_mve} MVE skipped"))
    }
}
