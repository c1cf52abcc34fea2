//! Polymarket gamma API client.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client as HttpClient;
use tracing::{debug, info};

use super::types::GammaMarket;
use crate::core::domain::{RawMarket, Venue};
use crate::core::exchange::retry::{
    classify_status, classify_transport, retry_with_backoff, RetryPolicy,
};
use crate::core::exchange::{FetchPage, FetchParams, MarketFeed, RawQuote};
use crate::error::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://gamma-api.polymarket.com";
const REQUEST_TIMEOUT_SECS: u64 = 10;
const PAGE_SIZE: u32 = 100;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct PolymarketConfig {
    pub base_url: String,
    pub page_size: u32,
}

impl Default for PolymarketConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: PAGE_SIZE,
        }
    }
}

impl PolymarketConfig {
    /// Resolve configuration from `POLYMARKET_BASE_URL`.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("POLYMARKET_BASE_URL")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.base_url),
            page_size: defaults.page_size,
        }
    }
}

/// HTTP client for the gamma markets API.
pub struct PolymarketClient {
    http: HttpClient,
    config: PolymarketConfig,
    retry: RetryPolicy,
}

impl PolymarketClient {
    pub fn new(config: PolymarketConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(Error::Http)?;
        Ok(Self {
            http,
            config,
            retry: RetryPolicy::default(),
        })
    }

    async fn get_page(&self, offset: u32) -> Result<Vec<GammaMarket>> {
        let url = format!(
            "{}/markets?active=true&closed=false&limit={}&offset={offset}",
            self.config.base_url, self.config.page_size
        );
        retry_with_backoff(&self.retry, &url, |attempt| {
            let http = self.http.clone();
            let url = url.clone();
            async move {
                if attempt > 1 {
                    debug!(url = %url, attempt, "Retrying request");
                }
                let response = http
                    .get(&url)
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
                    .json::<Vec<GammaMarket>>()
                    .await
                    .map_err(|e| classify_transport(&e))
            }
        })
        .await
    }

    /// Fetch every active market, paging by offset.
    pub async fn fetch_all_markets(&self, max_pages: u32) -> Result<Vec<RawMarket>> {
        let mut out = Vec::new();
        let mut offset = 0u32;
        let mut pages = 0u32;
        loop {
            let page = self.get_page(offset).await?;
            let fetched = page.len();
            out.extend(page.into_iter().filter_map(GammaMarket::into_raw));
            pages += 1;
            if fetched < self.config.page_size as usize {
                break;
            }
            if max_pages > 0 && pages >= max_pages {
                break;
            }
            offset += self.config.page_size;
        }
        info!(markets = out.len(), pages, "Polymarket markets fetched");
        Ok(out)
    }
}

#[async_trait]
impl MarketFeed for PolymarketClient {
    fn venue(&self) -> Venue {
        Venue::Polymarket
    }

    async fn fetch_markets(&self, params: &FetchParams) -> Result<FetchPage> {
        let offset: u32 = params
            .cursor
            .as_deref()
            .and_then(|c| c.parse().ok())
            .unwrap_or(0);
        let page = self.get_page(offset).await?;
        let fetched = page.len();
        let next_cursor = (fetched == self.config.page_size as usize)
            .then(|| (offset + self.config.page_size).to_string());
        Ok(FetchPage {
            markets: page.into_iter().filter_map(GammaMarket::into_raw).collect(),
            next_cursor,
        })
    }

    async fn fetch_quotes(&self, markets: &[RawMarket]) -> Result<Vec<RawQuote>> {
        // The gamma listing carries outcome prices; refetch the first page
        // window and join on the stable id.
        let wanted: HashMap<&str, ()> = markets
            .iter()
            .map(|m| (m.external_id.as_str(), ()))
            .collect();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }
        let page = self.get_page(0).await?;
        let now = Utc::now();
        Ok(page
            .into_iter()
            .filter_map(|m| {
                let id = m.external_id()?;
                if !wanted.contains_key(id.as_str()) {
                    return None;
                }
                let yes_price = m.yes_price()?;
                Some(RawQuote {
                    venue: Venue::Polymarket,
                    external_id: id,
                    yes_price,
                    captured_at: now,
                })
            })
            .collect())
    }
}
