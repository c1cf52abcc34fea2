//! Kalshi exchange adapter.

mod auth;
mod client;
mod types;

pub use auth::{bearer_token, KalshiCredentials};
pub use client::{KalshiClient, KalshiConfig, KalshiMaintainer};
pub use types::{ApiEvent, ApiMarket, ApiSeries, EventsResponse, MarketsResponse, SeriesResponse};
