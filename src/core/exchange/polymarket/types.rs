//! Polymarket gamma API DTOs and conversions.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::core::domain::{MarketStatus, RawMarket, Venue};

/// A market as the gamma API returns it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GammaMarket {
    #[serde(default)]
    pub condition_id: Option<String>,
    pub question: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub category: Option<String>,
    /// JSON-encoded list of outcome prices, e.g. `"[\"0.42\", \"0.58\"]"`.
    #[serde(default)]
    pub outcome_prices: Option<String>,
}

impl GammaMarket {
    /// The stable external id: the condition id when present, else the slug.
    #[must_use]
    pub fn external_id(&self) -> Option<String> {
        self.condition_id
            .clone()
            .filter(|c| !c.is_empty())
            .or_else(|| self.slug.clone().filter(|s| !s.is_empty()))
    }

    /// First outcome price (the YES side), parsed out of the stringified
    /// list the API ships.
    #[must_use]
    pub fn yes_price(&self) -> Option<rust_decimal::Decimal> {
        let raw = self.outcome_prices.as_deref()?;
        let prices: Vec<String> = serde_json::from_str(raw).ok()?;
        prices.first()?.parse().ok()
    }

    /// Convert into the adapter DTO; markets without a stable id are
    /// dropped by the caller.
    #[must_use]
    pub fn into_raw(self) -> Option<RawMarket> {
        let external_id = self.external_id()?;
        let status = if self.closed {
            MarketStatus::Closed
        } else if self.active {
            MarketStatus::Active
        } else {
            MarketStatus::Archived
        };
        Some(RawMarket {
            venue: Venue::Polymarket,
            external_id,
            title: self.question.clone(),
            status,
            close_time: self.end_date,
            category: self.category.clone(),
            metadata: json!({
                "condition_id": self.condition_id,
                "slug": self.slug,
            }),
        })
    }
}
