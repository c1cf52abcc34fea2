//! Commodity and financial-instrument signal extraction.
//!
//! COMMODITIES and FINANCE share one bundle: both are "instrument vs level
//! by date" questions, differing only in asset class.

use chrono::NaiveDate;

use super::{resolve_settle, SettleDateType};
use crate::core::domain::fingerprint::{
    extract_comparator, extract_dates, extract_numbers, Comparator,
};
use crate::core::domain::Market;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetClass {
    Energy,
    Metals,
    Agriculture,
    EquityIndex,
    SingleStock,
    Unknown,
}

impl AssetClass {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Energy => "ENERGY",
            Self::Metals => "METALS",
            Self::Agriculture => "AGRICULTURE",
            Self::EquityIndex => "EQUITY_INDEX",
            Self::SingleStock => "SINGLE_STOCK",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Whether the class belongs to the FINANCE topic rather than
    /// COMMODITIES.
    #[must_use]
    pub const fn is_financial(&self) -> bool {
        matches!(self, Self::EquityIndex | Self::SingleStock)
    }
}

static INSTRUMENTS: &[(&str, &str, AssetClass)] = &[
    ("wti", "WTI", AssetClass::Energy),
    ("brent", "BRENT", AssetClass::Energy),
    ("crude oil", "WTI", AssetClass::Energy),
    ("oil price", "WTI", AssetClass::Energy),
    ("natural gas", "NATGAS", AssetClass::Energy),
    ("gasoline", "GASOLINE", AssetClass::Energy),
    ("gold", "GOLD", AssetClass::Metals),
    ("silver", "SILVER", AssetClass::Metals),
    ("copper", "COPPER", AssetClass::Metals),
    ("wheat", "WHEAT", AssetClass::Agriculture),
    ("corn", "CORN", AssetClass::Agriculture),
    ("soybean", "SOYBEANS", AssetClass::Agriculture),
    ("s&p 500", "SPX", AssetClass::EquityIndex),
    ("s&p500", "SPX", AssetClass::EquityIndex),
    ("sp500", "SPX", AssetClass::EquityIndex),
    ("nasdaq", "NDX", AssetClass::EquityIndex),
    ("dow jones", "DJI", AssetClass::EquityIndex),
    ("russell 2000", "RUT", AssetClass::EquityIndex),
    ("tesla", "TSLA", AssetClass::SingleStock),
    ("apple", "AAPL", AssetClass::SingleStock),
    ("nvidia", "NVDA", AssetClass::SingleStock),
    ("microsoft", "MSFT", AssetClass::SingleStock),
];

/// Typed signal bundle for commodity and finance markets.
#[derive(Debug, Clone)]
pub struct CommoditySignals {
    pub asset_class: AssetClass,
    pub instrument: Option<&'static str>,
    pub comparator: Comparator,
    pub target: Option<f64>,
    pub range: Option<(f64, f64)>,
    pub settle_date: Option<NaiveDate>,
    pub date_type: SettleDateType,
    pub settle_period: Option<String>,
    pub confidence: f64,
}

impl CommoditySignals {
    /// Primary index key: `instrument|settle`.
    #[must_use]
    pub fn index_key(&self) -> Option<String> {
        let instrument = self.instrument?;
        if let Some(date) = self.settle_date {
            return Some(format!("{instrument}|{}", date.format("%Y-%m-%d")));
        }
        self.settle_period
            .as_ref()
            .map(|p| format!("{instrument}|{p}"))
    }

    /// Values used for number-agreement scoring.
    #[must_use]
    pub fn level_values(&self) -> Vec<f64> {
        if let Some((low, high)) = self.range {
            return vec![low, high];
        }
        self.target.into_iter().collect()
    }
}

/// Extract the commodity/finance signal bundle from a market.
#[must_use]
pub fn extract_commodity_signals(market: &Market) -> CommoditySignals {
    let lower = market.title.to_lowercase();

    let matched = INSTRUMENTS
        .iter()
        .find(|(needle, _, _)| lower.contains(needle));
    let (instrument, asset_class) =
        matched.map_or((None, AssetClass::Unknown), |(_, name, class)| {
            (Some(*name), *class)
        });

    let comparator = extract_comparator(&market.title);

    // Instrument names like "S&P 500" carry digits of their own; scrub the
    // matched name so its numbers never read as price levels.
    let mut scrubbed = market.title.clone();
    if let Some((needle, _, _)) = matched {
        if let Some(pos) = lower.find(needle) {
            scrubbed.replace_range(pos..pos + needle.len(), &" ".repeat(needle.len()));
        }
    }

    let levels: Vec<f64> = extract_numbers(&scrubbed)
        .into_iter()
        .filter(|n| {
            n.monetary
                || n.percent
                || !(n.value.fract() == 0.0 && (1900.0..=2100.0).contains(&n.value))
        })
        .map(|n| n.value)
        .collect();

    let (target, range) = if comparator == Comparator::Between && levels.len() >= 2 {
        (None, Some((levels[0].min(levels[1]), levels[0].max(levels[1]))))
    } else {
        (levels.first().copied(), None)
    };

    let dates = extract_dates(&market.title);
    let (settle_date, date_type, settle_period) = resolve_settle(&dates, market.close_time);

    let mut confidence: f64 = 0.0;
    if instrument.is_some() {
        confidence += 0.5;
    }
    if target.is_some() || range.is_some() {
        confidence += 0.3;
    }
    if settle_date.is_some() || settle_period.is_some() {
        confidence += 0.2;
    }

    CommoditySignals {
        asset_class,
        instrument,
        comparator,
        target,
        range,
        settle_date,
        date_type,
        settle_period,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{MarketStatus, Venue};
    use serde_json::Value;

    fn market(title: &str) -> Market {
        Market {
            id: 1,
            venue: Venue::Kalshi,
            external_id: "X".into(),
            title: title.into(),
            status: MarketStatus::Active,
            close_time: None,
            category: None,
            metadata: Value::Null,
            derived_topic: None,
            taxonomy_source: None,
            is_mve: false,
            event_ticker: None,
        }
    }

    #[test]
    fn wti_threshold() {
        let s = extract_commodity_signals(&market("WTI crude oil above $90 on March 31, 2026?"));
        assert_eq!(s.instrument, Some("WTI"));
        assert_eq!(s.asset_class, AssetClass::Energy);
        assert_eq!(s.comparator, Comparator::Ge);
        assert_eq!(s.target, Some(90.0));
        assert_eq!(s.index_key().as_deref(), Some("WTI|2026-03-31"));
    }

    #[test]
    fn gold_range() {
        let s = extract_commodity_signals(&market("Gold between $2,500 and $2,700 in June 2026"));
        assert_eq!(s.instrument, Some("GOLD"));
        assert_eq!(s.range, Some((2500.0, 2700.0)));
        assert_eq!(s.level_values(), vec![2500.0, 2700.0]);
        assert_eq!(s.date_type, SettleDateType::MonthEnd);
    }

    #[test]
    fn sp500_is_finance() {
        let s = extract_commodity_signals(&market("S&P 500 above 6000 at year end 2026?"));
        assert_eq!(s.instrument, Some("SPX"));
        assert!(s.asset_class.is_financial());
        assert_eq!(s.target, Some(6000.0));
    }

    #[test]
    fn single_stock() {
        let s = extract_commodity_signals(&market("Nvidia market cap above $5t in 2026?"));
        assert_eq!(s.instrument, Some("NVDA"));
        assert_eq!(s.asset_class, AssetClass::SingleStock);
        assert_eq!(s.target, Some(5e12));
    }

    #[test]
    fn no_instrument_no_key() {
        let s = extract_commodity_signals(&market("Price of everything goes up"));
        assert_eq!(s.instrument, None);
        assert_eq!(s.index_key(), None);
    }
}
