//! Climate and weather signal extraction.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{resolve_settle, SettleDateType};
use crate::core::domain::fingerprint::{
    extract_comparator, extract_dates, extract_numbers, Comparator,
};
use crate::core::domain::Market;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClimateKind {
    Hurricane,
    Temperature,
    Snow,
    Rainfall,
    Drought,
    Wildfire,
    Flood,
    Earthquake,
    Volcano,
    Other,
}

impl ClimateKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hurricane => "HURRICANE",
            Self::Temperature => "TEMPERATURE",
            Self::Snow => "SNOW",
            Self::Rainfall => "RAINFALL",
            Self::Drought => "DROUGHT",
            Self::Wildfire => "WILDFIRE",
            Self::Flood => "FLOOD",
            Self::Earthquake => "EARTHQUAKE",
            Self::Volcano => "VOLCANO",
            Self::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for ClimateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

static KIND_PATTERNS: Lazy<Vec<(ClimateKind, Regex)>> = Lazy::new(|| {
    let table: &[(ClimateKind, &str)] = &[
        (
            ClimateKind::Hurricane,
            r"\b(hurricane|tropical storm|cyclone|typhoon)\b",
        ),
        (
            ClimateKind::Temperature,
            r"\b(temperature|high temp|heat wave|degrees|hottest|coldest)\b",
        ),
        (ClimateKind::Snow, r"\b(snow|snowfall|blizzard)\b"),
        (ClimateKind::Rainfall, r"\b(rain|rainfall|precipitation)\b"),
        (ClimateKind::Drought, r"\b(drought)\b"),
        (ClimateKind::Wildfire, r"\b(wildfire|forest fire)\b"),
        (ClimateKind::Flood, r"\b(flood|flooding)\b"),
        (ClimateKind::Earthquake, r"\b(earthquake|magnitude)\b"),
        (ClimateKind::Volcano, r"\b(volcano|volcanic|erupt(s|ion)?)\b"),
    ];
    table
        .iter()
        .map(|(k, p)| (*k, Regex::new(&format!("(?i){p}")).expect("climate kind regex")))
        .collect()
});

/// Locations both venues quote for weather markets.
static REGIONS: &[(&str, &str)] = &[
    ("new york", "NYC"),
    ("nyc", "NYC"),
    ("central park", "NYC"),
    ("miami", "MIA"),
    ("chicago", "CHI"),
    ("seattle", "SEA"),
    ("los angeles", "LAX"),
    ("denver", "DEN"),
    ("austin", "AUS"),
    ("boston", "BOS"),
    ("phoenix", "PHX"),
    ("houston", "HOU"),
    ("atlantic", "ATLANTIC"),
    ("gulf", "GULF"),
    ("florida", "FL"),
    ("texas", "TX"),
    ("california", "CA"),
];

/// Typed signal bundle for climate markets.
#[derive(Debug, Clone)]
pub struct ClimateSignals {
    pub kind: ClimateKind,
    pub settle_date: Option<NaiveDate>,
    pub date_type: SettleDateType,
    pub settle_period: Option<String>,
    pub region: Option<&'static str>,
    pub thresholds: Vec<f64>,
    pub comparator: Comparator,
    pub confidence: f64,
}

impl ClimateSignals {
    /// Normalized settle key: the day for day-pinned markets, the period
    /// otherwise.
    #[must_use]
    pub fn settle_key(&self) -> Option<String> {
        if let Some(date) = self.settle_date {
            return Some(date.format("%Y-%m-%d").to_string());
        }
        self.settle_period.clone()
    }

    /// Primary index key: `kind|settle_key`.
    #[must_use]
    pub fn index_key(&self) -> Option<String> {
        self.settle_key()
            .map(|s| format!("{}|{}", self.kind.as_str(), s))
    }

    /// Month fallback key for day-pinned markets: `kind|YYYY-MM`.
    #[must_use]
    pub fn month_key(&self) -> Option<String> {
        self.settle_date
            .map(|d| format!("{}|{}", self.kind.as_str(), d.format("%Y-%m")))
    }
}

/// Extract the climate signal bundle from a market.
#[must_use]
pub fn extract_climate_signals(market: &Market) -> ClimateSignals {
    let lower = market.title.to_lowercase();

    let kind = KIND_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(&lower))
        .map_or(ClimateKind::Other, |(k, _)| *k);

    let dates = extract_dates(&market.title);
    let (settle_date, date_type, settle_period) = resolve_settle(&dates, market.close_time);

    let region = REGIONS
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, code)| *code);

    let thresholds: Vec<f64> = extract_numbers(&market.title)
        .into_iter()
        .filter(|n| n.percent || !(n.value.fract() == 0.0 && (1900.0..=2100.0).contains(&n.value)))
        .map(|n| n.value)
        .collect();

    let comparator = extract_comparator(&market.title);

    let mut confidence: f64 = 0.0;
    if kind != ClimateKind::Other {
        confidence += 0.5;
    }
    if settle_date.is_some() || settle_period.is_some() {
        confidence += 0.3;
    }
    if region.is_some() {
        confidence += 0.2;
    }

    ClimateSignals {
        kind,
        settle_date,
        date_type,
        settle_period,
        region,
        thresholds,
        comparator,
        confidence,
    }
}
