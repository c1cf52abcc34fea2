//! Geopolitical event signal extraction.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::domain::fingerprint::{extract_dates, DatePrecision};
use crate::core::domain::Market;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeoEventType {
    War,
    Peace,
    Territory,
    Military,
    Diplomacy,
    Sanctions,
    Unknown,
}

impl GeoEventType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::War => "WAR",
            Self::Peace => "PEACE",
            Self::Territory => "TERRITORY",
            Self::Military => "MILITARY",
            Self::Diplomacy => "DIPLOMACY",
            Self::Sanctions => "SANCTIONS",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for GeoEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

static EVENT_TYPE_PATTERNS: Lazy<Vec<(GeoEventType, Regex)>> = Lazy::new(|| {
    // Order matters: peace phrasing ("ceasefire in the war") should win
    // over the bare war words it quotes.
    let table: &[(GeoEventType, &str)] = &[
        (
            GeoEventType::Peace,
            r"\b(ceasefire|peace deal|peace agreement|truce|armistice)\b",
        ),
        (
            GeoEventType::Sanctions,
            r"\b(sanctions?|embargo|export controls?)\b",
        ),
        (
            GeoEventType::Territory,
            r"\b(annex(es|ation)?|territory|territorial|occupies|occupation)\b",
        ),
        (
            GeoEventType::Diplomacy,
            r"\b(summit|treaty|negotiations?|diplomatic|talks|meets with)\b",
        ),
        (
            GeoEventType::War,
            r"\b(war|invasion|invades?|declares? war)\b",
        ),
        (
            GeoEventType::Military,
            r"\b(strike|missile|military|troops|attack|nuclear test)\b",
        ),
    ];
    table
        .iter()
        .map(|(t, p)| (*t, Regex::new(p).expect("geo event regex")))
        .collect()
});

static REGIONS: &[(&str, &str)] = &[
    ("middle east", "MIDDLE_EAST"),
    ("eastern europe", "EASTERN_EUROPE"),
    ("asia pacific", "ASIA_PACIFIC"),
    ("latin america", "LATIN_AMERICA"),
    ("north africa", "NORTH_AFRICA"),
    ("balkans", "BALKANS"),
    ("south china sea", "SOUTH_CHINA_SEA"),
];

static GEO_COUNTRIES: &[(&str, &str)] = &[
    ("russia", "RUSSIA"),
    ("ukraine", "UKRAINE"),
    ("china", "CHINA"),
    ("taiwan", "TAIWAN"),
    ("iran", "IRAN"),
    ("israel", "ISRAEL"),
    ("north korea", "NORTH_KOREA"),
    ("south korea", "SOUTH_KOREA"),
    ("syria", "SYRIA"),
    ("venezuela", "VENEZUELA"),
    ("india", "INDIA"),
    ("pakistan", "PAKISTAN"),
    ("united states", "US"),
    ("nato", "NATO"),
];

static ACTORS: &[(&str, &str)] = &[
    ("putin", "PUTIN"),
    ("zelensky", "ZELENSKY"),
    ("zelenskyy", "ZELENSKY"),
    ("xi jinping", "XI"),
    ("xi", "XI"),
    ("khamenei", "KHAMENEI"),
    ("netanyahu", "NETANYAHU"),
    ("kim jong un", "KIM"),
    ("maduro", "MADURO"),
];

/// Typed signal bundle for geopolitics markets.
#[derive(Debug, Clone)]
pub struct GeoSignals {
    pub regions: Vec<&'static str>,
    pub countries: Vec<&'static str>,
    pub event_type: GeoEventType,
    pub actors: Vec<&'static str>,
    pub year: Option<i32>,
    pub deadline: Option<NaiveDate>,
    pub confidence: f64,
}

impl GeoSignals {
    /// Primary index key: `country|event_type|year` for the first country.
    #[must_use]
    pub fn index_key(&self) -> Option<String> {
        let country = self.countries.first()?;
        let year = self.year?;
        Some(format!("{}|{}|{}", country, self.event_type.as_str(), year))
    }

    /// Fallback key when no country was found: `event_type|year`.
    #[must_use]
    pub fn event_year_key(&self) -> Option<String> {
        let year = self.year?;
        (self.event_type != GeoEventType::Unknown)
            .then(|| format!("{}|{}", self.event_type.as_str(), year))
    }
}

fn find_all(lower: &str, table: &[(&str, &'static str)]) -> Vec<&'static str> {
    let mut out: Vec<&'static str> = Vec::new();
    for (needle, canonical) in table {
        if lower.contains(needle) && !out.contains(canonical) {
            out.push(canonical);
        }
    }
    out
}

/// Extract the geopolitics signal bundle from a market.
#[must_use]
pub fn extract_geo_signals(market: &Market) -> GeoSignals {
    let lower = market.title.to_lowercase();

    let event_type = EVENT_TYPE_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(&lower))
        .map_or(GeoEventType::Unknown, |(t, _)| *t);

    let regions = find_all(&lower, REGIONS);
    let countries = find_all(&lower, GEO_COUNTRIES);
    let actors = find_all(&lower, ACTORS);

    let dates = extract_dates(&market.title);
    let year = dates.first().map(|d| d.year);
    let deadline = dates
        .iter()
        .find(|d| d.precision == DatePrecision::Day)
        .and_then(|d| d.naive_date());

    let mut confidence: f64 = 0.0;
    if !countries.is_empty() || !regions.is_empty() {
        confidence += 0.4;
    }
    if event_type != GeoEventType::Unknown {
        confidence += 0.4;
    }
    if year.is_some() {
        confidence += 0.2;
    }

    GeoSignals {
        regions,
        countries,
        event_type,
        actors,
        year,
        deadline,
        confidence,
    }
}
