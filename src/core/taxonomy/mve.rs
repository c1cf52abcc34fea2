//! Multi-variable (same-game-parlay) market detection.
//!
//! MVE markets bundle several outcomes of one event into a single contract.
//! They are excluded from per-outcome sports matching, so detection has to
//! fire before the sports pipeline ever sees the market.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::domain::Market;

/// Where the MVE verdict came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MveSource {
    EventTicker,
    SeriesTicker,
    ApiField,
    TitlePattern,
    Unknown,
}

impl MveSource {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::EventTicker => "event_ticker",
            Self::SeriesTicker => "series_ticker",
            Self::ApiField => "api_field",
            Self::TitlePattern => "title_pattern",
            Self::Unknown => "unknown",
        }
    }
}

/// MVE verdict with source attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MveDetection {
    pub is_mve: bool,
    pub source: MveSource,
}

/// Exchange ticker prefix reserved for multi-variable events.
const MVE_TICKER_PREFIX: &str = "KXMV";

static PARLAY_TITLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(same game parlay|sgp|parlay)\b").expect("parlay title regex")
});

/// "yes X, yes Y" enumerations read as parlays even without the word.
static YES_CHAIN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\byes\s+[^,]+,\s*yes\s+").expect("yes chain regex"));

/// Detect whether a market is multi-variable, checking the strongest signal
/// first: event ticker, then series ticker, then the explicit API field,
/// then title phrasing.
#[must_use]
pub fn detect_mve(market: &Market) -> MveDetection {
    if market
        .event_ticker()
        .map_or(false, |t| t.starts_with(MVE_TICKER_PREFIX))
    {
        return MveDetection {
            is_mve: true,
            source: MveSource::EventTicker,
        };
    }

    if market
        .series_ticker()
        .map_or(false, |t| t.starts_with(MVE_TICKER_PREFIX))
    {
        return MveDetection {
            is_mve: true,
            source: MveSource::SeriesTicker,
        };
    }

    if market
        .meta_bool(&["is_multivariate", "isMultivariate"])
        .unwrap_or(false)
    {
        return MveDetection {
            is_mve: true,
            source: MveSource::ApiField,
        };
    }

    if PARLAY_TITLE_RE.is_match(&market.title) || YES_CHAIN_RE.is_match(&market.title) {
        return MveDetection {
            is_mve: true,
            source: MveSource::TitlePattern,
        };
    }

    MveDetection {
        is_mve: false,
        source: MveSource::Unknown,
    }
}
