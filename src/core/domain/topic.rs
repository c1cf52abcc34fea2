//! Canonical topic taxonomy.

use serde::{Deserialize, Serialize};

/// Closed set of canonical topics a market can be classified into.
///
/// New topics are rare and intentional; dispatching on this enum is the
/// backbone of the pipeline registry, so the set stays closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CanonicalTopic {
    CryptoDaily,
    CryptoIntraday,
    Macro,
    Rates,
    Elections,
    Geopolitics,
    Sports,
    Entertainment,
    Climate,
    Commodities,
    Finance,
    Universal,
    Unknown,
}

impl CanonicalTopic {
    /// All topics in a stable order, UNKNOWN last.
    pub const ALL: [CanonicalTopic; 13] = [
        CanonicalTopic::CryptoDaily,
        CanonicalTopic::CryptoIntraday,
        CanonicalTopic::Macro,
        CanonicalTopic::Rates,
        CanonicalTopic::Elections,
        CanonicalTopic::Geopolitics,
        CanonicalTopic::Sports,
        CanonicalTopic::Entertainment,
        CanonicalTopic::Climate,
        CanonicalTopic::Commodities,
        CanonicalTopic::Finance,
        CanonicalTopic::Universal,
        CanonicalTopic::Unknown,
    ];

    /// Stable string form used in the database and the CLI.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CryptoDaily => "CRYPTO_DAILY",
            Self::CryptoIntraday => "CRYPTO_INTRADAY",
            Self::Macro => "MACRO",
            Self::Rates => "RATES",
            Self::Elections => "ELECTIONS",
            Self::Geopolitics => "GEOPOLITICS",
            Self::Sports => "SPORTS",
            Self::Entertainment => "ENTERTAINMENT",
            Self::Climate => "CLIMATE",
            Self::Commodities => "COMMODITIES",
            Self::Finance => "FINANCE",
            Self::Universal => "UNIVERSAL",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Parse a topic from its stable string form (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_ascii_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
    }

    /// Whether markets of this topic should be excluded from generic fetches.
    ///
    /// Sports markets have their own event-enriched fetch path; every other
    /// pipeline filters them out.
    #[must_use]
    pub const fn excludes_sports(&self) -> bool {
        !matches!(self, Self::Sports)
    }
}

impl std::fmt::Display for CanonicalTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a market's derived topic was assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxonomySource {
    Database,
    Rule,
    TickerPattern,
    TitleKeywords,
    Category,
    Metadata,
    SeriesMetadata,
    EventMetadata,
    Fallback,
}

impl TaxonomySource {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::Rule => "rule",
            Self::TickerPattern => "ticker_pattern",
            Self::TitleKeywords => "title_keywords",
            Self::Category => "category",
            Self::Metadata => "metadata",
            Self::SeriesMetadata => "series_metadata",
            Self::EventMetadata => "event_metadata",
            Self::Fallback => "fallback",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "database" => Some(Self::Database),
            "rule" => Some(Self::Rule),
            "ticker_pattern" => Some(Self::TickerPattern),
            "title_keywords" => Some(Self::TitleKeywords),
            "category" => Some(Self::Category),
            "metadata" => Some(Self::Metadata),
            "series_metadata" => Some(Self::SeriesMetadata),
            "event_metadata" => Some(Self::EventMetadata),
            "fallback" => Some(Self::Fallback),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaxonomySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_string_roundtrip() {
        for topic in CanonicalTopic::ALL {
            assert_eq!(CanonicalTopic::parse(topic.as_str()), Some(topic));
        }
    }

    #[test]
    fn topic_parse_is_case_insensitive() {
        assert_eq!(
            CanonicalTopic::parse("crypto_daily"),
            Some(CanonicalTopic::CryptoDaily)
        );
        assert_eq!(
            CanonicalTopic::parse(" Elections "),
            Some(CanonicalTopic::Elections)
        );
        assert_eq!(CanonicalTopic::parse("bogus"), None);
    }

    #[test]
    fn only_sports_keeps_sports_markets() {
        assert!(!CanonicalTopic::Sports.excludes_sports());
        assert!(CanonicalTopic::CryptoDaily.excludes_sports());
        assert!(CanonicalTopic::Macro.excludes_sports());
    }

    #[test]
    fn taxonomy_source_roundtrip() {
        for source in [
            TaxonomySource::Database,
            TaxonomySource::Rule,
            TaxonomySource::TickerPattern,
            TaxonomySource::TitleKeywords,
            TaxonomySource::Category,
            TaxonomySource::Metadata,
            TaxonomySource::SeriesMetadata,
            TaxonomySource::EventMetadata,
            TaxonomySource::Fallback,
        ] {
            assert_eq!(TaxonomySource::parse(source.as_str()), Some(source));
        }
    }
}
