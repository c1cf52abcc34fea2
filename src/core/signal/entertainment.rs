//! Awards and entertainment signal extraction.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::domain::fingerprint::extract_dates;
use crate::core::domain::Market;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AwardShow {
    Oscars,
    Grammys,
    Emmys,
    GoldenGlobes,
    Tonys,
    Baftas,
    Mtva,
    Unknown,
}

impl AwardShow {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Oscars => "OSCARS",
            Self::Grammys => "GRAMMYS",
            Self::Emmys => "EMMYS",
            Self::GoldenGlobes => "GOLDEN_GLOBES",
            Self::Tonys => "TONYS",
            Self::Baftas => "BAFTAS",
            Self::Mtva => "MTVA",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// The media family the show covers.
    #[must_use]
    pub const fn media_type(&self) -> &'static str {
        match self {
            Self::Oscars | Self::Baftas => "film",
            Self::Emmys => "tv",
            Self::Grammys | Self::Mtva => "music",
            Self::Tonys => "theater",
            Self::GoldenGlobes => "film_tv",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for AwardShow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

static SHOW_PATTERNS: Lazy<Vec<(AwardShow, Regex)>> = Lazy::new(|| {
    let table: &[(AwardShow, &str)] = &[
        (AwardShow::Oscars, r"\b(oscars?|academy awards?)\b"),
        (AwardShow::Grammys, r"\b(grammys?|grammy awards?)\b"),
        (AwardShow::Emmys, r"\b(emmys?|emmy awards?)\b"),
        (AwardShow::GoldenGlobes, r"\b(golden globes?)\b"),
        (AwardShow::Tonys, r"\b(tonys?|tony awards?)\b"),
        (AwardShow::Baftas, r"\b(baftas?|bafta awards?)\b"),
        (AwardShow::Mtva, r"\b(mtv (video music )?awards?|vmas?)\b"),
    ];
    table
        .iter()
        .map(|(s, p)| (*s, Regex::new(&format!("(?i){p}")).expect("award show regex")))
        .collect()
});

/// Known award categories, normalized.
static CATEGORY_PHRASES: &[(&str, &str)] = &[
    ("best picture", "BEST_PICTURE"),
    ("best film", "BEST_PICTURE"),
    ("best director", "BEST_DIRECTOR"),
    ("best actor", "BEST_ACTOR"),
    ("best actress", "BEST_ACTRESS"),
    ("best supporting actor", "BEST_SUPPORTING_ACTOR"),
    ("best supporting actress", "BEST_SUPPORTING_ACTRESS"),
    ("album of the year", "ALBUM_OF_THE_YEAR"),
    ("record of the year", "RECORD_OF_THE_YEAR"),
    ("song of the year", "SONG_OF_THE_YEAR"),
    ("best new artist", "BEST_NEW_ARTIST"),
    ("best drama series", "BEST_DRAMA_SERIES"),
    ("best comedy series", "BEST_COMEDY_SERIES"),
    ("best musical", "BEST_MUSICAL"),
    ("best play", "BEST_PLAY"),
];

static QUOTED_TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([^"]{2,60})"|\u{201c}([^\u{201d}]{2,60})\u{201d}"#).expect("quoted title regex"));

fn is_capitalized(word: &str) -> bool {
    let mut chars = word.chars();
    chars.next().map_or(false, |c| c.is_ascii_uppercase())
        && chars.clone().count() >= 1
        && chars.all(|c| c.is_ascii_lowercase())
}

static NOMINEE_STOPWORDS: &[&str] = &[
    "best", "picture", "actor", "actress", "director", "album", "record", "song", "artist",
    "oscars", "oscar", "academy", "award", "awards", "grammy", "grammys", "emmy", "emmys",
    "golden", "globes", "tony", "tonys", "bafta", "baftas", "will", "who", "wins", "win",
];

/// Typed signal bundle for entertainment markets.
#[derive(Debug, Clone)]
pub struct EntertainmentSignals {
    pub award_show: AwardShow,
    pub media_type: &'static str,
    pub year: Option<i32>,
    pub category: Option<&'static str>,
    pub nominees: Vec<String>,
    pub confidence: f64,
}

impl EntertainmentSignals {
    /// Primary index key: `show|year`.
    #[must_use]
    pub fn index_key(&self) -> Option<String> {
        if self.award_show == AwardShow::Unknown {
            return None;
        }
        let year = self.year?;
        Some(format!("{}|{}", self.award_show.as_str(), year))
    }
}

/// Extract the entertainment signal bundle from a market.
#[must_use]
pub fn extract_entertainment_signals(market: &Market) -> EntertainmentSignals {
    let lower = market.title.to_lowercase();

    let award_show = SHOW_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(&lower))
        .map_or(AwardShow::Unknown, |(s, _)| *s);

    let category = CATEGORY_PHRASES
        .iter()
        .find(|(phrase, _)| lower.contains(phrase))
        .map(|(_, c)| *c);

    let year = extract_dates(&market.title).first().map(|d| d.year);

    // Nominees: quoted work titles plus capitalized name pairs.
    let mut nominees: Vec<String> = Vec::new();
    for caps in QUOTED_TITLE_RE.captures_iter(&market.title) {
        if let Some(m) = caps.get(1).or_else(|| caps.get(2)) {
            let normalized = m.as_str().to_lowercase().replace(' ', "_");
            if !nominees.contains(&normalized) {
                nominees.push(normalized);
            }
        }
    }
    let words: Vec<&str> = market
        .title
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    for pair in words.windows(2) {
        if !is_capitalized(pair[0]) || !is_capitalized(pair[1]) {
            continue;
        }
        let first = pair[0].to_lowercase();
        let last = pair[1].to_lowercase();
        if NOMINEE_STOPWORDS.contains(&first.as_str()) || NOMINEE_STOPWORDS.contains(&last.as_str())
        {
            continue;
        }
        let normalized = format!("{first}_{last}");
        if !nominees.contains(&normalized) {
            nominees.push(normalized);
        }
    }
    nominees.sort();
    nominees.dedup();

    let mut confidence: f64 = 0.0;
    if award_show != AwardShow::Unknown {
        confidence += 0.5;
    }
    if category.is_some() {
        confidence += 0.3;
    }
    if year.is_some() {
        confidence += 0.2;
    }

    EntertainmentSignals {
        award_show,
        media_type: award_show.media_type(),
        year,
        category,
        nominees,
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
            venue: Venue::Polymarket,
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
    fn oscars_best_picture() {
        let s = extract_entertainment_signals(&market("2026 Oscars Best Picture Winner"));
        assert_eq!(s.award_show, AwardShow::Oscars);
        assert_eq!(s.category, Some("BEST_PICTURE"));
        assert_eq!(s.year, Some(2026));
        assert_eq!(s.media_type, "film");
        assert_eq!(s.index_key().as_deref(), Some("OSCARS|2026"));
    }

    #[test]
    fn academy_awards_alias() {
        let s = extract_entertainment_signals(&market("Academy Award for Best Director 2026"));
        assert_eq!(s.award_show, AwardShow::Oscars);
        assert_eq!(s.category, Some("BEST_DIRECTOR"));
    }

    #[test]
    fn grammys_album_of_the_year() {
        let s = extract_entertainment_signals(&market(
            "Will Taylor Swift win Album of the Year at the 2026 Grammys?",
        ));
        assert_eq!(s.award_show, AwardShow::Grammys);
        assert_eq!(s.category, Some("ALBUM_OF_THE_YEAR"));
        assert_eq!(s.media_type, "music");
        assert!(s.nominees.contains(&"taylor_swift".to_string()));
    }

    #[test]
    fn quoted_work_is_a_nominee() {
        let s = extract_entertainment_signals(&market(
            r#"Will "Dune Part Three" win Best Picture at the 2027 Oscars?"#,
        ));
        assert!(s.nominees.contains(&"dune_part_three".to_string()));
    }

    #[test]
    fn unknown_show_has_no_key() {
        let s = extract_entertainment_signals(&market("Who wins the talent show?"));
        assert_eq!(s.award_show, AwardShow::Unknown);
        assert_eq!(s.index_key(), None);
    }
}
