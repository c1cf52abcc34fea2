//! Sports matchup signal extraction.
//!
//! Teams and start times come from the title when they must, but exchange
//! event metadata is authoritative when present: event titles name both
//! teams and the strike date carries the scheduled start.

use chrono::{DateTime, Timelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::domain::fingerprint::extract_numbers;
use crate::core::domain::{KalshiEvent, Market};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum League {
    Nba,
    Nfl,
    Nhl,
    Mlb,
    Ufc,
    Epl,
    Ncaaf,
    Ncaab,
    Unknown,
}

impl League {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Nba => "NBA",
            Self::Nfl => "NFL",
            Self::Nhl => "NHL",
            Self::Mlb => "MLB",
            Self::Ufc => "UFC",
            Self::Epl => "EPL",
            Self::Ncaaf => "NCAAF",
            Self::Ncaab => "NCAAB",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for League {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the team pair was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamsSource {
    Title,
    Event,
}

/// Where the start bucket was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartSource {
    Title,
    Event,
    CloseTime,
}

impl StartSource {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Event => "event",
            Self::CloseTime => "closeTime",
        }
    }
}

/// Kind of sports bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SportsMarketType {
    Moneyline,
    Spread,
    Total,
    Prop,
}

impl SportsMarketType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Moneyline => "moneyline",
            Self::Spread => "spread",
            Self::Total => "total",
            Self::Prop => "prop",
        }
    }

    /// Moneyline and spread questions are close enough to pair; totals and
    /// props only pair with their own kind.
    #[must_use]
    pub fn compatible_with(&self, other: SportsMarketType) -> bool {
        if *self == other {
            return true;
        }
        matches!(
            (*self, other),
            (Self::Moneyline, Self::Spread) | (Self::Spread, Self::Moneyline)
        )
    }
}

static LEAGUE_PATTERNS: Lazy<Vec<(League, Regex)>> = Lazy::new(|| {
    let table: &[(League, &str)] = &[
        (League::Nba, r"\b(nba|basketball)\b"),
        (League::Nfl, r"\b(nfl|super bowl)\b"),
        (League::Nhl, r"\b(nhl|stanley cup|hockey)\b"),
        (League::Mlb, r"\b(mlb|world series|baseball)\b"),
        (League::Ufc, r"\b(ufc|mma)\b"),
        (League::Epl, r"\b(premier league|epl)\b"),
        (League::Ncaaf, r"\b(college football|ncaaf)\b"),
        (League::Ncaab, r"\b(college basketball|march madness|ncaab)\b"),
    ];
    table
        .iter()
        .map(|(l, p)| (*l, Regex::new(&format!("(?i){p}")).expect("league regex")))
        .collect()
});

/// Exchange series prefixes carry the league for sports markets.
static SERIES_LEAGUES: &[(&str, League)] = &[
    ("KXNBA", League::Nba),
    ("KXNFL", League::Nfl),
    ("KXNHL", League::Nhl),
    ("KXMLB", League::Mlb),
    ("KXUFC", League::Ufc),
    ("KXEPL", League::Epl),
];

static MATCHUP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(.*?)\s+(?:vs\.?|at|@|v\.?)\s+(.*?)(?:\s*[:\-\?].*)?$")
        .expect("matchup regex")
});

static SPREAD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(by (more than|at least|over)|cover|spread|margin of victory)\b")
        .expect("spread regex")
});

static TOTAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(total|combined)\b.*\b(points?|goals?|runs?)\b").expect("total regex")
});

static PROP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(to score|first basket|touchdowns?|passing yards|knockout|first goal)\b")
        .expect("prop regex")
});

/// Words stripped from a team phrase before normalization.
static TEAM_NOISE: &[&str] = &[
    "winner", "game", "match", "the", "will", "win", "beat", "defeats", "defeat",
];

/// Typed signal bundle for sports markets.
#[derive(Debug, Clone)]
pub struct SportsSignals {
    pub league: League,
    /// Normalized pair, sorted so the key is order-independent.
    pub team_a: Option<String>,
    pub team_b: Option<String>,
    pub teams_source: TeamsSource,
    /// Hour-truncated scheduled start.
    pub start_bucket: Option<DateTime<Utc>>,
    pub start_source: StartSource,
    pub market_type: SportsMarketType,
    pub line_value: Option<f64>,
    pub confidence: f64,
}

impl SportsSignals {
    /// Event key: `league|teamA|teamB|bucket`.
    #[must_use]
    pub fn event_key(&self) -> Option<String> {
        let a = self.team_a.as_deref()?;
        let b = self.team_b.as_deref()?;
        let bucket = self.start_bucket?;
        Some(format!(
            "{}|{}|{}|{}",
            self.league.as_str(),
            a,
            b,
            bucket.format("%Y-%m-%dT%H:00Z")
        ))
    }
}

/// Tokens that end the team phrase and start the bet description.
static TEAM_STOPWORDS: &[&str] = &[
    "total", "points", "over", "under", "combined", "by", "margin", "score", "moneyline",
];

/// Normalize a team phrase to its nickname: cut at the first bet-description
/// token, strip noise words, and keep the last token
/// ("Los Angeles Lakers" -> "lakers").
#[must_use]
pub fn normalize_team(raw: &str) -> Option<String> {
    let mut tokens: Vec<String> = Vec::new();
    for token in raw
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        if TEAM_STOPWORDS.contains(&token) {
            break;
        }
        if !TEAM_NOISE.contains(&token) {
            tokens.push(token.to_string());
        }
    }
    tokens.last().cloned().filter(|t| t.len() >= 3)
}

fn truncate_to_hour(t: DateTime<Utc>) -> DateTime<Utc> {
    t.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}

fn parse_matchup(text: &str) -> Option<(String, String)> {
    let caps = MATCHUP_RE.captures(text)?;
    let a = normalize_team(caps.get(1)?.as_str())?;
    let b = normalize_team(caps.get(2)?.as_str())?;
    if a == b {
        return None;
    }
    // Unordered pair: sorted so "Lakers at Celtics" and "Celtics vs Lakers"
    // index identically.
    if a <= b {
        Some((a, b))
    } else {
        Some((b, a))
    }
}

fn classify_market_type(lower: &str) -> SportsMarketType {
    if TOTAL_RE.is_match(lower) {
        SportsMarketType::Total
    } else if SPREAD_RE.is_match(lower) {
        SportsMarketType::Spread
    } else if PROP_RE.is_match(lower) {
        SportsMarketType::Prop
    } else {
        SportsMarketType::Moneyline
    }
}

/// Extract the sports signal bundle from a market, enriched with its
/// exchange event when available.
#[must_use]
pub fn extract_sports_signals(market: &Market, event: Option<&KalshiEvent>) -> SportsSignals {
    let lower = market.title.to_lowercase();

    let mut league = market
        .series_ticker()
        .map(str::to_ascii_uppercase)
        .and_then(|s| {
            SERIES_LEAGUES
                .iter()
                .find(|(prefix, _)| s.starts_with(prefix))
                .map(|(_, l)| *l)
        })
        .unwrap_or(League::Unknown);
    if league == League::Unknown {
        league = LEAGUE_PATTERNS
            .iter()
            .find(|(_, re)| re.is_match(&lower))
            .map_or(League::Unknown, |(l, _)| *l);
    }

    // Event metadata beats title parsing for teams. The fetch path stores
    // event enrichment in the metadata bag when it resolved the event
    // up front.
    let event_title = event
        .map(|e| e.title.clone())
        .or_else(|| market.meta_str(&["event_title"]).map(String::from));
    let (teams, teams_source) = match event_title.as_deref().and_then(parse_matchup) {
        Some(pair) => (Some(pair), TeamsSource::Event),
        None => (parse_matchup(&market.title), TeamsSource::Title),
    };
    let (team_a, team_b) = match teams {
        Some((a, b)) => (Some(a), Some(b)),
        None => (None, None),
    };

    let event_strike = event
        .and_then(|e| e.strike_date)
        .or_else(|| {
            market
                .meta_str(&["event_strike_date"])
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| t.with_timezone(&Utc))
        });
    let (start_bucket, start_source) = match event_strike {
        Some(strike) => (Some(truncate_to_hour(strike)), StartSource::Event),
        None => match market.close_time {
            Some(close) => (Some(truncate_to_hour(close)), StartSource::CloseTime),
            None => (None, StartSource::CloseTime),
        },
    };

    let market_type = classify_market_type(&lower);
    let line_value = match market_type {
        SportsMarketType::Spread | SportsMarketType::Total => extract_numbers(&market.title)
            .into_iter()
            .map(|n| n.value)
            .find(|v| *v < 300.0),
        _ => None,
    };

    let mut confidence: f64 = 0.0;
    if league != League::Unknown {
        confidence += 0.3;
    }
    if team_a.is_some() {
        confidence += 0.4;
    }
    if start_bucket.is_some() {
        confidence += 0.3;
    }

    SportsSignals {
        league,
        team_a,
        team_b,
        teams_source,
        start_bucket,
        start_source,
        market_type,
        line_value,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{MarketStatus, Venue};
    use chrono::TimeZone;
    use serde_json::{json, Value};

    fn market(title: &str, close: Option<DateTime<Utc>>, metadata: Value) -> Market {
        Market {
            id: 1,
            venue: Venue::Kalshi,
            external_id: "X".into(),
            title: title.into(),
            status: MarketStatus::Active,
            close_time: close,
            category: None,
            metadata,
            derived_topic: None,
            taxonomy_source: None,
            is_mve: false,
            event_ticker: None,
        }
    }

    fn event(title: &str, strike: DateTime<Utc>) -> KalshiEvent {
        KalshiEvent {
            event_ticker: "KXNBA-26JAN21-LAL-BOS".into(),
            series_ticker: Some("KXNBA".into()),
            title: title.into(),
            subtitle: None,
            category: Some("Sports".into()),
            strike_date: Some(strike),
            mutually_exclusive: true,
            market_count: 2,
        }
    }

    #[test]
    fn title_matchup_normalizes_and_sorts() {
        let close = Utc.with_ymd_and_hms(2026, 1, 21, 19, 30, 0).unwrap();
        let m = market("Los Angeles Lakers at Boston Celtics Winner", Some(close), Value::Null);
        let s = extract_sports_signals(&m, None);
        assert_eq!(s.team_a.as_deref(), Some("celtics"));
        assert_eq!(s.team_b.as_deref(), Some("lakers"));
        assert_eq!(s.teams_source, TeamsSource::Title);
        assert_eq!(s.start_source, StartSource::CloseTime);
        assert_eq!(
            s.event_key().as_deref(),
            Some("UNKNOWN|celtics|lakers|2026-01-21T19:00Z")
        );
    }

    #[test]
    fn reversed_matchup_keys_identically() {
        let close = Utc.with_ymd_and_hms(2026, 1, 21, 19, 0, 0).unwrap();
        let a = market("Lakers at Celtics Winner", Some(close), Value::Null);
        let b = market("Celtics vs Lakers", Some(close), Value::Null);
        let ka = extract_sports_signals(&a, None).event_key();
        let kb = extract_sports_signals(&b, None).event_key();
        assert_eq!(ka, kb);
        assert!(ka.is_some());
    }

    #[test]
    fn event_metadata_is_authoritative() {
        let close = Utc.with_ymd_and_hms(2026, 1, 22, 4, 0, 0).unwrap();
        let strike = Utc.with_ymd_and_hms(2026, 1, 21, 19, 30, 0).unwrap();
        let m = market("Will the home team win?", Some(close), Value::Null);
        let e = event("Lakers at Celtics", strike);
        let s = extract_sports_signals(&m, Some(&e));
        assert_eq!(s.teams_source, TeamsSource::Event);
        assert_eq!(s.team_a.as_deref(), Some("celtics"));
        assert_eq!(s.start_source, StartSource::Event);
        assert_eq!(
            s.start_bucket,
            Some(Utc.with_ymd_and_hms(2026, 1, 21, 19, 0, 0).unwrap())
        );
    }

    #[test]
    fn league_from_series_ticker() {
        let m = market(
            "Lakers at Celtics Winner",
            None,
            json!({"series_ticker": "KXNBA"}),
        );
        let s = extract_sports_signals(&m, None);
        assert_eq!(s.league, League::Nba);
    }

    #[test]
    fn league_from_title() {
        let m = market("NBA: Lakers vs Celtics", None, Value::Null);
        let s = extract_sports_signals(&m, None);
        assert_eq!(s.league, League::Nba);
    }

    #[test]
    fn spread_with_line() {
        let m = market(
            "Chiefs beat the Bills by more than 6.5 points?",
            None,
            Value::Null,
        );
        let s = extract_sports_signals(&m, None);
        assert_eq!(s.market_type, SportsMarketType::Spread);
        assert_eq!(s.line_value, Some(6.5));
    }

    #[test]
    fn total_market() {
        let m = market(
            "Lakers vs Celtics total points over 220.5?",
            None,
            Value::Null,
        );
        let s = extract_sports_signals(&m, None);
        assert_eq!(s.market_type, SportsMarketType::Total);
        assert_eq!(s.line_value, Some(220.5));
    }

    #[test]
    fn market_type_compatibility() {
        assert!(SportsMarketType::Moneyline.compatible_with(SportsMarketType::Spread));
        assert!(!SportsMarketType::Moneyline.compatible_with(SportsMarketType::Total));
        assert!(SportsMarketType::Total.compatible_with(SportsMarketType::Total));
    }
}
