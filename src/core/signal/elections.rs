//! Election signal extraction.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::domain::fingerprint::{extract_dates, DatePrecision};
use crate::core::domain::Market;

/// Countries whose elections both venues routinely list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Country {
    Us,
    Uk,
    France,
    Germany,
    Canada,
    Australia,
    Malaysia,
    Latvia,
    India,
    Brazil,
    Mexico,
    Japan,
    SouthKorea,
    Israel,
    Ireland,
    Poland,
    Netherlands,
    Italy,
    Spain,
    Argentina,
    Romania,
    Portugal,
    Chile,
    Venezuela,
    Unknown,
}

impl Country {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Us => "US",
            Self::Uk => "UK",
            Self::France => "FRANCE",
            Self::Germany => "GERMANY",
            Self::Canada => "CANADA",
            Self::Australia => "AUSTRALIA",
            Self::Malaysia => "MALAYSIA",
            Self::Latvia => "LATVIA",
            Self::India => "INDIA",
            Self::Brazil => "BRAZIL",
            Self::Mexico => "MEXICO",
            Self::Japan => "JAPAN",
            Self::SouthKorea => "SOUTH_KOREA",
            Self::Israel => "ISRAEL",
            Self::Ireland => "IRELAND",
            Self::Poland => "POLAND",
            Self::Netherlands => "NETHERLANDS",
            Self::Italy => "ITALY",
            Self::Spain => "SPAIN",
            Self::Argentina => "ARGENTINA",
            Self::Romania => "ROMANIA",
            Self::Portugal => "PORTUGAL",
            Self::Chile => "CHILE",
            Self::Venezuela => "VENEZUELA",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for Country {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The office being contested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Office {
    President,
    Senate,
    House,
    Governor,
    PrimeMinister,
    Mayor,
    PartyControl,
    VicePresident,
    Unknown,
}

impl Office {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::President => "PRESIDENT",
            Self::Senate => "SENATE",
            Self::House => "HOUSE",
            Self::Governor => "GOVERNOR",
            Self::PrimeMinister => "PRIME_MINISTER",
            Self::Mayor => "MAYOR",
            Self::PartyControl => "PARTY_CONTROL",
            Self::VicePresident => "VICE_PRESIDENT",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Office compatibility for the hard gate. HOUSE and SENATE races are
    /// often phrased as chamber-control questions on the other venue.
    #[must_use]
    pub fn compatible_with(&self, other: Office) -> bool {
        if *self == other {
            return true;
        }
        matches!(
            (*self, other),
            (Office::House, Office::PartyControl)
                | (Office::PartyControl, Office::House)
                | (Office::Senate, Office::PartyControl)
                | (Office::PartyControl, Office::Senate)
        )
    }
}

impl std::fmt::Display for Office {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the market is actually asking about the race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectionIntent {
    Winner,
    Margin,
    Turnout,
    PartyControl,
    Nominee,
}

impl ElectionIntent {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Winner => "WINNER",
            Self::Margin => "MARGIN",
            Self::Turnout => "TURNOUT",
            Self::PartyControl => "PARTY_CONTROL",
            Self::Nominee => "NOMINEE",
        }
    }
}

static COUNTRY_PATTERNS: Lazy<Vec<(Country, Regex)>> = Lazy::new(|| {
    let table: &[(Country, &str)] = &[
        (Country::Us, r"\b(us|u\.s\.|usa|united states|america)\b"),
        (Country::Uk, r"\b(uk|u\.k\.|united kingdom|britain|british)\b"),
        (Country::France, r"\b(france|french)\b"),
        (Country::Germany, r"\b(germany|german)\b"),
        (Country::Canada, r"\b(canada|canadian)\b"),
        (Country::Australia, r"\b(australia|australian)\b"),
        (Country::Malaysia, r"\b(malaysia|malaysian)\b"),
        (Country::Latvia, r"\b(latvia|latvian)\b"),
        (Country::India, r"\b(india|indian)\b"),
        (Country::Brazil, r"\b(brazil|brazilian)\b"),
        (Country::Mexico, r"\b(mexico|mexican)\b"),
        (Country::Japan, r"\b(japan|japanese)\b"),
        (Country::SouthKorea, r"\b(south korea|korean)\b"),
        (Country::Israel, r"\b(israel|israeli)\b"),
        (Country::Ireland, r"\b(ireland|irish)\b"),
        (Country::Poland, r"\b(poland|polish)\b"),
        (Country::Netherlands, r"\b(netherlands|dutch)\b"),
        (Country::Italy, r"\b(italy|italian)\b"),
        (Country::Spain, r"\b(spain|spanish)\b"),
        (Country::Argentina, r"\b(argentina|argentine)\b"),
        (Country::Romania, r"\b(romania|romanian)\b"),
        (Country::Portugal, r"\b(portugal|portuguese)\b"),
        (Country::Chile, r"\b(chile|chilean)\b"),
        (Country::Venezuela, r"\b(venezuela|venezuelan)\b"),
    ];
    table
        .iter()
        .map(|(c, p)| (*c, Regex::new(p).expect("country regex")))
        .collect()
});

/// US state names to postal codes. "Georgia" stays out: it collides with
/// the country and is resolved by office context below.
static US_STATES: &[(&str, &str)] = &[
    ("alabama", "AL"),
    ("alaska", "AK"),
    ("arizona", "AZ"),
    ("arkansas", "AR"),
    ("california", "CA"),
    ("colorado", "CO"),
    ("connecticut", "CT"),
    ("delaware", "DE"),
    ("florida", "FL"),
    ("hawaii", "HI"),
    ("idaho", "ID"),
    ("illinois", "IL"),
    ("indiana", "IN"),
    ("iowa", "IA"),
    ("kansas", "KS"),
    ("kentucky", "KY"),
    ("louisiana", "LA"),
    ("maine", "ME"),
    ("maryland", "MD"),
    ("massachusetts", "MA"),
    ("michigan", "MI"),
    ("minnesota", "MN"),
    ("mississippi", "MS"),
    ("missouri", "MO"),
    ("montana", "MT"),
    ("nebraska", "NE"),
    ("nevada", "NV"),
    ("new hampshire", "NH"),
    ("new jersey", "NJ"),
    ("new mexico", "NM"),
    ("new york", "NY"),
    ("north carolina", "NC"),
    ("north dakota", "ND"),
    ("ohio", "OH"),
    ("oklahoma", "OK"),
    ("oregon", "OR"),
    ("pennsylvania", "PA"),
    ("rhode island", "RI"),
    ("south carolina", "SC"),
    ("south dakota", "SD"),
    ("tennessee", "TN"),
    ("texas", "TX"),
    ("utah", "UT"),
    ("vermont", "VT"),
    ("virginia", "VA"),
    ("washington", "WA"),
    ("west virginia", "WV"),
    ("wisconsin", "WI"),
    ("wyoming", "WY"),
];

/// Ambiguous names resolved to a state only when the office is clearly a
/// US one.
static AMBIGUOUS_STATES: &[(&str, &str)] = &[("georgia", "GA")];

/// Candidate aliases folded to a canonical normalized name.
static CANDIDATE_ALIASES: &[(&str, &str)] = &[
    ("donald trump", "donald_trump"),
    ("trump", "donald_trump"),
    ("joe biden", "joe_biden"),
    ("biden", "joe_biden"),
    ("kamala harris", "kamala_harris"),
    ("harris", "kamala_harris"),
    ("kamala", "kamala_harris"),
    ("jd vance", "jd_vance"),
    ("vance", "jd_vance"),
    ("gavin newsom", "gavin_newsom"),
    ("newsom", "gavin_newsom"),
    ("ron desantis", "ron_desantis"),
    ("desantis", "ron_desantis"),
    ("emmanuel macron", "emmanuel_macron"),
    ("macron", "emmanuel_macron"),
    ("marine le pen", "marine_le_pen"),
    ("le pen", "marine_le_pen"),
    ("keir starmer", "keir_starmer"),
    ("starmer", "keir_starmer"),
    ("nigel farage", "nigel_farage"),
    ("farage", "nigel_farage"),
    ("rishi sunak", "rishi_sunak"),
    ("sunak", "rishi_sunak"),
    ("anwar ibrahim", "anwar_ibrahim"),
    ("anwar", "anwar_ibrahim"),
];

static PARTY_PATTERNS: &[(&str, &str)] = &[
    ("democrat", "DEMOCRATIC"),
    ("republican", "REPUBLICAN"),
    ("gop", "REPUBLICAN"),
    ("labour", "LABOUR"),
    ("conservative", "CONSERVATIVE"),
    ("tory", "CONSERVATIVE"),
    ("tories", "CONSERVATIVE"),
];

static CANDIDATE_ALIAS_RES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    CANDIDATE_ALIASES
        .iter()
        .map(|(alias, canonical)| {
            // Aliases are whole words; "trumpet" must not hit "trump".
            let pattern = format!(r"\b{}\b", regex::escape(alias));
            (
                Regex::new(&pattern).expect("candidate alias regex"),
                *canonical,
            )
        })
        .collect()
});

/// Title words that look like names but never are.
static NAME_STOPWORDS: &[&str] = &[
    "election", "presidential", "president", "winner", "senate", "house", "governor", "general",
    "prime", "minister", "party", "control", "united", "states", "kingdom", "popular", "vote",
    "margin", "turnout", "nominee", "primary", "runoff", "republican", "democratic", "who", "will",
    "win", "next", "new",
];

/// Typed signal bundle for election markets.
#[derive(Debug, Clone)]
pub struct ElectionSignals {
    pub country: Country,
    pub office: Office,
    pub year: Option<i32>,
    pub state: Option<&'static str>,
    pub candidates: Vec<String>,
    pub intent: ElectionIntent,
    pub party: Option<&'static str>,
    pub confidence: f64,
}

impl ElectionSignals {
    /// Race key: `country|office|year[|state]`.
    #[must_use]
    pub fn race_key(&self) -> String {
        let mut key = format!(
            "{}|{}|{}",
            self.country.as_str(),
            self.office.as_str(),
            self.year.map_or_else(|| "?".to_string(), |y| y.to_string())
        );
        if let Some(state) = self.state {
            key.push('|');
            key.push_str(state);
        }
        key
    }

    /// Secondary index key: `country|year`.
    #[must_use]
    pub fn country_year_key(&self) -> Option<String> {
        let year = self.year?;
        Some(format!("{}|{}", self.country.as_str(), year))
    }
}

fn extract_office(lower: &str) -> Office {
    if lower.contains("vice president") || lower.contains("vice-president") {
        return Office::VicePresident;
    }
    if lower.contains("party control")
        || lower.contains("house majority")
        || lower.contains("senate majority")
        || (lower.contains("control") && (lower.contains("house") || lower.contains("senate")))
    {
        return Office::PartyControl;
    }
    if lower.contains("president") {
        return Office::President;
    }
    if lower.contains("senate") || lower.contains("senator") {
        return Office::Senate;
    }
    if lower.contains("governor") {
        return Office::Governor;
    }
    if lower.contains("house") || lower.contains("congressional district") {
        return Office::House;
    }
    if lower.contains("prime minister") {
        return Office::PrimeMinister;
    }
    if lower.contains("mayor") {
        return Office::Mayor;
    }
    Office::Unknown
}

fn extract_intent(lower: &str, office: Office) -> ElectionIntent {
    if lower.contains("margin") {
        return ElectionIntent::Margin;
    }
    if lower.contains("turnout") {
        return ElectionIntent::Turnout;
    }
    if lower.contains("nominee") || lower.contains("nomination") || lower.contains("primary") {
        return ElectionIntent::Nominee;
    }
    if office == Office::PartyControl {
        return ElectionIntent::PartyControl;
    }
    ElectionIntent::Winner
}

fn is_capitalized_name(word: &str) -> bool {
    let mut chars = word.chars();
    chars.next().map_or(false, |c| c.is_ascii_uppercase())
        && chars.clone().count() >= 1
        && chars.all(|c| c.is_ascii_lowercase())
}

fn extract_candidates(title: &str, lower: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();

    for (re, canonical) in CANDIDATE_ALIAS_RES.iter() {
        if re.is_match(lower) && !found.iter().any(|c| c == canonical) {
            found.push((*canonical).to_string());
        }
    }

    // Generic First Last pairs from the raw title, minus the known aliases
    // and obvious non-names. Adjacent-word windows overlap, so "Will Josh
    // Shapiro" still yields the Josh Shapiro pair.
    let words: Vec<&str> = title
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    for pair in words.windows(2) {
        if !is_capitalized_name(pair[0]) || !is_capitalized_name(pair[1]) {
            continue;
        }
        let first = pair[0].to_lowercase();
        let last = pair[1].to_lowercase();
        if NAME_STOPWORDS.contains(&first.as_str()) || NAME_STOPWORDS.contains(&last.as_str()) {
            continue;
        }
        let spaced = format!("{first} {last}");
        if CANDIDATE_ALIASES.iter().any(|(alias, _)| *alias == spaced) {
            continue; // already folded above
        }
        let normalized = format!("{first}_{last}");
        if !found.contains(&normalized) {
            found.push(normalized);
        }
    }

    found.sort();
    found.dedup();
    found
}

/// Extract the election signal bundle from a market.
#[must_use]
pub fn extract_election_signals(market: &Market) -> ElectionSignals {
    let lower = market.title.to_lowercase();

    let office = extract_office(&lower);

    let mut country = COUNTRY_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(&lower))
        .map_or(Country::Unknown, |(c, _)| *c);

    let mut state = US_STATES
        .iter()
        .find(|(name, _)| lower.contains(name))
        .map(|(_, code)| *code);

    // US-shaped offices resolve the Georgia collision and imply the country
    let us_office = matches!(office, Office::Senate | Office::House | Office::Governor);
    if state.is_none() && us_office {
        state = AMBIGUOUS_STATES
            .iter()
            .find(|(name, _)| lower.contains(name))
            .map(|(_, code)| *code);
    }
    if country == Country::Unknown && state.is_some() && us_office {
        country = Country::Us;
    }

    let year = extract_dates(&market.title)
        .iter()
        .find(|d| {
            matches!(
                d.precision,
                DatePrecision::Year | DatePrecision::Day | DatePrecision::Month
            )
        })
        .map(|d| d.year);

    let intent = extract_intent(&lower, office);
    let candidates = extract_candidates(&market.title, &lower);

    let party = PARTY_PATTERNS
        .iter()
        .find(|(pattern, _)| lower.contains(pattern))
        .map(|(_, p)| *p);

    let mut confidence: f64 = 0.0;
    if country != Country::Unknown {
        confidence += 0.4;
    }
    if office != Office::Unknown {
        confidence += 0.3;
    }
    if year.is_some() {
        confidence += 0.2;
    }
    if !candidates.is_empty() {
        confidence += 0.1;
    }

    ElectionSignals {
        country,
        office,
        year,
        state,
        candidates,
        intent,
        party,
        confidence,
    }
}
