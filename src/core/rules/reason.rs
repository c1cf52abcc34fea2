//! The structured reason-string grammar.
//!
//! Every link write is stamped with a reason the rule engines can parse
//! back without re-extracting signals. One token per field,
//! space-separated; scores print with two decimals so a formatted reason
//! parses back to exactly the value it carried.

use chrono::{DateTime, TimeZone, Utc};

use crate::core::signal::crypto::{CryptoEntity, PriceContext};
use crate::core::signal::macro_econ::PeriodMatchKind;
use crate::core::signal::{Direction, SettleDateType};

/// Qualitative label attached to a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Strong,
    Weak,
}

impl Tier {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Strong => "STRONG",
            Self::Weak => "WEAK",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "STRONG" => Some(Self::Strong),
            "WEAK" => Some(Self::Weak),
            _ => None,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Crypto-daily reason:
/// `entity=<E> dateType=<T> date=<s>(<d>d) num=<s>[<ctx>] text=<s>`.
#[derive(Debug, Clone, PartialEq)]
pub struct CryptoDailyReason {
    pub entity: Option<CryptoEntity>,
    pub date_type: SettleDateType,
    pub date_score: f64,
    pub day_diff: i64,
    pub num_score: f64,
    pub num_context: PriceContext,
    pub text_score: f64,
}

impl CryptoDailyReason {
    #[must_use]
    pub fn format(&self) -> String {
        format!(
            "entity={} dateType={} date={:.2}({}d) num={:.2}[{}] text={:.2}",
            self.entity.map_or("NONE", |e| e.as_str()),
            self.date_type.as_str(),
            self.date_score,
            self.day_diff,
            self.num_score,
            self.num_context.as_str(),
            self.text_score,
        )
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let fields = split_fields(s)?;
        let entity = match field(&fields, "entity")? {
            "NONE" => None,
            e => Some(CryptoEntity::parse(e)?),
        };
        let date_type = SettleDateType::parse(field(&fields, "dateType")?)?;
        let date_raw = field(&fields, "date")?;
        let (date_score, day_diff) = parse_score_with_days(date_raw)?;
        let num_raw = field(&fields, "num")?;
        let (num_score, ctx) = parse_score_with_bracket(num_raw)?;
        let num_context = PriceContext::parse(ctx)?;
        let text_score = field(&fields, "text")?.parse().ok()?;
        Some(Self {
            entity,
            date_type,
            date_score,
            day_diff,
            num_score,
            num_context,
            text_score,
        })
    }
}

/// Crypto-intraday reason: `entity=<E> bucket=<iso> dir=<L>/<R> text=<s>`.
#[derive(Debug, Clone, PartialEq)]
pub struct CryptoIntradayReason {
    pub entity: Option<CryptoEntity>,
    pub bucket: DateTime<Utc>,
    pub dir_left: Option<Direction>,
    pub dir_right: Option<Direction>,
    pub text_score: f64,
}

const BUCKET_FORMAT: &str = "%Y-%m-%dT%H:%MZ";

impl CryptoIntradayReason {
    #[must_use]
    pub fn format(&self) -> String {
        format!(
            "entity={} bucket={} dir={}/{} text={:.2}",
            self.entity.map_or("NONE", |e| e.as_str()),
            self.bucket.format(BUCKET_FORMAT),
            self.dir_left.map_or("-", |d| d.as_str()),
            self.dir_right.map_or("-", |d| d.as_str()),
            self.text_score,
        )
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let fields = split_fields(s)?;
        let entity = match field(&fields, "entity")? {
            "NONE" => None,
            e => Some(CryptoEntity::parse(e)?),
        };
        let bucket = chrono::NaiveDateTime::parse_from_str(field(&fields, "bucket")?, BUCKET_FORMAT)
            .ok()
            .map(|n| Utc.from_utc_datetime(&n))?;
        let dirs = field(&fields, "dir")?;
        let (l, r) = dirs.split_once('/')?;
        let dir_left = (l != "-").then(|| Direction::parse(l)).flatten();
        let dir_right = (r != "-").then(|| Direction::parse(r)).flatten();
        let text_score = field(&fields, "text")?.parse().ok()?;
        Some(Self {
            entity,
            bucket,
            dir_left,
            dir_right,
            text_score,
        })
    }
}

/// Macro reason:
/// `MACRO: tier=<T> me=<s> per=<s>[<kind>](<periodL>/<periodR>) num=<s> txt=<s>`.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroReason {
    pub tier: Tier,
    pub me_score: f64,
    pub per_score: f64,
    pub per_kind: Option<PeriodMatchKind>,
    pub period_left: String,
    pub period_right: String,
    pub num_score: f64,
    pub text_score: f64,
}

impl MacroReason {
    #[must_use]
    pub fn format(&self) -> String {
        format!(
            "MACRO: tier={} me={:.2} per={:.2}[{}]({}/{}) num={:.2} txt={:.2}",
            self.tier.as_str(),
            self.me_score,
            self.per_score,
            self.per_kind.map_or("none", |k| k.as_str()),
            self.period_left,
            self.period_right,
            self.num_score,
            self.text_score,
        )
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let rest = s.strip_prefix("MACRO: ")?;
        let fields = split_fields(rest)?;
        let tier = Tier::parse(field(&fields, "tier")?)?;
        let me_score = field(&fields, "me")?.parse().ok()?;
        let per_raw = field(&fields, "per")?;
        let (per_score, kind_str, period_left, period_right) = parse_period_field(per_raw)?;
        let per_kind = match kind_str {
            "none" => None,
            k => Some(PeriodMatchKind::parse(k)?),
        };
        let num_score = field(&fields, "num")?.parse().ok()?;
        let text_score = field(&fields, "txt")?.parse().ok()?;
        Some(Self {
            tier,
            me_score,
            per_score,
            per_kind,
            period_left: period_left.to_string(),
            period_right: period_right.to_string(),
            num_score,
            text_score,
        })
    }
}

/// Colon-prefixed generic reason: `<TAG>: k=v k=v ...`.
///
/// Values are sanitized to a single token at format time; parsing returns
/// the pairs in order.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericReason {
    pub tag: String,
    pub fields: Vec<(String, String)>,
}

impl GenericReason {
    #[must_use]
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn push(&mut self, key: &str, value: impl std::fmt::Display) -> &mut Self {
        let sanitized = value
            .to_string()
            .replace(char::is_whitespace, "_");
        self.fields.push((key.to_string(), sanitized));
        self
    }

    pub fn push_score(&mut self, key: &str, value: f64) -> &mut Self {
        self.fields.push((key.to_string(), format!("{value:.2}")));
        self
    }

    #[must_use]
    pub fn format(&self) -> String {
        let body = self
            .fields
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ");
        format!("{}: {}", self.tag, body)
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let (tag, body) = s.split_once(": ")?;
        if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_uppercase() || c == '_') {
            return None;
        }
        let mut fields = Vec::new();
        for token in body.split_whitespace() {
            let (k, v) = token.split_once('=')?;
            fields.push((k.to_string(), v.to_string()));
        }
        Some(Self {
            tag: tag.to_string(),
            fields,
        })
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn get_score(&self, key: &str) -> Option<f64> {
        self.get(key)?.parse().ok()
    }
}

/// Any reason this system ever writes.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedReason {
    CryptoDaily(CryptoDailyReason),
    CryptoIntraday(CryptoIntradayReason),
    Macro(MacroReason),
    Generic(GenericReason),
    /// Rewritten by a rule engine: `auto_confirm@..` / `auto_reject@..`.
    Auto {
        confirmed: bool,
        version: String,
        detail: String,
    },
}

/// Parse any reason string emitted by a pipeline or rule engine.
#[must_use]
pub fn parse_reason(s: &str) -> Option<ParsedReason> {
    if let Some(rest) = s.strip_prefix("auto_confirm@") {
        let (version, detail) = rest.split_once(':')?;
        return Some(ParsedReason::Auto {
            confirmed: true,
            version: version.to_string(),
            detail: detail.to_string(),
        });
    }
    if let Some(rest) = s.strip_prefix("auto_reject@") {
        let (version, detail) = rest.split_once(':')?;
        return Some(ParsedReason::Auto {
            confirmed: false,
            version: version.to_string(),
            detail: detail.to_string(),
        });
    }
    if s.starts_with("MACRO: ") {
        return MacroReason::parse(s).map(ParsedReason::Macro);
    }
    if s.starts_with("entity=") {
        if s.contains(" bucket=") {
            return CryptoIntradayReason::parse(s).map(ParsedReason::CryptoIntraday);
        }
        return CryptoDailyReason::parse(s).map(ParsedReason::CryptoDaily);
    }
    GenericReason::parse(s).map(ParsedReason::Generic)
}

/// `auto_confirm@<ver>:<topic>:<rule>`.
#[must_use]
pub fn format_auto_confirm(version: &str, topic: &str, rule: &str) -> String {
    format!("auto_confirm@{version}:{topic}:{rule}")
}

/// `auto_reject@<ver>:<rule1+rule2>`.
#[must_use]
pub fn format_auto_reject(version: &str, rules: &[&str]) -> String {
    format!("auto_reject@{version}:{}", rules.join("+"))
}

fn split_fields(s: &str) -> Option<Vec<(&str, &str)>> {
    let mut out = Vec::new();
    for token in s.split_whitespace() {
        let (k, v) = token.split_once('=')?;
        out.push((k, v));
    }
    (!out.is_empty()).then_some(out)
}

fn field<'a>(fields: &[(&'a str, &'a str)], key: &str) -> Option<&'a str> {
    fields.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// `1.00(0d)` -> (1.0, 0).
fn parse_score_with_days(raw: &str) -> Option<(f64, i64)> {
    let (score, rest) = raw.split_once('(')?;
    let days = rest.strip_suffix("d)")?;
    Some((score.parse().ok()?, days.parse().ok()?))
}

/// `1.00[price]` -> (1.0, "price").
fn parse_score_with_bracket(raw: &str) -> Option<(f64, &str)> {
    let (score, rest) = raw.split_once('[')?;
    let ctx = rest.strip_suffix(']')?;
    Some((score.parse().ok()?, ctx))
}

/// `1.00[exact](2026-03/2026-03)` -> (1.0, "exact", "2026-03", "2026-03").
fn parse_period_field(raw: &str) -> Option<(f64, &str, &str, &str)> {
    let (score, rest) = raw.split_once('[')?;
    let (kind, rest) = rest.split_once(']')?;
    let periods = rest.strip_prefix('(')?.strip_suffix(')')?;
    let (left, right) = periods.split_once('/')?;
    Some((score.parse().ok()?, kind, left, right))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crypto_daily_roundtrip() {
        let reason = CryptoDailyReason {
            entity: Some(CryptoEntity::Bitcoin),
            date_type: SettleDateType::DayExact,
            date_score: 1.0,
            day_diff: 0,
            num_score: 1.0,
            num_context: PriceContext::Threshold,
            text_score: 0.35,
        };
        let formatted = reason.format();
        assert_eq!(
            formatted,
            "entity=BITCOIN dateType=DAY_EXACT date=1.00(0d) num=1.00[threshold] text=0.35"
        );
        assert_eq!(CryptoDailyReason::parse(&formatted), Some(reason));
    }

    #[test]
    fn crypto_daily_day_diff_one() {
        let reason = CryptoDailyReason {
            entity: Some(CryptoEntity::Ethereum),
            date_type: SettleDateType::DayExact,
            date_score: 0.6,
            day_diff: 1,
            num_score: 0.7,
            num_context: PriceContext::Price,
            text_score: 0.12,
        };
        let parsed = CryptoDailyReason::parse(&reason.format()).unwrap();
        assert_eq!(parsed.day_diff, 1);
        assert_eq!(parsed.date_score, 0.6);
    }

    #[test]
    fn crypto_intraday_roundtrip() {
        let reason = CryptoIntradayReason {
            entity: Some(CryptoEntity::Bitcoin),
            bucket: Utc.with_ymd_and_hms(2026, 1, 21, 15, 0, 0).unwrap(),
            dir_left: Some(Direction::Up),
            dir_right: Some(Direction::Up),
            text_score: 0.4,
        };
        let formatted = reason.format();
        assert_eq!(
            formatted,
            "entity=BITCOIN bucket=2026-01-21T15:00Z dir=up/up text=0.40"
        );
        assert_eq!(CryptoIntradayReason::parse(&formatted), Some(reason));
    }

    #[test]
    fn intraday_missing_direction() {
        let reason = CryptoIntradayReason {
            entity: Some(CryptoEntity::Solana),
            bucket: Utc.with_ymd_and_hms(2026, 1, 21, 9, 0, 0).unwrap(),
            dir_left: None,
            dir_right: Some(Direction::Down),
            text_score: 0.1,
        };
        let parsed = CryptoIntradayReason::parse(&reason.format()).unwrap();
        assert_eq!(parsed.dir_left, None);
        assert_eq!(parsed.dir_right, Some(Direction::Down));
    }

    #[test]
    fn macro_roundtrip() {
        let reason = MacroReason {
            tier: Tier::Strong,
            me_score: 0.5,
            per_score: 1.0,
            per_kind: Some(PeriodMatchKind::Exact),
            period_left: "2026-03".into(),
            period_right: "2026-03".into(),
            num_score: 0.9,
            text_score: 0.15,
        };
        let formatted = reason.format();
        assert_eq!(
            formatted,
            "MACRO: tier=STRONG me=0.50 per=1.00[exact](2026-03/2026-03) num=0.90 txt=0.15"
        );
        assert_eq!(MacroReason::parse(&formatted), Some(reason));
    }

    #[test]
    fn generic_roundtrip() {
        let mut reason = GenericReason::new("ELECTIONS");
        reason
            .push("country", "US")
            .push_score("office", 1.0)
            .push("cand", "donald_trump");
        let formatted = reason.format();
        assert_eq!(formatted, "ELECTIONS: country=US office=1.00 cand=donald_trump");
        let parsed = GenericReason::parse(&formatted).unwrap();
        assert_eq!(parsed, reason);
        assert_eq!(parsed.get("country"), Some("US"));
        assert_eq!(parsed.get_score("office"), Some(1.0));
    }

    #[test]
    fn generic_sanitizes_spaces() {
        let mut reason = GenericReason::new("SPORTS");
        reason.push("event", "NBA|celtics lakers|2026");
        assert_eq!(reason.format(), "SPORTS: event=NBA|celtics_lakers|2026");
    }

    #[test]
    fn parse_reason_dispatches() {
        assert!(matches!(
            parse_reason("entity=BITCOIN dateType=DAY_EXACT date=1.00(0d) num=1.00[price] text=0.35"),
            Some(ParsedReason::CryptoDaily(_))
        ));
        assert!(matches!(
            parse_reason("entity=BITCOIN bucket=2026-01-21T15:00Z dir=up/up text=0.40"),
            Some(ParsedReason::CryptoIntraday(_))
        ));
        assert!(matches!(
            parse_reason("MACRO: tier=WEAK me=0.50 per=0.18[month_in_year](2026-03/2026) num=0.00 txt=0.10"),
            Some(ParsedReason::Macro(_))
        ));
        assert!(matches!(
            parse_reason("CLIMATE: kind=HURRICANE date=1.00 region=FL thresh=1.00 text=0.22"),
            Some(ParsedReason::Generic(_))
        ));
    }

    #[test]
    fn auto_reasons_parse() {
        let confirm = format_auto_confirm("2.6.8", "crypto_daily", "score_floor");
        assert_eq!(confirm, "auto_confirm@2.6.8:crypto_daily:score_floor");
        assert!(matches!(
            parse_reason(&confirm),
            Some(ParsedReason::Auto {
                confirmed: true,
                ..
            })
        ));

        let reject = format_auto_reject("1.4.2", &["hard_floor", "entity_mismatch"]);
        assert_eq!(reject, "auto_reject@1.4.2:hard_floor+entity_mismatch");
        match parse_reason(&reject) {
            Some(ParsedReason::Auto {
                confirmed, detail, ..
            }) => {
                assert!(!confirmed);
                assert_eq!(detail, "hard_floor+entity_mismatch");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn malformed_reasons_do_not_parse() {
        assert_eq!(CryptoDailyReason::parse("entity=BITCOIN dateType=bogus"), None);
        assert_eq!(parse_reason(""), None);
        assert_eq!(GenericReason::parse("no colon here"), None);
    }
}
