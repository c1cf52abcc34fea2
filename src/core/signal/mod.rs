//! Per-topic signal extractors.
//!
//! Each topic defines a typed signal bundle extracted as a pure function of
//! the market (plus exchange event metadata where it exists). Pipelines
//! index and score these bundles; nothing downstream re-parses titles.

pub mod climate;
pub mod commodities;
pub mod crypto;
pub mod elections;
pub mod entertainment;
pub mod geopolitics;
pub mod macro_econ;
pub mod rates;
pub mod sports;

/// How a market's settle date was pinned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettleDateType {
    DayExact,
    MonthEnd,
    Quarter,
    CloseTime,
    Unknown,
}

impl SettleDateType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DayExact => "DAY_EXACT",
            Self::MonthEnd => "MONTH_END",
            Self::Quarter => "QUARTER",
            Self::CloseTime => "CLOSE_TIME",
            Self::Unknown => "UNKNOWN",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DAY_EXACT" => Some(Self::DayExact),
            "MONTH_END" => Some(Self::MonthEnd),
            "QUARTER" | "QUARTER_END" => Some(Self::Quarter),
            "CLOSE_TIME" => Some(Self::CloseTime),
            "UNKNOWN" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Day-pinned types compare by day difference; period types compare by
    /// period string equality.
    #[must_use]
    pub const fn is_day_pinned(&self) -> bool {
        matches!(self, Self::DayExact | Self::CloseTime)
    }
}

impl std::fmt::Display for SettleDateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve a settle date from extracted dates plus the close time, most
/// specific first. Returns the pinned day (when there is one), the date
/// type, and the period key for month/quarter/year settles.
#[must_use]
pub fn resolve_settle(
    dates: &[crate::core::domain::fingerprint::ExtractedDate],
    close_time: Option<chrono::DateTime<chrono::Utc>>,
) -> (
    Option<chrono::NaiveDate>,
    SettleDateType,
    Option<String>,
) {
    use crate::core::domain::fingerprint::DatePrecision;

    if let Some(day) = dates
        .iter()
        .find(|d| d.precision == DatePrecision::Day)
        .and_then(|d| d.naive_date())
    {
        return (Some(day), SettleDateType::DayExact, None);
    }
    if let Some(m) = dates.iter().find(|d| d.precision == DatePrecision::Month) {
        return (None, SettleDateType::MonthEnd, m.period_key());
    }
    if let Some(q) = dates.iter().find(|d| d.precision == DatePrecision::Quarter) {
        return (None, SettleDateType::Quarter, q.period_key());
    }
    if let Some(y) = dates.iter().find(|d| d.precision == DatePrecision::Year) {
        return (None, SettleDateType::Unknown, Some(y.year.to_string()));
    }
    if let Some(close) = close_time {
        return (Some(close.date_naive()), SettleDateType::CloseTime, None);
    }
    (None, SettleDateType::Unknown, None)
}

/// Direction of an up/down market.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            _ => None,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
