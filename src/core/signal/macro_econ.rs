//! Macroeconomic indicator signal extraction.

use chrono::NaiveDate;

use crate::core::domain::fingerprint::{
    extract_dates, extract_macro_entities, DatePrecision,
};
use crate::core::domain::Market;

/// The reference period a macro print covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroPeriod {
    Day(NaiveDate),
    Month { year: i32, month: u32 },
    Quarter { year: i32, quarter: u32 },
    Year(i32),
}

impl MacroPeriod {
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Day(d) => d.format("%Y-%m-%d").to_string(),
            Self::Month { year, month } => format!("{year}-{month:02}"),
            Self::Quarter { year, quarter } => format!("{year}-Q{quarter}"),
            Self::Year(y) => y.to_string(),
        }
    }

    #[must_use]
    pub fn year(&self) -> i32 {
        match self {
            Self::Day(d) => chrono::Datelike::year(d),
            Self::Month { year, .. } | Self::Quarter { year, .. } => *year,
            Self::Year(y) => *y,
        }
    }
}

/// How two macro periods line up.
///
/// STRONG-tier kinds are `Exact`, `MonthInQuarter`, and `QuarterInYear`;
/// `MonthInYear` deliberately scores below the safe-confirm floor so a bare
/// year on one side never auto-confirms against a month print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodMatchKind {
    Exact,
    MonthInQuarter,
    QuarterInYear,
    MonthInYear,
    YearOnly,
}

impl PeriodMatchKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::MonthInQuarter => "month_in_quarter",
            Self::QuarterInYear => "quarter_in_year",
            Self::MonthInYear => "month_in_year",
            Self::YearOnly => "year_only",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "exact" => Some(Self::Exact),
            "month_in_quarter" => Some(Self::MonthInQuarter),
            "quarter_in_year" => Some(Self::QuarterInYear),
            "month_in_year" => Some(Self::MonthInYear),
            "year_only" => Some(Self::YearOnly),
            _ => None,
        }
    }

    /// Sub-score contribution for this alignment.
    #[must_use]
    pub const fn score(&self) -> f64 {
        match self {
            Self::Exact => 1.0,
            Self::MonthInQuarter => 0.80,
            Self::QuarterInYear => 0.70,
            Self::MonthInYear => 0.18,
            Self::YearOnly => 0.15,
        }
    }

    #[must_use]
    pub const fn is_strong(&self) -> bool {
        matches!(self, Self::Exact | Self::MonthInQuarter | Self::QuarterInYear)
    }
}

/// Compare two macro periods; None means they contradict each other.
#[must_use]
pub fn match_periods(left: &MacroPeriod, right: &MacroPeriod) -> Option<PeriodMatchKind> {
    use MacroPeriod::*;
    if left.year() != right.year() {
        return None;
    }
    match (left, right) {
        (Day(a), Day(b)) => (a == b).then_some(PeriodMatchKind::Exact),
        (Month { month: a, .. }, Month { month: b, .. }) => {
            (a == b).then_some(PeriodMatchKind::Exact)
        }
        (Quarter { quarter: a, .. }, Quarter { quarter: b, .. }) => {
            (a == b).then_some(PeriodMatchKind::Exact)
        }
        (Month { month, .. }, Quarter { quarter, .. })
        | (Quarter { quarter, .. }, Month { month, .. }) => {
            ((month - 1) / 3 + 1 == *quarter).then_some(PeriodMatchKind::MonthInQuarter)
        }
        (Quarter { .. }, Year(_)) | (Year(_), Quarter { .. }) => {
            Some(PeriodMatchKind::QuarterInYear)
        }
        (Month { .. }, Year(_)) | (Year(_), Month { .. }) => Some(PeriodMatchKind::MonthInYear),
        (Year(_), Year(_)) => Some(PeriodMatchKind::YearOnly),
        (Day(d), Month { month, .. }) | (Month { month, .. }, Day(d)) => {
            (chrono::Datelike::month(d) == *month).then_some(PeriodMatchKind::Exact)
        }
        (Day(d), Quarter { quarter, .. }) | (Quarter { quarter, .. }, Day(d)) => {
            ((chrono::Datelike::month(d) - 1) / 3 + 1 == *quarter)
                .then_some(PeriodMatchKind::MonthInQuarter)
        }
        (Day(_), Year(_)) | (Year(_), Day(_)) => Some(PeriodMatchKind::MonthInYear),
    }
}

/// Typed signal bundle for macro markets.
#[derive(Debug, Clone)]
pub struct MacroSignals {
    pub entity: Option<&'static str>,
    pub period: Option<MacroPeriod>,
    pub year: Option<i32>,
    pub values: Vec<f64>,
    pub confidence: f64,
}

impl MacroSignals {
    /// Primary index key: `entity|year`.
    #[must_use]
    pub fn index_key(&self) -> Option<String> {
        let entity = self.entity?;
        let year = self.year?;
        Some(format!("{entity}|{year}"))
    }
}

/// Extract the macro signal bundle from a market.
#[must_use]
pub fn extract_macro_signals(market: &Market) -> MacroSignals {
    let entity = extract_macro_entities(&market.title).into_iter().next();
    let dates = extract_dates(&market.title);

    // Most specific period wins
    let period = dates
        .iter()
        .find(|d| d.precision == DatePrecision::Day)
        .and_then(|d| d.naive_date().map(MacroPeriod::Day))
        .or_else(|| {
            dates
                .iter()
                .find(|d| d.precision == DatePrecision::Month)
                .and_then(|d| {
                    d.month.map(|month| MacroPeriod::Month {
                        year: d.year,
                        month,
                    })
                })
        })
        .or_else(|| {
            dates
                .iter()
                .find(|d| d.precision == DatePrecision::Quarter)
                .and_then(|d| {
                    d.quarter.map(|quarter| MacroPeriod::Quarter {
                        year: d.year,
                        quarter,
                    })
                })
        })
        .or_else(|| {
            dates
                .iter()
                .find(|d| d.precision == DatePrecision::Year)
                .map(|d| MacroPeriod::Year(d.year))
        });

    let year = period.as_ref().map(MacroPeriod::year);

    let values = crate::core::domain::fingerprint::extract_numbers(&market.title)
        .into_iter()
        .filter(|n| n.percent || n.value < 1900.0 || n.value > 2100.0)
        .map(|n| n.value)
        .collect();

    let confidence = match (&entity, &period) {
        (Some(_), Some(_)) => 1.0,
        (Some(_), None) => 0.5,
        (None, _) => 0.0,
    };

    MacroSignals {
        entity,
        period,
        year,
        values,
        confidence,
    }
}
