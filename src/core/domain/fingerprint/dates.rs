//! Date extraction from market titles.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

/// How much of a calendar date a title actually pins down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatePrecision {
    Day,
    Month,
    Quarter,
    Year,
}

/// A date (or partial date) extracted from a title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDate {
    pub year: i32,
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub quarter: Option<u32>,
    pub precision: DatePrecision,
    pub raw: String,
}

impl ExtractedDate {
    /// The exact calendar day, when precision allows.
    #[must_use]
    pub fn naive_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month?, self.day?)
    }

    /// Settle-period string: `YYYY-MM` for months, `YYYY-Qn` for quarters.
    #[must_use]
    pub fn period_key(&self) -> Option<String> {
        match self.precision {
            DatePrecision::Month => self.month.map(|m| format!("{}-{:02}", self.year, m)),
            DatePrecision::Quarter => self.quarter.map(|q| format!("{}-Q{}", self.year, q)),
            _ => None,
        }
    }
}

const MONTHS: &str = "january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sept|sep|oct|nov|dec";

static ISO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").expect("iso date regex"));

static MONTH_DAY_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b({MONTHS})\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?,?\s+(\d{{4}})\b"
    ))
    .expect("month day year regex")
});

static DAY_MONTH_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+({MONTHS})\.?,?\s+(\d{{4}})\b"
    ))
    .expect("day month year regex")
});

static SLASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").expect("slash date regex"));

static QUARTER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:q([1-4])\s*(\d{4})|(\d{4})\s*q([1-4]))\b").expect("quarter regex")
});

static MONTH_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b({MONTHS})\.?\s+(\d{{4}})\b")).expect("month year regex")
});

static MONTH_DAY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b({MONTHS})\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?\b"
    ))
    .expect("month day regex")
});

static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").expect("year regex"));

fn month_number(name: &str) -> Option<u32> {
    let prefix: String = name.to_lowercase().chars().take(3).collect();
    match prefix.as_str() {
        "jan" => Some(1),
        "feb" => Some(2),
        "mar" => Some(3),
        "apr" => Some(4),
        "may" => Some(5),
        "jun" => Some(6),
        "jul" => Some(7),
        "aug" => Some(8),
        "sep" => Some(9),
        "oct" => Some(10),
        "nov" => Some(11),
        "dec" => Some(12),
        _ => None,
    }
}

fn overlaps(claimed: &[(usize, usize)], start: usize, end: usize) -> bool {
    claimed.iter().any(|&(s, e)| start < e && s < end)
}

/// Extract every date mention from a title, most specific pattern first.
///
/// A span claimed by a more specific pattern is invisible to the less
/// specific ones, so "Jan 21, 2026" yields one day-precision date rather
/// than a day date plus a stray year.
#[must_use]
pub fn extract_dates(title: &str) -> Vec<ExtractedDate> {
    let mut out = Vec::new();
    let mut claimed: Vec<(usize, usize)> = Vec::new();

    for caps in ISO_RE.captures_iter(title) {
        let whole = caps.get(0).expect("group 0");
        if overlaps(&claimed, whole.start(), whole.end()) {
            continue;
        }
        let (year, month, day) = (
            caps[1].parse::<i32>().unwrap_or(0),
            caps[2].parse::<u32>().unwrap_or(0),
            caps[3].parse::<u32>().unwrap_or(0),
        );
        if NaiveDate::from_ymd_opt(year, month, day).is_none() {
            continue;
        }
        claimed.push((whole.start(), whole.end()));
        out.push(ExtractedDate {
            year,
            month: Some(month),
            day: Some(day),
            quarter: None,
            precision: DatePrecision::Day,
            raw: whole.as_str().to_string(),
        });
    }

    for caps in MONTH_DAY_YEAR_RE.captures_iter(title) {
        let whole = caps.get(0).expect("group 0");
        if overlaps(&claimed, whole.start(), whole.end()) {
            continue;
        }
        let Some(month) = month_number(&caps[1]) else {
            continue;
        };
        let day = caps[2].parse::<u32>().unwrap_or(0);
        let year = caps[3].parse::<i32>().unwrap_or(0);
        if NaiveDate::from_ymd_opt(year, month, day).is_none() {
            continue;
        }
        claimed.push((whole.start(), whole.end()));
        out.push(ExtractedDate {
            year,
            month: Some(month),
            day: Some(day),
            quarter: None,
            precision: DatePrecision::Day,
            raw: whole.as_str().to_string(),
        });
    }

    for caps in DAY_MONTH_YEAR_RE.captures_iter(title) {
        let whole = caps.get(0).expect("group 0");
        if overlaps(&claimed, whole.start(), whole.end()) {
            continue;
        }
        let day = caps[1].parse::<u32>().unwrap_or(0);
        let Some(month) = month_number(&caps[2]) else {
            continue;
        };
        let year = caps[3].parse::<i32>().unwrap_or(0);
        if NaiveDate::from_ymd_opt(year, month, day).is_none() {
            continue;
        }
        claimed.push((whole.start(), whole.end()));
        out.push(ExtractedDate {
            year,
            month: Some(month),
            day: Some(day),
            quarter: None,
            precision: DatePrecision::Day,
            raw: whole.as_str().to_string(),
        });
    }

    for caps in SLASH_RE.captures_iter(title) {
        let whole = caps.get(0).expect("group 0");
        if overlaps(&claimed, whole.start(), whole.end()) {
            continue;
        }
        let month = caps[1].parse::<u32>().unwrap_or(0);
        let day = caps[2].parse::<u32>().unwrap_or(0);
        let year = caps[3].parse::<i32>().unwrap_or(0);
        if NaiveDate::from_ymd_opt(year, month, day).is_none() {
            continue;
        }
        claimed.push((whole.start(), whole.end()));
        out.push(ExtractedDate {
            year,
            month: Some(month),
            day: Some(day),
            quarter: None,
            precision: DatePrecision::Day,
            raw: whole.as_str().to_string(),
        });
    }

    for caps in QUARTER_RE.captures_iter(title) {
        let whole = caps.get(0).expect("group 0");
        if overlaps(&claimed, whole.start(), whole.end()) {
            continue;
        }
        let (quarter, year) = if let (Some(q), Some(y)) = (caps.get(1), caps.get(2)) {
            (
                q.as_str().parse::<u32>().unwrap_or(0),
                y.as_str().parse::<i32>().unwrap_or(0),
            )
        } else if let (Some(y), Some(q)) = (caps.get(3), caps.get(4)) {
            (
                q.as_str().parse::<u32>().unwrap_or(0),
                y.as_str().parse::<i32>().unwrap_or(0),
            )
        } else {
            continue;
        };
        claimed.push((whole.start(), whole.end()));
        out.push(ExtractedDate {
            year,
            month: None,
            day: None,
            quarter: Some(quarter),
            precision: DatePrecision::Quarter,
            raw: whole.as_str().to_string(),
        });
    }

    for caps in MONTH_YEAR_RE.captures_iter(title) {
        let whole = caps.get(0).expect("group 0");
        if overlaps(&claimed, whole.start(), whole.end()) {
            continue;
        }
        let Some(month) = month_number(&caps[1]) else {
            continue;
        };
        let year = caps[2].parse::<i32>().unwrap_or(0);
        claimed.push((whole.start(), whole.end()));
        out.push(ExtractedDate {
            year,
            month: Some(month),
            day: None,
            quarter: None,
            precision: DatePrecision::Month,
            raw: whole.as_str().to_string(),
        });
    }

    for caps in YEAR_RE.captures_iter(title) {
        let whole = caps.get(0).expect("group 0");
        if overlaps(&claimed, whole.start(), whole.end()) {
            continue;
        }
        let year = caps[1].parse::<i32>().unwrap_or(0);
        claimed.push((whole.start(), whole.end()));
        out.push(ExtractedDate {
            year,
            month: None,
            day: None,
            quarter: None,
            precision: DatePrecision::Year,
            raw: whole.as_str().to_string(),
        });
    }

    // Order of appearance in the title, not pattern order
    out.sort_by_key(|d| title.find(&d.raw).unwrap_or(usize::MAX));
    out
}

/// A month-day mention with no year, e.g. "on Jan 21?".
///
/// Daily markets routinely omit the year; callers resolve it against the
/// market's close time.
#[must_use]
pub fn extract_month_day(title: &str) -> Option<(u32, u32, String)> {
    // Skip spans that belong to a full date
    let full_spans: Vec<(usize, usize)> = extract_dates(title)
        .into_iter()
        .filter_map(|d| title.find(&d.raw).map(|s| (s, s + d.raw.len())))
        .collect();

    for caps in MONTH_DAY_RE.captures_iter(title) {
        let whole = caps.get(0).expect("group 0");
        if overlaps(&full_spans, whole.start(), whole.end()) {
            continue;
        }
        let Some(month) = month_number(&caps[1]) else {
            continue;
        };
        let Some(day) = caps[2].parse::<u32>().ok().filter(|d| (1..=31).contains(d)) else {
            continue;
        };
        return Some((month, day, whole.as_str().to_string()));
    }
    None
}
