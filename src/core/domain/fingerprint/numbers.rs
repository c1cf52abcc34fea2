//! Numeric extraction from market titles.

use once_cell::sync::Lazy;
use regex::Regex;

/// A number extracted from a title, normalized by its suffix.
///
/// `$150k` becomes `value = 150_000.0, monetary = true`; `3.5%` becomes
/// `value = 3.5, percent = true`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedNumber {
    pub value: f64,
    pub monetary: bool,
    pub percent: bool,
    pub raw: String,
}

/// Optional `$`, digits with separators, optional magnitude suffix bounded
/// by a word break, optional percent sign.
static NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\$\s*)?(\d[\d,]*(?:\.\d+)?)\s*([kmbt])?\b\s*(%)?").expect("number regex")
});

fn suffix_multiplier(suffix: &str) -> f64 {
    match suffix.to_ascii_lowercase().as_str() {
        "k" => 1e3,
        "m" => 1e6,
        "b" => 1e9,
        "t" => 1e12,
        _ => 1.0,
    }
}

/// Extract all numbers from a title, in order of appearance.
#[must_use]
pub fn extract_numbers(title: &str) -> Vec<ExtractedNumber> {
    let mut out = Vec::new();

    for caps in NUMBER_RE.captures_iter(title) {
        let digits = match caps.get(2) {
            Some(m) => m.as_str(),
            None => continue,
        };
        let Ok(base) = digits.replace(',', "").parse::<f64>() else {
            continue;
        };

        let monetary = caps.get(1).is_some();
        let multiplier = caps.get(3).map_or(1.0, |m| suffix_multiplier(m.as_str()));
        let percent = caps.get(4).is_some();

        let full = caps.get(0).map_or(digits, |m| m.as_str());
        out.push(ExtractedNumber {
            value: base * multiplier,
            monetary,
            percent,
            raw: full.trim().to_string(),
        });
    }

    out
}

/// Relative gap between two values, symmetric in its arguments and
/// measured against the smaller magnitude so "$100k vs $101k" reads as a
/// full 1% gap.
///
/// Returns 0 for two zeros and 1 when only one side is zero.
#[must_use]
pub fn relative_gap(a: f64, b: f64) -> f64 {
    let denom = a.abs().min(b.abs());
    if denom == 0.0 {
        return if a == b { 0.0 } else { 1.0 };
    }
    (a - b).abs() / denom
}

/// Sub-score for how well two number sets agree, per the matching table:
/// overlapping (min, max) ranges score 1.0, then 0.9 / 0.7 / 0.4 as the
/// relative gap between the closest endpoints grows past 1% / 5% / 10%.
#[must_use]
pub fn number_agreement(left: &[f64], right: &[f64]) -> f64 {
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let (lmin, lmax) = min_max(left);
    let (rmin, rmax) = min_max(right);

    // Ranges overlap
    if lmin <= rmax && rmin <= lmax {
        return 1.0;
    }

    // Gap between the closest endpoints
    let gap = if lmax < rmin {
        relative_gap(lmax, rmin)
    } else {
        relative_gap(rmax, lmin)
    };

    if gap < 0.01 {
        0.9
    } else if gap < 0.05 {
        0.7
    } else if gap < 0.10 {
        0.4
    } else {
        0.0
    }
}

fn min_max(values: &[f64]) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &v in values {
        min = min.min(v);
        max = max.max(v);
    }
    (min, max)
}
