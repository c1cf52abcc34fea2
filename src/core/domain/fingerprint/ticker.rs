//! Ticker boundary matching.
//!
//! Short tickers are a false-positive minefield: `eth` lives inside
//! "Hegseth", `sol` inside "solution". Short tickers therefore match only on
//! word boundaries with an optional leading `$`, while full asset names are
//! long enough to match by plain substring.

use regex::Regex;

/// The canonical boundary pattern for a short ticker.
///
/// Matches `<ticker>` only when flanked by non-alphanumerics (or the ends of
/// the string), with an optional `$` prefix. Intended to run against
/// lowercased text.
#[must_use]
pub fn ticker_pattern(ticker: &str) -> String {
    format!(r"(^|[^a-z0-9])\$?{}([^a-z0-9]|$)", regex::escape(ticker))
}

/// Compile the boundary pattern for a short ticker.
///
/// # Errors
/// Never fails for alphanumeric tickers; the signature matches
/// `Regex::new` so callers can cache compiled patterns.
pub fn compile_ticker_regex(ticker: &str) -> Result<Regex, regex::Error> {
    Regex::new(&ticker_pattern(ticker))
}

/// Test a lowercased title for a short ticker at word boundaries.
#[must_use]
pub fn matches_ticker(regex: &Regex, lower_title: &str) -> bool {
    regex.is_match(lower_title)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hits(ticker: &str, title: &str) -> bool {
        let re = compile_ticker_regex(ticker).unwrap();
        matches_ticker(&re, &title.to_lowercase())
    }

    #[test]
    fn eth_matches_at_boundaries() {
        assert!(hits("eth", "ETH price"));
        assert!(hits("eth", "$ETH"));
        assert!(hits("eth", "buy eth"));
        assert!(hits("eth", "ETH!"));
        assert!(hits("eth", "eth"));
    }

    #[test]
    fn eth_does_not_match_inside_words() {
        assert!(!hits("eth", "Hegseth"));
        assert!(!hits("eth", "Kenneth"));
        assert!(!hits("eth", "methane"));
        assert!(!hits("eth", "Pete Hegseth nomination"));
    }

    #[test]
    fn sol_does_not_match_inside_solution() {
        assert!(!hits("sol", "solution"));
        assert!(!hits("sol", "solar power"));
        assert!(hits("sol", "SOL above $200"));
        assert!(hits("sol", "$sol pump"));
    }

    #[test]
    fn btc_boundaries() {
        assert!(hits("btc", "will btc close above"));
        assert!(hits("btc", "BTC/USD"));
        assert!(!hits("btc", "subtcommittee"));
    }

    #[test]
    fn dollar_prefix_is_optional_not_required() {
        assert!(hits("xrp", "$XRP to $5"));
        assert!(hits("xrp", "XRP to $5"));
    }
}
