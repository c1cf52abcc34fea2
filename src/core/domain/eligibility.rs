//! The canonical "is this market usable now" filter.
//!
//! Every fetch path goes through this predicate; nothing else decides which
//! markets enter matching.

use chrono::{DateTime, Duration, Utc};

use super::market::{Market, MarketStatus};
use super::topic::CanonicalTopic;

/// Time-window parameters for eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibilityParams {
    pub grace_minutes: i64,
    pub forward_hours: i64,
    pub lookback_hours: i64,
    /// Include resolved/archived markets within the lookback (diagnostics).
    pub include_terminal: bool,
}

pub const DEFAULT_GRACE_MINUTES: i64 = 60;
pub const DEFAULT_FORWARD_HOURS_CRYPTO_DAILY: i64 = 72;
pub const DEFAULT_FORWARD_HOURS_CRYPTO_INTRADAY: i64 = 24;
pub const DEFAULT_FORWARD_HOURS_LONG: i64 = 8760;
pub const DEFAULT_LOOKBACK_HOURS_CRYPTO: i64 = 168;
pub const DEFAULT_LOOKBACK_HOURS_LONG: i64 = 720;

impl EligibilityParams {
    /// Topic-specific defaults: crypto settles fast and looks back a week;
    /// macro and politics run on month-scale windows.
    #[must_use]
    pub fn for_topic(topic: CanonicalTopic) -> Self {
        let (forward_hours, lookback_hours) = match topic {
            CanonicalTopic::CryptoDaily => (
                DEFAULT_FORWARD_HOURS_CRYPTO_DAILY,
                DEFAULT_LOOKBACK_HOURS_CRYPTO,
            ),
            CanonicalTopic::CryptoIntraday => (
                DEFAULT_FORWARD_HOURS_CRYPTO_INTRADAY,
                DEFAULT_LOOKBACK_HOURS_CRYPTO,
            ),
            _ => (DEFAULT_FORWARD_HOURS_LONG, DEFAULT_LOOKBACK_HOURS_LONG),
        };
        Self {
            grace_minutes: DEFAULT_GRACE_MINUTES,
            forward_hours,
            lookback_hours,
            include_terminal: false,
        }
    }

    #[must_use]
    pub fn grace(&self) -> Duration {
        Duration::minutes(self.grace_minutes)
    }
}

/// Reason codes emitted by [`explain_eligibility`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EligibilityCode {
    Eligible,
    StatusTerminal,
    StaleActive,
    WithinGrace,
    ClosedTooOld,
    NoCloseTime,
    BeyondForward,
}

impl EligibilityCode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Eligible => "eligible",
            Self::StatusTerminal => "status_terminal",
            Self::StaleActive => "stale_active",
            Self::WithinGrace => "within_grace",
            Self::ClosedTooOld => "closed_too_old",
            Self::NoCloseTime => "no_close_time",
            Self::BeyondForward => "beyond_forward",
        }
    }
}

/// Severity of an `active` market lingering past its close time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleSeverity {
    Ok,
    Minor,
    Major,
}

/// Categorize how stale an active market is, measured from its close time.
///
/// Within the grace window it is not stale at all; up to twice the grace it
/// is a minor lag (venues often settle late); beyond that something is wrong
/// with ingestion or the market itself.
#[must_use]
pub fn categorize_stale_active(age_past_close: Duration, grace: Duration) -> StaleSeverity {
    if age_past_close <= grace {
        StaleSeverity::Ok
    } else if age_past_close <= grace * 2 {
        StaleSeverity::Minor
    } else {
        StaleSeverity::Major
    }
}

/// Explain why a market is or is not eligible right now.
///
/// The first code is the verdict: `Eligible` (possibly followed by
/// qualifiers like `WithinGrace` or `NoCloseTime`) or the disqualifying
/// reason.
#[must_use]
pub fn explain_eligibility(
    market: &Market,
    now: DateTime<Utc>,
    params: &EligibilityParams,
) -> Vec<EligibilityCode> {
    let grace = params.grace();
    let lookback_cutoff = now - Duration::hours(params.lookback_hours);

    match market.status {
        MarketStatus::Active => match market.close_time {
            None => vec![EligibilityCode::Eligible, EligibilityCode::NoCloseTime],
            Some(close) => {
                if close < now - grace {
                    vec![EligibilityCode::StaleActive]
                } else if close > now + Duration::hours(params.forward_hours) {
                    vec![EligibilityCode::BeyondForward]
                } else if close < now {
                    vec![EligibilityCode::Eligible, EligibilityCode::WithinGrace]
                } else {
                    vec![EligibilityCode::Eligible]
                }
            }
        },
        MarketStatus::Closed => match market.close_time {
            None => vec![EligibilityCode::NoCloseTime],
            Some(close) => {
                if close >= lookback_cutoff {
                    vec![EligibilityCode::Eligible]
                } else {
                    vec![EligibilityCode::ClosedTooOld]
                }
            }
        },
        MarketStatus::Resolved | MarketStatus::Archived => {
            if params.include_terminal {
                let recent = market
                    .close_time
                    .map_or(false, |close| close >= lookback_cutoff);
                if recent {
                    return vec![EligibilityCode::Eligible, EligibilityCode::StatusTerminal];
                }
            }
            vec![EligibilityCode::StatusTerminal]
        }
    }
}

/// The predicate form of [`explain_eligibility`].
#[must_use]
pub fn is_eligible(market: &Market, now: DateTime<Utc>, params: &EligibilityParams) -> bool {
    explain_eligibility(market, now, params).contains(&EligibilityCode::Eligible)
}
