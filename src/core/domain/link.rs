//! Cross-venue market links.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::market::Venue;
use super::topic::CanonicalTopic;

/// Review status of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Suggested,
    Confirmed,
    Rejected,
}

impl LinkStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Suggested => "suggested",
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "suggested" => Some(Self::Suggested),
            "confirmed" => Some(Self::Confirmed),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed pair of markets across two venues, with the score and the
/// structured reason the pipeline stamped on it.
///
/// At most one link exists per (left venue, left market, right venue,
/// right market) key. Status moves forward only, with one exception:
/// `confirmed -> rejected` is a deliberate override and is logged.
#[derive(Debug, Clone)]
pub struct MarketLink {
    pub id: i64,
    pub left_venue: Venue,
    pub left_market_id: i64,
    pub right_venue: Venue,
    pub right_market_id: i64,
    pub score: f64,
    pub status: LinkStatus,
    pub reason: String,
    pub topic: CanonicalTopic,
    pub algo_version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MarketLink {
    /// Whether a status transition is permitted.
    ///
    /// `confirmed -> suggested` would silently undo a review decision and is
    /// never allowed; `confirmed -> rejected` is allowed but callers must
    /// warn. Everything else moves freely.
    #[must_use]
    pub fn can_transition(from: LinkStatus, to: LinkStatus) -> bool {
        !matches!((from, to), (LinkStatus::Confirmed, LinkStatus::Suggested))
    }

    /// Whether this transition represents an override worth a warning.
    #[must_use]
    pub fn is_override(from: LinkStatus, to: LinkStatus) -> bool {
        matches!((from, to), (LinkStatus::Confirmed, LinkStatus::Rejected))
    }

    /// The unordered venue-pair key, used to spot duplicate pairings
    /// regardless of direction.
    #[must_use]
    pub fn unordered_key(&self) -> (Venue, i64, Venue, i64) {
        if (self.left_venue.as_str(), self.left_market_id)
            <= (self.right_venue.as_str(), self.right_market_id)
        {
            (
                self.left_venue,
                self.left_market_id,
                self.right_venue,
                self.right_market_id,
            )
        } else {
            (
                self.right_venue,
                self.right_market_id,
                self.left_venue,
                self.left_market_id,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmed_never_regresses_to_suggested() {
        assert!(!MarketLink::can_transition(
            LinkStatus::Confirmed,
            LinkStatus::Suggested
        ));
        assert!(MarketLink::can_transition(
            LinkStatus::Confirmed,
            LinkStatus::Rejected
        ));
        assert!(MarketLink::can_transition(
            LinkStatus::Suggested,
            LinkStatus::Confirmed
        ));
        assert!(MarketLink::can_transition(
            LinkStatus::Suggested,
            LinkStatus::Rejected
        ));
        assert!(MarketLink::can_transition(
            LinkStatus::Rejected,
            LinkStatus::Suggested
        ));
    }

    #[test]
    fn confirmed_to_rejected_is_an_override() {
        assert!(MarketLink::is_override(
            LinkStatus::Confirmed,
            LinkStatus::Rejected
        ));
        assert!(!MarketLink::is_override(
            LinkStatus::Suggested,
            LinkStatus::Rejected
        ));
    }

    #[test]
    fn unordered_key_ignores_direction() {
        let now = Utc::now();
        let link = MarketLink {
            id: 1,
            left_venue: Venue::Polymarket,
            left_market_id: 7,
            right_venue: Venue::Kalshi,
            right_market_id: 3,
            score: 0.9,
            status: LinkStatus::Suggested,
            reason: String::new(),
            topic: CanonicalTopic::CryptoDaily,
            algo_version: "v1".into(),
            created_at: now,
            updated_at: now,
        };
        let mut flipped = link.clone();
        std::mem::swap(&mut flipped.left_venue, &mut flipped.right_venue);
        std::mem::swap(&mut flipped.left_market_id, &mut flipped.right_market_id);

        assert_eq!(link.unordered_key(), flipped.unordered_key());
    }
}
