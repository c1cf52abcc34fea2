//! Pure domain types shared across the matching engine.

pub mod eligibility;
pub mod fingerprint;
mod link;
mod market;
mod topic;

pub use link::{LinkStatus, MarketLink};
pub use market::{
    should_record_quote, IngestionState, KalshiEvent, Market, MarketStatus, Outcome, OutcomeSide,
    Quote, RawMarket, Venue, WatchlistEntry,
};
pub use topic::{CanonicalTopic, TaxonomySource};
