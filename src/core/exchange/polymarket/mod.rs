//! Polymarket gamma API adapter.

mod client;
mod types;

pub use client::{PolymarketClient, PolymarketConfig};
pub use types::GammaMarket;
