//! Topic classification.
//!
//! Assigns each market a canonical topic from series metadata, category,
//! tags, and title keywords, and detects multi-variable (parlay) markets.

mod classifier;
mod mve;

pub use classifier::{classify, Classification};
pub use mve::{detect_mve, MveDetection, MveSource};
