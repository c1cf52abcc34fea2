//! Cross-venue matching orchestration.

mod orchestrator;

pub use orchestrator::{
    run_matching, MatchRunConfig, MatchRunOutcome, RunMode, ScoreHistogram,
};
