//! The suggest-matches command.

use clap::Parser;

use super::output;
use crate::app::Config;
use crate::core::domain::{CanonicalTopic, Venue};
use crate::core::matching::{run_matching, MatchRunConfig, RunMode};
use crate::core::pipeline::{global_registry, DedupLimits};
use crate::core::store::Repository;
use crate::error::{Error, Result};

#[derive(Parser, Debug)]
pub struct SuggestMatchesArgs {
    /// Topic to match
    #[arg(long)]
    pub topic: String,

    /// Write suggestions instead of dry-running
    #[arg(long)]
    pub apply: bool,

    /// Left venue
    #[arg(long, default_value = "kalshi")]
    pub from: String,

    /// Right venue
    #[arg(long, default_value = "polymarket")]
    pub to: String,

    /// Override the topic's score floor
    #[arg(long)]
    pub min_score: Option<f64>,

    /// Override the topic's lookback window
    #[arg(long)]
    pub lookback_hours: Option<i64>,

    /// Auto-confirm qualifying pairs
    #[arg(long)]
    pub auto_confirm: bool,

    /// Auto-reject disqualified pairs
    #[arg(long)]
    pub auto_reject: bool,
}

pub fn parse_topic(raw: &str) -> Result<CanonicalTopic> {
    CanonicalTopic::parse(raw).ok_or_else(|| Error::Config(format!("unknown topic '{raw}'")))
}

pub fn parse_venue(raw: &str) -> Result<Venue> {
    Venue::parse(raw).ok_or_else(|| Error::Config(format!("unknown venue '{raw}'")))
}

pub async fn suggest_matches(
    store: &dyn Repository,
    config: &Config,
    args: SuggestMatchesArgs,
) -> Result<i32> {
    let topic = parse_topic(&args.topic)?;
    let run_config = MatchRunConfig {
        from_venue: parse_venue(&args.from)?,
        to_venue: parse_venue(&args.to)?,
        lookback_hours: args.lookback_hours,
        min_score: args.min_score,
        mode: if args.apply {
            RunMode::Suggest
        } else {
            RunMode::DryRun
        },
        auto_confirm: args.auto_confirm,
        auto_reject: args.auto_reject,
        dedup: DedupLimits {
            max_per_left: config.matching.max_per_left,
            max_per_right: config.matching.max_per_right,
        },
        ..MatchRunConfig::new(topic)
    };

    let outcome = run_matching(store, global_registry(), &run_config).await?;

    output::section(&format!(
        "{} {} -> {}{}",
        topic,
        run_config.from_venue,
        run_config.to_venue,
        if args.apply { "" } else { " (dry-run)" }
    ));
    output::field("left / right", format!("{} / {}", outcome.left_count, outcome.right_count));
    output::field("evaluated", outcome.candidates_evaluated);
    output::field("passed gates", outcome.candidates_passed_gates);
    output::field("survivors", outcome.survivors);
    output::field(
        "written",
        format!(
            "{} suggested, {} confirmed, {} rejected",
            outcome.suggested, outcome.confirmed, outcome.rejected
        ),
    );
    let h = outcome.histogram;
    output::field(
        "scores",
        format!(
            "≥0.9: {}  0.8+: {}  0.7+: {}  0.6+: {}  <0.6: {}",
            h.ge_90, h.from_80, h.from_70, h.from_60, h.below_60
        ),
    );
    if outcome.status_guarded > 0 {
        output::warning(&format!(
            "{} confirmed link(s) kept their status",
            outcome.status_guarded
        ));
    }
    output::success(&format!("done in {}ms", outcome.duration_ms));
    Ok(0)
}
