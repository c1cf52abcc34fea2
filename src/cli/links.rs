//! Link rule-engine commands and manual review.

use clap::{Parser, Subcommand};
use tabled::{Table, Tabled};

use super::matching::parse_topic;
use super::output;
use crate::core::domain::{CanonicalTopic, LinkStatus, MarketLink};
use crate::core::rules::{run_auto_reject, run_safe_confirm, RejectConfig, RulePassReport};
use crate::core::store::{LinkFilter, Repository};
use crate::error::{Error, Result};

#[derive(Subcommand, Debug)]
pub enum LinksCommand {
    /// Promote suggested links that pass the safe-confirm pack
    AutoConfirm(AutoConfirmArgs),

    /// Demote suggested links that trip the reject pack
    AutoReject(AutoRejectArgs),

    /// Show the suggestion review queue
    Queue(QueueArgs),
}

#[derive(Parser, Debug)]
pub struct AutoConfirmArgs {
    /// Topic, or "all"
    #[arg(long, default_value = "all")]
    pub topic: String,

    /// Apply status changes instead of dry-running
    #[arg(long)]
    pub apply: bool,

    /// Show blocking rules for links left suggested
    #[arg(long)]
    pub explain: bool,

    /// Scan at most this many links
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Parser, Debug)]
pub struct AutoRejectArgs {
    /// Topic to sweep
    #[arg(long)]
    pub topic: String,

    /// Apply status changes instead of dry-running
    #[arg(long)]
    pub apply: bool,

    /// Only age-reject links older than this
    #[arg(long, default_value = "24")]
    pub min_age_hours: i64,

    /// Also demote confirmed links (logged as overrides)
    #[arg(long)]
    pub include_confirmed: bool,

    /// Scan at most this many links
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Parser, Debug)]
pub struct QueueArgs {
    /// Restrict to one topic
    #[arg(long)]
    pub topic: Option<String>,

    /// Minimum score
    #[arg(long)]
    pub min_score: Option<f64>,

    /// Maximum rows
    #[arg(long, default_value = "25")]
    pub limit: usize,
}

#[derive(Parser, Debug)]
pub struct ConfirmMatchArgs {
    /// Link id
    #[arg(long)]
    pub id: i64,
}

#[derive(Parser, Debug)]
pub struct RejectMatchArgs {
    /// Link id
    #[arg(long)]
    pub id: i64,
}

pub async fn dispatch(store: &dyn Repository, command: LinksCommand) -> Result<i32> {
    match command {
        LinksCommand::AutoConfirm(args) => auto_confirm(store, args).await,
        LinksCommand::AutoReject(args) => auto_reject(store, args).await,
        LinksCommand::Queue(args) => queue(store, args).await,
    }
}

fn parse_topic_or_all(raw: &str) -> Result<Option<CanonicalTopic>> {
    if raw.eq_ignore_ascii_case("all") {
        return Ok(None);
    }
    parse_topic(raw).map(Some)
}

fn print_report(title: &str, report: &RulePassReport, explain: bool) {
    output::section(title);
    output::field("scanned", report.scanned);
    output::field(
        "flipped",
        format!(
            "{}{}",
            report.flipped,
            if report.applied { "" } else { " (dry-run)" }
        ),
    );
    for (rule, count) in &report.by_rule {
        output::field(rule, count);
    }
    if explain {
        for (rule, count) in &report.blocked_by_rule {
            output::field(&format!("blocked:{rule}"), count);
        }
    }
    if report.overrides > 0 {
        output::warning(&format!(
            "{} confirmed link(s) overridden to rejected",
            report.overrides
        ));
    }
    for sample in &report.samples {
        output::field("sample", sample);
    }
}

async fn auto_confirm(store: &dyn Repository, args: AutoConfirmArgs) -> Result<i32> {
    let topic = parse_topic_or_all(&args.topic)?;
    let report = run_safe_confirm(store, topic, args.apply, args.limit).await?;
    print_report("auto-confirm", &report, args.explain);
    Ok(0)
}

async fn auto_reject(store: &dyn Repository, args: AutoRejectArgs) -> Result<i32> {
    let topic = parse_topic(&args.topic)?;
    let config = RejectConfig {
        min_age_hours: args.min_age_hours,
        include_confirmed: args.include_confirmed,
    };
    let report = run_auto_reject(store, Some(topic), &config, args.apply, args.limit).await?;
    print_report("auto-reject", &report, false);
    Ok(0)
}

#[derive(Tabled)]
struct QueueRow {
    id: i64,
    topic: String,
    score: String,
    pair: String,
    reason: String,
}

impl QueueRow {
    fn from_link(link: &MarketLink) -> Self {
        let mut reason = link.reason.clone();
        if reason.len() > 60 {
            reason.truncate(57);
            reason.push_str("...");
        }
        Self {
            id: link.id,
            topic: link.topic.to_string(),
            score: format!("{:.2}", link.score),
            pair: format!(
                "{}:{} <-> {}:{}",
                link.left_venue, link.left_market_id, link.right_venue, link.right_market_id
            ),
            reason,
        }
    }
}

async fn queue(store: &dyn Repository, args: QueueArgs) -> Result<i32> {
    let topic = args.topic.as_deref().map(parse_topic).transpose()?;
    let links = store
        .list_links(&LinkFilter {
            topic,
            status: Some(LinkStatus::Suggested),
            min_score: args.min_score,
            limit: Some(args.limit),
            ..Default::default()
        })
        .await?;

    if links.is_empty() {
        output::success("queue is empty");
        return Ok(0);
    }
    let rows: Vec<QueueRow> = links.iter().map(QueueRow::from_link).collect();
    println!("{}", Table::new(rows));
    Ok(0)
}

pub async fn confirm_match(store: &dyn Repository, args: ConfirmMatchArgs) -> Result<i32> {
    let link = store
        .get_link(args.id)
        .await?
        .ok_or_else(|| Error::Config(format!("no link with id {}", args.id)))?;
    if link.status == LinkStatus::Confirmed {
        output::warning("link is already confirmed");
        return Ok(0);
    }
    store
        .update_link_status(args.id, LinkStatus::Confirmed, "manual_confirm")
        .await?;
    output::success(&format!("link #{} confirmed", args.id));
    Ok(0)
}

pub async fn reject_match(store: &dyn Repository, args: RejectMatchArgs) -> Result<i32> {
    let link = store
        .get_link(args.id)
        .await?
        .ok_or_else(|| Error::Config(format!("no link with id {}", args.id)))?;
    if link.status == LinkStatus::Confirmed {
        output::warning("rejecting a previously confirmed link");
    }
    store
        .update_link_status(args.id, LinkStatus::Rejected, "manual_reject")
        .await?;
    output::success(&format!("link #{} rejected", args.id));
    Ok(0)
}
