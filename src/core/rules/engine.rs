//! Drivers that sweep existing links through the rule packs.

use std::collections::BTreeMap;

use chrono::Utc;
use tracing::{info, warn};

use super::reason::{format_auto_confirm, format_auto_reject};
use super::reject::{evaluate_reject, RejectConfig, REJECT_PACK_VERSION};
use super::safe_confirm::{evaluate_safe_confirm, pack_version, ConfirmVerdict};
use crate::core::domain::{CanonicalTopic, LinkStatus, MarketLink};
use crate::core::store::{LinkFilter, Repository};
use crate::error::Result;

/// Outcome of one rule-engine sweep.
#[derive(Debug, Clone, Default)]
pub struct RulePassReport {
    pub scanned: u64,
    /// Links whose status flipped (or would flip, in dry-run).
    pub flipped: u64,
    /// Overrides of confirmed links (reject only).
    pub overrides: u64,
    pub applied: bool,
    /// Confirm: winning rule per pack. Reject: each fired rule.
    pub by_rule: BTreeMap<String, u64>,
    /// Confirm only: first blocking rule per link left suggested.
    pub blocked_by_rule: BTreeMap<String, u64>,
    /// A few example links, for dry-run output.
    pub samples: Vec<String>,
}

const MAX_SAMPLES: usize = 5;

async fn titles_for(
    repo: &dyn Repository,
    link: &MarketLink,
) -> Result<Option<(String, String)>> {
    let left = repo.get_market(link.left_market_id).await?;
    let right = repo.get_market(link.right_market_id).await?;
    Ok(match (left, right) {
        (Some(l), Some(r)) => Some((l.title, r.title)),
        _ => None,
    })
}

/// Sweep suggested links through the safe-confirm packs.
///
/// Dry-run reports counts by rule; apply promotes and rewrites the reason
/// to `auto_confirm@<ver>:<topic>:<rule>`.
pub async fn run_safe_confirm(
    repo: &dyn Repository,
    topic: Option<CanonicalTopic>,
    apply: bool,
    limit: Option<usize>,
) -> Result<RulePassReport> {
    let filter = LinkFilter {
        topic,
        status: Some(LinkStatus::Suggested),
        limit,
        ..Default::default()
    };
    let links = repo.list_links(&filter).await?;

    let mut report = RulePassReport {
        applied: apply,
        ..Default::default()
    };

    for link in &links {
        report.scanned += 1;
        let Some((left_title, right_title)) = titles_for(repo, link).await? else {
            continue;
        };
        match evaluate_safe_confirm(link, &left_title, &right_title) {
            ConfirmVerdict::Confirm { rule } => {
                report.flipped += 1;
                *report.by_rule.entry(rule.to_string()).or_default() += 1;
                if report.samples.len() < MAX_SAMPLES {
                    report.samples.push(format!(
                        "#{} {:.2} {} <-> {}",
                        link.id, link.score, left_title, right_title
                    ));
                }
                if apply {
                    let version = pack_version(link.topic).unwrap_or("0");
                    let reason = format_auto_confirm(
                        version,
                        &link.topic.as_str().to_lowercase(),
                        rule,
                    );
                    repo.update_link_status(link.id, LinkStatus::Confirmed, &reason)
                        .await?;
                }
            }
            ConfirmVerdict::Blocked { rule } => {
                *report
                    .blocked_by_rule
                    .entry(rule.to_string())
                    .or_default() += 1;
            }
            ConfirmVerdict::NotApplicable => {}
        }
    }

    info!(
        scanned = report.scanned,
        flipped = report.flipped,
        applied = apply,
        "Safe-confirm sweep done"
    );
    Ok(report)
}

/// Sweep links through the reject pack.
///
/// Dry-run reports counts by rule; apply demotes and rewrites the reason to
/// `auto_reject@<ver>:<rule1+rule2>`. Confirmed links are only touched when
/// the config opts in, and each such override is logged.
pub async fn run_auto_reject(
    repo: &dyn Repository,
    topic: Option<CanonicalTopic>,
    config: &RejectConfig,
    apply: bool,
    limit: Option<usize>,
) -> Result<RulePassReport> {
    let mut links = repo
        .list_links(&LinkFilter {
            topic,
            status: Some(LinkStatus::Suggested),
            limit,
            ..Default::default()
        })
        .await?;
    if config.include_confirmed {
        links.extend(
            repo.list_links(&LinkFilter {
                topic,
                status: Some(LinkStatus::Confirmed),
                limit,
                ..Default::default()
            })
            .await?,
        );
    }

    let now = Utc::now();
    let mut report = RulePassReport {
        applied: apply,
        ..Default::default()
    };

    for link in &links {
        report.scanned += 1;
        let Some((left_title, right_title)) = titles_for(repo, link).await? else {
            continue;
        };
        let verdict = evaluate_reject(link, &left_title, &right_title, now, config);
        if !verdict.should_reject() {
            continue;
        }

        report.flipped += 1;
        for rule in &verdict.rules {
            *report.by_rule.entry((*rule).to_string()).or_default() += 1;
        }
        if report.samples.len() < MAX_SAMPLES {
            report.samples.push(format!(
                "#{} {:.2} [{}]",
                link.id,
                link.score,
                verdict.rules.join("+")
            ));
        }

        if link.status == LinkStatus::Confirmed {
            report.overrides += 1;
            warn!(
                link = link.id,
                rules = %verdict.rules.join("+"),
                "Rejecting a previously confirmed link"
            );
        }

        if apply {
            let reason = format_auto_reject(REJECT_PACK_VERSION, &verdict.rules);
            repo.update_link_status(link.id, LinkStatus::Rejected, &reason)
                .await?;
        }
    }

    info!(
        scanned = report.scanned,
        flipped = report.flipped,
        applied = apply,
        "Reject sweep done"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{MarketStatus, RawMarket, Venue};
    use crate::core::store::{MemoryStore, SuggestionUpsert};
    use chrono::Duration;
    use serde_json::json;

    async fn seed_link(
        store: &MemoryStore,
        left_title: &str,
        right_title: &str,
        score: f64,
        reason: &str,
        topic: CanonicalTopic,
    ) -> i64 {
        let close = Utc::now() + Duration::hours(24);
        let left = store
            .upsert_market(&RawMarket {
                venue: Venue::Kalshi,
                external_id: format!("k-{left_title}"),
                title: left_title.into(),
                status: MarketStatus::Active,
                close_time: Some(close),
                category: None,
                metadata: json!({}),
            })
            .await
            .unwrap();
        let right = store
            .upsert_market(&RawMarket {
                venue: Venue::Polymarket,
                external_id: format!("p-{right_title}"),
                title: right_title.into(),
                status: MarketStatus::Active,
                close_time: Some(close),
                category: None,
                metadata: json!({}),
            })
            .await
            .unwrap();
        store
            .upsert_suggestion_v3(&SuggestionUpsert {
                left_venue: Venue::Kalshi,
                left_market_id: left.id,
                right_venue: Venue::Polymarket,
                right_market_id: right.id,
                score,
                reason: reason.into(),
                algo_version: "test".into(),
                topic,
                status: LinkStatus::Suggested,
            })
            .await
            .unwrap();
        let links = store.list_links(&LinkFilter::default()).await.unwrap();
        links
            .iter()
            .find(|l| l.left_market_id == left.id && l.right_market_id == right.id)
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn safe_confirm_promotes_and_rewrites_reason() {
        let store = MemoryStore::new();
        let id = seed_link(
            &store,
            "Bitcoin above $100000 on Jan 21, 2026",
            "BTC above $100001 on Jan 21, 2026",
            0.93,
            "entity=BITCOIN dateType=DAY_EXACT date=1.00(0d) num=0.95[price] text=0.40",
            CanonicalTopic::CryptoDaily,
        )
        .await;

        // Dry-run counts but does not touch the link
        let dry = run_safe_confirm(&store, Some(CanonicalTopic::CryptoDaily), false, None)
            .await
            .unwrap();
        assert_eq!(dry.flipped, 1);
        assert_eq!(
            store.get_link(id).await.unwrap().unwrap().status,
            LinkStatus::Suggested
        );

        let applied = run_safe_confirm(&store, Some(CanonicalTopic::CryptoDaily), true, None)
            .await
            .unwrap();
        assert_eq!(applied.flipped, 1);
        let link = store.get_link(id).await.unwrap().unwrap();
        assert_eq!(link.status, LinkStatus::Confirmed);
        assert!(
            link.reason.starts_with("auto_confirm@2.6.8:crypto_daily:"),
            "reason: {}",
            link.reason
        );
    }

    #[tokio::test]
    async fn safe_confirm_blocked_below_floor() {
        let store = MemoryStore::new();
        seed_link(
            &store,
            "Bitcoin above $100000 on Jan 21, 2026",
            "BTC above $100001 on Jan 21, 2026",
            0.80,
            "entity=BITCOIN dateType=DAY_EXACT date=1.00(0d) num=0.95[price] text=0.40",
            CanonicalTopic::CryptoDaily,
        )
        .await;

        let report = run_safe_confirm(&store, None, true, None).await.unwrap();
        assert_eq!(report.flipped, 0);
        assert_eq!(report.blocked_by_rule.get("score_floor"), Some(&1));
    }

    #[tokio::test]
    async fn auto_reject_demotes_low_scores() {
        let store = MemoryStore::new();
        let id = seed_link(
            &store,
            "Bitcoin above $100k on Jan 21, 2026",
            "Ethereum above $5k on Jan 21, 2026",
            0.2,
            "entity=BITCOIN dateType=DAY_EXACT date=1.00(0d) num=0.00[unknown] text=0.05",
            CanonicalTopic::CryptoDaily,
        )
        .await;

        let report = run_auto_reject(
            &store,
            Some(CanonicalTopic::CryptoDaily),
            &RejectConfig::default(),
            true,
            None,
        )
        .await
        .unwrap();
        assert_eq!(report.flipped, 1);
        assert!(report.by_rule.contains_key("hard_floor"));
        assert!(report.by_rule.contains_key("entity_mismatch"));

        let link = store.get_link(id).await.unwrap().unwrap();
        assert_eq!(link.status, LinkStatus::Rejected);
        assert!(link.reason.starts_with("auto_reject@1.4.2:"));
    }
}
