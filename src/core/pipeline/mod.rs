//! Topic pipeline contract and registry.
//!
//! A topic pipeline is the capability bundle one topic needs to go from
//! "two lists of markets" to "scored, deduplicated candidate links". The
//! registry maps canonical topics to their pipelines; it is populated once
//! at startup and read-only afterwards.

mod bracket;
mod climate;
mod commodities;
mod crypto_daily;
mod crypto_intraday;
mod elections;
mod entertainment;
mod finance;
mod geopolitics;
mod macro_econ;
mod rates;
mod sports;

pub use bracket::{dedup_brackets, BracketLimits};
pub use climate::ClimatePipeline;
pub use commodities::CommoditiesPipeline;
pub use crypto_daily::CryptoDailyPipeline;
pub use crypto_intraday::CryptoIntradayPipeline;
pub use elections::ElectionsPipeline;
pub use entertainment::EntertainmentPipeline;
pub use finance::FinancePipeline;
pub use geopolitics::GeopoliticsPipeline;
pub use macro_econ::MacroPipeline;
pub use rates::RatesPipeline;
pub use sports::SportsPipeline;

use std::collections::HashMap;

use async_trait::async_trait;
use once_cell::sync::Lazy;

use crate::core::domain::{CanonicalTopic, Market, Venue};
use crate::core::rules::Tier;
use crate::core::store::Repository;
use crate::error::Result;

/// Options handed to a pipeline's fetch step.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub lookback_hours: Option<i64>,
    pub limit: Option<usize>,
}

/// Outcome of the hard gates for one pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateResult {
    Passed,
    Failed(String),
}

impl GateResult {
    #[must_use]
    pub const fn passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

/// A scored pair, before and after dedup.
#[derive(Debug, Clone)]
pub struct ScoreResult {
    pub score: f64,
    pub reason: String,
    pub tier: Tier,
}

/// A surviving candidate pair.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub left: Market,
    pub right: Market,
    pub result: ScoreResult,
}

/// Dedup caps applied after scoring.
#[derive(Debug, Clone, Copy)]
pub struct DedupLimits {
    pub max_per_left: usize,
    pub max_per_right: usize,
}

impl Default for DedupLimits {
    fn default() -> Self {
        Self {
            max_per_left: 3,
            max_per_right: 3,
        }
    }
}

/// Multi-key candidate index: key -> positions in the right-markets slice.
#[derive(Debug, Default)]
pub struct CandidateIndex {
    map: HashMap<String, Vec<usize>>,
}

impl CandidateIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: String, position: usize) {
        self.map.entry(key).or_default().push(position);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> &[usize] {
        self.map.get(key).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Auto-confirm verdict from a pipeline hook.
#[derive(Debug, Clone)]
pub struct AutoConfirmDecision {
    pub should_confirm: bool,
    pub rule: Option<&'static str>,
    pub confidence: f64,
}

impl AutoConfirmDecision {
    #[must_use]
    pub const fn no() -> Self {
        Self {
            should_confirm: false,
            rule: None,
            confidence: 0.0,
        }
    }
}

/// Auto-reject verdict from a pipeline hook.
#[derive(Debug, Clone)]
pub struct AutoRejectDecision {
    pub should_reject: bool,
    pub rule: Option<&'static str>,
    pub reason: Option<String>,
}

impl AutoRejectDecision {
    #[must_use]
    pub const fn no() -> Self {
        Self {
            should_reject: false,
            rule: None,
            reason: None,
        }
    }
}

/// The capability bundle every topic pipeline implements.
#[async_trait]
pub trait TopicPipeline: Send + Sync {
    fn topic(&self) -> CanonicalTopic;

    /// Opaque version stamped into every link this pipeline writes.
    fn algo_version(&self) -> &'static str;

    fn supports_auto_confirm(&self) -> bool {
        false
    }

    fn supports_auto_reject(&self) -> bool {
        false
    }

    /// Minimum score for a pair to be suggested at all.
    fn min_score(&self) -> f64;

    /// Fetch eligible markets for one venue side.
    async fn fetch_markets(
        &self,
        repo: &dyn Repository,
        venue: Venue,
        opts: &FetchOptions,
    ) -> Result<Vec<Market>>;

    /// Build the multi-key index over the right-side markets.
    fn build_index(&self, markets: &[Market]) -> CandidateIndex;

    /// Candidate positions for one left market.
    fn find_candidates(&self, market: &Market, index: &CandidateIndex) -> Vec<usize>;

    /// Non-scoring rejections; a failed gate drops the pair silently.
    fn check_hard_gates(&self, left: &Market, right: &Market) -> GateResult;

    /// Score a pair that passed the gates. None means one side lacked the
    /// signals to score at all.
    fn score(&self, left: &Market, right: &Market) -> Option<ScoreResult>;

    /// Deduplicate scored candidates. The default keeps the best
    /// `max_per_left` per left market and `max_per_right` per right market,
    /// in stable score-descending order.
    fn apply_dedup(&self, candidates: Vec<Candidate>, limits: &DedupLimits) -> Vec<Candidate> {
        default_dedup(candidates, limits)
    }

    /// Auto-confirm hook; only consulted when `supports_auto_confirm`.
    fn should_auto_confirm(
        &self,
        _left: &Market,
        _right: &Market,
        _result: &ScoreResult,
    ) -> AutoConfirmDecision {
        AutoConfirmDecision::no()
    }

    /// Auto-reject hook; only consulted when `supports_auto_reject`.
    fn should_auto_reject(
        &self,
        _left: &Market,
        _right: &Market,
        _result: &ScoreResult,
    ) -> AutoRejectDecision {
        AutoRejectDecision::no()
    }
}

/// Stable candidate order: score descending, ties by (left id, right id).
pub fn sort_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.result
            .score
            .partial_cmp(&a.result.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.left.id.cmp(&b.left.id))
            .then_with(|| a.right.id.cmp(&b.right.id))
    });
}

/// Default dedup: stable order, then per-side caps.
#[must_use]
pub fn default_dedup(mut candidates: Vec<Candidate>, limits: &DedupLimits) -> Vec<Candidate> {
    sort_candidates(&mut candidates);
    let mut per_left: HashMap<i64, usize> = HashMap::new();
    let mut per_right: HashMap<i64, usize> = HashMap::new();
    candidates
        .into_iter()
        .filter(|c| {
            let l = per_left.entry(c.left.id).or_insert(0);
            let r = per_right.entry(c.right.id).or_insert(0);
            if *l >= limits.max_per_left || *r >= limits.max_per_right {
                return false;
            }
            *l += 1;
            *r += 1;
            true
        })
        .collect()
}

/// Registry from canonical topic to pipeline.
#[derive(Default)]
pub struct PipelineRegistry {
    pipelines: HashMap<CanonicalTopic, Box<dyn TopicPipeline>>,
}

impl PipelineRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pipeline. Last registration for a topic wins; that only
    /// happens in tests.
    pub fn register(&mut self, pipeline: Box<dyn TopicPipeline>) {
        self.pipelines.insert(pipeline.topic(), pipeline);
    }

    #[must_use]
    pub fn get(&self, topic: CanonicalTopic) -> Option<&dyn TopicPipeline> {
        self.pipelines.get(&topic).map(Box::as_ref)
    }

    /// Topics with a registered pipeline, in canonical order.
    #[must_use]
    pub fn topics(&self) -> Vec<CanonicalTopic> {
        CanonicalTopic::ALL
            .iter()
            .copied()
            .filter(|t| self.pipelines.contains_key(t))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}

/// Build a registry with every production pipeline.
#[must_use]
pub fn register_all_pipelines() -> PipelineRegistry {
    let mut registry = PipelineRegistry::new();
    registry.register(Box::new(CryptoDailyPipeline::new()));
    registry.register(Box::new(CryptoIntradayPipeline::new()));
    registry.register(Box::new(MacroPipeline::new()));
    registry.register(Box::new(RatesPipeline::new()));
    registry.register(Box::new(ElectionsPipeline::new()));
    registry.register(Box::new(GeopoliticsPipeline::new()));
    registry.register(Box::new(EntertainmentPipeline::new()));
    registry.register(Box::new(ClimatePipeline::new()));
    registry.register(Box::new(CommoditiesPipeline::new()));
    registry.register(Box::new(FinancePipeline::new()));
    registry.register(Box::new(SportsPipeline::new()));
    registry
}

/// Process-global registry, written once at startup and immutable after.
static GLOBAL_REGISTRY: Lazy<PipelineRegistry> = Lazy::new(register_all_pipelines);

/// The global registry.
#[must_use]
pub fn global_registry() -> &'static PipelineRegistry {
    &GLOBAL_REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_all_matchable_topics() {
        let registry = register_all_pipelines();
        for topic in [
            CanonicalTopic::CryptoDaily,
            CanonicalTopic::CryptoIntraday,
            CanonicalTopic::Macro,
            CanonicalTopic::Rates,
            CanonicalTopic::Elections,
            CanonicalTopic::Geopolitics,
            CanonicalTopic::Entertainment,
            CanonicalTopic::Climate,
            CanonicalTopic::Commodities,
            CanonicalTopic::Finance,
            CanonicalTopic::Sports,
        ] {
            let pipeline = registry.get(topic);
            assert!(pipeline.is_some(), "no pipeline for {topic}");
            assert_eq!(pipeline.unwrap().topic(), topic);
        }
        assert!(registry.get(CanonicalTopic::Unknown).is_none());
        assert!(registry.get(CanonicalTopic::Universal).is_none());
    }

    #[test]
    fn every_pipeline_stamps_a_version_and_floor() {
        let registry = register_all_pipelines();
        for topic in registry.topics() {
            let p = registry.get(topic).unwrap();
            assert!(!p.algo_version().is_empty());
            assert!((0.0..=1.0).contains(&p.min_score()));
        }
    }

    #[test]
    fn candidate_index_basics() {
        let mut index = CandidateIndex::new();
        index.insert("a".into(), 0);
        index.insert("a".into(), 2);
        index.insert("b".into(), 1);
        assert_eq!(index.get("a"), &[0, 2]);
        assert_eq!(index.get("b"), &[1]);
        assert_eq!(index.get("missing"), &[] as &[usize]);
        assert_eq!(index.len(), 2);
    }
}
