//! Recommendation Engine
//!
//! Item-based collaborative filtering over the interaction graph: candidate
//! generation by two-hop pruning, summed pairwise Jaccard scoring with
//! memoization, and deterministic top-k ranking.
//!
//! The engine holds a shared reference to an [`InteractionGraph`] and owns
//! its similarity cache; multiple engines over independent graphs can
//! coexist. Every query is evaluated against a single consistent read
//! snapshot of the graph.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::graph::{GraphView, InteractionGraph, ItemId};
use crate::recommendation::metrics::{CacheStatsSnapshot, PerformanceTimer, RecommendReport};
use crate::recommendation::similarity::{jaccard, PairKey, SimilarityCache};

/// A ranked recommendation, translated back to the external identifier.
///
/// The score is the sum of Jaccard similarities between the item and every
/// item in the querying user's history, so it lives in [0, |history|].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub item: String,
    pub score: f64,
}

/// Result of a deadline-bounded query. `complete` is false when the budget
/// expired before every candidate was scored; the ranking then covers only
/// the candidates scored so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialRecommendations {
    pub items: Vec<Recommendation>,
    pub complete: bool,
}

/// Recommendations plus the per-request report for harness measurement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub items: Vec<Recommendation>,
    pub report: RecommendReport,
}

/// Main recommendation engine
pub struct RecommendationEngine {
    graph: Arc<InteractionGraph>,
    cache: SimilarityCache,
    config: EngineConfig,
}

impl RecommendationEngine {
    /// Create an engine with default configuration over a shared graph
    pub fn new(graph: Arc<InteractionGraph>) -> Self {
        Self::with_config(graph, EngineConfig::default())
    }

    pub fn with_config(graph: Arc<InteractionGraph>, config: EngineConfig) -> Self {
        let cache = SimilarityCache::new(config.similarity_cache_capacity, config.cache_shards);
        Self {
            graph,
            cache,
            config,
        }
    }

    /// The graph this engine reads from
    pub fn graph(&self) -> &InteractionGraph {
        &self.graph
    }

    /// Similarity-cache counters (hits, misses, stale recomputes, evictions)
    pub fn cache_stats(&self) -> CacheStatsSnapshot {
        self.cache.stats().snapshot()
    }

    /// Number of item pairs currently cached
    pub fn cached_pairs(&self) -> usize {
        self.cache.len()
    }

    // ========================================================================
    // Similarity
    // ========================================================================

    /// Jaccard similarity of two items' audiences, memoized per unordered
    /// pair. Symmetric in its arguments; 0.0 when either audience is empty.
    pub fn compute_similarity(&self, a: ItemId, b: ItemId) -> f64 {
        let view = self.graph.view();
        self.cached_similarity(&view, a, b)
    }

    fn cached_similarity(&self, view: &GraphView<'_>, a: ItemId, b: ItemId) -> f64 {
        let key = PairKey::new(a, b);
        let version_lo = view.audience_version(key.lo());
        let version_hi = view.audience_version(key.hi());

        self.cache.get_or_compute(key, version_lo, version_hi, || {
            match (view.audience(key.lo()), view.audience(key.hi())) {
                (Some(a), Some(b)) => jaccard(a, b),
                _ => 0.0,
            }
        })
    }

    fn score_candidate(&self, view: &GraphView<'_>, history: &[ItemId], candidate: ItemId) -> f64 {
        history
            .iter()
            .map(|&item| self.cached_similarity(view, item, candidate))
            .sum()
    }

    // ========================================================================
    // Recommendation
    // ========================================================================

    /// Top-k recommendations for a user.
    ///
    /// Unseen users and users with empty histories yield an empty vector.
    /// `k == 0` is rejected with [`Error::InvalidLimit`]. Ranking order is
    /// descending score, ties broken by ascending internal item handle
    /// (i.e. first-interned item wins), which makes results reproducible.
    pub fn recommend(&self, user: &str, k: usize) -> Result<Vec<Recommendation>> {
        Ok(self.recommend_detailed(user, k)?.items)
    }

    /// `recommend` with the configured `default_k`, honoring the configured
    /// scoring budget when one is set
    pub fn recommend_top(&self, user: &str) -> Result<Vec<Recommendation>> {
        match self.config.scoring_budget {
            Some(budget) => Ok(self
                .recommend_within(user, self.config.default_k, budget)?
                .items),
            None => self.recommend(user, self.config.default_k),
        }
    }

    /// Top-k recommendations plus the per-request report
    pub fn recommend_detailed(&self, user: &str, k: usize) -> Result<RecommendationResponse> {
        validate_query(user, k)?;

        let timer = PerformanceTimer::new("recommend");
        let mut report = RecommendReport::new(user);

        let view = self.graph.view();
        let items = match self.resolve_history(&view, user) {
            None => Vec::new(),
            Some(history) => {
                report.history_size = history.len();

                let candidate_timer = PerformanceTimer::new("candidate_generation");
                let candidates = generate_candidates(&view, &history);
                report.candidate_duration_us = candidate_timer.elapsed_us();
                report.candidates_considered = candidates.len();
                drop(candidate_timer);

                let scoring_timer = PerformanceTimer::new("scoring");
                let mut scored = self.score_all(&view, &history, candidates);
                report.scoring_duration_us = scoring_timer.elapsed_us();
                drop(scoring_timer);

                rank_top_k(&mut scored, k);
                translate(&view, scored)
            }
        };

        report.recommendations_returned = items.len();
        report.total_duration_us = timer.elapsed_us();
        report.cache = self.cache.stats().snapshot();
        timer.log_if_slow(200);

        debug!(
            user,
            k,
            candidates = report.candidates_considered,
            returned = report.recommendations_returned,
            "recommendations generated"
        );

        Ok(RecommendationResponse { items, report })
    }

    /// Deadline-bounded variant of `recommend`.
    ///
    /// Candidate generation and scoring are checked against the budget;
    /// when it expires, the candidates scored so far are ranked and the
    /// result is flagged incomplete. Exceeding the budget is a degraded
    /// outcome, never an error.
    pub fn recommend_within(
        &self,
        user: &str,
        k: usize,
        budget: Duration,
    ) -> Result<PartialRecommendations> {
        validate_query(user, k)?;

        let deadline = Instant::now() + budget;
        let view = self.graph.view();

        let Some(history) = self.resolve_history(&view, user) else {
            return Ok(PartialRecommendations {
                items: Vec::new(),
                complete: true,
            });
        };

        let mut complete = true;
        let mut candidates: HashSet<ItemId> = HashSet::new();
        for &item in &history {
            if Instant::now() >= deadline {
                complete = false;
                break;
            }
            collect_two_hop(&view, item, &mut candidates);
        }
        for item in &history {
            candidates.remove(item);
        }

        let mut scored: Vec<(ItemId, f64)> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if Instant::now() >= deadline {
                complete = false;
                break;
            }
            scored.push((candidate, self.score_candidate(&view, &history, candidate)));
        }

        rank_top_k(&mut scored, k);
        let items = translate(&view, scored);

        if !complete {
            debug!(
                user,
                k,
                budget_ms = budget.as_millis() as u64,
                returned = items.len(),
                "scoring budget expired, returning partial ranking"
            );
        }

        Ok(PartialRecommendations { items, complete })
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// The user's history as a sorted vector, or `None` when there is
    /// nothing to recommend from
    fn resolve_history(&self, view: &GraphView<'_>, user: &str) -> Option<Vec<ItemId>> {
        let uid = view.user_handle(user)?;
        let history = view.history(uid)?;
        if history.is_empty() {
            return None;
        }
        let mut items: Vec<ItemId> = history.iter().copied().collect();
        items.sort_unstable();
        Some(items)
    }

    fn score_all(
        &self,
        view: &GraphView<'_>,
        history: &[ItemId],
        candidates: HashSet<ItemId>,
    ) -> Vec<(ItemId, f64)> {
        let candidates: Vec<ItemId> = candidates.into_iter().collect();

        if candidates.len() >= self.config.parallel_threshold {
            candidates
                .par_iter()
                .map(|&c| (c, self.score_candidate(view, history, c)))
                .collect()
        } else {
            candidates
                .iter()
                .map(|&c| (c, self.score_candidate(view, history, c)))
                .collect()
        }
    }
}

// ============================================================================
// Pure helpers
// ============================================================================

fn validate_query(user: &str, k: usize) -> Result<()> {
    if user.trim().is_empty() {
        return Err(Error::empty_identifier("user"));
    }
    if k == 0 {
        return Err(Error::InvalidLimit { k });
    }
    Ok(())
}

/// Union of the histories of every user in `item`'s audience
fn collect_two_hop(view: &GraphView<'_>, item: ItemId, candidates: &mut HashSet<ItemId>) {
    let Some(audience) = view.audience(item) else {
        return;
    };
    for &other_user in audience {
        if let Some(their_items) = view.history(other_user) {
            candidates.extend(their_items.iter().copied());
        }
    }
}

/// Candidate set: items within two hops of the history, minus the history
/// itself. Items sharing no user with the history never enter the set,
/// which is what makes scoring tractable.
fn generate_candidates(view: &GraphView<'_>, history: &[ItemId]) -> HashSet<ItemId> {
    let mut candidates = HashSet::new();
    for &item in history {
        collect_two_hop(view, item, &mut candidates);
    }
    for item in history {
        candidates.remove(item);
    }
    candidates
}

/// Sort by descending score, ties by ascending item handle, keep `k`.
/// Scores are finite sums of Jaccard indices, so the comparison is total
/// in practice.
fn rank_top_k(scored: &mut Vec<(ItemId, f64)>, k: usize) {
    scored.sort_unstable_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    scored.truncate(k);
}

fn translate(view: &GraphView<'_>, scored: Vec<(ItemId, f64)>) -> Vec<Recommendation> {
    scored
        .into_iter()
        .filter_map(|(item, score)| {
            view.external_item(item).map(|external| Recommendation {
                item: external.to_string(),
                score,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::InteractionGraph;

    fn engine_with(interactions: &[(&str, &str)]) -> RecommendationEngine {
        let graph = Arc::new(InteractionGraph::new());
        for (user, item) in interactions {
            graph.add_interaction(user, item).unwrap();
        }
        RecommendationEngine::new(graph)
    }

    #[test]
    fn test_shared_user_scenario() {
        // U1: {A, B}, U2: {A, C}. C is reachable from A through U2.
        // Audiences: A = {U1, U2}, C = {U2} → Jaccard(A, C) = 1/2.
        // B and C share no user → Jaccard(B, C) = 0.
        let engine = engine_with(&[("U1", "A"), ("U1", "B"), ("U2", "A"), ("U2", "C")]);

        let recs = engine.recommend("U1", 5).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].item, "C");
        assert!((recs[0].score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_unseen_user_returns_empty() {
        let engine = engine_with(&[]);
        assert!(engine.recommend("Ghost", 3).unwrap().is_empty());
    }

    #[test]
    fn test_zero_k_rejected() {
        let engine = engine_with(&[("U1", "A")]);
        let err = engine.recommend("U1", 0).unwrap_err();
        assert!(matches!(err, Error::InvalidLimit { k: 0 }));
    }

    #[test]
    fn test_empty_user_rejected() {
        let engine = engine_with(&[("U1", "A")]);
        let err = engine.recommend("  ", 5).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_no_self_recommendation() {
        let engine = engine_with(&[
            ("U1", "A"),
            ("U1", "B"),
            ("U2", "A"),
            ("U2", "B"),
            ("U2", "C"),
        ]);

        let recs = engine.recommend("U1", 10).unwrap();
        for rec in &recs {
            assert_ne!(rec.item, "A");
            assert_ne!(rec.item, "B");
        }
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].item, "C");
    }

    #[test]
    fn test_pruning_soundness() {
        // D is only interacted with by U3, who shares nothing with U1;
        // it must never be scored or returned.
        let engine = engine_with(&[("U1", "A"), ("U2", "A"), ("U2", "B"), ("U3", "D")]);

        let recs = engine.recommend("U1", 10).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].item, "B");
    }

    #[test]
    fn test_top_k_bound() {
        let engine = engine_with(&[
            ("U1", "A"),
            ("U2", "A"),
            ("U2", "B"),
            ("U2", "C"),
            ("U2", "D"),
        ]);

        assert_eq!(engine.recommend("U1", 2).unwrap().len(), 2);
        // Only 3 eligible candidates exist
        assert_eq!(engine.recommend("U1", 10).unwrap().len(), 3);
    }

    #[test]
    fn test_tie_break_is_first_interned_item() {
        // B and C both have audience {U2}; identical scores against A.
        // B was interned before C, so B ranks first.
        let engine = engine_with(&[("U1", "A"), ("U2", "A"), ("U2", "B"), ("U2", "C")]);

        let recs = engine.recommend("U1", 2).unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].item, "B");
        assert_eq!(recs[1].item, "C");
        assert_eq!(recs[0].score, recs[1].score);
    }

    #[test]
    fn test_similarity_symmetric_and_in_range() {
        let engine = engine_with(&[("U1", "A"), ("U2", "A"), ("U2", "B"), ("U3", "B")]);
        let graph = engine.graph();
        let a = graph.item_handle("A").unwrap();
        let b = graph.item_handle("B").unwrap();

        let ab = engine.compute_similarity(a, b);
        let ba = engine.compute_similarity(b, a);
        assert_eq!(ab, ba);
        assert!((0.0..=1.0).contains(&ab));
        // Audiences {U1, U2} and {U2, U3} overlap in one of three users
        assert!((ab - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_self_similarity_of_active_item_is_one() {
        let engine = engine_with(&[("U1", "A"), ("U2", "A")]);
        let a = engine.graph().item_handle("A").unwrap();
        assert!((engine.compute_similarity(a, a) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_caching_transparent_and_observable() {
        let engine = engine_with(&[("U1", "A"), ("U1", "B"), ("U2", "A"), ("U2", "C")]);

        let cold = engine.recommend("U1", 5).unwrap();
        let cold_stats = engine.cache_stats();
        let warm = engine.recommend("U1", 5).unwrap();
        let warm_stats = engine.cache_stats();

        assert_eq!(cold, warm);
        assert!(warm_stats.hits > cold_stats.hits);
        assert_eq!(warm_stats.misses, cold_stats.misses);
    }

    #[test]
    fn test_insertion_invalidates_cached_similarity() {
        let graph = Arc::new(InteractionGraph::new());
        graph.add_interaction("U1", "A").unwrap();
        graph.add_interaction("U1", "B").unwrap();
        let engine = RecommendationEngine::new(Arc::clone(&graph));

        let a = graph.item_handle("A").unwrap();
        let b = graph.item_handle("B").unwrap();

        // Audiences both {U1} → 1.0, now cached
        assert!((engine.compute_similarity(a, b) - 1.0).abs() < 1e-12);

        // U2 joins A's audience only; the pair must be recomputed
        graph.add_interaction("U2", "A").unwrap();
        assert!((engine.compute_similarity(a, b) - 0.5).abs() < 1e-12);
        assert_eq!(engine.cache_stats().stale_recomputes, 1);
    }

    #[test]
    fn test_recommend_within_zero_budget_degrades() {
        let engine = engine_with(&[("U1", "A"), ("U2", "A"), ("U2", "B")]);

        let partial = engine
            .recommend_within("U1", 5, Duration::ZERO)
            .unwrap();
        assert!(!partial.complete);
        assert!(partial.items.is_empty());
    }

    #[test]
    fn test_recommend_within_generous_budget_is_complete() {
        let engine = engine_with(&[("U1", "A"), ("U2", "A"), ("U2", "B")]);

        let partial = engine
            .recommend_within("U1", 5, Duration::from_secs(10))
            .unwrap();
        assert!(partial.complete);
        assert_eq!(partial.items.len(), 1);
        assert_eq!(partial.items[0].item, "B");
    }

    #[test]
    fn test_detailed_report_counts() {
        let engine = engine_with(&[("U1", "A"), ("U1", "B"), ("U2", "A"), ("U2", "C")]);

        let response = engine.recommend_detailed("U1", 5).unwrap();
        assert_eq!(response.report.history_size, 2);
        assert_eq!(response.report.candidates_considered, 1);
        assert_eq!(response.report.recommendations_returned, 1);
        assert!(response.report.complete);
        assert_eq!(response.items.len(), 1);
    }

    #[test]
    fn test_scores_accumulate_over_history() {
        // C shares users with both A and B, so its score is the sum of
        // both pairwise similarities.
        let engine = engine_with(&[
            ("U1", "A"),
            ("U1", "B"),
            ("U2", "A"),
            ("U2", "C"),
            ("U3", "B"),
            ("U3", "C"),
        ]);

        let graph = engine.graph();
        let a = graph.item_handle("A").unwrap();
        let b = graph.item_handle("B").unwrap();
        let c = graph.item_handle("C").unwrap();
        let expected = engine.compute_similarity(a, c) + engine.compute_similarity(b, c);

        let recs = engine.recommend("U1", 5).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].item, "C");
        assert!((recs[0].score - expected).abs() < 1e-12);
    }
}
