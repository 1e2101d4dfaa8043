//! Recommendation Module
//!
//! Item-based collaborative filtering over the interaction graph.
//!
//! ## Architecture
//!
//! 1. **Similarity** - Jaccard index of item audiences, memoized in a
//!    bounded, sharded LRU cache with version-based invalidation
//! 2. **Engine** - two-hop candidate pruning, summed-similarity scoring,
//!    deterministic top-k ranking
//! 3. **Metrics** - cache counters and per-request reports for external
//!    measurement
//!
//! ## Algorithm Overview
//!
//! For a user with history H, candidates are the items reachable in two
//! hops (item → shared users → their items), minus H itself. Each
//! candidate c is scored as Σ over m ∈ H of Jaccard(audience(m),
//! audience(c)); the k highest scores win, ties resolved by ascending
//! internal item handle.

pub mod engine;
pub mod metrics;
pub mod similarity;

// Re-export the types that are actually used externally
pub use engine::{
    PartialRecommendations, Recommendation, RecommendationEngine, RecommendationResponse,
};
pub use metrics::{CacheStatsSnapshot, RecommendReport};
pub use similarity::jaccard;
