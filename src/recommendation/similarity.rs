//! Item-item similarity and its memoization cache
//!
//! Similarity between two items is the Jaccard index of their audiences:
//! |A ∩ B| / |A ∪ B|. Scores are memoized per unordered item pair in a
//! bounded, sharded cache with least-recently-used eviction.
//!
//! Each cached entry records the audience versions of both items at
//! computation time. A lookup whose versions no longer match is treated as
//! a miss and recomputed, so an insertion touching either item invalidates
//! the pair on its next access. The shard lock is held across the compute
//! closure, which gives at-most-one computation per key when several
//! threads race on a cold pair.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, PoisonError};

use crate::graph::{ItemId, UserId};
use crate::recommendation::metrics::CacheStats;

// ============================================================================
// Jaccard index
// ============================================================================

/// Jaccard index of two audiences, in [0, 1].
///
/// Returns 0.0 when either set is empty. The union cardinality is derived
/// as |A| + |B| − |A ∩ B| rather than materialized.
pub fn jaccard(a: &HashSet<UserId>, b: &HashSet<UserId>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    // Probe the larger set with the smaller one
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let intersection = small.iter().filter(|u| large.contains(u)).count();
    let union = a.len() + b.len() - intersection;

    intersection as f64 / union as f64
}

// ============================================================================
// Cache key
// ============================================================================

/// Canonically ordered (min, max) item pair, so both argument orders hit
/// the same cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct PairKey {
    lo: ItemId,
    hi: ItemId,
}

impl PairKey {
    pub(crate) fn new(a: ItemId, b: ItemId) -> Self {
        if a <= b {
            Self { lo: a, hi: b }
        } else {
            Self { lo: b, hi: a }
        }
    }

    pub(crate) fn lo(&self) -> ItemId {
        self.lo
    }

    pub(crate) fn hi(&self) -> ItemId {
        self.hi
    }
}

// ============================================================================
// Sharded LRU cache
// ============================================================================

#[derive(Debug)]
struct CacheEntry {
    score: f64,
    version_lo: u64,
    version_hi: u64,
    /// Access tick for LRU ordering
    tick: u64,
}

#[derive(Debug, Default)]
struct Shard {
    entries: HashMap<PairKey, CacheEntry>,
    tick: u64,
}

/// Bounded memoization cache for pairwise similarity scores
#[derive(Debug)]
pub(crate) struct SimilarityCache {
    shards: Vec<Mutex<Shard>>,
    per_shard_capacity: usize,
    stats: CacheStats,
}

impl SimilarityCache {
    /// `capacity` is the total entry budget, split evenly across `shards`
    pub(crate) fn new(capacity: usize, shards: usize) -> Self {
        let shards = shards.max(1);
        let per_shard_capacity = (capacity / shards).max(1);
        Self {
            shards: (0..shards).map(|_| Mutex::new(Shard::default())).collect(),
            per_shard_capacity,
            stats: CacheStats::default(),
        }
    }

    pub(crate) fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Total number of cached entries across all shards
    pub(crate) fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| {
                s.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .entries
                    .len()
            })
            .sum()
    }

    /// Return the cached score for `key` if its recorded audience versions
    /// still match, otherwise invoke `compute` and cache the result.
    ///
    /// The shard lock is held while `compute` runs; the closure must not
    /// take any lock ordered before the cache (in this crate it only reads
    /// an already-held graph view).
    pub(crate) fn get_or_compute<F>(
        &self,
        key: PairKey,
        version_lo: u64,
        version_hi: u64,
        compute: F,
    ) -> f64
    where
        F: FnOnce() -> f64,
    {
        let mut shard = self.shard_for(key).lock().unwrap_or_else(PoisonError::into_inner);
        shard.tick += 1;
        let tick = shard.tick;

        match shard.entries.get_mut(&key) {
            Some(entry) if entry.version_lo == version_lo && entry.version_hi == version_hi => {
                entry.tick = tick;
                self.stats.record_hit();
                return entry.score;
            }
            Some(_) => self.stats.record_stale_recompute(),
            None => self.stats.record_miss(),
        }

        let score = compute();

        if shard.entries.len() >= self.per_shard_capacity && !shard.entries.contains_key(&key) {
            let oldest = shard
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.tick)
                .map(|(key, _)| *key);
            if let Some(oldest) = oldest {
                shard.entries.remove(&oldest);
                self.stats.record_eviction();
            }
        }

        shard.entries.insert(
            key,
            CacheEntry {
                score,
                version_lo,
                version_hi,
                tick,
            },
        );

        score
    }

    fn shard_for(&self, key: PairKey) -> &Mutex<Shard> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[hasher.finish() as usize % self.shards.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users(ids: &[u32]) -> HashSet<UserId> {
        ids.iter().map(|&id| UserId(id)).collect()
    }

    fn items(a: u32, b: u32) -> PairKey {
        PairKey::new(ItemId(a), ItemId(b))
    }

    #[test]
    fn test_jaccard_identical_sets() {
        let a = users(&[1, 2, 3]);
        assert!((jaccard(&a, &a) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_jaccard_disjoint_sets() {
        let a = users(&[1, 2]);
        let b = users(&[3, 4]);
        assert_eq!(jaccard(&a, &b), 0.0);
    }

    #[test]
    fn test_jaccard_partial_overlap() {
        let a = users(&[1, 2, 3, 4]);
        let b = users(&[3, 4, 5, 6]);
        // Intersection {3, 4}, union {1..6}
        assert!((jaccard(&a, &b) - 2.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_jaccard_empty_side() {
        let a = users(&[1]);
        let empty = users(&[]);
        assert_eq!(jaccard(&a, &empty), 0.0);
        assert_eq!(jaccard(&empty, &a), 0.0);
        assert_eq!(jaccard(&empty, &empty), 0.0);
    }

    #[test]
    fn test_jaccard_symmetric() {
        let a = users(&[1, 2, 7]);
        let b = users(&[2, 9]);
        assert_eq!(jaccard(&a, &b), jaccard(&b, &a));
    }

    #[test]
    fn test_pair_key_canonical_order() {
        assert_eq!(items(3, 7), items(7, 3));
        assert_eq!(items(5, 5).lo(), items(5, 5).hi());
    }

    #[test]
    fn test_cache_hit_skips_recompute() {
        let cache = SimilarityCache::new(100, 4);
        let key = items(0, 1);

        let first = cache.get_or_compute(key, 1, 1, || 0.5);
        let second = cache.get_or_compute(key, 1, 1, || panic!("must not recompute"));
        assert_eq!(first, 0.5);
        assert_eq!(second, 0.5);

        let snap = cache.stats().snapshot();
        assert_eq!(snap.misses, 1);
        assert_eq!(snap.hits, 1);
    }

    #[test]
    fn test_version_mismatch_recomputes() {
        let cache = SimilarityCache::new(100, 4);
        let key = items(0, 1);

        cache.get_or_compute(key, 1, 1, || 0.25);
        let updated = cache.get_or_compute(key, 2, 1, || 0.75);
        assert_eq!(updated, 0.75);

        let snap = cache.stats().snapshot();
        assert_eq!(snap.misses, 1);
        assert_eq!(snap.stale_recomputes, 1);

        // The refreshed entry is served from cache again
        assert_eq!(cache.get_or_compute(key, 2, 1, || panic!("cached")), 0.75);
    }

    #[test]
    fn test_lru_eviction_at_capacity() {
        // Single shard with room for 2 entries
        let cache = SimilarityCache::new(2, 1);

        cache.get_or_compute(items(0, 1), 1, 1, || 0.1);
        cache.get_or_compute(items(0, 2), 1, 1, || 0.2);
        // Touch (0,1) so (0,2) becomes least recently used
        cache.get_or_compute(items(0, 1), 1, 1, || panic!("cached"));

        cache.get_or_compute(items(0, 3), 1, 1, || 0.3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().snapshot().evictions, 1);

        // (0,1) survived, (0,2) was evicted
        cache.get_or_compute(items(0, 1), 1, 1, || panic!("cached"));
        let recomputed = cache.get_or_compute(items(0, 2), 1, 1, || 0.9);
        assert_eq!(recomputed, 0.9);
    }
}
