//! Recommendation metrics and performance monitoring
//!
//! Counters for similarity-cache effectiveness plus a per-request report so
//! an external harness can measure cold-vs-warm behavior without reaching
//! into engine internals.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

// ============================================================================
// Cache statistics
// ============================================================================

/// Live atomic counters owned by the similarity cache
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    stale_recomputes: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStats {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stale_recompute(&self) {
        self.stale_recomputes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let stale_recomputes = self.stale_recomputes.load(Ordering::Relaxed);
        CacheStatsSnapshot {
            hits,
            misses,
            stale_recomputes,
            evictions: self.evictions.load(Ordering::Relaxed),
            hit_rate: hit_rate(hits, misses + stale_recomputes),
        }
    }
}

/// Serializable snapshot of cache effectiveness
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    /// Lookups that found an entry whose underlying audiences had changed
    /// since it was cached; counted separately from cold misses
    pub stale_recomputes: u64,
    pub evictions: u64,
    pub hit_rate: f64,
}

fn hit_rate(hits: u64, non_hits: u64) -> f64 {
    let total = hits + non_hits;
    if total == 0 {
        return 0.0;
    }
    hits as f64 / total as f64
}

// ============================================================================
// Per-request report
// ============================================================================

/// Metrics for a single recommendation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendReport {
    pub request_id: String,
    pub timestamp: i64,
    pub user: String,

    // Performance
    pub total_duration_us: u64,
    pub candidate_duration_us: u64,
    pub scoring_duration_us: u64,

    // Volume
    pub history_size: usize,
    pub candidates_considered: usize,
    pub recommendations_returned: usize,

    /// False when a scoring budget expired before all candidates were scored
    pub complete: bool,

    /// Cache counters after this request
    pub cache: CacheStatsSnapshot,
}

impl RecommendReport {
    pub(crate) fn new(user: &str) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().timestamp(),
            user: user.to_string(),
            total_duration_us: 0,
            candidate_duration_us: 0,
            scoring_duration_us: 0,
            history_size: 0,
            candidates_considered: 0,
            recommendations_returned: 0,
            complete: true,
            cache: CacheStatsSnapshot {
                hits: 0,
                misses: 0,
                stale_recomputes: 0,
                evictions: 0,
                hit_rate: 0.0,
            },
        }
    }
}

// ============================================================================
// Timing
// ============================================================================

/// Timer for tracking operation duration, logged on drop
pub struct PerformanceTimer {
    start: Instant,
    label: &'static str,
}

impl PerformanceTimer {
    pub fn new(label: &'static str) -> Self {
        Self {
            start: Instant::now(),
            label,
        }
    }

    pub fn elapsed_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    pub fn log_if_slow(&self, threshold_ms: u64) {
        let elapsed_ms = self.start.elapsed().as_millis() as u64;
        if elapsed_ms > threshold_ms {
            tracing::warn!(
                operation = self.label,
                elapsed_ms,
                threshold_ms,
                "slow operation"
            );
        }
    }
}

impl Drop for PerformanceTimer {
    fn drop(&mut self) {
        tracing::debug!(
            operation = self.label,
            elapsed_us = self.elapsed_us(),
            "operation completed"
        );
    }
}
