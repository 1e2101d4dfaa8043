//! Configuration management for the ItemGraph engine
//!
//! Provides strongly-typed configuration with validation, environment variable
//! parsing, and sensible defaults. Every knob here is a performance tunable;
//! none of them change the ranking contract.
//!
//! # Example
//! ```no_run
//! use itemgraph::Config;
//! let config = Config::from_env().expect("failed to load config");
//! println!("cache capacity: {}", config.engine.similarity_cache_capacity);
//! ```

use crate::error::{Error, Result};
use std::time::Duration;
use tracing::info;

/// Default similarity cache capacity (total entries across all shards)
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Default number of cache shards
pub const DEFAULT_CACHE_SHARDS: usize = 16;

/// Default number of recommendations returned when the caller does not
/// specify a limit
pub const DEFAULT_TOP_K: usize = 5;

/// Candidate-set size above which scoring switches to the rayon pool
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 256;

/// Main application configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Recommendation engine configuration
    pub engine: EngineConfig,
}

/// Recommendation engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of cached similarity scores (LRU-evicted beyond this)
    pub similarity_cache_capacity: usize,
    /// Number of independently locked cache shards
    pub cache_shards: usize,
    /// Number of recommendations returned by `recommend_top`
    pub default_k: usize,
    /// Candidate-set size above which scoring runs on the rayon pool
    pub parallel_threshold: usize,
    /// Optional wall-clock budget applied by `recommend_top`; `recommend`
    /// itself never deadlines unless called through `recommend_within`
    pub scoring_budget: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            similarity_cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_shards: DEFAULT_CACHE_SHARDS,
            default_k: DEFAULT_TOP_K,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            scoring_budget: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Try to load .env file (ignore if not found)
        dotenvy::dotenv().ok();

        let config = Self {
            engine: EngineConfig::from_env()?,
        };

        config.validate()?;
        config.log_summary();

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.engine.similarity_cache_capacity == 0 {
            return Err(Error::InvalidConfig {
                key: "REC_CACHE_CAPACITY",
                message: "similarity cache capacity must be positive".into(),
            });
        }

        if self.engine.cache_shards == 0 {
            return Err(Error::InvalidConfig {
                key: "REC_CACHE_SHARDS",
                message: "cache shard count must be positive".into(),
            });
        }

        if self.engine.cache_shards > self.engine.similarity_cache_capacity {
            return Err(Error::InvalidConfig {
                key: "REC_CACHE_SHARDS",
                message: "shard count cannot exceed cache capacity".into(),
            });
        }

        if self.engine.default_k == 0 {
            return Err(Error::InvalidConfig {
                key: "REC_DEFAULT_K",
                message: "default recommendation count must be positive".into(),
            });
        }

        Ok(())
    }

    /// Log configuration summary
    fn log_summary(&self) {
        info!("Configuration loaded:");
        info!("  Engine:");
        info!(
            "    Similarity cache: {} entries / {} shards",
            self.engine.similarity_cache_capacity, self.engine.cache_shards
        );
        info!("    Default top-k: {}", self.engine.default_k);
        info!(
            "    Parallel scoring threshold: {} candidates",
            self.engine.parallel_threshold
        );
        if let Some(budget) = self.engine.scoring_budget {
            info!("    Scoring budget: {:?}", budget);
        }
    }
}

impl EngineConfig {
    fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            similarity_cache_capacity: get_env_or(
                "REC_CACHE_CAPACITY",
                &defaults.similarity_cache_capacity.to_string(),
            )
            .parse()
            .unwrap_or(defaults.similarity_cache_capacity),
            cache_shards: get_env_or("REC_CACHE_SHARDS", &defaults.cache_shards.to_string())
                .parse()
                .unwrap_or(defaults.cache_shards),
            default_k: get_env_or("REC_DEFAULT_K", &defaults.default_k.to_string())
                .parse()
                .unwrap_or(defaults.default_k),
            parallel_threshold: get_env_or(
                "REC_PARALLEL_THRESHOLD",
                &defaults.parallel_threshold.to_string(),
            )
            .parse()
            .unwrap_or(defaults.parallel_threshold),
            scoring_budget: {
                let ms: u64 = get_env_or("REC_SCORING_BUDGET_MS", "0").parse().unwrap_or(0);
                if ms == 0 {
                    None
                } else {
                    Some(Duration::from_millis(ms))
                }
            },
        })
    }
}

// ============================================================================
// Helper functions
// ============================================================================

/// Get environment variable with default
fn get_env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
