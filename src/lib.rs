//! ItemGraph library crate
//!
//! In-memory item-to-item recommendations from sparse user-item interaction
//! data. Callers feed `(user, item)` pairs into an [`InteractionGraph`] and
//! query a [`RecommendationEngine`] for the top-k items most similar to a
//! user's history.
//!
//! ```
//! use std::sync::Arc;
//! use itemgraph::{InteractionGraph, RecommendationEngine};
//!
//! let graph = Arc::new(InteractionGraph::new());
//! graph.add_interaction("U1", "A").unwrap();
//! graph.add_interaction("U1", "B").unwrap();
//! graph.add_interaction("U2", "A").unwrap();
//! graph.add_interaction("U2", "C").unwrap();
//!
//! let engine = RecommendationEngine::new(graph);
//! let recs = engine.recommend("U1", 5).unwrap();
//! assert_eq!(recs[0].item, "C");
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod recommendation;

// Re-export commonly used types
pub use config::{Config, EngineConfig};
pub use error::{Error, Result};
pub use graph::{InteractionGraph, ItemId, UserId};
pub use recommendation::{
    PartialRecommendations, Recommendation, RecommendationEngine, RecommendationResponse,
};
