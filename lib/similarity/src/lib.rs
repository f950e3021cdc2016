//! # adresX Similarity
//!
//! Multi-factor, explainable similarity between address records.
//!
//! ## Factors
//!
//! - **Textual**: normalized Levenshtein and token Jaccard over corrected text
//! - **Hierarchical**: per-level agreement, finer levels weigh more
//! - **Geographic**: haversine distance with a linear near/far band
//! - **Semantic**: overlap of landmark names
//!
//! ## Example
//!
//! ```rust
//! use adresx_similarity::{SimilarityConfig, SimilarityEngine, SimilarityWeights};
//!
//! let config = SimilarityConfig {
//!     weights: SimilarityWeights {
//!         textual: 3.0,
//!         hierarchical: 3.0,
//!         geographic: 2.5,
//!         semantic: 1.5,
//!     },
//!     ..SimilarityConfig::default()
//! };
//!
//! // weights are normalized to sum to 1.0
//! let engine = SimilarityEngine::new(config).unwrap();
//! assert!((engine.config().weights.textual - 0.3).abs() < 1e-9);
//! ```

pub mod distance;
pub mod engine;
pub mod explain;
pub mod weights;

pub use distance::{
    geographic_similarity, hierarchical_similarity, semantic_similarity, textual_similarity,
};
pub use engine::SimilarityEngine;
pub use explain::{RankedMatch, SimilarityBreakdown};
pub use weights::{SimilarityConfig, SimilarityWeights, WeightsError};
