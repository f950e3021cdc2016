//! Explainability for address similarity
//!
//! Every comparison keeps its four sub-scores next to the overall score so
//! a duplicate decision can be traced back to the factor that drove it.

use adresx_core::RecordId;
use serde::{Deserialize, Serialize};

/// Overall similarity plus the four factor scores, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityBreakdown {
    pub overall: f64,
    pub textual: f64,
    pub hierarchical: f64,
    pub geographic: f64,
    pub semantic: f64,
}

/// One candidate scored against a query record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedMatch {
    pub id: RecordId,
    pub breakdown: SimilarityBreakdown,
}

impl RankedMatch {
    pub fn score(&self) -> f64 {
        self.breakdown.overall
    }
}
