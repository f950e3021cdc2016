//! Confidence scoring

use serde::{Deserialize, Serialize};

use crate::config::{PipelineConfig, ScoringWeights};
use crate::geo::ResolutionTier;
use crate::parser::ParsedAddress;
use crate::record::{ComponentKind, Confidence, ValidationStatus};
use crate::validator::HierarchyVerdict;

/// Score plus the inputs it was built from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceReport {
    pub score: Confidence,
    pub status: ValidationStatus,
    pub parse_completeness: f64,
    pub hierarchy_score: f64,
    pub geo_score: f64,
}

#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    weights: ScoringWeights,
    valid_threshold: f64,
    expected_kinds: Vec<ComponentKind>,
}

impl ConfidenceScorer {
    /// Takes an already validated configuration
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            weights: config.scoring,
            valid_threshold: config.valid_threshold,
            expected_kinds: config.expected_kinds.clone(),
        }
    }

    /// Mean contribution over the expected kinds; absent kinds count zero
    pub fn parse_completeness(&self, parsed: &ParsedAddress) -> f64 {
        if self.expected_kinds.is_empty() {
            return 0.0;
        }
        let total: f64 = self.expected_kinds.iter().map(|&k| parsed.contribution(k)).sum();
        total / self.expected_kinds.len() as f64
    }

    pub fn score(
        &self,
        parsed: &ParsedAddress,
        verdict: &HierarchyVerdict,
        tier: ResolutionTier,
    ) -> ConfidenceReport {
        let parse_completeness = self.parse_completeness(parsed);
        let hierarchy_score = verdict.score();
        let geo_score = tier.score();

        let score = Confidence::new(
            self.weights.parse * parse_completeness
                + self.weights.hierarchy * hierarchy_score
                + self.weights.geo * geo_score,
        );

        // A conflict decides the status on its own
        let status = if verdict.has_conflict() {
            ValidationStatus::Invalid
        } else if score.value() >= self.valid_threshold {
            ValidationStatus::Valid
        } else {
            ValidationStatus::NeedsReview
        };

        ConfidenceReport {
            score,
            status,
            parse_completeness,
            hierarchy_score,
            geo_score,
        }
    }
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}
