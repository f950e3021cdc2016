//! Similarity engine
//!
//! Scores a pair of address records on four factors and combines them with
//! the configured weights. Each comparison comes with its breakdown.
//!
//! A factor with no data on either record (no coordinates, no hierarchy
//! levels, no landmarks) still reports its neutral score in the breakdown
//! but is left out of the overall score, and the remaining weights are
//! scaled up to cover it. Missing data on one side only stays neutral and
//! counts.

use crate::distance::{
    geographic_similarity, has_level_values, hierarchical_similarity, landmarks,
    semantic_similarity, textual_similarity, NEUTRAL,
};
use crate::explain::{RankedMatch, SimilarityBreakdown};
use crate::weights::{SimilarityConfig, SimilarityWeights, WeightsError};
use adresx_core::AddressRecord;

#[derive(Debug, Clone, Default)]
pub struct SimilarityEngine {
    config: SimilarityConfig,
}

impl SimilarityEngine {
    /// Create an engine, validating and normalizing the configuration
    pub fn new(mut config: SimilarityConfig) -> Result<Self, WeightsError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SimilarityConfig {
        &self.config
    }

    /// Same engine with different factor weights, re-normalized
    pub fn with_weights(&self, weights: SimilarityWeights) -> Result<Self, WeightsError> {
        Self::new(SimilarityConfig {
            weights,
            ..self.config
        })
    }

    /// Compare two records. The pair is put in a fixed order first, so
    /// `compare(a, b)` and `compare(b, a)` are bit-for-bit equal.
    pub fn compare(&self, a: &AddressRecord, b: &AddressRecord) -> SimilarityBreakdown {
        let (first, second) = if (a.id, &a.corrected_text) <= (b.id, &b.corrected_text) {
            (a, b)
        } else {
            (b, a)
        };

        let textual = textual_similarity(&first.corrected_text, &second.corrected_text);
        let hierarchical = hierarchical_similarity(&first.components, &second.components);
        let geographic = geographic_similarity(
            first.coordinate,
            second.coordinate,
            self.config.near_m,
            self.config.far_m,
        );
        let (first_landmarks, second_landmarks) = (landmarks(first), landmarks(second));
        let semantic = semantic_similarity(&first_landmarks, &second_landmarks);

        let w = &self.config.weights;
        let factors = [
            (w.textual, textual, true),
            (
                w.hierarchical,
                hierarchical,
                has_level_values(&first.components) || has_level_values(&second.components),
            ),
            (
                w.geographic,
                geographic,
                first.coordinate.is_some() || second.coordinate.is_some(),
            ),
            (
                w.semantic,
                semantic,
                !first_landmarks.is_empty() || !second_landmarks.is_empty(),
            ),
        ];
        let (weighted, total) = factors
            .iter()
            .filter(|(_, _, evaluable)| *evaluable)
            .fold((0.0, 0.0), |(weighted, total), (weight, score, _)| {
                (weighted + weight * score, total + weight)
            });
        let overall = if total > 0.0 { weighted / total } else { NEUTRAL };

        SimilarityBreakdown {
            overall: overall.clamp(0.0, 1.0),
            textual,
            hierarchical,
            geographic,
            semantic,
        }
    }

    /// Overall similarity only
    pub fn similarity(&self, a: &AddressRecord, b: &AddressRecord) -> f64 {
        self.compare(a, b).overall
    }

    /// Score candidates against a query record, best first. Ties keep the
    /// lower id first.
    pub fn rank(&self, query: &AddressRecord, candidates: &[AddressRecord]) -> Vec<RankedMatch> {
        let mut results: Vec<RankedMatch> = candidates
            .iter()
            .filter(|c| c.id != query.id)
            .map(|c| RankedMatch {
                id: c.id,
                breakdown: self.compare(query, c),
            })
            .collect();

        results.sort_by(|a, b| {
            b.score()
                .partial_cmp(&a.score())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adresx_core::{
        ComponentKind, Confidence, Coordinate, ParsedComponents, ProcessingMetadata, RecordId,
        ResolutionTier, ValidationStatus,
    };

    fn record(
        id: u64,
        corrected: &str,
        components: ParsedComponents,
        at: Option<Coordinate>,
    ) -> AddressRecord {
        AddressRecord {
            id: RecordId(id),
            raw_text: corrected.to_string(),
            normalized_text: corrected.to_string(),
            corrected_text: corrected.to_string(),
            components,
            coordinate: at,
            resolution_tier: if at.is_some() {
                ResolutionTier::NeighborhoodCentroid
            } else {
                ResolutionTier::Unresolved
            },
            confidence: Confidence::new(0.9),
            validation_status: ValidationStatus::Valid,
            metadata: ProcessingMetadata::new("test"),
        }
    }

    fn moda() -> ParsedComponents {
        ParsedComponents::new()
            .with(ComponentKind::Province, "İstanbul")
            .with(ComponentKind::District, "Kadıköy")
            .with(ComponentKind::Neighborhood, "Moda")
            .with(ComponentKind::Street, "Caferağa")
            .with(ComponentKind::BuildingNumber, "10")
    }

    const MODA: Coordinate = Coordinate { lat: 40.9800, lon: 29.0270 };

    #[test]
    fn test_near_duplicates_score_high() {
        let engine = SimilarityEngine::default();
        let a = record(1, "istanbul kadıköy moda mahallesi caferağa sokak 10", moda(), Some(MODA));
        let b = record(2, "istanbul kadıköy moda mahallesi caferağa sokak no 10", moda(), Some(MODA));
        let breakdown = engine.compare(&a, &b);
        assert_eq!(breakdown.hierarchical, 1.0);
        assert_eq!(breakdown.geographic, 1.0);
        assert_eq!(breakdown.semantic, 0.5);
        assert!(breakdown.overall >= 0.85, "got {}", breakdown.overall);
    }

    #[test]
    fn test_symmetric() {
        let engine = SimilarityEngine::default();
        let a = record(1, "istanbul kadıköy moda mahallesi", moda(), Some(MODA));
        let b = record(
            2,
            "ankara çankaya kızılay mahallesi",
            ParsedComponents::new().with(ComponentKind::Province, "Ankara"),
            Some(Coordinate::new(39.9208, 32.8541)),
        );
        assert_eq!(engine.compare(&a, &b), engine.compare(&b, &a));
    }

    #[test]
    fn test_reflexive_for_complete_record() {
        let engine = SimilarityEngine::default();
        let components = moda().with(ComponentKind::Poi, "Moda Parkı");
        let a = record(1, "moda parkı karşısı caferağa sokak 10", components, Some(MODA));
        let breakdown = engine.compare(&a, &a);
        assert_eq!(breakdown.semantic, 1.0);
        assert!((breakdown.overall - 1.0).abs() < 1e-12, "got {}", breakdown.overall);
    }

    #[test]
    fn test_reflexive_without_landmarks() {
        let engine = SimilarityEngine::default();
        let components = moda().with(ComponentKind::Unit, "3");
        let a = record(
            1,
            "istanbul kadıköy moda mahallesi caferağa sokak 10 daire 3",
            components,
            Some(MODA),
        );
        let breakdown = engine.compare(&a, &a);
        assert_eq!(breakdown.semantic, NEUTRAL);
        assert_eq!(breakdown.overall, 1.0);
    }

    #[test]
    fn test_factors_missing_on_both_sides_are_left_out() {
        let engine = SimilarityEngine::default();
        let text = "istanbul kadıköy moda mahallesi caferağa sokak 10";
        let a = record(1, text, moda(), None);
        let b = record(2, text, moda(), None);
        let breakdown = engine.compare(&a, &b);
        assert_eq!(breakdown.geographic, NEUTRAL);
        assert_eq!(breakdown.overall, 1.0);

        // a coordinate on one side only keeps the neutral score in play
        let located = record(2, text, moda(), Some(MODA));
        let one_sided = engine.compare(&a, &located);
        let expected = (0.30 + 0.30 + 0.25 * NEUTRAL) / 0.85;
        assert!((one_sided.overall - expected).abs() < 1e-9, "got {}", one_sided.overall);
    }

    #[test]
    fn test_with_weights_renormalizes() {
        let engine = SimilarityEngine::default()
            .with_weights(SimilarityWeights {
                textual: 1.0,
                hierarchical: 0.0,
                geographic: 0.0,
                semantic: 0.0,
            })
            .unwrap();
        let a = record(1, "moda", ParsedComponents::new(), None);
        let b = record(2, "moda", ParsedComponents::new(), None);
        assert_eq!(engine.similarity(&a, &b), 1.0);
        assert!(SimilarityEngine::default()
            .with_weights(SimilarityWeights {
                textual: 0.0,
                hierarchical: 0.0,
                geographic: 0.0,
                semantic: 0.0,
            })
            .is_err());
    }

    #[test]
    fn test_rank_sorting() {
        let engine = SimilarityEngine::default();
        let query = record(1, "istanbul kadıköy moda mahallesi caferağa sokak 10", moda(), Some(MODA));
        let candidates = vec![
            query.clone(),
            record(
                3,
                "ankara çankaya kızılay mahallesi",
                ParsedComponents::new().with(ComponentKind::Province, "Ankara"),
                Some(Coordinate::new(39.9208, 32.8541)),
            ),
            record(2, "istanbul kadıköy moda mahallesi caferağa sokak no 10", moda(), Some(MODA)),
        ];
        let ranked = engine.rank(&query, &candidates);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].id, RecordId(2));
        assert_eq!(ranked[1].id, RecordId(3));
    }
}
