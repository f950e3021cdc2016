//! Per-factor similarity functions
//!
//! All functions return a similarity score in range [0.0, 1.0] where 1.0
//! means identical. A factor that cannot be evaluated scores a neutral 0.5.

use adresx_core::text::fold_key;
use adresx_core::{extract_landmarks, AddressRecord, ComponentKind, Coordinate, ParsedComponents};
use ahash::AHashSet;
use std::collections::BTreeSet;

/// Score of a factor with nothing to compare
pub const NEUTRAL: f64 = 0.5;

/// Finer levels weigh more: agreeing on a street says more than agreeing on
/// a province
pub const LEVEL_WEIGHTS: [(ComponentKind, f64); 5] = [
    (ComponentKind::Province, 1.0),
    (ComponentKind::District, 2.0),
    (ComponentKind::Neighborhood, 3.0),
    (ComponentKind::Street, 3.0),
    (ComponentKind::BuildingNumber, 2.0),
];

/// Mean of normalized Levenshtein and token Jaccard
pub fn textual_similarity(a: &str, b: &str) -> f64 {
    let edit = strsim::normalized_levenshtein(a, b);
    (edit + jaccard_tokens(a, b)) / 2.0
}

/// Jaccard index of whitespace-separated token sets
pub fn jaccard_tokens(a: &str, b: &str) -> f64 {
    let tokens_a: AHashSet<&str> = a.split_whitespace().collect();
    let tokens_b: AHashSet<&str> = b.split_whitespace().collect();
    jaccard(&tokens_a, &tokens_b).unwrap_or(1.0)
}

fn jaccard<T: Eq + std::hash::Hash>(a: &AHashSet<T>, b: &AHashSet<T>) -> Option<f64> {
    let union = a.union(b).count();
    if union == 0 {
        return None;
    }
    Some(a.intersection(b).count() as f64 / union as f64)
}

/// Weighted per-level agreement. Equal values score 1, a value on one side
/// only scores 0.5, a level missing on both sides is skipped.
pub fn hierarchical_similarity(a: &ParsedComponents, b: &ParsedComponents) -> f64 {
    let mut weighted = 0.0;
    let mut total = 0.0;
    for (kind, weight) in LEVEL_WEIGHTS {
        let score = match (a.get(kind), b.get(kind)) {
            (Some(x), Some(y)) => {
                if fold_key(x) == fold_key(y) {
                    1.0
                } else {
                    0.0
                }
            }
            (Some(_), None) | (None, Some(_)) => NEUTRAL,
            (None, None) => continue,
        };
        weighted += weight * score;
        total += weight;
    }
    if total == 0.0 {
        NEUTRAL
    } else {
        weighted / total
    }
}

/// Whether any level compared by [`hierarchical_similarity`] is present
pub fn has_level_values(components: &ParsedComponents) -> bool {
    LEVEL_WEIGHTS
        .iter()
        .any(|(kind, _)| components.contains(*kind))
}

/// Linear falloff between `near_m` and `far_m`
pub fn geographic_similarity(
    a: Option<Coordinate>,
    b: Option<Coordinate>,
    near_m: f64,
    far_m: f64,
) -> f64 {
    let (Some(a), Some(b)) = (a, b) else {
        return NEUTRAL;
    };
    let distance = a.distance_m(&b);
    if distance <= near_m {
        1.0
    } else if distance >= far_m {
        0.0
    } else {
        1.0 - (distance - near_m) / (far_m - near_m)
    }
}

/// Jaccard over landmark names; neutral unless both sides name one
pub fn semantic_similarity(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return NEUTRAL;
    }
    let a: AHashSet<&String> = a.iter().collect();
    let b: AHashSet<&String> = b.iter().collect();
    jaccard(&a, &b).unwrap_or(NEUTRAL)
}

/// Landmark phrases in the corrected text plus the poi component, folded
pub fn landmarks(record: &AddressRecord) -> BTreeSet<String> {
    let mut found: BTreeSet<String> = extract_landmarks(&record.corrected_text)
        .iter()
        .map(|l| fold_key(l))
        .collect();
    if let Some(poi) = record.components.get(ComponentKind::Poi) {
        found.insert(fold_key(poi));
    }
    found
}
