//! Hierarchy validation
//!
//! Checks parsed administrative components against the hierarchy, bottom-up.
//! The finest named level picks candidate nodes, the coarser named levels
//! vote on them through the parent chain, and whatever the surviving
//! candidates agree on is either confirmed or filled in.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::hierarchy::{HierarchyLevel, HierarchySnapshot, NodeIdx, NodeList};
use crate::parser::{MatchSource, ParsedAddress};
use crate::record::Degradation;
use crate::text::fold_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Named and consistent with the resolved chain
    Exact,
    /// Not named, filled in from the resolved chain
    Inferred,
    /// Named but unknown, or contradicted by the resolved chain
    Conflicting,
    Absent,
}

impl MatchStatus {
    pub fn weight(self) -> f64 {
        match self {
            MatchStatus::Exact => 1.0,
            MatchStatus::Inferred => 0.7,
            MatchStatus::Conflicting | MatchStatus::Absent => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyConflict {
    pub level: HierarchyLevel,
    pub found: String,
    /// What the resolved chain has at this level, if it has exactly one answer
    pub expected: Option<String>,
}

impl From<&HierarchyConflict> for Degradation {
    fn from(conflict: &HierarchyConflict) -> Self {
        Degradation::HierarchyConflict {
            level: conflict.level,
            found: conflict.found.clone(),
            expected: conflict.expected.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyVerdict {
    pub statuses: BTreeMap<HierarchyLevel, MatchStatus>,
    /// Most specific node the components resolve to
    pub resolved: Option<NodeIdx>,
    pub conflicts: Vec<HierarchyConflict>,
    /// More than one node fits the finest named level equally well
    pub ambiguous: bool,
}

impl HierarchyVerdict {
    pub fn status(&self, level: HierarchyLevel) -> MatchStatus {
        self.statuses.get(&level).copied().unwrap_or(MatchStatus::Absent)
    }

    pub fn has_conflict(&self) -> bool {
        self.statuses.values().any(|s| *s == MatchStatus::Conflicting)
    }

    /// Mean level weight. An absent neighborhood is left out; an absent
    /// province or district counts as zero.
    pub fn score(&self) -> f64 {
        let weights: Vec<f64> = HierarchyLevel::ALL
            .iter()
            .filter_map(|&level| match self.status(level) {
                MatchStatus::Absent if !level.is_required() => None,
                status => Some(status.weight()),
            })
            .collect();
        if weights.is_empty() {
            0.0
        } else {
            weights.iter().sum::<f64>() / weights.len() as f64
        }
    }
}

fn names_match(hierarchy: &HierarchySnapshot, node: NodeIdx, value: &str) -> bool {
    fold_key(&hierarchy.node(node).name) == fold_key(value)
}

/// Validate administrative components in place. Present values that check
/// out are replaced with canonical names and missing ancestors are filled in
/// with [`MatchSource::Inferred`].
///
/// A named level the hierarchy does not know is `Conflicting`, which makes
/// the record invalid. Such a name has no parent chain to check the coarser
/// levels against, so it cannot be told apart from a misplaced one.
/// `NeedsReview` is left for records whose named levels all resolve.
pub fn validate(parsed: &mut ParsedAddress, hierarchy: &HierarchySnapshot) -> HierarchyVerdict {
    let mut verdict = HierarchyVerdict {
        statuses: BTreeMap::new(),
        resolved: None,
        conflicts: Vec::new(),
        ambiguous: false,
    };

    let value_at = |parsed: &ParsedAddress, level: HierarchyLevel| {
        parsed.components.get(level.component_kind()).map(str::to_string)
    };

    // Finest level first; an unknown name is recorded as a conflict and the
    // next level up becomes the anchor candidate
    let mut anchor: Option<(HierarchyLevel, NodeList)> = None;
    for &level in HierarchyLevel::ALL.iter().rev() {
        let Some(value) = value_at(parsed, level) else {
            continue;
        };
        let candidates = hierarchy.find_by_name_at(&value, level);
        if candidates.is_empty() {
            verdict.statuses.insert(level, MatchStatus::Conflicting);
            verdict.conflicts.push(HierarchyConflict { level, found: value, expected: None });
            continue;
        }
        anchor = Some((level, candidates));
        break;
    }

    let Some((anchor_level, candidates)) = anchor else {
        for level in HierarchyLevel::ALL {
            verdict.statuses.entry(level).or_insert(MatchStatus::Absent);
        }
        return verdict;
    };

    let coarser: Vec<HierarchyLevel> = HierarchyLevel::ALL
        .iter()
        .copied()
        .filter(|&l| l < anchor_level)
        .collect();

    let mismatches = |node: NodeIdx| {
        coarser
            .iter()
            .filter(|&&level| match value_at(parsed, level) {
                Some(value) => !hierarchy
                    .ancestor_at(node, level)
                    .is_some_and(|a| names_match(hierarchy, a, &value)),
                None => false,
            })
            .count()
    };
    let fewest = candidates.iter().map(|&c| mismatches(c)).min().unwrap_or(0);
    let winners: Vec<NodeIdx> = candidates
        .iter()
        .copied()
        .filter(|&c| mismatches(c) == fewest)
        .collect();
    verdict.ambiguous = winners.len() > 1;

    // Anchor level: all winners share the name
    let anchor_kind = anchor_level.component_kind();
    let anchor_source = parsed.source(anchor_kind).unwrap_or(MatchSource::HierarchyLookup);
    parsed.set(anchor_kind, hierarchy.node(winners[0]).name.clone(), anchor_source);
    verdict.statuses.insert(anchor_level, MatchStatus::Exact);

    for level in coarser {
        let ancestors: Vec<Option<NodeIdx>> =
            winners.iter().map(|&w| hierarchy.ancestor_at(w, level)).collect();
        let shared = match ancestors.split_first() {
            Some((first, rest)) if first.is_some() && rest.iter().all(|a| a == first) => *first,
            _ => None,
        };
        let kind = level.component_kind();

        match value_at(parsed, level) {
            Some(value) => {
                let agrees = ancestors
                    .iter()
                    .all(|a| a.is_some_and(|a| names_match(hierarchy, a, &value)));
                if agrees {
                    if let Some(node) = shared.or(ancestors[0]) {
                        let source = parsed.source(kind).unwrap_or(MatchSource::HierarchyLookup);
                        parsed.set(kind, hierarchy.node(node).name.clone(), source);
                    }
                    verdict.statuses.insert(level, MatchStatus::Exact);
                } else {
                    verdict.statuses.insert(level, MatchStatus::Conflicting);
                    verdict.conflicts.push(HierarchyConflict {
                        level,
                        found: value,
                        expected: shared.map(|n| hierarchy.node(n).name.clone()),
                    });
                }
            }
            None => match shared {
                Some(node) => {
                    parsed.set(kind, hierarchy.node(node).name.clone(), MatchSource::Inferred);
                    verdict.statuses.insert(level, MatchStatus::Inferred);
                }
                None => {
                    verdict.statuses.insert(level, MatchStatus::Absent);
                }
            },
        }
    }

    for level in HierarchyLevel::ALL {
        verdict.statuses.entry(level).or_insert(MatchStatus::Absent);
    }

    verdict.resolved = if winners.len() == 1 {
        Some(winners[0])
    } else {
        hierarchy.common_ancestor(&winners)
    };

    if !verdict.conflicts.is_empty() {
        tracing::debug!(conflicts = verdict.conflicts.len(), "hierarchy conflicts found");
    }
    verdict
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::HierarchyLevel::*;
    use crate::parser::parse;
    use crate::record::ComponentKind;
    use crate::test_support::{entry, sample_snapshot};

    fn run(text: &str) -> (ParsedAddress, HierarchyVerdict) {
        let snapshot = sample_snapshot();
        let mut parsed = parse(text, &snapshot);
        let verdict = validate(&mut parsed, &snapshot);
        (parsed, verdict)
    }

    #[test]
    fn test_consistent_chain_is_exact() {
        let (parsed, verdict) = run("istanbul kadıköy moda mahallesi caferağa sokak 10");
        assert_eq!(verdict.status(Province), MatchStatus::Exact);
        assert_eq!(verdict.status(District), MatchStatus::Exact);
        assert_eq!(verdict.status(Neighborhood), MatchStatus::Exact);
        assert!(!verdict.has_conflict());
        assert_eq!(verdict.score(), 1.0);
        let snapshot = sample_snapshot();
        assert_eq!(verdict.resolved, snapshot.get_by_code("34.01.01"));
        assert_eq!(parsed.components.get(ComponentKind::Neighborhood), Some("Moda"));
    }

    #[test]
    fn test_wrong_province_conflicts() {
        let (_, verdict) = run("istanbul çankaya kızılay mahallesi");
        assert_eq!(verdict.status(Province), MatchStatus::Conflicting);
        assert_eq!(verdict.status(District), MatchStatus::Exact);
        assert_eq!(verdict.status(Neighborhood), MatchStatus::Exact);
        assert!(verdict.has_conflict());
        assert_eq!(verdict.conflicts.len(), 1);
        assert_eq!(verdict.conflicts[0].found, "İstanbul");
        assert_eq!(verdict.conflicts[0].expected.as_deref(), Some("Ankara"));
    }

    #[test]
    fn test_missing_ancestors_are_inferred() {
        let (parsed, verdict) = run("soğanlı mahallesi");
        assert_eq!(verdict.status(Province), MatchStatus::Inferred);
        assert_eq!(verdict.status(District), MatchStatus::Inferred);
        assert_eq!(parsed.components.get(ComponentKind::Province), Some("Bursa"));
        assert_eq!(parsed.components.get(ComponentKind::District), Some("Osmangazi"));
        assert_eq!(parsed.source(ComponentKind::District), Some(MatchSource::Inferred));
        assert!((verdict.score() - (0.7 + 0.7 + 1.0) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_neighborhood_falls_back_to_district() {
        let (_, verdict) = run("kadıköy yeldeğirmeni mahallesi");
        assert_eq!(verdict.status(Neighborhood), MatchStatus::Conflicting);
        assert_eq!(verdict.status(District), MatchStatus::Exact);
        assert_eq!(verdict.status(Province), MatchStatus::Inferred);
        let snapshot = sample_snapshot();
        assert_eq!(verdict.resolved, snapshot.get_by_code("34.01"));
        assert!(verdict.has_conflict());
        assert!(verdict.conflicts.iter().any(|c| c.level == Neighborhood && c.expected.is_none()));
    }

    #[test]
    fn test_nothing_administrative() {
        let (_, verdict) = run("bağdat caddesi no 5");
        assert_eq!(verdict.resolved, None);
        assert_eq!(verdict.status(Province), MatchStatus::Absent);
        assert_eq!(verdict.score(), 0.0);
    }

    #[test]
    fn test_absent_neighborhood_is_neutral() {
        let (_, verdict) = run("istanbul kadıköy");
        assert_eq!(verdict.status(Neighborhood), MatchStatus::Absent);
        assert_eq!(verdict.score(), 1.0);
    }

    #[test]
    fn test_ambiguous_name_keeps_common_ancestor() {
        let snapshot = HierarchySnapshot::build(
            "dup",
            vec![
                entry("07", "Antalya", Province, None),
                entry("07.01", "Muratpaşa", District, Some("07")),
                entry("07.02", "Konyaaltı", District, Some("07")),
                entry("07.01.01", "Güzeloba", Neighborhood, Some("07.01")),
                entry("07.02.01", "Güzeloba", Neighborhood, Some("07.02")),
            ],
        )
        .unwrap();
        let mut parsed = parse("antalya güzeloba mahallesi", &snapshot);
        let verdict = validate(&mut parsed, &snapshot);

        assert!(verdict.ambiguous);
        assert_eq!(verdict.status(District), MatchStatus::Absent);
        assert_eq!(verdict.status(Province), MatchStatus::Exact);
        assert_eq!(verdict.resolved, snapshot.get_by_code("07"));
        assert!(!parsed.components.contains(ComponentKind::District));
    }

    #[test]
    fn test_district_narrows_ambiguous_neighborhood() {
        let snapshot = HierarchySnapshot::build(
            "dup",
            vec![
                entry("07", "Antalya", Province, None),
                entry("07.01", "Muratpaşa", District, Some("07")),
                entry("07.02", "Konyaaltı", District, Some("07")),
                entry("07.01.01", "Güzeloba", Neighborhood, Some("07.01")),
                entry("07.02.01", "Güzeloba", Neighborhood, Some("07.02")),
            ],
        )
        .unwrap();
        let mut parsed = parse("muratpaşa güzeloba mahallesi", &snapshot);
        let verdict = validate(&mut parsed, &snapshot);

        assert!(!verdict.ambiguous);
        assert_eq!(verdict.resolved, snapshot.get_by_code("07.01.01"));
        assert_eq!(verdict.status(Province), MatchStatus::Inferred);
        assert_eq!(parsed.components.get(ComponentKind::Province), Some("Antalya"));
    }
}
