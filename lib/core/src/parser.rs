//! Component parser
//!
//! Walks the corrected token stream left to right. At every position each
//! pattern (hierarchy name, name + suffix, marker, bare number) proposes at
//! most one candidate per kind and the longest candidate is consumed. Tokens
//! nothing claims end up in the remainder. Parsing never fails.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::hierarchy::{HierarchyLevel, HierarchySnapshot, NameMatch, NodeIdx, NodeList};
use crate::record::{ComponentKind, ParsedComponents};
use crate::tables::{
    is_structural_token, BUILDING_MARKER, FLOOR_MARKER, LANDMARK_SUFFIXES, NEIGHBORHOOD_SUFFIX,
    STREET_SUFFIXES, UNIT_MARKER,
};
use crate::text::turkish_title_case;

/// Longest name part accepted in front of a suffix
const MAX_NAME_TOKENS: usize = 4;

/// How a component was recognized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    /// `no 10`, `kat 3`, `daire 5`
    Marker,
    /// A name followed by `mahallesi`, `sokak`, `parkı`, ...
    Suffix,
    /// A name found in the administrative hierarchy
    HierarchyLookup,
    /// A bare number taken as the building number
    Heuristic,
    /// Filled in by the validator from the parent chain
    Inferred,
}

impl MatchSource {
    /// Weight of a component recognized this way in parse completeness
    pub fn contribution(self) -> f64 {
        match self {
            MatchSource::Marker | MatchSource::Suffix => 1.0,
            MatchSource::HierarchyLookup => 0.9,
            MatchSource::Heuristic | MatchSource::Inferred => 0.7,
        }
    }
}

/// Two readings of the same span, or a second match for a filled kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseAmbiguity {
    pub position: usize,
    pub text: String,
    pub chosen: ComponentKind,
    pub rejected: ComponentKind,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedAddress {
    pub components: ParsedComponents,
    pub sources: BTreeMap<ComponentKind, MatchSource>,
    /// Unclaimed tokens, in order
    pub remainder: Vec<String>,
    pub ambiguities: Vec<ParseAmbiguity>,
}

impl ParsedAddress {
    /// Set a component together with how it was found
    pub fn set(&mut self, kind: ComponentKind, value: impl Into<String>, source: MatchSource) -> bool {
        if self.components.insert(kind, value) {
            self.sources.insert(kind, source);
            true
        } else {
            false
        }
    }

    pub fn source(&self, kind: ComponentKind) -> Option<MatchSource> {
        self.sources.get(&kind).copied()
    }

    /// Contribution of one kind to parse completeness, 0 when absent
    pub fn contribution(&self, kind: ComponentKind) -> f64 {
        self.source(kind).map_or(0.0, MatchSource::contribution)
    }

    pub fn remainder_text(&self) -> String {
        self.remainder.join(" ")
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    len: usize,
    kind: ComponentKind,
    value: String,
    source: MatchSource,
    nodes: NodeList,
    /// Flat number carried by an `n/m` building token
    unit: Option<String>,
}

fn is_number(token: &str) -> bool {
    token.chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn is_postal_code(token: &str) -> bool {
    token.len() == 5 && token.chars().all(|c| c.is_ascii_digit())
}

fn is_nameable(token: &str) -> bool {
    !is_structural_token(token) && !is_number(token)
}

fn suffix_kind(token: &str) -> Option<ComponentKind> {
    if token == NEIGHBORHOOD_SUFFIX {
        Some(ComponentKind::Neighborhood)
    } else if STREET_SUFFIXES.contains(&token) {
        Some(ComponentKind::Street)
    } else if LANDMARK_SUFFIXES.contains(&token) {
        Some(ComponentKind::Poi)
    } else {
        None
    }
}

/// `10/3` is building 10, flat 3
fn split_building(token: &str) -> (String, Option<String>) {
    match token.split_once('/') {
        Some((building, unit)) if !building.is_empty() && !unit.is_empty() => {
            (building.to_string(), Some(format!("Daire {}", unit)))
        }
        _ => (token.to_string(), None),
    }
}

/// Whether a hierarchy name at `level` is broader than a suffixed `kind`, in
/// which case a suffixed name must not swallow it
fn is_broader(level: HierarchyLevel, kind: ComponentKind) -> bool {
    match kind {
        ComponentKind::Neighborhood => level < HierarchyLevel::Neighborhood,
        _ => true,
    }
}

fn blocking_lengths<'a>(
    matches: &'a [NameMatch],
    kind: ComponentKind,
    hierarchy: &'a HierarchySnapshot,
) -> impl Iterator<Item = usize> + 'a {
    matches
        .iter()
        .filter(move |m| m.nodes.iter().any(|&n| is_broader(hierarchy.node(n).level, kind)))
        .map(|m| m.len)
}

fn hierarchy_candidates(
    matches: &[NameMatch],
    hierarchy: &HierarchySnapshot,
    out: &mut Vec<Candidate>,
) {
    for m in matches {
        for level in HierarchyLevel::ALL {
            let nodes: NodeList = m
                .nodes
                .iter()
                .copied()
                .filter(|&n| hierarchy.node(n).level == level)
                .collect();
            if let Some(&first) = nodes.first() {
                out.push(Candidate {
                    len: m.len,
                    kind: level.component_kind(),
                    value: hierarchy.node(first).name.clone(),
                    source: MatchSource::HierarchyLookup,
                    nodes,
                    unit: None,
                });
            }
        }
    }
}

fn suffix_candidate(
    tokens: &[&str],
    i: usize,
    prefixes: &[Vec<NameMatch>],
    hierarchy: &HierarchySnapshot,
) -> Option<Candidate> {
    let mut j = i;
    while j < tokens.len() && j - i < MAX_NAME_TOKENS && is_nameable(tokens[j]) {
        j += 1;
    }
    if j == i || j >= tokens.len() {
        return None;
    }
    let kind = suffix_kind(tokens[j])?;
    let name_len = j - i;

    // A broader name may open the name part only if it is the whole name
    let mut at_start = blocking_lengths(&prefixes[i], kind, hierarchy).peekable();
    if at_start.peek().is_some() && !at_start.any(|len| len == name_len) {
        return None;
    }
    if (i + 1..j).any(|p| blocking_lengths(&prefixes[p], kind, hierarchy).next().is_some()) {
        return None;
    }

    let name = tokens[i..j].join(" ");
    let value = match kind {
        ComponentKind::Poi => turkish_title_case(&format!("{} {}", name, tokens[j])),
        _ => turkish_title_case(&name),
    };
    Some(Candidate {
        len: name_len + 1,
        kind,
        value,
        source: MatchSource::Suffix,
        nodes: NodeList::new(),
        unit: None,
    })
}

fn marker_candidate(tokens: &[&str], i: usize) -> Option<Candidate> {
    let number = tokens.get(i + 1).filter(|t| is_number(t))?;
    match tokens[i] {
        BUILDING_MARKER => {
            let (building, unit) = split_building(number);
            Some(Candidate {
                len: 2,
                kind: ComponentKind::BuildingNumber,
                value: building,
                source: MatchSource::Marker,
                nodes: NodeList::new(),
                unit,
            })
        }
        FLOOR_MARKER | UNIT_MARKER => Some(Candidate {
            len: 2,
            kind: ComponentKind::Unit,
            value: turkish_title_case(&format!("{} {}", tokens[i], number)),
            source: MatchSource::Marker,
            nodes: NodeList::new(),
            unit: None,
        }),
        _ => None,
    }
}

fn number_candidate(token: &str) -> Option<Candidate> {
    if !is_number(token) || is_postal_code(token) {
        return None;
    }
    let (building, unit) = split_building(token);
    Some(Candidate {
        len: 1,
        kind: ComponentKind::BuildingNumber,
        value: building,
        source: MatchSource::Heuristic,
        nodes: NodeList::new(),
        unit,
    })
}

/// Parse corrected text into components
pub fn parse(corrected: &str, hierarchy: &HierarchySnapshot) -> ParsedAddress {
    let tokens: Vec<&str> = corrected.split_whitespace().collect();
    let prefixes: Vec<Vec<NameMatch>> = (0..tokens.len())
        .map(|i| hierarchy.lookup_prefix(&tokens[i..]))
        .collect();

    let mut parsed = ParsedAddress::default();
    let mut matched_nodes: Vec<NodeIdx> = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let mut candidates = Vec::new();
        hierarchy_candidates(&prefixes[i], hierarchy, &mut candidates);
        candidates.extend(suffix_candidate(&tokens, i, &prefixes, hierarchy));
        candidates.extend(marker_candidate(&tokens, i));
        candidates.extend(number_candidate(tokens[i]));

        let consistent = |c: &Candidate| {
            c.nodes.is_empty()
                || matched_nodes.is_empty()
                || c.nodes
                    .iter()
                    .any(|&n| matched_nodes.iter().any(|&m| hierarchy.is_related(n, m)))
        };
        let rank = |c: &Candidate| {
            (
                c.len,
                !parsed.components.contains(c.kind),
                consistent(c),
                c.kind.specificity(),
            )
        };
        let Some(best) = candidates.iter().max_by_key(|c| rank(c)).cloned() else {
            parsed.remainder.push(tokens[i].to_string());
            i += 1;
            continue;
        };

        let span = tokens[i..i + best.len].join(" ");
        let mut rejected: Vec<ComponentKind> = candidates
            .iter()
            .filter(|c| c.len == best.len && c.kind != best.kind)
            .map(|c| c.kind)
            .collect();
        rejected.sort();
        rejected.dedup();
        for kind in rejected {
            parsed.ambiguities.push(ParseAmbiguity {
                position: i,
                text: span.clone(),
                chosen: best.kind,
                rejected: kind,
            });
        }

        let accumulates_unit = best.kind == ComponentKind::Unit
            && best.source == MatchSource::Marker
            && parsed.source(ComponentKind::Unit) == Some(MatchSource::Marker);

        if accumulates_unit {
            let combined = match parsed.components.get(ComponentKind::Unit) {
                Some(existing) => format!("{} {}", existing, best.value),
                None => best.value.clone(),
            };
            parsed.set(ComponentKind::Unit, combined, MatchSource::Marker);
        } else if parsed.components.contains(best.kind) {
            parsed.ambiguities.push(ParseAmbiguity {
                position: i,
                text: span.clone(),
                chosen: best.kind,
                rejected: best.kind,
            });
            parsed
                .remainder
                .extend(tokens[i..i + best.len].iter().map(|t| t.to_string()));
        } else {
            parsed.set(best.kind, best.value.clone(), best.source);
            matched_nodes.extend(best.nodes.iter().copied());
            if let Some(unit) = best.unit {
                if !parsed.components.contains(ComponentKind::Unit) {
                    parsed.set(ComponentKind::Unit, unit, best.source);
                }
            }
        }

        i += best.len;
    }

    parsed
}

/// Landmark phrases (`<name> <landmark suffix>`) found in corrected text
pub fn extract_landmarks(corrected: &str) -> BTreeSet<String> {
    let tokens: Vec<&str> = corrected.split_whitespace().collect();
    tokens
        .windows(2)
        .filter(|w| LANDMARK_SUFFIXES.contains(&w[1]) && is_nameable(w[0]))
        .map(|w| format!("{} {}", w[0], w[1]))
        .collect()
}
