//! Administrative hierarchy
//!
//! Provinces, districts and neighborhoods are held in an arena: nodes live in
//! one `Vec` and refer to their parent by index. A [`HierarchySnapshot`] is
//! immutable once built; [`HierarchyStore`] hands out `Arc`s to the current
//! snapshot and replaces it wholesale on refresh, so a pipeline run keeps the
//! view it started with.

use ahash::AHashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use unicode_normalization::UnicodeNormalization;

use crate::error::HierarchyError;
use crate::record::{BoundingBox, ComponentKind, Coordinate};
use crate::tables::TextTables;
use crate::text::{ascii_fold, turkish_lowercase};

/// Index of a node inside a snapshot's arena
pub type NodeIdx = usize;

/// Candidate nodes for one name; almost always one or two
pub type NodeList = SmallVec<[NodeIdx; 4]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HierarchyLevel {
    Province,
    District,
    Neighborhood,
}

impl HierarchyLevel {
    /// Broadest to finest
    pub const ALL: [HierarchyLevel; 3] = [
        HierarchyLevel::Province,
        HierarchyLevel::District,
        HierarchyLevel::Neighborhood,
    ];

    pub fn parent_level(self) -> Option<HierarchyLevel> {
        match self {
            HierarchyLevel::Province => None,
            HierarchyLevel::District => Some(HierarchyLevel::Province),
            HierarchyLevel::Neighborhood => Some(HierarchyLevel::District),
        }
    }

    pub fn component_kind(self) -> ComponentKind {
        match self {
            HierarchyLevel::Province => ComponentKind::Province,
            HierarchyLevel::District => ComponentKind::District,
            HierarchyLevel::Neighborhood => ComponentKind::Neighborhood,
        }
    }

    /// Whether an address is expected to name this level. A missing
    /// neighborhood is common and not held against a record.
    pub fn is_required(self) -> bool {
        !matches!(self, HierarchyLevel::Neighborhood)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HierarchyLevel::Province => "province",
            HierarchyLevel::District => "district",
            HierarchyLevel::Neighborhood => "neighborhood",
        }
    }
}

impl fmt::Display for HierarchyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of an external hierarchy dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyEntry {
    pub code: String,
    pub name: String,
    pub level: HierarchyLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub centroid: Option<Coordinate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<BoundingBox>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_km2: Option<f64>,
}

/// A versioned hierarchy dataset as shipped on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyDataset {
    pub version: String,
    pub entries: Vec<HierarchyEntry>,
}

#[derive(Debug, Clone)]
pub struct HierarchyNode {
    pub code: String,
    pub name: String,
    pub level: HierarchyLevel,
    pub parent: Option<NodeIdx>,
    pub parent_code: Option<String>,
    pub centroid: Option<Coordinate>,
    pub bounds: Option<BoundingBox>,
    pub population: Option<u64>,
    pub area_km2: Option<f64>,
}

impl HierarchyNode {
    pub fn to_entry(&self) -> HierarchyEntry {
        HierarchyEntry {
            code: self.code.clone(),
            name: self.name.clone(),
            level: self.level,
            parent_code: self.parent_code.clone(),
            centroid: self.centroid,
            bounds: self.bounds,
            population: self.population,
            area_km2: self.area_km2,
        }
    }
}

/// Hierarchy nodes starting at one token position
#[derive(Debug, Clone, PartialEq)]
pub struct NameMatch {
    /// Number of tokens the name spans
    pub len: usize,
    pub nodes: NodeList,
}

/// Lookup key for a name: NFC, Turkish-lowercased, split on anything that is
/// not a letter or digit
fn name_key(name: &str) -> String {
    let composed: String = name.nfc().collect();
    turkish_lowercase(&composed)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Immutable, validated view of the administrative hierarchy
#[derive(Debug)]
pub struct HierarchySnapshot {
    version: String,
    nodes: Vec<HierarchyNode>,
    by_code: AHashMap<String, NodeIdx>,
    by_name: AHashMap<String, NodeList>,
    by_folded_name: AHashMap<String, NodeList>,
    max_name_tokens: usize,
    tables: TextTables,
}

impl HierarchySnapshot {
    /// Build and validate a snapshot. Every district must hang off a
    /// province and every neighborhood off a district.
    pub fn build(
        version: impl Into<String>,
        entries: Vec<HierarchyEntry>,
    ) -> Result<Self, HierarchyError> {
        let mut nodes = Vec::with_capacity(entries.len());
        let mut by_code = AHashMap::with_capacity(entries.len());

        for entry in entries {
            let name = entry.name.trim().to_string();
            if name.is_empty() {
                return Err(HierarchyError::EmptyName(entry.code));
            }
            match (entry.level, &entry.parent_code) {
                (HierarchyLevel::Province, Some(_)) => {
                    return Err(HierarchyError::UnexpectedParent(entry.code));
                }
                (level, None) if level != HierarchyLevel::Province => {
                    return Err(HierarchyError::MissingParent { code: entry.code, level });
                }
                _ => {}
            }
            if by_code.contains_key(&entry.code) {
                return Err(HierarchyError::DuplicateCode(entry.code));
            }

            by_code.insert(entry.code.clone(), nodes.len());
            nodes.push(HierarchyNode {
                code: entry.code,
                name,
                level: entry.level,
                parent: None,
                parent_code: entry.parent_code,
                centroid: entry.centroid,
                bounds: entry.bounds,
                population: entry.population,
                area_km2: entry.area_km2,
            });
        }

        // Parents may appear after their children in the dataset
        for idx in 0..nodes.len() {
            let Some(parent_code) = nodes[idx].parent_code.clone() else {
                continue;
            };
            let parent = *by_code.get(&parent_code).ok_or_else(|| HierarchyError::UnknownParent {
                code: nodes[idx].code.clone(),
                parent: parent_code.clone(),
            })?;
            let expected = nodes[idx].level.parent_level();
            if expected != Some(nodes[parent].level) {
                return Err(HierarchyError::LevelMismatch {
                    code: nodes[idx].code.clone(),
                    parent: parent_code,
                    expected: expected.unwrap_or(HierarchyLevel::Province),
                    found: nodes[parent].level,
                });
            }
            nodes[idx].parent = Some(parent);
        }

        let mut by_name: AHashMap<String, NodeList> = AHashMap::new();
        let mut by_folded_name: AHashMap<String, NodeList> = AHashMap::new();
        let mut max_name_tokens = 0;
        for (idx, node) in nodes.iter().enumerate() {
            let key = name_key(&node.name);
            max_name_tokens = max_name_tokens.max(key.split(' ').count());
            by_folded_name.entry(ascii_fold(&key)).or_default().push(idx);
            by_name.entry(key).or_default().push(idx);
        }

        let mut tables = TextTables::turkish();
        tables.extend_with_names(nodes.iter().map(|n| n.name.as_str()));

        Ok(Self {
            version: version.into(),
            nodes,
            by_code,
            by_name,
            by_folded_name,
            max_name_tokens,
            tables,
        })
    }

    pub fn from_dataset(dataset: HierarchyDataset) -> Result<Self, HierarchyError> {
        Self::build(dataset.version, dataset.entries)
    }

    pub fn from_json_str(json: &str) -> Result<Self, HierarchyError> {
        let dataset: HierarchyDataset = serde_json::from_str(json)?;
        Self::from_dataset(dataset)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, HierarchyError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, idx: NodeIdx) -> &HierarchyNode {
        &self.nodes[idx]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &HierarchyNode> {
        self.nodes.iter()
    }

    pub fn get_by_code(&self, code: &str) -> Option<NodeIdx> {
        self.by_code.get(code).copied()
    }

    /// Normalization tables extended with this hierarchy's names
    pub fn tables(&self) -> &TextTables {
        &self.tables
    }

    /// Nodes at `level` whose name matches, exactly first and then with
    /// diacritics folded away
    pub fn find_by_name_at(&self, name: &str, level: HierarchyLevel) -> NodeList {
        let key = name_key(name);
        let at_level = |list: &NodeList| -> NodeList {
            list.iter()
                .copied()
                .filter(|&idx| self.nodes[idx].level == level)
                .collect()
        };

        if let Some(list) = self.by_name.get(&key) {
            let found = at_level(list);
            if !found.is_empty() {
                return found;
            }
        }
        self.by_folded_name
            .get(&ascii_fold(&key))
            .map(at_level)
            .unwrap_or_default()
    }

    /// Names of any level that start at the first token, longest first
    pub fn lookup_prefix(&self, tokens: &[&str]) -> Vec<NameMatch> {
        let max = self.max_name_tokens.min(tokens.len());
        let mut matches = Vec::new();
        for len in (1..=max).rev() {
            let key = tokens[..len].join(" ");
            let nodes = match self.by_name.get(&key) {
                Some(list) => list.clone(),
                None => match self.by_folded_name.get(&ascii_fold(&key)) {
                    Some(list) => list.clone(),
                    None => continue,
                },
            };
            matches.push(NameMatch { len, nodes });
        }
        matches
    }

    /// The node itself or the ancestor sitting at `level`
    pub fn ancestor_at(&self, idx: NodeIdx, level: HierarchyLevel) -> Option<NodeIdx> {
        let mut current = Some(idx);
        while let Some(i) = current {
            let node = &self.nodes[i];
            if node.level == level {
                return Some(i);
            }
            if node.level < level {
                return None;
            }
            current = node.parent;
        }
        None
    }

    pub fn is_ancestor_or_self(&self, ancestor: NodeIdx, idx: NodeIdx) -> bool {
        self.ancestor_at(idx, self.nodes[ancestor].level) == Some(ancestor)
    }

    /// Whether one node lies on the other's parent chain
    pub fn is_related(&self, a: NodeIdx, b: NodeIdx) -> bool {
        self.is_ancestor_or_self(a, b) || self.is_ancestor_or_self(b, a)
    }

    /// Nearest node on the parent chain, starting at `idx`, that satisfies `f`
    pub fn find_up(&self, idx: NodeIdx, f: impl Fn(&HierarchyNode) -> bool) -> Option<NodeIdx> {
        let mut current = Some(idx);
        while let Some(i) = current {
            if f(&self.nodes[i]) {
                return Some(i);
            }
            current = self.nodes[i].parent;
        }
        None
    }

    /// Deepest node that is an ancestor (or self) of every node in `nodes`
    pub fn common_ancestor(&self, nodes: &[NodeIdx]) -> Option<NodeIdx> {
        let (&first, rest) = nodes.split_first()?;
        let mut current = Some(first);
        while let Some(candidate) = current {
            if rest.iter().all(|&n| self.is_ancestor_or_self(candidate, n)) {
                return Some(candidate);
            }
            current = self.nodes[candidate].parent;
        }
        None
    }
}

/// Holder of the current hierarchy snapshot
pub struct HierarchyStore {
    current: RwLock<Arc<HierarchySnapshot>>,
}

impl HierarchyStore {
    pub fn new(snapshot: HierarchySnapshot) -> Self {
        tracing::info!(
            version = snapshot.version(),
            nodes = snapshot.len(),
            "hierarchy snapshot loaded"
        );
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// The snapshot to use for one unit of work
    pub fn snapshot(&self) -> Arc<HierarchySnapshot> {
        self.current.read().clone()
    }

    pub fn version(&self) -> String {
        self.current.read().version().to_string()
    }

    /// Replace the current snapshot, returning the previous one. Runs that
    /// already hold the old snapshot finish against it.
    pub fn swap(&self, snapshot: HierarchySnapshot) -> Arc<HierarchySnapshot> {
        let next = Arc::new(snapshot);
        let previous = std::mem::replace(&mut *self.current.write(), next.clone());
        tracing::info!(
            from = previous.version(),
            to = next.version(),
            nodes = next.len(),
            "hierarchy snapshot swapped"
        );
        previous
    }
}
