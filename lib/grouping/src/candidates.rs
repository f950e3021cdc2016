//! Candidate blocking
//!
//! Only records that share an exact value at one of the blocking levels are
//! compared. Values are matched on their folded form, so `Kadıköy` and
//! `KADIKOY` land in the same block.

use adresx_core::text::fold_key;
use adresx_core::{AddressRecord, ComponentKind};
use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// One block: a level and a folded value
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockKey {
    pub kind: ComponentKind,
    pub value: String,
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.kind, self.value)
    }
}

type Members = SmallVec<[usize; 8]>;

/// Maps block keys to the positions of the records in them
#[derive(Debug, Clone)]
pub struct BlockingIndex {
    levels: Vec<ComponentKind>,
    blocks: AHashMap<BlockKey, Members>,
}

impl BlockingIndex {
    pub fn new(levels: &[ComponentKind]) -> Self {
        Self {
            levels: levels.to_vec(),
            blocks: AHashMap::new(),
        }
    }

    /// Index `records` by position
    pub fn build(levels: &[ComponentKind], records: &[&AddressRecord]) -> Self {
        let mut index = Self::new(levels);
        for (idx, record) in records.iter().enumerate() {
            index.insert(idx, record);
        }
        index
    }

    /// Block keys of a record, sorted
    pub fn keys_for(&self, record: &AddressRecord) -> Vec<BlockKey> {
        let mut keys: Vec<BlockKey> = self
            .levels
            .iter()
            .filter_map(|&kind| {
                let value = fold_key(record.components.get(kind)?);
                (!value.is_empty()).then_some(BlockKey { kind, value })
            })
            .collect();
        keys.sort();
        keys
    }

    pub fn insert(&mut self, idx: usize, record: &AddressRecord) {
        for key in self.keys_for(record) {
            let members = self.blocks.entry(key).or_default();
            if !members.contains(&idx) {
                members.push(idx);
            }
        }
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Indexed positions sharing a block with `record`, sorted
    pub fn candidates_for(&self, record: &AddressRecord) -> Vec<usize> {
        let mut found: Vec<usize> = self
            .keys_for(record)
            .iter()
            .filter_map(|key| self.blocks.get(key))
            .flat_map(|members| members.iter().copied())
            .collect();
        found.sort_unstable();
        found.dedup();
        found
    }

    /// Every unordered pair sharing at least one block, as `(low, high)`,
    /// sorted
    pub fn candidate_pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs: AHashSet<(usize, usize)> = AHashSet::new();
        for members in self.blocks.values() {
            for (i, &a) in members.iter().enumerate() {
                for &b in &members[i + 1..] {
                    pairs.insert((a.min(b), a.max(b)));
                }
            }
        }
        let mut pairs: Vec<(usize, usize)> = pairs.into_iter().collect();
        pairs.sort_unstable();
        pairs
    }
}
