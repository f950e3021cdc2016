//! Batch duplicate grouping
//!
//! Blocked candidate pairs are scored in parallel, pairs at or above the
//! threshold are unioned, and every connected component becomes a
//! [`DuplicateGroup`]. The result depends only on the set of records, never
//! on their order.

use crate::candidates::BlockingIndex;
use crate::config::GroupingConfig;
use crate::error::{GroupingError, Result};
use crate::union_find::UnionFind;
use adresx_core::{AddressRecord, RecordId};
use adresx_similarity::{SimilarityBreakdown, SimilarityEngine};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// SHA-256 hex of the sorted member ids
    pub group_hash: String,
    pub representative: RecordId,
    /// Sorted ascending
    pub members: Vec<RecordId>,
    pub member_count: usize,
    pub average_confidence: f64,
}

impl DuplicateGroup {
    pub fn contains(&self, id: RecordId) -> bool {
        self.members.binary_search(&id).is_ok()
    }

    /// Lowest member id
    pub fn key(&self) -> RecordId {
        self.members.first().copied().unwrap_or(self.representative)
    }
}

/// A member linked to its group's representative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateRelationship {
    pub group_hash: String,
    pub record_id: RecordId,
    pub representative: RecordId,
    pub similarity: f64,
    pub breakdown: SimilarityBreakdown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupingStats {
    pub records: usize,
    pub pairs_compared: usize,
    pub groups: usize,
    /// Records that belong to some group
    pub grouped_records: usize,
    pub average_group_size: f64,
}

impl GroupingStats {
    pub fn compute(records: usize, pairs_compared: usize, groups: &[DuplicateGroup]) -> Self {
        let grouped_records: usize = groups.iter().map(|g| g.member_count).sum();
        let average_group_size = if groups.is_empty() {
            0.0
        } else {
            grouped_records as f64 / groups.len() as f64
        };
        Self {
            records,
            pairs_compared,
            groups: groups.len(),
            grouped_records,
            average_group_size,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupingOutcome {
    /// Ordered by lowest member id
    pub groups: Vec<DuplicateGroup>,
    /// Ordered by group, then record id
    pub relationships: Vec<DuplicateRelationship>,
    pub stats: GroupingStats,
}

/// SHA-256 hex digest of the sorted ids, so any ordering of the same
/// members hashes the same
pub fn group_hash(ids: &[RecordId]) -> String {
    let mut sorted = ids.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut hasher = Sha256::new();
    for (i, id) in sorted.iter().enumerate() {
        if i > 0 {
            hasher.update(b",");
        }
        hasher.update(id.0.to_string().as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Highest confidence, then most components, then lowest id
pub fn select_representative<'a>(members: &[&'a AddressRecord]) -> Option<&'a AddressRecord> {
    members.iter().copied().max_by(|a, b| {
        a.confidence()
            .total_cmp(&b.confidence())
            .then(a.completeness().cmp(&b.completeness()))
            .then(b.id.cmp(&a.id))
    })
}

#[derive(Debug, Clone, Default)]
pub struct DuplicateGrouper {
    config: GroupingConfig,
    engine: SimilarityEngine,
}

impl DuplicateGrouper {
    pub fn new(mut config: GroupingConfig) -> Result<Self> {
        config.validate()?;
        let engine = SimilarityEngine::new(config.similarity)?;
        Ok(Self { config, engine })
    }

    pub fn config(&self) -> &GroupingConfig {
        &self.config
    }

    pub fn engine(&self) -> &SimilarityEngine {
        &self.engine
    }

    /// Breakdown of the pair when it clears the threshold
    pub fn matches(&self, a: &AddressRecord, b: &AddressRecord) -> Option<SimilarityBreakdown> {
        let breakdown = self.engine.compare(a, b);
        (breakdown.overall >= self.config.threshold).then_some(breakdown)
    }

    /// Group a population of records. Record ids must be unique.
    pub fn group(&self, records: &[AddressRecord]) -> Result<GroupingOutcome> {
        let mut sorted: Vec<&AddressRecord> = records.iter().collect();
        sorted.sort_by_key(|r| r.id);
        if let Some(pair) = sorted.windows(2).find(|w| w[0].id == w[1].id) {
            return Err(GroupingError::DuplicateRecord(pair[0].id));
        }

        let index = BlockingIndex::build(&self.config.blocking_levels, &sorted);
        let pairs = index.candidate_pairs();
        let matched: Vec<(usize, usize)> = pairs
            .par_iter()
            .filter(|&&(a, b)| self.matches(sorted[a], sorted[b]).is_some())
            .copied()
            .collect();

        let mut sets = UnionFind::new(sorted.len());
        for &(a, b) in &matched {
            sets.union(a, b);
        }

        let assembled: Vec<(DuplicateGroup, Vec<DuplicateRelationship>)> = sets
            .sets()
            .par_iter()
            .filter(|set| set.len() >= 2 || self.config.include_singletons)
            .filter_map(|set| {
                let members: Vec<&AddressRecord> = set.iter().map(|&i| sorted[i]).collect();
                self.assemble(&members)
            })
            .collect();

        let mut outcome = GroupingOutcome::default();
        for (group, relationships) in assembled {
            outcome.groups.push(group);
            outcome.relationships.extend(relationships);
        }
        outcome.stats = GroupingStats::compute(sorted.len(), pairs.len(), &outcome.groups);

        info!(
            records = outcome.stats.records,
            pairs_compared = outcome.stats.pairs_compared,
            pairs_matched = matched.len(),
            groups = outcome.stats.groups,
            grouped_records = outcome.stats.grouped_records,
            "duplicate grouping pass complete"
        );

        Ok(outcome)
    }

    /// Build a group and its relationships from its member records
    pub(crate) fn assemble(
        &self,
        members: &[&AddressRecord],
    ) -> Option<(DuplicateGroup, Vec<DuplicateRelationship>)> {
        let representative = select_representative(members)?;

        let mut ids: Vec<RecordId> = members.iter().map(|r| r.id).collect();
        ids.sort_unstable();
        let hash = group_hash(&ids);
        let average_confidence =
            members.iter().map(|r| r.confidence()).sum::<f64>() / members.len() as f64;

        let mut relationships: Vec<DuplicateRelationship> = members
            .iter()
            .filter(|r| r.id != representative.id)
            .map(|r| {
                let breakdown = self.engine.compare(r, representative);
                DuplicateRelationship {
                    group_hash: hash.clone(),
                    record_id: r.id,
                    representative: representative.id,
                    similarity: breakdown.overall,
                    breakdown,
                }
            })
            .collect();
        relationships.sort_by_key(|r| r.record_id);

        let group = DuplicateGroup {
            group_hash: hash,
            representative: representative.id,
            member_count: ids.len(),
            members: ids,
            average_confidence,
        };
        Some((group, relationships))
    }
}
