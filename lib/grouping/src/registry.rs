//! Incremental duplicate registry
//!
//! Records are added one at a time and merged into existing groups. An
//! insert scores the new record against its blocking candidates, then takes
//! leases on its blocks and on every group it is about to rewrite before
//! committing under the write lock. A busy lease is retried with
//! exponential backoff and reported as [`GroupingError::Contention`] once
//! the retry policy is exhausted. [`DuplicateRegistry::rebuild`] regroups
//! everything under the registry-wide write lock.

use crate::candidates::BlockingIndex;
use crate::config::GroupingConfig;
use crate::error::{GroupingError, Result};
use crate::grouper::{
    DuplicateGroup, DuplicateGrouper, DuplicateRelationship, GroupingOutcome, GroupingStats,
};
use crate::lease::{GroupLeases, LeaseKey};
use adresx_core::{AddressRecord, ComponentKind, RecordId};
use ahash::AHashMap;
use parking_lot::RwLock;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
struct GroupEntry {
    group: DuplicateGroup,
    relationships: Vec<DuplicateRelationship>,
}

#[derive(Debug)]
struct RegistryState {
    /// Bumped by every rebuild
    generation: u64,
    records: Vec<AddressRecord>,
    positions: AHashMap<RecordId, usize>,
    index: BlockingIndex,
    /// Group key (lowest member id) of every grouped record
    group_of: AHashMap<RecordId, RecordId>,
    groups: BTreeMap<RecordId, GroupEntry>,
    pairs_compared: usize,
}

impl RegistryState {
    fn new(config: &GroupingConfig) -> Self {
        Self {
            generation: 0,
            records: Vec::new(),
            positions: AHashMap::new(),
            index: BlockingIndex::new(&config.blocking_levels),
            group_of: AHashMap::new(),
            groups: BTreeMap::new(),
            pairs_compared: 0,
        }
    }

    /// Group key of the record at `idx`; ungrouped records stand for
    /// themselves
    fn key_of(&self, idx: usize) -> RecordId {
        let id = self.records[idx].id;
        self.group_of.get(&id).copied().unwrap_or(id)
    }

    fn install(&mut self, group: DuplicateGroup, relationships: Vec<DuplicateRelationship>) {
        let key = group.key();
        for id in &group.members {
            self.group_of.insert(*id, key);
        }
        self.groups.insert(key, GroupEntry { group, relationships });
    }

    /// Install every group of a batch outcome, pairing each with its
    /// relationships
    fn install_outcome(&mut self, outcome: &GroupingOutcome) {
        let mut relationships: BTreeMap<&str, Vec<DuplicateRelationship>> = BTreeMap::new();
        for rel in &outcome.relationships {
            relationships
                .entry(rel.group_hash.as_str())
                .or_default()
                .push(rel.clone());
        }
        for group in &outcome.groups {
            let rels = relationships.remove(group.group_hash.as_str()).unwrap_or_default();
            self.install(group.clone(), rels);
        }
    }

    /// Recompute record positions and the blocking index after a removal
    fn reindex(&mut self, levels: &[ComponentKind]) {
        self.positions = self
            .records
            .iter()
            .enumerate()
            .map(|(idx, record)| (record.id, idx))
            .collect();
        let records: Vec<&AddressRecord> = self.records.iter().collect();
        self.index = BlockingIndex::build(levels, &records);
    }
}

/// Outcome of a single insert attempt
enum Attempt {
    Done(Option<DuplicateGroup>),
    Contended(LeaseKey),
    Stale,
}

pub struct DuplicateRegistry {
    grouper: DuplicateGrouper,
    state: RwLock<RegistryState>,
    leases: GroupLeases,
}

impl DuplicateRegistry {
    pub fn new(config: GroupingConfig) -> Result<Self> {
        Ok(Self::from_grouper(DuplicateGrouper::new(config)?))
    }

    pub fn from_grouper(grouper: DuplicateGrouper) -> Self {
        let state = RegistryState::new(grouper.config());
        Self {
            grouper,
            state: RwLock::new(state),
            leases: GroupLeases::new(),
        }
    }

    /// Registry seeded with a population, grouped in one pass
    pub fn with_records(config: GroupingConfig, records: Vec<AddressRecord>) -> Result<Self> {
        let registry = Self::new(config)?;
        {
            let mut state = registry.state.write();
            for record in records {
                if state.positions.contains_key(&record.id) {
                    return Err(GroupingError::DuplicateRecord(record.id));
                }
                let idx = state.records.len();
                state.positions.insert(record.id, idx);
                state.index.insert(idx, &record);
                state.records.push(record);
            }
        }
        registry.rebuild()?;
        Ok(registry)
    }

    pub fn grouper(&self) -> &DuplicateGrouper {
        &self.grouper
    }

    /// Block and group leases held by inserts in flight
    pub fn leases(&self) -> &GroupLeases {
        &self.leases
    }

    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn record(&self, id: RecordId) -> Option<AddressRecord> {
        let state = self.state.read();
        state.positions.get(&id).map(|&idx| state.records[idx].clone())
    }

    /// Groups ordered by lowest member id
    pub fn groups(&self) -> Vec<DuplicateGroup> {
        self.state
            .read()
            .groups
            .values()
            .map(|entry| entry.group.clone())
            .collect()
    }

    pub fn group_of(&self, id: RecordId) -> Option<DuplicateGroup> {
        let state = self.state.read();
        let key = state.group_of.get(&id)?;
        state.groups.get(key).map(|entry| entry.group.clone())
    }

    /// Current groups and relationships in the same shape as a batch pass
    pub fn outcome(&self) -> GroupingOutcome {
        let state = self.state.read();
        let groups: Vec<DuplicateGroup> =
            state.groups.values().map(|entry| entry.group.clone()).collect();
        let relationships = state
            .groups
            .values()
            .flat_map(|entry| entry.relationships.iter().cloned())
            .collect();
        let stats = GroupingStats::compute(state.records.len(), state.pairs_compared, &groups);
        GroupingOutcome {
            groups,
            relationships,
            stats,
        }
    }

    /// Add one record, merging every group it matches into one. Returns the
    /// record's group, or `None` when it matched nothing and singleton
    /// groups are off.
    pub fn add(&self, record: AddressRecord) -> Result<Option<DuplicateGroup>> {
        let retry = self.grouper.config().retry;
        let mut last_busy = String::from("registry");

        for attempt in 1..=retry.max_attempts {
            match self.try_add(&record)? {
                Attempt::Done(group) => return Ok(group),
                Attempt::Contended(key) => {
                    debug!(record = %record.id, lease = %key, attempt, "lease busy, backing off");
                    last_busy = key.to_string();
                }
                Attempt::Stale => {
                    debug!(record = %record.id, attempt, "registry changed underneath, retrying");
                    last_busy = String::from("registry");
                }
            }
            if attempt < retry.max_attempts {
                std::thread::sleep(retry.backoff(attempt));
            }
        }

        warn!(
            record = %record.id,
            lease = %last_busy,
            attempts = retry.max_attempts,
            "giving up on duplicate registry insert"
        );
        Err(GroupingError::Contention {
            lease: last_busy,
            attempts: retry.max_attempts,
        })
    }

    fn try_add(&self, record: &AddressRecord) -> Result<Attempt> {
        let block_keys = {
            let state = self.state.read();
            if state.positions.contains_key(&record.id) {
                return Err(GroupingError::DuplicateRecord(record.id));
            }
            state.index.keys_for(record)
        };
        let _blocks = match self
            .leases
            .try_acquire(block_keys.into_iter().map(LeaseKey::Block))
        {
            Ok(guard) => guard,
            Err(busy) => return Ok(Attempt::Contended(busy)),
        };

        // With the blocks held no other insert can add candidates for us
        let (generation, matched, touched, compared) = {
            let state = self.state.read();
            let candidates = state.index.candidates_for(record);
            let matched: Vec<usize> = candidates
                .par_iter()
                .filter(|&&idx| self.grouper.matches(&state.records[idx], record).is_some())
                .copied()
                .collect();
            let touched: BTreeSet<RecordId> = matched.iter().map(|&idx| state.key_of(idx)).collect();
            (state.generation, matched, touched, candidates.len())
        };

        let _groups = match self
            .leases
            .try_acquire(touched.iter().copied().map(LeaseKey::Group))
        {
            Ok(guard) => guard,
            Err(busy) => return Ok(Attempt::Contended(busy)),
        };

        let mut state = self.state.write();
        if state.positions.contains_key(&record.id) {
            return Err(GroupingError::DuplicateRecord(record.id));
        }
        // A group we scored against may have been merged before we leased it
        let current: BTreeSet<RecordId> = matched.iter().map(|&idx| state.key_of(idx)).collect();
        if state.generation != generation || current != touched {
            return Ok(Attempt::Stale);
        }

        let idx = state.records.len();
        state.positions.insert(record.id, idx);
        state.index.insert(idx, record);
        state.records.push(record.clone());
        state.pairs_compared += compared;

        if matched.is_empty() && !self.grouper.config().include_singletons {
            debug!(record = %record.id, "no duplicates found");
            return Ok(Attempt::Done(None));
        }

        let mut member_positions: BTreeSet<usize> = matched.iter().copied().collect();
        member_positions.insert(idx);
        for key in &touched {
            if let Some(entry) = state.groups.remove(key) {
                for id in &entry.group.members {
                    if let Some(&pos) = state.positions.get(id) {
                        member_positions.insert(pos);
                    }
                }
            }
        }

        let assembled = {
            let members: Vec<&AddressRecord> =
                member_positions.iter().map(|&pos| &state.records[pos]).collect();
            self.grouper.assemble(&members)
        };
        let Some((group, relationships)) = assembled else {
            return Ok(Attempt::Done(None));
        };

        debug!(
            record = %record.id,
            group = %group.group_hash,
            members = group.member_count,
            merged = touched.len(),
            "record joined duplicate group"
        );
        state.install(group.clone(), relationships);
        Ok(Attempt::Done(Some(group)))
    }

    /// Regroup every record from scratch
    pub fn rebuild(&self) -> Result<GroupingOutcome> {
        let mut state = self.state.write();
        let outcome = self.grouper.group(&state.records)?;

        state.group_of.clear();
        state.groups.clear();
        state.install_outcome(&outcome);
        state.pairs_compared = outcome.stats.pairs_compared;
        state.generation += 1;

        info!(
            generation = state.generation,
            groups = outcome.stats.groups,
            records = outcome.stats.records,
            "duplicate registry rebuilt"
        );
        Ok(outcome)
    }

    /// Take a record back out. The rest of its group is regrouped, so a
    /// group held together only through this record splits. Returns `None`
    /// for an unknown id.
    pub fn remove(&self, id: RecordId) -> Result<Option<AddressRecord>> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        let Some(idx) = state.positions.get(&id).copied() else {
            return Ok(None);
        };

        let record = state.records.remove(idx);
        state.reindex(&self.grouper.config().blocking_levels);

        if let Some(key) = state.group_of.remove(&id) {
            if let Some(entry) = state.groups.remove(&key) {
                let rest: Vec<AddressRecord> = entry
                    .group
                    .members
                    .iter()
                    .filter(|&&member| member != id)
                    .filter_map(|member| {
                        state.group_of.remove(member);
                        state.positions.get(member).map(|&pos| state.records[pos].clone())
                    })
                    .collect();
                let outcome = self.grouper.group(&rest)?;
                state.install_outcome(&outcome);
            }
        }
        // positions moved, so inserts scored before this point must retry
        state.generation += 1;

        debug!(record = %id, generation = state.generation, "record removed from registry");
        Ok(Some(record))
    }
}
