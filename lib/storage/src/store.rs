//! Record store
//!
//! [`RecordStore`] is the seam to whatever relational store the embedding
//! application runs. [`MemoryRecordStore`] keeps everything behind one
//! lock, so a record or a regrouping becomes visible all at once or not at
//! all.

use crate::error::{Result, StorageError};
use crate::rows::{AddressRow, DuplicateGroupRow, DuplicateRelationshipRow};
use crate::snapshot::StoreSnapshot;
use adresx_core::{AddressRecord, RecordId};
use adresx_grouping::GroupingOutcome;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::debug;

pub trait RecordStore: Send + Sync {
    /// Insert or replace a record. A replaced record keeps its `created_at`.
    fn put_address(&self, record: &AddressRecord) -> Result<AddressRow>;

    fn get_address(&self, id: RecordId) -> Result<Option<AddressRow>>;

    fn addresses(&self) -> Result<Vec<AddressRow>>;

    /// Replace every group and relationship with the given outcome
    fn replace_groups(&self, outcome: &GroupingOutcome) -> Result<()>;

    fn groups(&self) -> Result<Vec<DuplicateGroupRow>>;

    fn relationships(&self) -> Result<Vec<DuplicateRelationshipRow>>;
}

#[derive(Debug, Default)]
struct StoreState {
    addresses: BTreeMap<RecordId, AddressRow>,
    groups: BTreeMap<String, DuplicateGroupRow>,
    relationships: Vec<DuplicateRelationshipRow>,
}

#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    state: RwLock<StoreState>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state.read().addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored record, converted back from its row
    pub fn record(&self, id: RecordId) -> Result<AddressRecord> {
        self.state
            .read()
            .addresses
            .get(&id)
            .map(AddressRow::to_record)
            .ok_or(StorageError::NotFound(id))
    }

    pub fn to_snapshot(&self) -> StoreSnapshot {
        let state = self.state.read();
        StoreSnapshot {
            created_at: Utc::now(),
            addresses: state.addresses.values().cloned().collect(),
            groups: state.groups.values().cloned().collect(),
            relationships: state.relationships.clone(),
        }
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let state = StoreState {
            addresses: snapshot.addresses.into_iter().map(|row| (row.id, row)).collect(),
            groups: snapshot
                .groups
                .into_iter()
                .map(|row| (row.hash.clone(), row))
                .collect(),
            relationships: snapshot.relationships,
        };
        Self {
            state: RwLock::new(state),
        }
    }

    fn group_rows(
        outcome: &GroupingOutcome,
        existing: &BTreeMap<String, DuplicateGroupRow>,
        now: DateTime<Utc>,
    ) -> Result<BTreeMap<String, DuplicateGroupRow>> {
        let mut rows = BTreeMap::new();
        for group in &outcome.groups {
            let mut row = DuplicateGroupRow::from_group(group, now)?;
            if let Some(previous) = existing.get(&row.hash) {
                row.created_at = previous.created_at;
            }
            rows.insert(row.hash.clone(), row);
        }
        Ok(rows)
    }
}

impl RecordStore for MemoryRecordStore {
    fn put_address(&self, record: &AddressRecord) -> Result<AddressRow> {
        let mut row = AddressRow::from_record(record, Utc::now());
        let mut state = self.state.write();
        if let Some(previous) = state.addresses.get(&record.id) {
            row.created_at = previous.created_at;
        }
        state.addresses.insert(record.id, row.clone());
        debug!(record = %record.id, "address committed");
        Ok(row)
    }

    fn get_address(&self, id: RecordId) -> Result<Option<AddressRow>> {
        Ok(self.state.read().addresses.get(&id).cloned())
    }

    fn addresses(&self) -> Result<Vec<AddressRow>> {
        Ok(self.state.read().addresses.values().cloned().collect())
    }

    fn replace_groups(&self, outcome: &GroupingOutcome) -> Result<()> {
        let now = Utc::now();
        let relationships: Vec<DuplicateRelationshipRow> = outcome
            .relationships
            .iter()
            .map(|rel| DuplicateRelationshipRow::from_relationship(rel, now))
            .collect();

        let mut state = self.state.write();
        // build everything before touching the state
        let groups = Self::group_rows(outcome, &state.groups, now)?;
        state.groups = groups;
        state.relationships = relationships;
        debug!(groups = state.groups.len(), "duplicate groups committed");
        Ok(())
    }

    fn groups(&self) -> Result<Vec<DuplicateGroupRow>> {
        Ok(self.state.read().groups.values().cloned().collect())
    }

    fn relationships(&self) -> Result<Vec<DuplicateRelationshipRow>> {
        Ok(self.state.read().relationships.clone())
    }
}
