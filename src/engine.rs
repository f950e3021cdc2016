//! End-to-end address engine
//!
//! Processes submissions through the pipeline, admits each record to the
//! duplicate registry, commits it to the store, and keeps the stored groups
//! in step with the registry.
//! Grouping runs write their own processing-log entries.

use adresx_core::{
    AddressPipeline, AddressRecord, OperationType, ProcessingLogEntry, ProcessingLogSink,
    RecordId,
};
use adresx_grouping::{DuplicateGroup, DuplicateRegistry, GroupingError, GroupingOutcome};
use adresx_storage::{RecordStore, StorageError};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Pipeline(#[from] adresx_core::Error),

    #[error(transparent)]
    Grouping(#[from] GroupingError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// A processed submission and the duplicate group it joined
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub record: AddressRecord,
    pub group: Option<DuplicateGroup>,
}

pub struct AddressEngine {
    pipeline: AddressPipeline,
    registry: DuplicateRegistry,
    store: Arc<dyn RecordStore>,
    log_sink: Option<Arc<dyn ProcessingLogSink>>,
    /// Held while group rows are written
    persist: Mutex<()>,
}

impl AddressEngine {
    pub fn new(
        pipeline: AddressPipeline,
        registry: DuplicateRegistry,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            pipeline,
            registry,
            store,
            log_sink: None,
            persist: Mutex::new(()),
        }
    }

    /// Sink for grouping entries. Pipeline entries go to the pipeline's
    /// own sink.
    pub fn with_log_sink(mut self, sink: Arc<dyn ProcessingLogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    pub fn pipeline(&self) -> &AddressPipeline {
        &self.pipeline
    }

    pub fn registry(&self) -> &DuplicateRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Process, admit to the duplicate registry, then commit to the store.
    ///
    /// A record the registry refuses (an id already submitted, or lease
    /// contention after every retry) is never stored. A record the store
    /// refuses is taken back out of the registry.
    pub fn submit(&self, id: RecordId, raw: &str) -> EngineResult<Submission> {
        let record = self.pipeline.process(id, raw)?;

        let started = Instant::now();
        let result = self.registry.add(record.clone());
        let entry = ProcessingLogEntry::new(OperationType::AddToGroups, json!({ "id": id }))
            .with_duration_ms(started.elapsed().as_millis() as u64);
        let entry = match &result {
            Ok(group) => entry.with_output(json!({
                "group_hash": group.as_ref().map(|g| g.group_hash.as_str()),
                "member_count": group.as_ref().map(|g| g.member_count),
            })),
            Err(e) => entry.with_error(e),
        };
        self.log(&entry);
        let group = result?;

        if let Err(e) = self.store.put_address(&record) {
            warn!(record = %id, error = %e, "store rejected record, rolling back registry insert");
            self.registry.remove(id)?;
            return Err(e.into());
        }

        if group.is_some() {
            let _guard = self.persist.lock();
            self.store.replace_groups(&self.registry.outcome())?;
        }
        Ok(Submission { record, group })
    }

    /// Rebuild every group from scratch and store the result
    pub fn regroup(&self) -> EngineResult<GroupingOutcome> {
        let started = Instant::now();
        let result = self.registry.rebuild();
        let entry = ProcessingLogEntry::new(
            OperationType::GroupDuplicates,
            json!({ "records": self.registry.len() }),
        )
        .with_duration_ms(started.elapsed().as_millis() as u64);
        let entry = match &result {
            Ok(outcome) => entry.with_output(serde_json::to_value(&outcome.stats).unwrap_or_default()),
            Err(e) => entry.with_error(e),
        };
        self.log(&entry);

        let outcome = result?;
        let _guard = self.persist.lock();
        self.store.replace_groups(&self.registry.outcome())?;
        Ok(outcome)
    }

    fn log(&self, entry: &ProcessingLogEntry) {
        if let Some(sink) = &self.log_sink {
            if let Err(e) = sink.append(entry) {
                warn!(request_id = %entry.request_id, error = %e, "failed to write processing log entry");
            }
        }
    }
}
