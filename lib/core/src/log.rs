//! Processing log
//!
//! Every pipeline or grouping run produces one [`ProcessingLogEntry`],
//! including runs that rejected their input. Sinks are append-only.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    ProcessAddress,
    ReprocessAddress,
    GroupDuplicates,
    AddToGroups,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingLogEntry {
    pub request_id: Uuid,
    pub operation: OperationType,
    pub input: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub logged_at: DateTime<Utc>,
}

impl ProcessingLogEntry {
    pub fn new(operation: OperationType, input: serde_json::Value) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            operation,
            input,
            output: None,
            duration_ms: 0,
            error: None,
            logged_at: Utc::now(),
        }
    }

    pub fn with_output(mut self, output: serde_json::Value) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_error(mut self, error: impl ToString) -> Self {
        self.error = Some(error.to_string());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Destination for processing-log entries
pub trait ProcessingLogSink: Send + Sync {
    fn append(&self, entry: &ProcessingLogEntry) -> Result<()>;
}

/// Keeps entries in memory; for tests and embedding applications that
/// forward entries elsewhere
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    entries: Mutex<Vec<ProcessingLogEntry>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ProcessingLogEntry> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl ProcessingLogSink for MemoryLogSink {
    fn append(&self, entry: &ProcessingLogEntry) -> Result<()> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}
