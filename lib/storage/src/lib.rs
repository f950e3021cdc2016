pub mod error;
pub mod processing_log;
pub mod rows;
pub mod snapshot;
pub mod store;

pub use error::{Result, StorageError};
pub use processing_log::JsonlProcessingLog;
pub use rows::{
    round4, AddressRow, BreakdownRow, ComponentsRow, DuplicateGroupRow, DuplicateRelationshipRow,
};
pub use snapshot::{SnapshotDescription, SnapshotManager, StoreSnapshot};
pub use store::{MemoryRecordStore, RecordStore};
