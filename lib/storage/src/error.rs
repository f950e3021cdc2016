use adresx_core::RecordId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("record {0} not found")]
    NotFound(RecordId),

    #[error("group {0} has no members")]
    EmptyGroup(String),

    #[error("invalid snapshot name: {0:?}")]
    InvalidSnapshotName(String),

    #[error("snapshot checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StorageError> for adresx_core::Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Io(e) => adresx_core::Error::Io(e),
            StorageError::Serialization(e) => adresx_core::Error::Serialization(e),
            other => adresx_core::Error::Log(other.to_string()),
        }
    }
}
