use adresx_core::RecordId;
use adresx_similarity::WeightsError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GroupingError>;

#[derive(Error, Debug)]
pub enum GroupingError {
    #[error("grouping contention on {lease} after {attempts} attempts")]
    Contention { lease: String, attempts: u32 },

    #[error("record {0} is already registered")]
    DuplicateRecord(RecordId),

    #[error("threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("at least one blocking level is required")]
    NoBlockingLevels,

    #[error("invalid retry policy: {0}")]
    InvalidRetryPolicy(String),

    #[error("similarity configuration: {0}")]
    Similarity(#[from] WeightsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid grouping configuration: {0}")]
    Json(#[from] serde_json::Error),
}
