use thiserror::Error;

use crate::hierarchy::HierarchyLevel;
use crate::record::ComponentKind;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    #[error("Hierarchy error: {0}")]
    Hierarchy(#[from] HierarchyError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Processing log error: {0}")]
    Log(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Raw text rejected before it enters the pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("address text is empty")]
    Empty,

    #[error("address text contains no letters or digits")]
    NoContent,
}

/// Problems found while building a hierarchy snapshot from an external dataset.
#[derive(Error, Debug)]
pub enum HierarchyError {
    #[error("duplicate hierarchy code: {0}")]
    DuplicateCode(String),

    #[error("hierarchy entry {0} has an empty name")]
    EmptyName(String),

    #[error("{level} entry {code} is missing its parent code")]
    MissingParent { code: String, level: HierarchyLevel },

    #[error("province entry {0} must not have a parent")]
    UnexpectedParent(String),

    #[error("entry {code} references unknown parent {parent}")]
    UnknownParent { code: String, parent: String },

    #[error("entry {code} expects a {expected} parent but {parent} is a {found}")]
    LevelMismatch {
        code: String,
        parent: String,
        expected: HierarchyLevel,
        found: HierarchyLevel,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid hierarchy dataset: {0}")]
    Json(#[from] serde_json::Error),
}

/// A configuration value outside its allowed domain.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("weight {name} must be finite and non-negative, got {value}")]
    InvalidWeight { name: &'static str, value: f64 },

    #[error("weights must not sum to zero")]
    ZeroTotalWeight,

    #[error("{name} must be within [0, 1], got {value}")]
    OutOfRange { name: &'static str, value: f64 },

    #[error("expected component kinds must not be empty")]
    NoExpectedKinds,

    #[error("duplicate expected component kind: {0}")]
    DuplicateKind(ComponentKind),

    #[error("geocoder timeout must be positive")]
    ZeroTimeout,

    #[error("{0} must be positive")]
    ZeroLimit(&'static str),
}

/// Failure of the optional external geocoder. Never fatal to a pipeline run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeocodeError {
    #[error("geocoder timed out after {0} ms")]
    Timeout(u64),

    #[error("geocoder unavailable: {0}")]
    Unavailable(String),

    #[error("geocoder busy: all {workers} workers occupied and {queued} calls queued")]
    Busy { workers: usize, queued: usize },

    #[error("geocoder returned an invalid coordinate ({lat}, {lon})")]
    InvalidCoordinate { lat: f64, lon: f64 },
}
