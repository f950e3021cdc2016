//! # adresX Grouping
//!
//! Finds duplicate address records and clusters them.
//!
//! - [`BlockingIndex`] limits comparisons to records sharing a province,
//!   district or neighborhood
//! - [`DuplicateGrouper`] scores candidate pairs and unions the matches
//! - [`DuplicateRegistry`] adds records one at a time under per-group
//!   leases
//!
//! ## Example
//!
//! ```rust
//! use adresx_grouping::{group_hash, GroupingConfig};
//! use adresx_core::RecordId;
//!
//! let config = GroupingConfig::default();
//! assert_eq!(config.threshold, 0.85);
//!
//! let hash = group_hash(&[RecordId(2), RecordId(1)]);
//! assert_eq!(hash, group_hash(&[RecordId(1), RecordId(2)]));
//! ```

pub mod candidates;
pub mod config;
pub mod error;
pub mod grouper;
pub mod lease;
pub mod registry;
pub mod union_find;

#[cfg(test)]
mod test_support;

pub use candidates::{BlockKey, BlockingIndex};
pub use config::{GroupingConfig, RetryPolicy};
pub use error::{GroupingError, Result};
pub use grouper::{
    group_hash, select_representative, DuplicateGroup, DuplicateGrouper, DuplicateRelationship,
    GroupingOutcome, GroupingStats,
};
pub use lease::{GroupLeases, LeaseGuard, LeaseKey};
pub use registry::DuplicateRegistry;
pub use union_find::UnionFind;
