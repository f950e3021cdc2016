//! # adresX
//!
//! Turkish address normalization, hierarchical validation and duplicate
//! resolution.
//!
//! adresX turns free-text addresses into validated, geo-located records
//! with explainable confidence scores, then finds and groups duplicates
//! across the population.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use adresx::prelude::*;
//!
//! let entry = |code: &str, name: &str, level, parent: Option<&str>| HierarchyEntry {
//!     code: code.to_string(),
//!     name: name.to_string(),
//!     level,
//!     parent_code: parent.map(str::to_string),
//!     centroid: None,
//!     bounds: None,
//!     population: None,
//!     area_km2: None,
//! };
//! let snapshot = HierarchySnapshot::build(
//!     "2024-01",
//!     vec![
//!         entry("16", "Bursa", HierarchyLevel::Province, None),
//!         entry("16.01", "Osmangazi", HierarchyLevel::District, Some("16")),
//!     ],
//! )
//! .unwrap();
//!
//! let pipeline = AddressPipeline::new(
//!     Arc::new(HierarchyStore::new(snapshot)),
//!     PipelineConfig::default(),
//! )
//! .unwrap();
//! let engine = AddressEngine::new(
//!     pipeline,
//!     DuplicateRegistry::new(GroupingConfig::default()).unwrap(),
//!     Arc::new(MemoryRecordStore::new()),
//! );
//!
//! let submission = engine.submit(RecordId(1), "BURSA osmangazi").unwrap();
//! assert_eq!(submission.record.corrected_text, "bursa osmangazi");
//! assert!(submission.group.is_none());
//! ```
//!
//! ## Crate Structure
//!
//! - [`adresx-core`](https://docs.rs/adresx-core) - Normalizer, parser, hierarchy, validator, geo resolver, scorer, pipeline
//! - [`adresx-similarity`](https://docs.rs/adresx-similarity) - Multi-factor explainable similarity
//! - [`adresx-grouping`](https://docs.rs/adresx-grouping) - Blocking, union-find grouping, incremental registry
//! - [`adresx-storage`](https://docs.rs/adresx-storage) - Persisted rows, record store, snapshots, processing log

pub mod engine;

pub use engine::{AddressEngine, EngineError, EngineResult, Submission};

// Re-export core types
pub use adresx_core::{
    AddressPipeline, AddressRecord, ComponentKind, Confidence, Coordinate, Error,
    HierarchyEntry, HierarchyLevel, HierarchySnapshot, HierarchyStore, MemoryLogSink,
    OperationType, ParsedComponents, PipelineConfig, ProcessingLogEntry, ProcessingLogSink,
    RecordId, ResolutionTier, Result, ValidationStatus,
};

// Re-export similarity
pub use adresx_similarity::{SimilarityBreakdown, SimilarityConfig, SimilarityEngine};

// Re-export grouping
pub use adresx_grouping::{
    DuplicateGroup, DuplicateGrouper, DuplicateRegistry, DuplicateRelationship, GroupingConfig,
    GroupingOutcome,
};

// Re-export storage
pub use adresx_storage::{JsonlProcessingLog, MemoryRecordStore, RecordStore};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        AddressEngine, AddressPipeline, AddressRecord, ComponentKind, Coordinate,
        DuplicateGroup, DuplicateGrouper, DuplicateRegistry, GroupingConfig, HierarchyEntry,
        HierarchyLevel, HierarchySnapshot, HierarchyStore, MemoryRecordStore, PipelineConfig,
        RecordId, RecordStore, SimilarityEngine, ValidationStatus,
    };
}
