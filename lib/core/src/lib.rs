//! # adresX Core
//!
//! Turns free-text Turkish addresses into validated, geo-located records.
//!
//! The per-record pipeline runs in this order:
//!
//! - [`normalize`] - Turkish case folding, abbreviation expansion, spelling fixes
//! - [`parse`] - greedy segmentation into administrative components
//! - [`validate`] - consistency check against the [`HierarchySnapshot`]
//! - [`GeoResolver`] - geocoder result or hierarchy centroid
//! - [`ConfidenceScorer`] - confidence score and validation status
//!
//! [`AddressPipeline`] wires the stages together.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use adresx_core::{
//!     AddressPipeline, HierarchyEntry, HierarchyLevel, HierarchySnapshot, HierarchyStore,
//!     PipelineConfig, RecordId, ValidationStatus,
//! };
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
//!         entry("06", "Ankara", HierarchyLevel::Province, None),
//!         entry("06.01", "Çankaya", HierarchyLevel::District, Some("06")),
//!     ],
//! )
//! .unwrap();
//!
//! let pipeline = AddressPipeline::new(
//!     Arc::new(HierarchyStore::new(snapshot)),
//!     PipelineConfig::default(),
//! )
//! .unwrap();
//!
//! let record = pipeline.process(RecordId(1), "ANKARA cankaya").unwrap();
//! assert_eq!(record.corrected_text, "ankara çankaya");
//! assert_ne!(record.validation_status, ValidationStatus::Invalid);
//! ```

pub mod config;
pub mod error;
pub mod geo;
pub mod hierarchy;
pub mod log;
pub mod parser;
pub mod pipeline;
pub mod record;
pub mod scorer;
pub mod tables;
pub mod text;
pub mod validator;

#[cfg(test)]
mod test_support;

pub use config::{PipelineConfig, ScoringWeights};
pub use error::{ConfigError, Error, GeocodeError, HierarchyError, InputError, Result};
pub use geo::{GeoResolution, GeoResolver, GeocodeQuery, Geocoder, ResolutionTier};
pub use hierarchy::{
    HierarchyDataset, HierarchyEntry, HierarchyLevel, HierarchyNode, HierarchySnapshot,
    HierarchyStore, NodeIdx,
};
pub use log::{MemoryLogSink, OperationType, ProcessingLogEntry, ProcessingLogSink};
pub use parser::{extract_landmarks, parse, MatchSource, ParseAmbiguity, ParsedAddress};
pub use pipeline::AddressPipeline;
pub use record::{
    AddressRecord, BoundingBox, ComponentKind, Confidence, Coordinate, Degradation,
    ParsedComponents, PipelineStep, ProcessingMetadata, RecordId, StepOutcome, StepStatus,
    ValidationStatus,
};
pub use scorer::{ConfidenceReport, ConfidenceScorer};
pub use tables::TextTables;
pub use text::{normalize, NormalizedText};
pub use validator::{validate, HierarchyConflict, HierarchyVerdict, MatchStatus};
