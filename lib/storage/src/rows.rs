//! Persisted row layouts
//!
//! Field names are part of the storage contract. Scores are kept with four
//! fractional digits; timestamps are set by the store.

use crate::error::{Result, StorageError};
use adresx_core::{
    AddressRecord, ComponentKind, Confidence, Coordinate, ParsedComponents, ProcessingMetadata,
    RecordId, ResolutionTier, ValidationStatus,
};
use adresx_grouping::{DuplicateGroup, DuplicateRelationship};
use adresx_similarity::SimilarityBreakdown;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Round to four fractional digits
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Components mapping with one optional column per kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentsRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poi: Option<String>,
}

impl From<&ParsedComponents> for ComponentsRow {
    fn from(components: &ParsedComponents) -> Self {
        let get = |kind| components.get(kind).map(str::to_string);
        Self {
            province: get(ComponentKind::Province),
            district: get(ComponentKind::District),
            neighborhood: get(ComponentKind::Neighborhood),
            street: get(ComponentKind::Street),
            building_number: get(ComponentKind::BuildingNumber),
            unit: get(ComponentKind::Unit),
            poi: get(ComponentKind::Poi),
        }
    }
}

impl From<&ComponentsRow> for ParsedComponents {
    fn from(row: &ComponentsRow) -> Self {
        let mut components = ParsedComponents::new();
        let columns = [
            (ComponentKind::Province, &row.province),
            (ComponentKind::District, &row.district),
            (ComponentKind::Neighborhood, &row.neighborhood),
            (ComponentKind::Street, &row.street),
            (ComponentKind::BuildingNumber, &row.building_number),
            (ComponentKind::Unit, &row.unit),
            (ComponentKind::Poi, &row.poi),
        ];
        for (kind, value) in columns {
            if let Some(value) = value {
                // empty values are dropped by insert
                components.insert(kind, value.as_str());
            }
        }
        components
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressRow {
    pub id: RecordId,
    pub raw_text: String,
    pub normalized_text: String,
    pub corrected_text: String,
    pub components: ComponentsRow,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinate: Option<Coordinate>,
    pub resolution_tier: ResolutionTier,
    pub confidence: f64,
    pub validation_status: ValidationStatus,
    pub processing_metadata: ProcessingMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AddressRow {
    pub fn from_record(record: &AddressRecord, now: DateTime<Utc>) -> Self {
        Self {
            id: record.id,
            raw_text: record.raw_text.clone(),
            normalized_text: record.normalized_text.clone(),
            corrected_text: record.corrected_text.clone(),
            components: ComponentsRow::from(&record.components),
            coordinate: record.coordinate,
            resolution_tier: record.resolution_tier,
            confidence: round4(record.confidence()),
            validation_status: record.validation_status,
            processing_metadata: record.metadata.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn to_record(&self) -> AddressRecord {
        AddressRecord {
            id: self.id,
            raw_text: self.raw_text.clone(),
            normalized_text: self.normalized_text.clone(),
            corrected_text: self.corrected_text.clone(),
            components: ParsedComponents::from(&self.components),
            coordinate: self.coordinate,
            resolution_tier: self.resolution_tier,
            confidence: Confidence::new(self.confidence),
            validation_status: self.validation_status,
            metadata: self.processing_metadata.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroupRow {
    pub hash: String,
    pub representative_id: RecordId,
    pub member_count: usize,
    pub average_confidence: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DuplicateGroupRow {
    pub fn from_group(group: &DuplicateGroup, now: DateTime<Utc>) -> Result<Self> {
        if group.member_count == 0 {
            return Err(StorageError::EmptyGroup(group.group_hash.clone()));
        }
        Ok(Self {
            hash: group.group_hash.clone(),
            representative_id: group.representative,
            member_count: group.member_count,
            average_confidence: round4(group.average_confidence),
            created_at: now,
            updated_at: now,
        })
    }
}

/// The four named sub-scores
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreakdownRow {
    pub textual: f64,
    pub hierarchical: f64,
    pub geographic: f64,
    pub semantic: f64,
}

impl From<&SimilarityBreakdown> for BreakdownRow {
    fn from(b: &SimilarityBreakdown) -> Self {
        Self {
            textual: round4(b.textual),
            hierarchical: round4(b.hierarchical),
            geographic: round4(b.geographic),
            semantic: round4(b.semantic),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateRelationshipRow {
    pub group_hash: String,
    pub record_id: RecordId,
    pub similarity_score: f64,
    pub breakdown: BreakdownRow,
    pub created_at: DateTime<Utc>,
}

impl DuplicateRelationshipRow {
    pub fn from_relationship(rel: &DuplicateRelationship, now: DateTime<Utc>) -> Self {
        Self {
            group_hash: rel.group_hash.clone(),
            record_id: rel.record_id,
            similarity_score: round4(rel.similarity),
            breakdown: BreakdownRow::from(&rel.breakdown),
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> AddressRecord {
        AddressRecord {
            id: RecordId(7),
            raw_text: "istanbul kadikoy moda mah".to_string(),
            normalized_text: "istanbul kadikoy moda mahallesi".to_string(),
            corrected_text: "istanbul kadıköy moda mahallesi".to_string(),
            components: ParsedComponents::new()
                .with(ComponentKind::Province, "İstanbul")
                .with(ComponentKind::District, "Kadıköy")
                .with(ComponentKind::Neighborhood, "Moda"),
            coordinate: Some(Coordinate::new(40.98, 29.027)),
            resolution_tier: ResolutionTier::NeighborhoodCentroid,
            confidence: Confidence::new(0.784_56),
            validation_status: ValidationStatus::NeedsReview,
            metadata: ProcessingMetadata::new("test-v1"),
        }
    }

    #[test]
    fn test_round4() {
        assert_eq!(round4(0.784_56), 0.7846);
        assert_eq!(round4(1.0), 1.0);
        assert_eq!(round4(0.0), 0.0);
    }

    #[test]
    fn test_address_row_layout() {
        let row = AddressRow::from_record(&record(), Utc::now());
        assert_eq!(row.confidence, 0.7846);

        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["validation_status"], "needs_review");
        assert_eq!(json["components"]["district"], "Kadıköy");
        assert!(json["components"].get("street").is_none());
        assert_eq!(json["resolution_tier"], "neighborhood_centroid");
        assert!(json.get("created_at").is_some());
        assert!(json.get("processing_metadata").is_some());
    }

    #[test]
    fn test_address_row_back_to_record() {
        let original = record();
        let restored = AddressRow::from_record(&original, Utc::now()).to_record();
        assert_eq!(restored.components, original.components);
        assert_eq!(restored.confidence(), 0.7846);
        assert_eq!(restored.validation_status, original.validation_status);
    }

    #[test]
    fn test_empty_group_rejected() {
        let group = DuplicateGroup {
            group_hash: "abc".to_string(),
            representative: RecordId(1),
            members: Vec::new(),
            member_count: 0,
            average_confidence: 0.0,
        };
        assert!(matches!(
            DuplicateGroupRow::from_group(&group, Utc::now()),
            Err(StorageError::EmptyGroup(_))
        ));
    }

    #[test]
    fn test_relationship_row_has_four_subscores() {
        let rel = DuplicateRelationship {
            group_hash: "abc".to_string(),
            record_id: RecordId(2),
            representative: RecordId(1),
            similarity: 0.897_64,
            breakdown: SimilarityBreakdown {
                overall: 0.897_64,
                textual: 0.911_11,
                hierarchical: 1.0,
                geographic: 1.0,
                semantic: 0.5,
            },
        };
        let row = DuplicateRelationshipRow::from_relationship(&rel, Utc::now());
        assert_eq!(row.similarity_score, 0.8976);
        let json = serde_json::to_value(row.breakdown).unwrap();
        let mut keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["geographic", "hierarchical", "semantic", "textual"]);
        assert_eq!(json["textual"], 0.9111);
    }
}
