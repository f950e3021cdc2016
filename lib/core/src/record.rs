//! Address records and the value types they are built from.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::geo::ResolutionTier;
use crate::hierarchy::HierarchyLevel;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Numeric identity of an address record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RecordId {
    fn from(id: u64) -> Self {
        RecordId(id)
    }
}

/// Kind of a parsed address component
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Province,
    District,
    Neighborhood,
    Street,
    BuildingNumber,
    Unit,
    /// Free-form point of interest or landmark name
    Poi,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 7] = [
        ComponentKind::Province,
        ComponentKind::District,
        ComponentKind::Neighborhood,
        ComponentKind::Street,
        ComponentKind::BuildingNumber,
        ComponentKind::Unit,
        ComponentKind::Poi,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ComponentKind::Province => "province",
            ComponentKind::District => "district",
            ComponentKind::Neighborhood => "neighborhood",
            ComponentKind::Street => "street",
            ComponentKind::BuildingNumber => "building_number",
            ComponentKind::Unit => "unit",
            ComponentKind::Poi => "poi",
        }
    }

    /// Rank used to break ties between equally long parser matches.
    /// Higher wins: neighborhood over street over building.
    pub fn specificity(self) -> u8 {
        match self {
            ComponentKind::Neighborhood => 6,
            ComponentKind::District => 5,
            ComponentKind::Province => 4,
            ComponentKind::Street => 3,
            ComponentKind::Poi => 2,
            ComponentKind::BuildingNumber => 1,
            ComponentKind::Unit => 0,
        }
    }

    /// The administrative level this kind is validated against, if any
    pub fn hierarchy_level(self) -> Option<HierarchyLevel> {
        match self {
            ComponentKind::Province => Some(HierarchyLevel::Province),
            ComponentKind::District => Some(HierarchyLevel::District),
            ComponentKind::Neighborhood => Some(HierarchyLevel::Neighborhood),
            _ => None,
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed components of an address.
///
/// Keys are unique and values are never empty: an absent component is an
/// absent key. Deserialization drops empty values so stored data cannot
/// violate this either.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<ComponentKind, String>", into = "BTreeMap<ComponentKind, String>")]
pub struct ParsedComponents {
    values: BTreeMap<ComponentKind, String>,
}

impl ParsedComponents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a component, trimming the value. Empty values are ignored and
    /// `false` is returned.
    pub fn insert(&mut self, kind: ComponentKind, value: impl Into<String>) -> bool {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return false;
        }
        self.values.insert(kind, trimmed.to_string());
        true
    }

    /// Builder-style insert, handy for fixtures
    #[must_use]
    pub fn with(mut self, kind: ComponentKind, value: impl Into<String>) -> Self {
        self.insert(kind, value);
        self
    }

    pub fn get(&self, kind: ComponentKind) -> Option<&str> {
        self.values.get(&kind).map(String::as_str)
    }

    pub fn contains(&self, kind: ComponentKind) -> bool {
        self.values.contains_key(&kind)
    }

    pub fn remove(&mut self, kind: ComponentKind) -> Option<String> {
        self.values.remove(&kind)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ComponentKind, &str)> {
        self.values.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

impl From<BTreeMap<ComponentKind, String>> for ParsedComponents {
    fn from(map: BTreeMap<ComponentKind, String>) -> Self {
        let mut components = ParsedComponents::new();
        for (kind, value) in map {
            components.insert(kind, value);
        }
        components
    }
}

impl From<ParsedComponents> for BTreeMap<ComponentKind, String> {
    fn from(components: ParsedComponents) -> Self {
        components.values
    }
}

/// A WGS84 latitude/longitude pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Great-circle distance in meters (haversine)
    pub fn distance_m(&self, other: &Coordinate) -> f64 {
        let (phi1, phi2) = (self.lat.to_radians(), other.lat.to_radians());
        let (delta_phi, delta_lambda) = (
            (other.lat - self.lat).to_radians(),
            (other.lon - self.lon).to_radians(),
        );
        let a = (delta_phi / 2.0).sin().powi(2)
            + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
    }
}

/// Axis-aligned bounding region of a hierarchy node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn contains(&self, point: &Coordinate) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.lat)
            && (self.min_lon..=self.max_lon).contains(&point.lon)
    }
}

/// Confidence score, always within [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            Confidence(0.0)
        } else {
            Confidence(value.clamp(0.0, 1.0))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl From<f64> for Confidence {
    fn from(value: f64) -> Self {
        Confidence::new(value)
    }
}

impl From<Confidence> for f64 {
    fn from(c: Confidence) -> Self {
        c.0
    }
}

/// Closed outcome set of hierarchy validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Valid,
    Invalid,
    NeedsReview,
}

impl ValidationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ValidationStatus::Valid => "valid",
            ValidationStatus::Invalid => "invalid",
            ValidationStatus::NeedsReview => "needs_review",
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    Normalize,
    Parse,
    Validate,
    Geocode,
    Score,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Ok,
    Degraded,
}

/// Outcome of a single pipeline step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl StepOutcome {
    pub fn ok(details: serde_json::Value) -> Self {
        Self { status: StepStatus::Ok, details }
    }

    pub fn degraded(details: serde_json::Value) -> Self {
        Self { status: StepStatus::Degraded, details }
    }
}

/// Non-fatal problems a pipeline run recovered from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    ParseAmbiguity {
        position: usize,
        text: String,
        chosen: ComponentKind,
        rejected: ComponentKind,
    },
    HierarchyConflict {
        level: HierarchyLevel,
        found: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        expected: Option<String>,
    },
    GeoResolutionTimeout {
        timeout_ms: u64,
    },
    GeocoderFailure {
        message: String,
    },
    GeocodeOutOfBounds {
        lat: f64,
        lon: f64,
    },
}

/// Which steps ran for a record and how each went
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    pub hierarchy_version: String,
    pub steps: BTreeMap<PipelineStep, StepOutcome>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degradations: Vec<Degradation>,
}

impl ProcessingMetadata {
    pub fn new(hierarchy_version: impl Into<String>) -> Self {
        Self {
            hierarchy_version: hierarchy_version.into(),
            ..Self::default()
        }
    }

    pub fn record_step(&mut self, step: PipelineStep, outcome: StepOutcome) {
        self.steps.insert(step, outcome);
    }

    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}

/// A fully processed address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub id: RecordId,
    pub raw_text: String,
    pub normalized_text: String,
    pub corrected_text: String,
    pub components: ParsedComponents,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinate: Option<Coordinate>,
    pub resolution_tier: ResolutionTier,
    pub confidence: Confidence,
    pub validation_status: ValidationStatus,
    pub metadata: ProcessingMetadata,
}

impl AddressRecord {
    pub fn confidence(&self) -> f64 {
        self.confidence.value()
    }

    /// Number of parsed components, used as a completeness tie-break
    pub fn completeness(&self) -> usize {
        self.components.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_components_reject_empty_values() {
        let mut components = ParsedComponents::new();
        assert!(!components.insert(ComponentKind::Street, "   "));
        assert!(components.insert(ComponentKind::Street, " Caferağa "));
        assert_eq!(components.get(ComponentKind::Street), Some("Caferağa"));
        assert_eq!(components.len(), 1);
    }

    #[test]
    fn test_components_deserialize_drops_empty() {
        let json = r#"{"province":"İstanbul","district":"","building_number":"10"}"#;
        let components: ParsedComponents = serde_json::from_str(json).unwrap();
        assert_eq!(components.len(), 2);
        assert!(!components.contains(ComponentKind::District));
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(Confidence::new(1.7).value(), 1.0);
        assert_eq!(Confidence::new(-0.2).value(), 0.0);
        assert_eq!(Confidence::new(f64::NAN).value(), 0.0);

        let parsed: Confidence = serde_json::from_str("3.5").unwrap();
        assert_eq!(parsed.value(), 1.0);
    }

    #[test]
    fn test_validation_status_strings() {
        let json = serde_json::to_string(&ValidationStatus::NeedsReview).unwrap();
        assert_eq!(json, "\"needs_review\"");
        assert_eq!(ValidationStatus::Valid.to_string(), "valid");
    }

    #[test]
    fn test_haversine_distance() {
        // Kadıköy pier to Moda, roughly 1.3 km
        let a = Coordinate::new(40.9906, 29.0230);
        let b = Coordinate::new(40.9800, 29.0300);
        let d = a.distance_m(&b);
        assert!(d > 1_000.0 && d < 1_600.0, "distance was {}", d);
        assert_eq!(a.distance_m(&a), 0.0);
        assert!((a.distance_m(&b) - b.distance_m(&a)).abs() < 1e-9);
    }

    #[test]
    fn test_bounding_box_contains() {
        let bounds = BoundingBox { min_lat: 40.0, min_lon: 28.0, max_lat: 41.5, max_lon: 30.0 };
        assert!(bounds.contains(&Coordinate::new(41.0, 29.0)));
        assert!(!bounds.contains(&Coordinate::new(39.9, 32.8)));
    }
}
