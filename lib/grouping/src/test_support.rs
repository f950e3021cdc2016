use adresx_core::{
    AddressRecord, ComponentKind, Confidence, Coordinate, ParsedComponents, ProcessingMetadata,
    RecordId, ResolutionTier, ValidationStatus,
};

pub const MODA: Coordinate = Coordinate { lat: 40.9800, lon: 29.0270 };
pub const KIZILAY: Coordinate = Coordinate { lat: 39.9208, lon: 32.8541 };

pub fn record(
    id: u64,
    corrected: &str,
    components: ParsedComponents,
    at: Option<Coordinate>,
    confidence: f64,
) -> AddressRecord {
    AddressRecord {
        id: RecordId(id),
        raw_text: corrected.to_string(),
        normalized_text: corrected.to_string(),
        corrected_text: corrected.to_string(),
        components,
        coordinate: at,
        resolution_tier: if at.is_some() {
            ResolutionTier::NeighborhoodCentroid
        } else {
            ResolutionTier::Unresolved
        },
        confidence: Confidence::new(confidence),
        validation_status: ValidationStatus::Valid,
        metadata: ProcessingMetadata::new("test"),
    }
}

pub fn moda_components() -> ParsedComponents {
    ParsedComponents::new()
        .with(ComponentKind::Province, "İstanbul")
        .with(ComponentKind::District, "Kadıköy")
        .with(ComponentKind::Neighborhood, "Moda")
        .with(ComponentKind::Street, "Caferağa")
        .with(ComponentKind::BuildingNumber, "10")
}

/// Two spellings of the same Moda address
pub fn moda(id: u64, confidence: f64) -> AddressRecord {
    let text = if id % 2 == 0 {
        "istanbul kadıköy moda mahallesi caferağa sokak no 10"
    } else {
        "istanbul kadıköy moda mahallesi caferağa sokak 10"
    };
    record(id, text, moda_components(), Some(MODA), confidence)
}

pub fn kizilay(id: u64, confidence: f64) -> AddressRecord {
    record(
        id,
        "ankara çankaya kızılay mahallesi",
        ParsedComponents::new()
            .with(ComponentKind::Province, "Ankara")
            .with(ComponentKind::District, "Çankaya")
            .with(ComponentKind::Neighborhood, "Kızılay"),
        Some(KIZILAY),
        confidence,
    )
}
