//! Small hierarchy shared by unit tests

use crate::hierarchy::{HierarchyEntry, HierarchyLevel, HierarchySnapshot};
use crate::record::{BoundingBox, Coordinate};

pub(crate) fn entry(
    code: &str,
    name: &str,
    level: HierarchyLevel,
    parent: Option<&str>,
) -> HierarchyEntry {
    HierarchyEntry {
        code: code.to_string(),
        name: name.to_string(),
        level,
        parent_code: parent.map(str::to_string),
        centroid: None,
        bounds: None,
        population: None,
        area_km2: None,
    }
}

fn located(mut entry: HierarchyEntry, lat: f64, lon: f64) -> HierarchyEntry {
    entry.centroid = Some(Coordinate::new(lat, lon));
    entry
}

/// İstanbul/Kadıköy/{Moda, Caferağa}, Ankara/Çankaya/Kızılay,
/// Bursa/Osmangazi/{Soğanlı, Fevzi Çakmak}. Fevzi Çakmak has no centroid.
pub(crate) fn sample_snapshot() -> HierarchySnapshot {
    use HierarchyLevel::*;

    let mut istanbul = located(entry("34", "İstanbul", Province, None), 41.0082, 28.9784);
    istanbul.bounds = Some(BoundingBox {
        min_lat: 40.80,
        min_lon: 27.95,
        max_lat: 41.60,
        max_lon: 29.95,
    });
    istanbul.population = Some(15_655_924);

    let entries = vec![
        istanbul,
        located(entry("34.01", "Kadıköy", District, Some("34")), 40.9900, 29.0300),
        located(entry("34.01.01", "Moda", Neighborhood, Some("34.01")), 40.9800, 29.0270),
        located(entry("34.01.02", "Caferağa", Neighborhood, Some("34.01")), 40.9870, 29.0250),
        located(entry("06", "Ankara", Province, None), 39.9334, 32.8597),
        located(entry("06.01", "Çankaya", District, Some("06")), 39.9179, 32.8627),
        located(entry("06.01.01", "Kızılay", Neighborhood, Some("06.01")), 39.9208, 32.8541),
        located(entry("16", "Bursa", Province, None), 40.1826, 29.0665),
        located(entry("16.01", "Osmangazi", District, Some("16")), 40.1950, 29.0600),
        located(entry("16.01.01", "Soğanlı", Neighborhood, Some("16.01")), 40.2090, 29.0330),
        entry("16.01.02", "Fevzi Çakmak", Neighborhood, Some("16.01")),
    ];

    match HierarchySnapshot::build("test-v1", entries) {
        Ok(snapshot) => snapshot,
        Err(e) => panic!("sample hierarchy is invalid: {e}"),
    }
}
