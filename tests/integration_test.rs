// Integration tests for adresX
use adresx::prelude::*;
use adresx::{AddressEngine, ParsedComponents, EngineError, JsonlProcessingLog, MemoryLogSink, OperationType};
use adresx_core::{
    Degradation, GeocodeError, GeocodeQuery, Geocoder, InputError, ResolutionTier,
};
use adresx_grouping::{group_hash, BlockKey, GroupingError, GroupingOutcome, LeaseKey, RetryPolicy};
use adresx_storage::{
    AddressRow, DuplicateGroupRow, DuplicateRelationshipRow, SnapshotManager, StorageError,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const EXAMPLE_1: &str = "istanbul kadikoy moda mah caferaga sk 10";
const EXAMPLE_2: &str = "İstanbul Çankaya Kızılay Mahallesi";
const EXAMPLE_3: &str = "İstanbul Kadıköy Moda Mahallesi Caferağa Sokak No 10";
const EXAMPLE_4: &str = "Bursa Osmangazi Soğanlı Mahallesi";

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/hierarchy.json")
}

fn hierarchy() -> Arc<HierarchyStore> {
    let snapshot = HierarchySnapshot::from_json_file(fixture_path()).unwrap();
    Arc::new(HierarchyStore::new(snapshot))
}

fn pipeline() -> AddressPipeline {
    AddressPipeline::new(hierarchy(), PipelineConfig::default()).unwrap()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn engine_with(pipeline: AddressPipeline) -> (AddressEngine, Arc<MemoryRecordStore>) {
    let store = Arc::new(MemoryRecordStore::new());
    let engine = AddressEngine::new(
        pipeline,
        DuplicateRegistry::new(GroupingConfig::default()).unwrap(),
        store.clone(),
    );
    (engine, store)
}

#[test]
fn test_fixture_hierarchy_loads() {
    let store = hierarchy();
    let snapshot = store.snapshot();
    assert_eq!(snapshot.version(), "fixture-2024.1");
    assert_eq!(snapshot.len(), 11);
    let moda = snapshot.get_by_code("34.01.01").unwrap();
    assert_eq!(snapshot.node(moda).name, "Moda");
}

#[test]
fn test_example_1_complete_address() {
    let record = pipeline().process(RecordId(1), EXAMPLE_1).unwrap();

    let expected = ParsedComponents::new()
        .with(ComponentKind::Province, "İstanbul")
        .with(ComponentKind::District, "Kadıköy")
        .with(ComponentKind::Neighborhood, "Moda")
        .with(ComponentKind::Street, "Caferağa")
        .with(ComponentKind::BuildingNumber, "10");
    assert_eq!(record.components, expected);
    assert_eq!(record.validation_status, ValidationStatus::Valid);
    assert!(record.confidence() >= 0.8, "got {}", record.confidence());
    assert_eq!(record.metadata.hierarchy_version, "fixture-2024.1");
}

#[test]
fn test_example_2_conflict_is_invalid() {
    let record = pipeline().process(RecordId(2), EXAMPLE_2).unwrap();
    assert_eq!(record.validation_status, ValidationStatus::Invalid);
    assert!(record
        .metadata
        .degradations
        .iter()
        .any(|d| matches!(d, Degradation::HierarchyConflict { .. })));
}

#[test]
fn test_example_3_groups_with_example_1() {
    let (engine, store) = engine_with(pipeline());

    let first = engine.submit(RecordId(1), EXAMPLE_1).unwrap();
    assert!(first.group.is_none());

    let third = engine.submit(RecordId(3), EXAMPLE_3).unwrap();
    assert!(third.record.confidence() > first.record.confidence());

    let similarity = SimilarityEngine::default().compare(&first.record, &third.record);
    assert!(similarity.overall >= 0.85, "got {}", similarity.overall);

    let group = third.group.unwrap();
    assert_eq!(group.members, vec![RecordId(1), RecordId(3)]);
    assert_eq!(group.representative, RecordId(3));
    assert_eq!(group.group_hash, group_hash(&[RecordId(3), RecordId(1)]));

    let rows = store.groups().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].representative_id, RecordId(3));
    let relationships = store.relationships().unwrap();
    assert_eq!(relationships.len(), 1);
    assert_eq!(relationships[0].record_id, RecordId(1));
}

#[test]
fn test_example_4_centroid_never_invalid() {
    let record = pipeline().process(RecordId(4), EXAMPLE_4).unwrap();
    assert_eq!(record.resolution_tier, ResolutionTier::NeighborhoodCentroid);
    assert_ne!(record.validation_status, ValidationStatus::Invalid);
    assert_eq!(record.components.get(ComponentKind::Neighborhood), Some("Soğanlı"));
}

#[test]
fn test_every_valid_input_yields_bounded_record() {
    let pipeline = pipeline();
    let inputs = [
        EXAMPLE_1,
        EXAMPLE_2,
        EXAMPLE_3,
        EXAMPLE_4,
        "ankara",
        "yeni cadde no 5 kat 2 daire 8",
        "FEVZİ ÇAKMAK MAH. 12/4",
        "34710 kadıköy",
        "moda parkı karşısı",
        "?? 42 !!",
    ];
    for (i, raw) in inputs.iter().enumerate() {
        let record = pipeline.process(RecordId(i as u64), raw).unwrap();
        assert!((0.0..=1.0).contains(&record.confidence()), "{raw}");
        assert!(record.components.iter().all(|(_, v)| !v.is_empty()), "{raw}");
        assert_eq!(record.metadata.steps.len(), 5, "{raw}");
    }
}

#[test]
fn test_rejected_input_is_logged() {
    let sink = Arc::new(MemoryLogSink::new());
    let pipeline = pipeline().with_log_sink(sink.clone());

    for raw in ["", "   ", "...,,,"] {
        let err = pipeline.process(RecordId(9), raw).unwrap_err();
        assert!(matches!(err, adresx::Error::Input(_)), "{raw}");
    }
    assert!(matches!(
        pipeline.process(RecordId(9), "").unwrap_err(),
        adresx::Error::Input(InputError::Empty)
    ));
    let entries = sink.entries();
    assert_eq!(entries.len(), 4);
    assert!(entries.iter().all(|e| e.is_error()));
}

#[test]
fn test_reprocess_is_idempotent() {
    let pipeline = pipeline();
    for (i, raw) in [EXAMPLE_1, EXAMPLE_3, EXAMPLE_4].iter().enumerate() {
        let first = pipeline.process(RecordId(i as u64), raw).unwrap();
        let again = pipeline.process(first.id, &first.corrected_text).unwrap();
        assert_eq!(again.components, first.components, "{raw}");
        assert_eq!(again.confidence, first.confidence, "{raw}");
        assert_eq!(again.validation_status, first.validation_status, "{raw}");
    }
}

#[test]
fn test_similarity_is_reflexive_for_complete_record() {
    let record = pipeline()
        .process(RecordId(1), "istanbul kadikoy moda mah caferaga sk 10 daire 3")
        .unwrap();
    assert_eq!(record.components.len(), 6);
    assert!(record.coordinate.is_some());

    let breakdown = SimilarityEngine::default().compare(&record, &record);
    assert_eq!(breakdown.overall, 1.0);
}

#[test]
fn test_similarity_is_symmetric() {
    let pipeline = pipeline();
    let records: Vec<AddressRecord> = [EXAMPLE_1, EXAMPLE_2, EXAMPLE_3, EXAMPLE_4]
        .iter()
        .enumerate()
        .map(|(i, raw)| pipeline.process(RecordId(i as u64 + 1), raw).unwrap())
        .collect();
    let engine = SimilarityEngine::default();
    for a in &records {
        for b in &records {
            assert_eq!(engine.compare(a, b), engine.compare(b, a));
            let s = engine.similarity(a, b);
            assert!((0.0..=1.0).contains(&s));
        }
    }
}

#[test]
fn test_grouping_idempotent_and_matches_registry() {
    let pipeline = pipeline();
    let inputs = [
        EXAMPLE_1,
        EXAMPLE_3,
        "istanbul kadıköy moda mahallesi caferağa sokak no 10",
        EXAMPLE_4,
        "bursa osmangazi soğanlı mah",
        EXAMPLE_2,
    ];
    let records: Vec<AddressRecord> = inputs
        .iter()
        .enumerate()
        .map(|(i, raw)| pipeline.process(RecordId(i as u64 + 1), raw).unwrap())
        .collect();

    let grouper = DuplicateGrouper::default();
    let first = grouper.group(&records).unwrap();
    let second = grouper.group(&records).unwrap();
    assert_eq!(first, second);
    assert!(!first.groups.is_empty());
    assert!(first.groups[0].contains(RecordId(1)));
    for group in &first.groups {
        assert!(group.member_count >= 2);
        assert!((0.0..=1.0).contains(&group.average_confidence));
    }
    for rel in &first.relationships {
        assert!(rel.similarity >= 0.85);
    }

    let registry = DuplicateRegistry::new(GroupingConfig::default()).unwrap();
    for record in &records {
        registry.add(record.clone()).unwrap();
    }
    assert_eq!(registry.outcome().groups, first.groups);
}

#[test]
fn test_engine_regroup_and_processing_log() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(JsonlProcessingLog::open(dir.path().join("processing.jsonl")).unwrap());
    let (engine, store) = engine_with(pipeline().with_log_sink(log.clone()));
    let engine = engine.with_log_sink(log.clone());

    engine.submit(RecordId(1), EXAMPLE_1).unwrap();
    engine.submit(RecordId(2), EXAMPLE_3).unwrap();
    let err = engine.submit(RecordId(3), "").unwrap_err();
    assert!(matches!(err, EngineError::Pipeline(_)));
    assert!(store.get_address(RecordId(3)).unwrap().is_none());

    let outcome = engine.regroup().unwrap();
    assert_eq!(outcome.groups.len(), 1);
    assert_eq!(store.groups().unwrap().len(), 1);
    assert_eq!(store.len(), 2);

    log.sync().unwrap();
    let entries = log.read_entries().unwrap();
    let count = |op| entries.iter().filter(|e| e.operation == op).count();
    assert_eq!(count(OperationType::ProcessAddress), 3);
    assert_eq!(count(OperationType::AddToGroups), 2);
    assert_eq!(count(OperationType::GroupDuplicates), 1);
    assert_eq!(entries.iter().filter(|e| e.is_error()).count(), 1);
    assert!(entries.iter().all(|e| e.request_id.get_version_num() == 4));
}

#[test]
fn test_store_snapshot_restores() -> anyhow::Result<()> {
    init_tracing();
    let (engine, store) = engine_with(pipeline());
    engine.submit(RecordId(1), EXAMPLE_1)?;
    engine.submit(RecordId(2), EXAMPLE_3)?;

    let dir = tempfile::tempdir()?;
    let snapshots = SnapshotManager::new(dir.path())?;
    let description = snapshots.create(&store.to_snapshot())?;

    let loaded = snapshots.load(&description.name, Some(&description.checksum))?;
    let restored = MemoryRecordStore::from_snapshot(loaded);
    assert_eq!(restored.addresses()?, store.addresses()?);
    assert_eq!(restored.groups()?, store.groups()?);

    let record = restored.record(RecordId(2))?;
    assert_eq!(record.components.get(ComponentKind::BuildingNumber), Some("10"));
    Ok(())
}

struct SlowGeocoder;

impl Geocoder for SlowGeocoder {
    fn geocode(&self, _query: &GeocodeQuery) -> Result<Option<Coordinate>, GeocodeError> {
        std::thread::sleep(Duration::from_millis(300));
        Ok(Some(Coordinate::new(40.981, 29.026)))
    }
}

#[test]
fn test_geocoder_timeout_falls_back_to_centroid() {
    let config = PipelineConfig {
        geocoder_timeout_ms: 20,
        ..PipelineConfig::default()
    };
    let pipeline = AddressPipeline::new(hierarchy(), config)
        .unwrap()
        .with_geocoder(Arc::new(SlowGeocoder));

    let record = pipeline.process(RecordId(1), EXAMPLE_3).unwrap();
    assert_eq!(record.resolution_tier, ResolutionTier::NeighborhoodCentroid);
    assert!(record
        .metadata
        .degradations
        .iter()
        .any(|d| matches!(d, Degradation::GeoResolutionTimeout { timeout_ms: 20 })));
    assert_ne!(record.validation_status, ValidationStatus::Invalid);
}

#[test]
fn test_concurrent_submissions() {
    let store = Arc::new(MemoryRecordStore::new());
    let config = GroupingConfig {
        retry: RetryPolicy {
            max_attempts: 10_000,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        },
        ..GroupingConfig::default()
    };
    let engine = AddressEngine::new(
        pipeline(),
        DuplicateRegistry::new(config).unwrap(),
        store.clone(),
    );

    std::thread::scope(|scope| {
        for t in 0..4u64 {
            let engine = &engine;
            scope.spawn(move || {
                for i in 0..5u64 {
                    let raw = if i % 2 == 0 { EXAMPLE_1 } else { EXAMPLE_3 };
                    engine.submit(RecordId(t * 10 + i), raw).unwrap();
                }
            });
        }
    });

    assert_eq!(store.len(), 20);
    let groups = engine.registry().groups();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].member_count, 20);
    assert_eq!(store.groups().unwrap().len(), 1);
}

#[test]
fn test_resubmitted_id_leaves_store_and_registry_in_step() {
    let (engine, store) = engine_with(pipeline());
    let first = engine.submit(RecordId(1), EXAMPLE_1).unwrap();

    let err = engine
        .submit(RecordId(1), "ankara çankaya kızılay mahallesi")
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Grouping(GroupingError::DuplicateRecord(RecordId(1)))
    ));

    let stored = store.get_address(RecordId(1)).unwrap().unwrap();
    let registered = engine.registry().record(RecordId(1)).unwrap();
    assert_eq!(stored.corrected_text, first.record.corrected_text);
    assert_eq!(registered.corrected_text, first.record.corrected_text);

    engine.regroup().unwrap();
    let stored = store.get_address(RecordId(1)).unwrap().unwrap();
    assert_eq!(stored.corrected_text, registered.corrected_text);
}

#[test]
fn test_contended_submission_is_not_stored() {
    let store = Arc::new(MemoryRecordStore::new());
    let config = GroupingConfig {
        retry: RetryPolicy {
            max_attempts: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 1,
        },
        ..GroupingConfig::default()
    };
    let engine = AddressEngine::new(
        pipeline(),
        DuplicateRegistry::new(config).unwrap(),
        store.clone(),
    );

    let held = engine
        .registry()
        .leases()
        .try_acquire([LeaseKey::Block(BlockKey {
            kind: ComponentKind::Province,
            value: "istanbul".to_string(),
        })])
        .unwrap();
    let err = engine.submit(RecordId(1), EXAMPLE_1).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Grouping(GroupingError::Contention { attempts: 2, .. })
    ));
    assert!(store.is_empty());
    assert!(engine.registry().is_empty());

    drop(held);
    engine.submit(RecordId(1), EXAMPLE_1).unwrap();
    assert_eq!(store.len(), 1);
    assert_eq!(engine.registry().len(), 1);
}

/// Store that refuses every address
struct ReadOnlyStore;

impl RecordStore for ReadOnlyStore {
    fn put_address(&self, _record: &AddressRecord) -> adresx_storage::Result<AddressRow> {
        Err(StorageError::Io(std::io::Error::other("read-only store")))
    }

    fn get_address(&self, _id: RecordId) -> adresx_storage::Result<Option<AddressRow>> {
        Ok(None)
    }

    fn addresses(&self) -> adresx_storage::Result<Vec<AddressRow>> {
        Ok(Vec::new())
    }

    fn replace_groups(&self, _outcome: &GroupingOutcome) -> adresx_storage::Result<()> {
        Ok(())
    }

    fn groups(&self) -> adresx_storage::Result<Vec<DuplicateGroupRow>> {
        Ok(Vec::new())
    }

    fn relationships(&self) -> adresx_storage::Result<Vec<DuplicateRelationshipRow>> {
        Ok(Vec::new())
    }
}

#[test]
fn test_store_failure_rolls_back_registry() {
    let registry = DuplicateRegistry::new(GroupingConfig::default()).unwrap();
    let engine = AddressEngine::new(pipeline(), registry, Arc::new(ReadOnlyStore));

    let err = engine.submit(RecordId(1), EXAMPLE_1).unwrap_err();
    assert!(matches!(err, EngineError::Storage(StorageError::Io(_))));
    assert!(engine.registry().is_empty());
    assert!(engine.registry().record(RecordId(1)).is_none());
}
