//! Per-record pipeline: normalize, parse, validate, geocode, score.
//!
//! A run takes one hierarchy snapshot up front and uses it for every stage.
//! Nothing shared is mutated until the finished record is handed back, so a
//! run can be dropped at any point.

use rayon::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::geo::{GeoResolver, Geocoder};
use crate::hierarchy::{HierarchySnapshot, HierarchyStore};
use crate::log::{OperationType, ProcessingLogEntry, ProcessingLogSink};
use crate::parser::{self, ParsedAddress};
use crate::record::{
    AddressRecord, Degradation, PipelineStep, ProcessingMetadata, RecordId, StepOutcome,
};
use crate::scorer::ConfidenceScorer;
use crate::text;
use crate::validator;

pub struct AddressPipeline {
    hierarchy: Arc<HierarchyStore>,
    config: PipelineConfig,
    scorer: ConfidenceScorer,
    geo: GeoResolver,
    log_sink: Option<Arc<dyn ProcessingLogSink>>,
}

impl AddressPipeline {
    pub fn new(hierarchy: Arc<HierarchyStore>, mut config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let scorer = ConfidenceScorer::new(&config);
        let geo = GeoResolver::new(Duration::from_millis(config.geocoder_timeout_ms))
            .with_limits(config.geocoder_workers, config.geocoder_queue);
        Ok(Self {
            hierarchy,
            config,
            scorer,
            geo,
            log_sink: None,
        })
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geo = self.geo.with_geocoder(geocoder);
        self
    }

    pub fn with_log_sink(mut self, sink: Arc<dyn ProcessingLogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn hierarchy(&self) -> &Arc<HierarchyStore> {
        &self.hierarchy
    }

    /// Turn raw text into a record. Only unusable input is an error; every
    /// other problem lowers confidence and is recorded in the metadata.
    pub fn process(&self, id: RecordId, raw: &str) -> Result<AddressRecord> {
        self.run(OperationType::ProcessAddress, id, raw)
    }

    /// Run an existing record's raw text again against the current
    /// hierarchy snapshot
    pub fn reprocess(&self, record: &AddressRecord) -> Result<AddressRecord> {
        self.run(OperationType::ReprocessAddress, record.id, &record.raw_text)
    }

    /// Process many records in parallel. Results keep input order.
    pub fn process_batch(&self, inputs: &[(RecordId, String)]) -> Vec<Result<AddressRecord>> {
        inputs
            .par_iter()
            .map(|(id, raw)| self.process(*id, raw))
            .collect()
    }

    fn run(&self, operation: OperationType, id: RecordId, raw: &str) -> Result<AddressRecord> {
        let started = Instant::now();
        let snapshot = self.hierarchy.snapshot();
        let result = self.run_stages(id, raw, &snapshot);

        let entry = ProcessingLogEntry::new(operation, json!({ "id": id, "raw_text": raw }))
            .with_duration_ms(started.elapsed().as_millis() as u64);
        let entry = match &result {
            Ok(record) => entry.with_output(json!({
                "confidence": record.confidence,
                "validation_status": record.validation_status,
                "resolution_tier": record.resolution_tier,
                "degradations": record.metadata.degradations,
            })),
            Err(e) => entry.with_error(e),
        };
        self.log(&entry);

        result
    }

    fn log(&self, entry: &ProcessingLogEntry) {
        if let Some(sink) = &self.log_sink {
            if let Err(e) = sink.append(entry) {
                tracing::warn!(request_id = %entry.request_id, error = %e, "failed to write processing log entry");
            }
        }
    }

    fn run_stages(
        &self,
        id: RecordId,
        raw: &str,
        snapshot: &HierarchySnapshot,
    ) -> Result<AddressRecord> {
        let mut metadata = ProcessingMetadata::new(snapshot.version());

        let normalized = text::normalize(raw, snapshot.tables()).map_err(Error::Input)?;
        metadata.record_step(
            PipelineStep::Normalize,
            StepOutcome::ok(json!({
                "expansions": normalized.expansions.len(),
                "corrections": normalized.corrections.len(),
            })),
        );

        let mut parsed = parser::parse(&normalized.corrected, snapshot);
        record_parse(&mut metadata, &parsed);

        let verdict = validator::validate(&mut parsed, snapshot);
        let conflicts: Vec<Degradation> = verdict.conflicts.iter().map(Degradation::from).collect();
        let validate_details = json!({
            "statuses": verdict.statuses,
            "ambiguous": verdict.ambiguous,
        });
        metadata.record_step(
            PipelineStep::Validate,
            if conflicts.is_empty() {
                StepOutcome::ok(validate_details)
            } else {
                StepOutcome::degraded(validate_details)
            },
        );
        metadata.degradations.extend(conflicts);

        let geo = self
            .geo
            .resolve(&parsed.components, &normalized.corrected, verdict.resolved, snapshot);
        let geo_details = json!({ "tier": geo.tier });
        metadata.record_step(
            PipelineStep::Geocode,
            if geo.degradations.is_empty() {
                StepOutcome::ok(geo_details)
            } else {
                StepOutcome::degraded(geo_details)
            },
        );
        metadata.degradations.extend(geo.degradations);

        let report = self.scorer.score(&parsed, &verdict, geo.tier);
        metadata.record_step(PipelineStep::Score, StepOutcome::ok(serde_json::to_value(report)?));

        if metadata.is_degraded() {
            tracing::warn!(
                id = %id,
                degradations = metadata.degradations.len(),
                status = %report.status,
                "address processed with degradations"
            );
        } else {
            tracing::debug!(id = %id, confidence = report.score.value(), status = %report.status, "address processed");
        }

        Ok(AddressRecord {
            id,
            raw_text: raw.to_string(),
            normalized_text: normalized.normalized,
            corrected_text: normalized.corrected,
            components: parsed.components,
            coordinate: geo.coordinate,
            resolution_tier: geo.tier,
            confidence: report.score,
            validation_status: report.status,
            metadata,
        })
    }
}

fn record_parse(metadata: &mut ProcessingMetadata, parsed: &ParsedAddress) {
    let details = json!({
        "components": parsed.components.len(),
        "remainder": parsed.remainder_text(),
    });
    if parsed.ambiguities.is_empty() {
        metadata.record_step(PipelineStep::Parse, StepOutcome::ok(details));
        return;
    }
    metadata.record_step(PipelineStep::Parse, StepOutcome::degraded(details));
    metadata
        .degradations
        .extend(parsed.ambiguities.iter().map(|a| Degradation::ParseAmbiguity {
            position: a.position,
            text: a.text.clone(),
            chosen: a.chosen,
            rejected: a.rejected,
        }));
}
