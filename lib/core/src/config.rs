use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ConfigError, Result};
use crate::record::ComponentKind;

/// Relative weights of the three confidence inputs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub parse: f64,
    pub hierarchy: f64,
    pub geo: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            parse: 0.4,
            hierarchy: 0.4,
            geo: 0.2,
        }
    }
}

impl ScoringWeights {
    pub fn sum(&self) -> f64 {
        self.parse + self.hierarchy + self.geo
    }

    /// Check weights and scale them to sum to 1.0
    pub fn validate_and_normalize(&mut self) -> std::result::Result<(), ConfigError> {
        for (name, value) in [("parse", self.parse), ("hierarchy", self.hierarchy), ("geo", self.geo)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight { name, value });
            }
        }
        let sum = self.sum();
        if sum <= 0.0 {
            return Err(ConfigError::ZeroTotalWeight);
        }
        if (sum - 1.0).abs() > 1e-9 {
            self.parse /= sum;
            self.hierarchy /= sum;
            self.geo /= sum;
        }
        Ok(())
    }
}

/// Settings for the per-record pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub scoring: ScoringWeights,
    /// Minimum confidence for a conflict-free record to be `valid`
    pub valid_threshold: f64,
    /// Kinds that parse completeness is measured against
    pub expected_kinds: Vec<ComponentKind>,
    pub geocoder_timeout_ms: u64,
    /// Threads that call the geocoder
    pub geocoder_workers: usize,
    /// Calls that may wait for a free worker before new ones are turned away
    pub geocoder_queue: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringWeights::default(),
            valid_threshold: 0.8,
            expected_kinds: vec![
                ComponentKind::Province,
                ComponentKind::District,
                ComponentKind::Neighborhood,
                ComponentKind::Street,
                ComponentKind::BuildingNumber,
            ],
            geocoder_timeout_ms: 2_000,
            geocoder_workers: 4,
            geocoder_queue: 16,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&mut self) -> std::result::Result<(), ConfigError> {
        self.scoring.validate_and_normalize()?;
        if !(0.0..=1.0).contains(&self.valid_threshold) {
            return Err(ConfigError::OutOfRange {
                name: "valid_threshold",
                value: self.valid_threshold,
            });
        }
        if self.expected_kinds.is_empty() {
            return Err(ConfigError::NoExpectedKinds);
        }
        for (i, kind) in self.expected_kinds.iter().enumerate() {
            if self.expected_kinds[..i].contains(kind) {
                return Err(ConfigError::DuplicateKind(*kind));
            }
        }
        if self.geocoder_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.geocoder_workers == 0 {
            return Err(ConfigError::ZeroLimit("geocoder_workers"));
        }
        if self.geocoder_queue == 0 {
            return Err(ConfigError::ZeroLimit("geocoder_queue"));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration. Missing fields keep their
    /// defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}
