//! Similarity weights and configuration
//!
//! Four factors contribute to the similarity of two address records. Their
//! weights are declared here, validated, and normalized to sum to 1.0.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Relative weight of each similarity factor
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimilarityWeights {
    pub textual: f64,
    pub hierarchical: f64,
    pub geographic: f64,
    pub semantic: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            textual: 0.30,
            hierarchical: 0.30,
            geographic: 0.25,
            semantic: 0.15,
        }
    }
}

impl SimilarityWeights {
    fn named(&self) -> [(&'static str, f64); 4] {
        [
            ("textual", self.textual),
            ("hierarchical", self.hierarchical),
            ("geographic", self.geographic),
            ("semantic", self.semantic),
        ]
    }

    pub fn sum(&self) -> f64 {
        self.textual + self.hierarchical + self.geographic + self.semantic
    }

    /// Validate the weights
    /// - Checks that weights are finite and non-negative
    /// - Normalizes weights to sum to 1.0 if they don't
    pub fn validate_and_normalize(&mut self) -> Result<(), WeightsError> {
        for (name, value) in self.named() {
            if !value.is_finite() || value < 0.0 {
                return Err(WeightsError::NegativeWeight { name, value });
            }
        }

        let weight_sum = self.sum();
        if weight_sum <= 0.0 {
            return Err(WeightsError::ZeroTotalWeight);
        }

        if (weight_sum - 1.0).abs() > 1e-9 {
            self.textual /= weight_sum;
            self.hierarchical /= weight_sum;
            self.geographic /= weight_sum;
            self.semantic /= weight_sum;
        }

        Ok(())
    }
}

/// Weights plus the distance band of the geographic factor
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimilarityConfig {
    pub weights: SimilarityWeights,
    /// At or below this distance two points count as the same place
    pub near_m: f64,
    /// At or beyond this distance two points share nothing
    pub far_m: f64,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            weights: SimilarityWeights::default(),
            near_m: 100.0,
            far_m: 5_000.0,
        }
    }
}

impl SimilarityConfig {
    pub fn validate(&mut self) -> Result<(), WeightsError> {
        self.weights.validate_and_normalize()?;
        if !(self.near_m.is_finite() && self.far_m.is_finite())
            || self.near_m < 0.0
            || self.far_m <= self.near_m
        {
            return Err(WeightsError::InvalidDistanceBand {
                near_m: self.near_m,
                far_m: self.far_m,
            });
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self, WeightsError> {
        let mut config: SimilarityConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, WeightsError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

/// Similarity configuration errors
#[derive(Debug, Error)]
pub enum WeightsError {
    #[error("weight {name} must be finite and non-negative, got {value}")]
    NegativeWeight { name: &'static str, value: f64 },

    #[error("total weight must be positive")]
    ZeroTotalWeight,

    #[error("invalid distance band: near {near_m} m, far {far_m} m")]
    InvalidDistanceBand { near_m: f64, far_m: f64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid similarity configuration: {0}")]
    Json(#[from] serde_json::Error),
}
