//! Grouping configuration

use crate::error::{GroupingError, Result};
use adresx_core::ComponentKind;
use adresx_similarity::SimilarityConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Backoff between attempts to take group leases
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 5,
            max_backoff_ms: 200,
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based), doubling each time
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(20);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(GroupingError::InvalidRetryPolicy(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(GroupingError::InvalidRetryPolicy(format!(
                "initial backoff {} ms exceeds max backoff {} ms",
                self.initial_backoff_ms, self.max_backoff_ms
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupingConfig {
    /// Pairs scoring at or above this are duplicates
    pub threshold: f64,
    /// Records sharing a value at any of these levels are compared
    pub blocking_levels: Vec<ComponentKind>,
    /// Emit one-member groups for records without duplicates
    pub include_singletons: bool,
    pub similarity: SimilarityConfig,
    pub retry: RetryPolicy,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            threshold: 0.85,
            blocking_levels: vec![
                ComponentKind::Province,
                ComponentKind::District,
                ComponentKind::Neighborhood,
            ],
            include_singletons: false,
            similarity: SimilarityConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl GroupingConfig {
    pub fn validate(&mut self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(GroupingError::InvalidThreshold(self.threshold));
        }
        self.blocking_levels.sort();
        self.blocking_levels.dedup();
        if self.blocking_levels.is_empty() {
            return Err(GroupingError::NoBlockingLevels);
        }
        self.similarity.validate()?;
        self.retry.validate()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut config: GroupingConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}
