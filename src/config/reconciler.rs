//! Reconciliation sweep configuration

use serde::Deserialize;
use std::time::Duration;

use crate::application::ReconcilerConfig;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct ReconcilerSettings {
    /// Run the background sweep
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Unprocessed events younger than this are left to Stripe redelivery
    #[serde(default = "default_min_age")]
    pub min_age_secs: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

impl ReconcilerSettings {
    pub fn worker_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            min_age: Duration::from_secs(self.min_age_secs),
            batch_size: self.batch_size,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.poll_interval_secs == 0 {
            return Err(ValidationError::InvalidPollInterval);
        }
        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ValidationError::InvalidBatchSize);
        }
        Ok(())
    }
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            poll_interval_secs: default_poll_interval(),
            min_age_secs: default_min_age(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    60
}

fn default_min_age() -> u64 {
    300
}

fn default_batch_size() -> u32 {
    50
}
