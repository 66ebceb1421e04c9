//! Review configuration.

use std::path::Path;

use netreview_buffers::BufferType;
use serde::{Deserialize, Serialize};

use crate::checks::{CrossingParams, ProximityParams};
use crate::error::ReviewError;
use crate::runner::{Execution, RunOptions};

/// Settings for a review run. Missing JSON fields take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    pub buffer_type: BufferType,
    pub execution: Execution,
    pub crossing: CrossingParams,
    pub proximity: ProximityParams,
}

impl ReviewConfig {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let config: ReviewConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Every tolerance must be finite and non-negative.
    pub fn validate(&self) -> Result<(), ReviewError> {
        self.crossing.validate()?;
        self.proximity.validate()
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            buffer_type: self.buffer_type,
            execution: self.execution,
        }
    }
}
