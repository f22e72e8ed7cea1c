use crate::error::{PlanError, Result};
use serde::Deserialize;
use std::path::Path;

/// Polling SLA for the task bridge.
///
/// The original deployment hard-coded a ~100s poll ceiling; every timing
/// knob lives here instead so callers can tune it per environment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Milliseconds between job-progress polls.
    pub interval_ms: u64,
    /// Maximum number of polls before `wait_and_get_job` gives up.
    pub max_loops: u32,
    /// Extra result-fetch attempts after progress reports complete.
    pub result_retries: u32,
    /// Attempts to persist a worker-side progress update before dropping it.
    pub progress_retry_limit: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            max_loops: 1000,
            result_retries: 50,
            progress_retry_limit: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Placeholder value for attributes with no rule and no historical default.
    pub unassigned_value: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unassigned_value: "Unassigned".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub poll: PollConfig,
}

impl Config {
    /// Loads configuration from a TOML file, or returns defaults when no
    /// path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                toml::from_str(&content).map_err(|e| PlanError::Config(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }
}
