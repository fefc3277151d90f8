//! Configuration schema consumed by the autoscaler core.
//!
//! Loading conventions (files, environment) belong to the embedding
//! application; this module only defines the shape and the defaults.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use ebbtide_metrics::QueueSet;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::strategy::ScaleStrategy;

/// Top-level autoscaler configuration: one entry per managed process type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoscaleConfig {
    /// Application identity passed through to the fleet controller.
    pub app_name: String,
    /// Managed process types, keyed by process name.
    pub processes: BTreeMap<String, ProcessConfig>,
}

impl AutoscaleConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml_str(&raw)
    }
}

/// Per-process scaling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Watched queues; `["*"]` (the default) watches everything.
    #[serde(default = "default_queues")]
    pub queues: Vec<String>,
    /// Count jobs scheduled for later execution as backlog.
    #[serde(default = "default_true")]
    pub include_scheduled: bool,
    /// Count jobs awaiting retry as backlog.
    #[serde(default = "default_true")]
    pub include_retrying: bool,
    /// Scale decision strategy.
    #[serde(default)]
    pub scale: ScaleStrategy,
    /// Minimum interval between scale evaluations.
    #[serde(default = "default_period_seconds")]
    pub throttle_seconds: u64,
    /// Minimum wait after initiating a quietdown before acting on it.
    #[serde(default = "default_period_seconds")]
    pub quiet_buffer_seconds: u64,
    /// Minimum time since the process last left zero before it may
    /// return to zero.
    #[serde(default = "default_period_seconds")]
    pub minimum_uptime_seconds: u64,
}

fn default_queues() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_period_seconds() -> u64 {
    10
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            queues: default_queues(),
            include_scheduled: true,
            include_retrying: true,
            scale: ScaleStrategy::default(),
            throttle_seconds: default_period_seconds(),
            quiet_buffer_seconds: default_period_seconds(),
            minimum_uptime_seconds: default_period_seconds(),
        }
    }
}

impl ProcessConfig {
    /// Resolve the watched-queue set.
    ///
    /// `"*"` must stand alone; an empty list behaves like the default
    /// wildcard. `process` is only used to name the offender in errors.
    pub fn queue_set(&self, process: &str) -> Result<QueueSet, ConfigError> {
        if self.queues.is_empty() {
            return Ok(QueueSet::All);
        }
        if self.queues.iter().any(|q| q == "*") {
            if self.queues.len() > 1 {
                return Err(ConfigError::MixedWildcard {
                    process: process.to_string(),
                });
            }
            return Ok(QueueSet::All);
        }
        Ok(QueueSet::named(self.queues.iter().cloned()))
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_secs(self.throttle_seconds)
    }

    pub fn quiet_buffer(&self) -> Duration {
        Duration::from_secs(self.quiet_buffer_seconds)
    }

    pub fn minimum_uptime(&self) -> Duration {
        Duration::from_secs(self.minimum_uptime_seconds)
    }
}
