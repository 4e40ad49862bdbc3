// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Replication configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Largest value a store is expected to hold, in KB
const MAX_VALUE_KB: usize = 128;
/// Memory budget for one object store, in KB
const STORE_MEMORY_KB: usize = 128 * 1000;

/// Configuration errors are raised at startup and never degraded around
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("{var} must be set to a secret of at least {min_len} characters")]
    MissingSecret { var: &'static str, min_len: usize },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Tunables shared by the sync handler and change notifier
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    /// Keys per `keys_and_values` message; bounds peak memory of a sync
    pub chunk_size: usize,
    /// Minimum spacing between cursor notifications sent to the index
    #[serde(with = "humantime_serde")]
    pub notify_interval: Duration,
    /// How long a finished sync stream stays open for the reader to drain it
    #[serde(with = "humantime_serde")]
    pub close_grace: Duration,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            // Half the memory budget spent on values of maximum size
            chunk_size: (STORE_MEMORY_KB / 2) / MAX_VALUE_KB,
            notify_interval: Duration::from_secs(1),
            close_grace: Duration::from_secs(60),
        }
    }
}

impl ReplicationConfig {
    /// Parse from TOML, filling unset fields with defaults
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be at least 1".into()));
        }
        if self.notify_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "notify_interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_notify_interval(mut self, interval: Duration) -> Self {
        self.notify_interval = interval;
        self
    }

    pub fn with_close_grace(mut self, grace: Duration) -> Self {
        self.close_grace = grace;
        self
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
