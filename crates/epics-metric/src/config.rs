// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! YAML configuration for the EPICS metric sink.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default channel name prefix.
pub const DEFAULT_PREFIX: &str = "artdaq";

/// Default time to wait for a channel search to resolve (milliseconds).
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

/// Sink configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SinkConfig {
    /// Prefix prepended (with `:`) to every channel name.
    pub channel_name_prefix: String,
    /// Append a process-identifying suffix to every channel name.
    pub unique_channel_names: bool,
    /// Bounded wait for a channel search, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Cooldown before a failed channel is searched again, in
    /// milliseconds. Absent means never retry.
    pub failed_channel_retry_ms: Option<u64>,
}

/// Retry policy for channels that failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    /// A failed channel stays failed until the sink is stopped.
    #[default]
    Never,
    /// A failed channel is searched again once the cooldown has elapsed.
    Cooldown {
        /// Minimum time between two searches for the same channel.
        cooldown_ms: u64,
    },
}

impl RetryPolicy {
    /// Cooldown as a duration, `None` for [`RetryPolicy::Never`].
    pub fn cooldown(&self) -> Option<Duration> {
        match self {
            RetryPolicy::Never => None,
            RetryPolicy::Cooldown { cooldown_ms } => Some(Duration::from_millis(*cooldown_ms)),
        }
    }
}

/// Configuration parsing errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// File I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A value parsed but is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            channel_name_prefix: DEFAULT_PREFIX.to_string(),
            unique_channel_names: false,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            failed_channel_retry_ms: None,
        }
    }
}

impl SinkConfig {
    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: SinkConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "connect_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Connect timeout as a duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Retry policy for failed channels.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self.failed_channel_retry_ms {
            Some(cooldown_ms) => RetryPolicy::Cooldown { cooldown_ms },
            None => RetryPolicy::Never,
        }
    }
}
