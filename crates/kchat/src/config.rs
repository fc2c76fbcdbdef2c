// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Registry configuration.
//!
//! Supports both programmatic and file-based configuration.
//!
//! ```toml
//! capacity = 2048
//! max_channels = 64
//! max_subscribers = 16
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Default channel buffer capacity in bytes.
pub const DEFAULT_CAPACITY: usize = 2048;

/// Smallest usable capacity: one byte of data plus one byte of slack.
pub const MIN_CAPACITY: usize = 2;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Channel and registry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Buffer capacity of every channel created by the registry.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Maximum number of live channels (unlimited when absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_channels: Option<usize>,

    /// Maximum number of subscribers per channel (unlimited when absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_subscribers: Option<usize>,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            max_channels: None,
            max_subscribers: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration with the given capacity and no limits.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    /// Set the channel limit.
    pub fn max_channels(mut self, limit: usize) -> Self {
        self.max_channels = Some(limit);
        self
    }

    /// Set the per-channel subscriber limit.
    pub fn max_subscribers(mut self, limit: usize) -> Self {
        self.max_subscribers = Some(limit);
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity < MIN_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "capacity {} is below the minimum of {}",
                self.capacity, MIN_CAPACITY
            )));
        }
        Ok(())
    }

    pub(crate) fn channel_limit_reached(&self, live: usize) -> bool {
        self.max_channels.is_some_and(|max| live >= max)
    }

    pub(crate) fn subscriber_limit_reached(&self, live: usize) -> bool {
        self.max_subscribers.is_some_and(|max| live >= max)
    }
}
