// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Daemon configuration.
//!
//! ```toml
//! socket_path = "/tmp/kchat.sock"
//! log_level = "info"
//! stats_interval_secs = 30
//!
//! [channel]
//! capacity = 2048
//! max_channels = 64
//! ```

use kchat::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default listening socket.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/kchat.sock";

/// kchatd configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Unix domain socket to listen on.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Log level (trace, debug, info, warn, error) or an `EnvFilter` directive.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Statistics reporting interval (seconds, 0 to disable).
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,

    /// Settings applied to every channel.
    #[serde(default)]
    pub channel: kchat::Config,
}

fn default_socket_path() -> PathBuf {
    PathBuf::from(DEFAULT_SOCKET_PATH)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_stats_interval() -> u64 {
    30
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            log_level: default_log_level(),
            stats_interval_secs: default_stats_interval(),
            channel: kchat::Config::default(),
        }
    }
}

impl DaemonConfig {
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

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.socket_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("socket_path is empty".into()));
        }
        self.channel.validate()
    }

    /// Commented example written by `kchatd gen-config`.
    pub fn example() -> String {
        format!(
            r#"# kchatd configuration

# Unix domain socket clients connect to
socket_path = "{}"

# Log level (trace, debug, info, warn, error)
log_level = "info"

# Statistics reporting interval in seconds (0 to disable)
stats_interval_secs = 30

[channel]
# Buffer size of every channel, in bytes
capacity = {}

# Optional limits (unlimited when omitted)
# max_channels = 64
# max_subscribers = 16
"#,
            DEFAULT_SOCKET_PATH,
            kchat::DEFAULT_CAPACITY
        )
    }
}
