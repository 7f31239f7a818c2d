// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client configuration.
//!
//! A `tandem.toml` in the working directory takes precedence over
//! `tandem/config.toml` under the user config directory. Every field is
//! optional; a missing file means defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use td_core::{EngineConfig, FlushPolicy};

use crate::client::SyncConfig;

const CONFIG_DIR_NAME: &str = "tandem";
const CONFIG_FILE_NAME: &str = "config.toml";
const LOCAL_FILE_NAME: &str = "tandem.toml";

/// Error loading the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// Client configuration stored in `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Relay URL (`ws://` or `wss://`).
    #[serde(default = "default_url")]
    pub url: String,
    /// Maximum reconnection attempts before giving up (default: 10).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First reconnection delay in milliseconds (default: 100).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Maximum delay between reconnection attempts in seconds (default: 30).
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
    /// Event-loop batches an echo entry survives (default: 4).
    #[serde(default = "default_echo_ttl")]
    pub echo_ttl: u32,
    /// When local edits are sent: `immediate` or `end_of_batch`.
    #[serde(default)]
    pub flush: FlushPolicy,
}

fn default_url() -> String {
    "ws://localhost:7890".to_string()
}

fn default_max_retries() -> u32 {
    10
}

fn default_initial_delay_ms() -> u64 {
    100
}

fn default_max_delay_secs() -> u64 {
    30
}

fn default_echo_ttl() -> u32 {
    4
}

impl Default for Config {
    fn default() -> Self {
        Config {
            url: default_url(),
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_secs: default_max_delay_secs(),
            echo_ttl: default_echo_ttl(),
            flush: FlushPolicy::default(),
        }
    }
}

impl Config {
    /// Default location of the config file, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads the config at `path`, or the defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Config::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Loads the config for the working directory.
    pub fn load_default() -> Result<Config, ConfigError> {
        let cwd = std::env::current_dir().map_err(|source| ConfigError::Read {
            path: ".".to_string(),
            source,
        })?;
        Config::load_from(&cwd)
    }

    /// Loads `tandem.toml` in `dir` if there is one, else the config at
    /// the default location.
    pub fn load_from(dir: &Path) -> Result<Config, ConfigError> {
        let local = dir.join(LOCAL_FILE_NAME);
        if local.exists() {
            return Config::load(&local);
        }
        match Config::default_path() {
            Some(path) => Config::load(&path),
            None => Ok(Config::default()),
        }
    }

    /// Parses a config from TOML.
    pub fn parse(content: &str) -> Result<Config, toml::de::Error> {
        toml::from_str(content)
    }

    /// Client settings derived from this config.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            url: self.url.clone(),
            max_retries: self.max_retries,
            max_delay_secs: self.max_delay_secs,
            initial_delay_ms: self.initial_delay_ms,
            engine: EngineConfig {
                echo_ttl: self.echo_ttl,
                flush: self.flush,
            },
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
