// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration management.
//!
//! Configuration is stored in `<state_dir>/config.toml` and includes:
//! - `[remote]`: the service to sync with (optional; without it, operations
//!   are queued but never sent)
//! - `[sync]`: engine and runner tunables
//!
//! Every field has a default, so a missing file or an empty table is valid.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tsq_core::BackoffPolicy;

use crate::env;
use crate::error::{Error, Result};
use crate::sync::{EngineConfig, RunnerConfig};

const APP_DIR_NAME: &str = "tsq";
const CONFIG_FILE_NAME: &str = "config.toml";
const DB_FILE_NAME: &str = "queue.db";
const LOCK_FILE_NAME: &str = "run.lock";
const LOG_FILE_NAME: &str = "tsq.log";

/// Configuration stored in `<state_dir>/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Remote service (optional - if absent, runs in queue-only mode).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteConfig>,
    #[serde(default)]
    pub sync: SyncSettings,
}

/// Remote service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL, e.g. `https://api.example.com/v1`.
    pub url: String,
    /// Per-request timeout in milliseconds (default: 10000).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Path probed for reachability, relative to `url` (default: "/health").
    #[serde(default = "default_health_path")]
    pub health_path: String,
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_health_path() -> String {
    "/health".to_string()
}

impl RemoteConfig {
    pub fn new(url: impl Into<String>) -> Self {
        RemoteConfig {
            url: url.into(),
            timeout_ms: default_timeout_ms(),
            health_path: default_health_path(),
        }
    }

    /// Validates that the URL is an absolute http(s) URL.
    ///
    /// Returns an error message if the URL is invalid.
    pub fn validate_url(&self) -> Option<String> {
        match reqwest::Url::parse(&self.url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => None,
            Ok(_) => Some(format!(
                "invalid remote URL '{}': must start with http:// or https://",
                self.url
            )),
            Err(e) => Some(format!("invalid remote URL '{}': {}", self.url, e)),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Engine and runner tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Entity chains synced concurrently.
    pub max_workers: usize,
    /// Failed attempts retried immediately before backoff kicks in.
    pub backoff_threshold: u32,
    /// First backoff delay in milliseconds; doubles per further attempt.
    pub backoff_base_ms: u64,
    /// Backoff ceiling in seconds.
    pub backoff_max_secs: u64,
    /// Attempts after which a failing operation is reported as stalled.
    pub escalate_after: u32,
    /// Drain at least this often while running.
    pub poll_interval_secs: u64,
    /// Reachability probe interval while running.
    pub probe_interval_secs: u64,
    /// Sync history older than this is pruned when the runner starts.
    pub history_retention_days: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            max_workers: 4,
            backoff_threshold: 5,
            backoff_base_ms: 1_000,
            backoff_max_secs: 300,
            escalate_after: 10,
            poll_interval_secs: 30,
            probe_interval_secs: 15,
            history_retention_days: 30,
        }
    }
}

impl SyncSettings {
    /// Rejects values that would stall or spin the runner.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("sync.max_workers", self.max_workers as u64),
            ("sync.backoff_base_ms", self.backoff_base_ms),
            ("sync.poll_interval_secs", self.poll_interval_secs),
            ("sync.probe_interval_secs", self.probe_interval_secs),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(Error::InvalidSetting {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        if Duration::from_millis(self.backoff_base_ms) > Duration::from_secs(self.backoff_max_secs)
        {
            return Err(Error::InvalidSetting {
                field: "sync.backoff_max_secs",
                reason: "must not be below sync.backoff_base_ms".to_string(),
            });
        }
        Ok(())
    }

    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            threshold: self.backoff_threshold,
            base: Duration::from_millis(self.backoff_base_ms),
            max: Duration::from_secs(self.backoff_max_secs),
        }
    }

    /// Engine settings; `call_timeout` bounds each remote call.
    pub fn engine_config(&self, call_timeout: Duration) -> EngineConfig {
        EngineConfig {
            max_workers: self.max_workers,
            backoff: self.backoff(),
            escalate_after: self.escalate_after,
            call_timeout,
        }
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            history_retention_days: Some(self.history_retention_days),
            ..RunnerConfig::default()
        }
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }
}

impl Config {
    /// Loads configuration from the given state directory.
    ///
    /// A missing file yields the defaults.
    pub fn load(state_dir: &Path) -> Result<Self> {
        let config_path = config_path(state_dir);
        if !config_path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(&config_path)
            .map_err(|e| Error::Config(format!("failed to read config: {}", e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to the given state directory.
    pub fn save(&self, state_dir: &Path) -> Result<()> {
        fs::create_dir_all(state_dir)?;
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(config_path(state_dir), content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(remote) = &self.remote {
            if remote.validate_url().is_some() {
                return Err(Error::InvalidRemoteUrl(remote.url.clone()));
            }
        }
        self.sync.validate()
    }

    /// Returns the remote configuration or [`Error::NoRemote`].
    pub fn require_remote(&self) -> Result<&RemoteConfig> {
        self.remote.as_ref().ok_or(Error::NoRemote)
    }

    /// Per-call timeout for the engine: the HTTP timeout plus slack so the
    /// client's own timeout fires first.
    pub fn call_timeout(&self) -> Duration {
        let http = self
            .remote
            .as_ref()
            .map(RemoteConfig::timeout)
            .unwrap_or(Duration::from_millis(default_timeout_ms()));
        http + Duration::from_secs(1)
    }
}

/// Resolves the state directory.
///
/// Order: explicit flag, `TSQ_STATE_DIR`, `$XDG_STATE_HOME/tsq`,
/// `~/.local/state/tsq`.
pub fn resolve_state_dir(flag: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = flag {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = env::state_dir() {
        return Ok(dir);
    }
    if let Some(xdg) = env::xdg_state_home() {
        return Ok(xdg.join(APP_DIR_NAME));
    }
    dirs::home_dir()
        .map(|home| home.join(".local").join("state").join(APP_DIR_NAME))
        .ok_or_else(|| {
            Error::Config("cannot determine state directory; set TSQ_STATE_DIR".to_string())
        })
}

pub fn config_path(state_dir: &Path) -> PathBuf {
    state_dir.join(CONFIG_FILE_NAME)
}

pub fn db_path(state_dir: &Path) -> PathBuf {
    state_dir.join(DB_FILE_NAME)
}

pub fn lock_path(state_dir: &Path) -> PathBuf {
    state_dir.join(LOCK_FILE_NAME)
}

pub fn log_path(state_dir: &Path) -> PathBuf {
    state_dir.join(LOG_FILE_NAME)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
