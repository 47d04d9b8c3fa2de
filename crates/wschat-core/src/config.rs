//! Configuration resolution for wschat.
//!
//! Implements layered config resolution:
//! 1. Built-in defaults
//! 2. Config file (`--config`, or `~/.config/wschat/config.toml` when present)
//! 3. Environment variables (`WSCHAT_*`)
//! 4. CLI arguments (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Complete wschat configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub client: ClientConfig,
    pub logging: LoggingConfig,
    pub discovery: DiscoveryConfig,
}

/// Server-mode configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host bound when an explicit port is given.
    pub bind_host: String,
    /// Host bound when port 0 ("local default") is given.
    pub local_host: String,
    /// Port substituted for port 0.
    pub local_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            local_host: "127.0.0.1".to_string(),
            local_port: 8080,
        }
    }
}

/// Client-mode reconnection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Delay before the first reconnect attempt (milliseconds).
    pub reconnect_initial_ms: u64,
    /// Upper bound on the reconnect delay (milliseconds).
    pub reconnect_max_ms: u64,
    /// Multiplier applied to the delay after each failed attempt.
    pub reconnect_multiplier: f64,
    /// Maximum reconnect attempts (None = unlimited).
    pub max_reconnect_attempts: Option<u32>,
    /// A connection that stayed up this long resets the backoff (seconds).
    pub stable_after_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reconnect_initial_ms: 1_000,
            reconnect_max_ms: 60_000,
            reconnect_multiplier: 2.0,
            max_reconnect_attempts: None,
            stable_after_secs: 60,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Public-IP discovery configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Endpoint returning the caller's address as plain text.
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.ipify.org".to_string(),
            timeout_secs: 5,
        }
    }
}

/// Load configuration with layered resolution.
///
/// An explicit `path` must exist; the global path is only read if present.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(p) => load_config_file(p)?,
        None => match global_config_path() {
            Some(global) if global.exists() => load_config_file(&global)?,
            _ => Config::default(),
        },
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Get the global config file path: `$XDG_CONFIG_HOME/wschat/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("wschat").join("config.toml"))
}

fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    toml::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

/// Apply `WSCHAT_*` overrides using `lookup` to read variables.
///
/// Unparseable numeric or boolean values are ignored.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("WSCHAT_BIND_HOST") {
        config.server.bind_host = val;
    }
    if let Some(val) = lookup("WSCHAT_LOG_LEVEL") {
        config.logging.level = val;
    }
    if let Some(val) = lookup("WSCHAT_LOG_JSON") {
        if let Ok(b) = val.parse() {
            config.logging.json = b;
        }
    }
    if let Some(val) = lookup("WSCHAT_MAX_RECONNECT_ATTEMPTS") {
        if let Ok(n) = val.parse() {
            config.client.max_reconnect_attempts = Some(n);
        }
    }
    if let Some(val) = lookup("WSCHAT_IP_ENDPOINT") {
        config.discovery.endpoint = val;
    }
}
