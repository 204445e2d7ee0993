//! Configuration loading and management.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server identity and listener.
    #[serde(default)]
    pub server: ServerConfig,
    /// Content filter wordlist.
    #[serde(default)]
    pub filter: FilterConfig,
    /// Per-session resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server name used in the welcome line and log fields.
    #[serde(default = "default_server_name")]
    pub name: String,
    /// Listen address (e.g. "127.0.0.1:50000").
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { name: default_server_name(), listen: default_listen() }
    }
}

fn default_server_name() -> String {
    "chatterd".to_string()
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 50000))
}

/// Content filter configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct FilterConfig {
    /// Path to the banned-word list (one word per line, `#` comments).
    /// When unset or unreadable, a small built-in list is used.
    pub wordlist: Option<String>,
    /// Extra banned words merged into the list.
    #[serde(default)]
    pub words: Vec<String>,
}

/// Per-session resource limits.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum accepted input line length in bytes.
    #[serde(default = "default_max_line_len")]
    pub max_line_len: usize,
    /// Outbound queue depth per session. A session whose queue stays full
    /// is treated as dead and torn down.
    #[serde(default = "default_outbox_depth")]
    pub outbox_depth: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { max_line_len: default_max_line_len(), outbox_depth: default_outbox_depth() }
    }
}

fn default_max_line_len() -> usize {
    1024
}

fn default_outbox_depth() -> usize {
    64
}
