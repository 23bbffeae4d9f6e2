//! Configuration management for the remote agent

use crate::{Error, Result};
use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// DevTools HTTP endpoint of the browser
    pub cdp_endpoint: String,

    /// Substring of the page URL used to pick the target to attach to
    pub target_url: Option<String>,

    /// Flag handed to the injected remote functions
    pub experimental: bool,

    /// Keep-alive interval in milliseconds
    pub keep_alive_interval_ms: u64,

    /// Timeout for a single protocol command in seconds
    pub command_timeout_secs: u64,

    /// Path of the remote functions payload
    pub remote_functions_path: Option<String>,

    /// Path of the utility library payload
    pub library_path: Option<String>,

    /// Log level
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cdp_endpoint: "http://localhost:9222".to_string(),
            target_url: None,
            experimental: false,
            keep_alive_interval_ms: 1000,
            command_timeout_secs: 30,
            remote_functions_path: None,
            library_path: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(endpoint) = env::var("REMOTE_AGENT_CDP_ENDPOINT") {
            config.cdp_endpoint = endpoint;
        }

        if let Ok(target_url) = env::var("REMOTE_AGENT_TARGET_URL") {
            config.target_url = Some(target_url);
        }

        if let Ok(experimental) = env::var("REMOTE_AGENT_EXPERIMENTAL") {
            config.experimental = experimental
                .parse()
                .map_err(|_| Error::configuration("Invalid REMOTE_AGENT_EXPERIMENTAL"))?;
        }

        if let Ok(interval) = env::var("REMOTE_AGENT_KEEP_ALIVE_MS") {
            config.keep_alive_interval_ms = interval
                .parse()
                .map_err(|_| Error::configuration("Invalid REMOTE_AGENT_KEEP_ALIVE_MS"))?;
        }

        if let Ok(timeout) = env::var("REMOTE_AGENT_COMMAND_TIMEOUT") {
            config.command_timeout_secs = timeout
                .parse()
                .map_err(|_| Error::configuration("Invalid REMOTE_AGENT_COMMAND_TIMEOUT"))?;
        }

        if let Ok(path) = env::var("REMOTE_AGENT_REMOTE_FUNCTIONS") {
            config.remote_functions_path = Some(path);
        }

        if let Ok(path) = env::var("REMOTE_AGENT_LIBRARY") {
            config.library_path = Some(path);
        }

        if let Ok(log_level) = env::var("REMOTE_AGENT_LOG_LEVEL") {
            config.log_level = log_level;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::configuration(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Error::configuration(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.keep_alive_interval_ms == 0 {
            return Err(Error::configuration("keep_alive_interval_ms must be greater than zero"));
        }
        if self.command_timeout_secs == 0 {
            return Err(Error::configuration("command_timeout_secs must be greater than zero"));
        }
        Ok(())
    }

    /// Keep-alive interval as a duration
    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_millis(self.keep_alive_interval_ms)
    }

    /// Command timeout as a duration
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}
